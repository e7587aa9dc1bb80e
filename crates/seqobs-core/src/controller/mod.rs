//! Observation controller.
//!
//! [`observe`] runs a sequence provider inside a tracked computation and
//! keeps the consumer's rendered state in step with whatever the provider
//! returns, across every recomputation.
//!
//! ## Recomputation
//!
//! 1. The provider runs. If it fails nothing else happens: no event, and the
//!    rendered state and any live bridge stay as they were.
//! 2. The output is materialized as a snapshot and diffed once against the
//!    rendered state. This one pass covers every transition between null,
//!    snapshot and source outputs.
//! 3. The events are applied to the rendered state and the previous live
//!    bridge, if any, is detached.
//! 4. A new bridge is attached for a source output, then the events are
//!    delivered.
//!
//! Between recomputations a live source's own notifications are translated
//! and delivered through the same outbox.
//!
//! ## Phases
//!
//! `Idle` until the first run completes, `Active` afterwards, `Stopped`
//! once [`ObserveHandle::stop`] is called or the handle is dropped. No event
//! is delivered after `Stopped` is reached.

pub mod callbacks;
pub mod options;
pub mod output;

pub use callbacks::{NoCallbacks, SequenceCallbacks};
pub use options::ObserveOptions;
pub use output::{OutputKind, SequenceOutput};

use crate::bridge::{translate, LiveSourceBridge};
use crate::diff::diff;
use crate::errors::Result;
use crate::identity::ChangePolicy;
use crate::model::{RenderedState, SequenceEvent, Snapshot};
use crate::reactive::{Computation, ComputationContext, Tracker};
use crate::source::{LiveSource, NotificationSink, SourceNotification};
use crate::{log_op_end, log_op_error, log_op_start};
use seqobs_core_types::ObservationId;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Instant;

/// Lifecycle of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
    Stopped,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Active => "active",
            Phase::Stopped => "stopped",
        }
    }
}

/// Start observing `provider` with default options.
///
/// # Errors
///
/// Returns the provider's error if its first run fails; nothing is observed
/// in that case.
pub fn observe<P, C>(tracker: &Tracker, provider: P, callbacks: C) -> Result<ObserveHandle>
where
    P: FnMut(&ComputationContext) -> Result<SequenceOutput> + 'static,
    C: SequenceCallbacks + 'static,
{
    observe_with_options(tracker, provider, callbacks, ObserveOptions::default())
}

/// Start observing `provider`.
///
/// The provider runs once before this returns, and the events for its
/// initial output are delivered during that run. Later runs happen when a
/// dependency it read through its context changes and `tracker` is flushed.
///
/// # Errors
///
/// Returns the provider's error if its first run fails; nothing is observed
/// in that case.
pub fn observe_with_options<P, C>(
    tracker: &Tracker,
    mut provider: P,
    callbacks: C,
    options: ObserveOptions,
) -> Result<ObserveHandle>
where
    P: FnMut(&ComputationContext) -> Result<SequenceOutput> + 'static,
    C: SequenceCallbacks + 'static,
{
    let start = Instant::now();
    let shared = Rc::new(Shared {
        id: ObservationId::new(),
        label: options.label.unwrap_or_default(),
        core: RefCell::new(Core {
            phase: Phase::Idle,
            rendered: RenderedState::new(),
            bridge: None,
        }),
        callbacks: RefCell::new(Box::new(callbacks)),
        outbox: RefCell::new(VecDeque::new()),
        computation: RefCell::new(None),
    });
    log_op_start!(
        "observe",
        observation_id = %shared.id,
        label = shared.label.as_str()
    );

    let weak = Rc::downgrade(&shared);
    let entered = tracker.enter(move |cx| match weak.upgrade() {
        Some(shared) => shared.recompute(&mut provider, cx),
        None => Ok(()),
    });

    match entered {
        Ok(computation) => {
            if shared.phase() == Phase::Stopped {
                computation.stop();
            }
            *shared.computation.borrow_mut() = Some(computation);
            log_op_end!(
                "observe",
                duration_ms = start.elapsed().as_millis() as u64,
                observation_id = %shared.id,
                label = shared.label.as_str()
            );
            Ok(ObserveHandle { shared })
        }
        Err(err) => {
            shared.stop();
            log_op_error!(
                "observe",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                observation_id = %shared.id,
                label = shared.label.as_str()
            );
            Err(err)
        }
    }
}

struct Shared {
    id: ObservationId,
    label: String,
    core: RefCell<Core>,
    callbacks: RefCell<Box<dyn SequenceCallbacks>>,
    outbox: RefCell<VecDeque<SequenceEvent>>,
    computation: RefCell<Option<Computation>>,
}

struct Core {
    phase: Phase,
    rendered: RenderedState,
    bridge: Option<LiveSourceBridge>,
}

impl Shared {
    fn phase(&self) -> Phase {
        self.core.borrow().phase
    }

    fn is_stopped(&self) -> bool {
        self.phase() == Phase::Stopped
    }

    fn recompute<P>(self: &Rc<Self>, provider: &mut P, cx: &ComputationContext) -> Result<()>
    where
        P: FnMut(&ComputationContext) -> Result<SequenceOutput>,
    {
        if self.is_stopped() {
            return Ok(());
        }
        let start = Instant::now();
        log_op_start!(
            "recompute",
            observation_id = %self.id,
            label = self.label.as_str()
        );

        let output = match provider(cx) {
            Ok(output) => output,
            Err(err) => {
                log_op_error!(
                    "recompute",
                    err.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    observation_id = %self.id,
                    label = self.label.as_str()
                );
                return Err(err);
            }
        };
        let mode = output.kind();

        match self.transition(output) {
            Ok(events) => {
                log_op_end!(
                    "recompute",
                    duration_ms = start.elapsed().as_millis() as u64,
                    observation_id = %self.id,
                    label = self.label.as_str(),
                    mode = mode.as_str(),
                    events = events as u64
                );
                Ok(())
            }
            Err(err) => {
                log_op_error!(
                    "recompute",
                    err.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    observation_id = %self.id,
                    label = self.label.as_str(),
                    mode = mode.as_str()
                );
                Err(err)
            }
        }
    }

    /// Diff the rendered state against `output`, commit, attach, deliver.
    /// Returns the number of events produced.
    fn transition(self: &Rc<Self>, output: SequenceOutput) -> Result<usize> {
        let (snapshot, source) = match output {
            SequenceOutput::Null => (Snapshot::empty(), None),
            SequenceOutput::Snapshot(items) => (Snapshot::from_items(items), None),
            SequenceOutput::Source(source) => {
                (Snapshot::from_items(source.snapshot()), Some(source))
            }
        };

        let (events, old_bridge) = {
            let mut core = self.core.borrow_mut();
            if core.phase == Phase::Stopped {
                return Ok(0);
            }
            // A bridge to this very source has kept the rendered state in
            // sync, so only real differences are worth reporting.
            let same_source = match (&core.bridge, &source) {
                (Some(bridge), Some(source)) => bridge.source_id() == source.id(),
                _ => false,
            };
            let policy = if same_source {
                ChangePolicy::WhenDifferent
            } else {
                ChangePolicy::Always
            };
            let events = diff(&core.rendered, &snapshot, policy)?;
            for event in &events {
                core.rendered.apply(event)?;
            }
            if core.phase == Phase::Idle {
                core.phase = Phase::Active;
            }
            (events, core.bridge.take())
        };
        if let Some(bridge) = old_bridge {
            bridge.detach();
        }

        self.outbox.borrow_mut().extend(events.iter().cloned());
        if let Some(source) = source {
            self.attach(source.as_ref());
        }
        self.pump();
        Ok(events.len())
    }

    fn attach(self: &Rc<Self>, source: &dyn LiveSource) {
        let weak: Weak<Shared> = Rc::downgrade(self);
        let sink: NotificationSink = Rc::new(move |notification| {
            if let Some(shared) = weak.upgrade() {
                shared.on_notification(notification);
            }
        });
        let bridge = LiveSourceBridge::attach(source, sink);
        let mut core = self.core.borrow_mut();
        if core.phase == Phase::Stopped {
            drop(core);
            bridge.detach();
        } else {
            core.bridge = Some(bridge);
        }
    }

    fn on_notification(&self, notification: SourceNotification) {
        {
            let Ok(mut core) = self.core.try_borrow_mut() else {
                tracing::warn!(
                    component = module_path!(),
                    observation_id = %self.id,
                    key = %notification.id(),
                    "notification arrived mid-transition; dropped"
                );
                return;
            };
            if core.phase == Phase::Stopped {
                return;
            }
            let Some(event) = translate(&core.rendered, notification) else {
                return;
            };
            if let Err(err) = core.rendered.apply(&event) {
                tracing::warn!(
                    component = module_path!(),
                    observation_id = %self.id,
                    error = %err,
                    "live event rejected"
                );
                return;
            }
            self.outbox.borrow_mut().push_back(event);
        }
        self.pump();
    }

    /// Deliver queued events. A call made while delivery is already running
    /// further up the stack returns at once; that outer loop picks up
    /// whatever was queued.
    fn pump(&self) {
        let Ok(mut callbacks) = self.callbacks.try_borrow_mut() else {
            return;
        };
        loop {
            if self.is_stopped() {
                self.outbox.borrow_mut().clear();
                return;
            }
            let next = self.outbox.borrow_mut().pop_front();
            let Some(event) = next else { return };
            callbacks.on_event(&event);
        }
    }

    fn stop(&self) {
        let bridge = {
            let mut core = self.core.borrow_mut();
            if core.phase == Phase::Stopped {
                return;
            }
            core.phase = Phase::Stopped;
            core.rendered.clear();
            core.bridge.take()
        };
        if let Some(bridge) = bridge {
            bridge.detach();
        }
        self.outbox.borrow_mut().clear();
        if let Some(computation) = self.computation.borrow().as_ref() {
            computation.stop();
        }
        tracing::info!(
            component = module_path!(),
            op = "stop",
            observation_id = %self.id,
            label = self.label.as_str(),
            "observation stopped"
        );
    }
}

/// Owner of a running observation.
///
/// Dropping the handle stops the observation.
#[must_use = "dropping the handle stops the observation"]
pub struct ObserveHandle {
    shared: Rc<Shared>,
}

impl ObserveHandle {
    /// Stop delivering events and release the provider and any live source.
    /// Idempotent, and safe to call from inside a callback.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    pub fn id(&self) -> &ObservationId {
        &self.shared.id
    }

    /// Copy of what has been communicated so far, including events queued
    /// but not yet delivered.
    pub fn rendered(&self) -> Snapshot {
        self.shared.core.borrow().rendered.to_snapshot()
    }

    /// Whether a live source is currently bridged.
    pub fn is_live(&self) -> bool {
        self.shared.core.borrow().bridge.is_some()
    }

    /// A handle callbacks can hold to stop this observation.
    pub fn stopper(&self) -> StopHandle {
        StopHandle {
            shared: Rc::downgrade(&self.shared),
        }
    }
}

impl Drop for ObserveHandle {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl fmt::Debug for ObserveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserveHandle")
            .field("id", &self.shared.id)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Weak stop handle; does nothing once the observation is gone.
#[derive(Clone)]
pub struct StopHandle {
    shared: Weak<Shared>,
}

impl StopHandle {
    pub fn stop(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.upgrade().map_or(true, |shared| shared.is_stopped())
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SeqObsError;
    use crate::reactive::ReactiveVar;
    use serde_json::{json, Value};

    fn recorder() -> (Rc<RefCell<Vec<SequenceEvent>>>, impl FnMut(&SequenceEvent)) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, move |e: &SequenceEvent| sink.borrow_mut().push(e.clone()))
    }

    #[test]
    fn test_initial_run_delivers_before_returning() {
        let tracker = Tracker::new();
        let (log, cb) = recorder();
        let handle = observe(
            &tracker,
            |_| Ok(SequenceOutput::items(vec![json!({"_id": "a"})])),
            cb,
        )
        .unwrap();
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(handle.phase(), Phase::Active);
        assert_eq!(handle.rendered().len(), 1);
    }

    #[test]
    fn test_first_run_failure_is_returned() {
        let tracker = Tracker::new();
        let err = observe(
            &tracker,
            |_| Err(SeqObsError::provider("no data")),
            NoCallbacks,
        )
        .unwrap_err();
        assert!(matches!(err, SeqObsError::ProviderFailed { .. }));
    }

    #[test]
    fn test_failed_rerun_leaves_state_alone() {
        let tracker = Tracker::new();
        let var: ReactiveVar<Option<Vec<Value>>> =
            ReactiveVar::new(Some(vec![json!({"_id": "a"})]));
        let v = var.clone();
        let (log, cb) = recorder();
        let handle = observe(
            &tracker,
            move |cx| {
                v.get(cx)
                    .map(SequenceOutput::Snapshot)
                    .ok_or_else(|| SeqObsError::provider("gone"))
            },
            cb,
        )
        .unwrap();
        var.set(None);
        assert!(tracker.flush().is_err());
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(handle.rendered().len(), 1);
    }

    #[test]
    fn test_stop_from_inside_callback() {
        let tracker = Tracker::new();
        let stopper: Rc<RefCell<Option<StopHandle>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&stopper);
        let delivered = Rc::new(RefCell::new(0));
        let count = Rc::clone(&delivered);
        let var = ReactiveVar::new(vec![json!({"_id": "a"})]);
        let v = var.clone();
        let handle = observe(
            &tracker,
            move |cx| Ok(SequenceOutput::Snapshot(v.get(cx))),
            move |_: &SequenceEvent| {
                *count.borrow_mut() += 1;
                if let Some(stop) = slot.borrow().as_ref() {
                    stop.stop();
                }
            },
        )
        .unwrap();
        *stopper.borrow_mut() = Some(handle.stopper());

        var.set(vec![json!({"_id": "b"}), json!({"_id": "c"})]);
        tracker.flush().unwrap();

        // initial add, then the first event of the transition stops delivery
        assert_eq!(*delivered.borrow(), 2);
        assert!(handle.is_stopped());
        assert!(handle.rendered().is_empty());
    }

    #[test]
    fn test_drop_stops() {
        let tracker = Tracker::new();
        let var = ReactiveVar::new(vec![json!(1)]);
        let v = var.clone();
        let (log, cb) = recorder();
        let handle = observe(
            &tracker,
            move |cx| Ok(SequenceOutput::Snapshot(v.get(cx))),
            cb,
        )
        .unwrap();
        let stopper = handle.stopper();
        drop(handle);
        assert!(stopper.is_stopped());
        var.set(vec![json!(2)]);
        tracker.flush().unwrap();
        assert_eq!(log.borrow().len(), 1);
    }
}
