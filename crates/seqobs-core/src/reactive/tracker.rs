use crate::errors::Result;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

type ComputeFn = Box<dyn FnMut(&ComputationContext) -> Result<()>>;

/// Scheduler for tracked computations.
///
/// Cloning yields another handle to the same scheduler. Not thread-safe.
#[derive(Clone, Default)]
pub struct Tracker {
    inner: Rc<TrackerInner>,
}

#[derive(Default)]
struct TrackerInner {
    pending: RefCell<VecDeque<Weak<ComputationInner>>>,
    flushing: Cell<bool>,
    next_id: Cell<u64>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` once now, recording its dependencies, and return the
    /// computation that will rerun it after any of them change.
    ///
    /// The computation lives as long as a [`Computation`] handle to it does.
    ///
    /// # Errors
    ///
    /// Returns the first run's error; the computation is stopped in that
    /// case.
    pub fn enter<F>(&self, f: F) -> Result<Computation>
    where
        F: FnMut(&ComputationContext) -> Result<()> + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let inner = Rc::new(ComputationInner {
            id,
            func: RefCell::new(Box::new(f)),
            invalidated: Cell::new(false),
            stopped: Cell::new(false),
            runs: Cell::new(0),
            tracker: Rc::downgrade(&self.inner),
            deps: RefCell::new(Vec::new()),
        });
        let computation = Computation { inner };
        if let Err(err) = ComputationInner::run(&computation.inner) {
            computation.stop();
            return Err(err);
        }
        Ok(computation)
    }

    /// Rerun every invalidated computation, including ones invalidated while
    /// flushing, until none are left.
    ///
    /// A flush requested from inside a running flush returns immediately.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a rerun. Every pending computation
    /// is still rerun.
    pub fn flush(&self) -> Result<()> {
        if self.inner.flushing.replace(true) {
            return Ok(());
        }
        let _guard = FlushGuard(&self.inner.flushing);

        let mut first_err = None;
        let mut reruns = 0usize;
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(weak) = next else { break };
            let Some(computation) = weak.upgrade() else {
                continue;
            };
            if computation.stopped.get() || !computation.invalidated.get() {
                continue;
            }
            reruns += 1;
            if let Err(err) = ComputationInner::run(&computation) {
                first_err.get_or_insert(err);
            }
        }
        tracing::trace!(component = module_path!(), reruns, "flush complete");
        first_err.map_or(Ok(()), Err)
    }

    /// Number of computations waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.inner.pending.borrow().len()
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("pending", &self.pending())
            .field("flushing", &self.inner.flushing.get())
            .finish()
    }
}

struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct ComputationInner {
    id: u64,
    func: RefCell<ComputeFn>,
    invalidated: Cell<bool>,
    stopped: Cell<bool>,
    runs: Cell<u64>,
    tracker: Weak<TrackerInner>,
    deps: RefCell<Vec<Weak<DependencyInner>>>,
}

impl ComputationInner {
    fn run(this: &Rc<Self>) -> Result<()> {
        if this.stopped.get() {
            return Ok(());
        }
        // Already running further up the stack.
        let Ok(mut func) = this.func.try_borrow_mut() else {
            return Ok(());
        };
        this.forget_deps();
        this.invalidated.set(false);
        this.runs.set(this.runs.get() + 1);
        let cx = ComputationContext {
            computation: Rc::clone(this),
            first_run: this.runs.get() == 1,
        };
        let result = (&mut *func)(&cx);
        drop(func);
        // A flush nested inside this run may have skipped it.
        if this.invalidated.get() && !this.stopped.get() {
            if let Some(tracker) = this.tracker.upgrade() {
                tracker.pending.borrow_mut().push_back(Rc::downgrade(this));
            }
        }
        result
    }

    fn invalidate(this: &Rc<Self>) {
        if this.stopped.get() || this.invalidated.replace(true) {
            return;
        }
        this.forget_deps();
        if let Some(tracker) = this.tracker.upgrade() {
            tracker.pending.borrow_mut().push_back(Rc::downgrade(this));
        }
    }

    fn forget_deps(self: &Rc<Self>) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps.iter().filter_map(Weak::upgrade) {
            dep.dependents
                .borrow_mut()
                .retain(|c| !Weak::ptr_eq(c, &Rc::downgrade(self)));
        }
    }
}

/// Handle to a tracked computation.
#[derive(Clone)]
pub struct Computation {
    inner: Rc<ComputationInner>,
}

impl Computation {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Stop rerunning. Idempotent.
    pub fn stop(&self) {
        if self.inner.stopped.replace(true) {
            return;
        }
        self.inner.forget_deps();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.get()
    }

    pub fn is_invalidated(&self) -> bool {
        self.inner.invalidated.get()
    }

    /// Schedule a rerun for the next flush.
    pub fn invalidate(&self) {
        ComputationInner::invalidate(&self.inner);
    }

    pub fn run_count(&self) -> u64 {
        self.inner.runs.get()
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("runs", &self.inner.runs.get())
            .field("invalidated", &self.inner.invalidated.get())
            .field("stopped", &self.inner.stopped.get())
            .finish()
    }
}

/// Passed to a computation's function on every run.
pub struct ComputationContext {
    computation: Rc<ComputationInner>,
    first_run: bool,
}

impl ComputationContext {
    /// The computation currently running.
    pub fn computation(&self) -> Computation {
        Computation {
            inner: Rc::clone(&self.computation),
        }
    }

    pub fn is_first_run(&self) -> bool {
        self.first_run
    }
}

/// Something a computation can depend on.
#[derive(Clone, Default)]
pub struct Dependency {
    inner: Rc<DependencyInner>,
}

#[derive(Default)]
struct DependencyInner {
    dependents: RefCell<Vec<Weak<ComputationInner>>>,
}

impl Dependency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the running computation as a dependent. Returns `false` if it
    /// already was one or has been stopped.
    pub fn depend(&self, cx: &ComputationContext) -> bool {
        let computation = &cx.computation;
        if computation.stopped.get() {
            return false;
        }
        let weak = Rc::downgrade(computation);
        let mut dependents = self.inner.dependents.borrow_mut();
        if dependents.iter().any(|c| Weak::ptr_eq(c, &weak)) {
            return false;
        }
        dependents.push(weak);
        computation
            .deps
            .borrow_mut()
            .push(Rc::downgrade(&self.inner));
        true
    }

    /// Invalidate every dependent.
    pub fn changed(&self) {
        let dependents: Vec<Weak<ComputationInner>> = self.inner.dependents.borrow().clone();
        for computation in dependents.iter().filter_map(Weak::upgrade) {
            ComputationInner::invalidate(&computation);
        }
    }

    pub fn has_dependents(&self) -> bool {
        self.inner
            .dependents
            .borrow()
            .iter()
            .any(|c| c.strong_count() > 0)
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("dependents", &self.inner.dependents.borrow().len())
            .finish()
    }
}
