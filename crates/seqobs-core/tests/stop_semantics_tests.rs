#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{docs, Recorder};
use seqobs_core::{
    observe, Key, MemorySource, Phase, ReactiveVar, SeqObsError, SequenceEvent, SequenceOutput,
    StopHandle, Tracker,
};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn test_scenario_no_callback_after_stop() {
    // GIVEN an active observation over a reactive array
    let tracker = Tracker::new();
    let var = ReactiveVar::new(docs(&["a"]));
    let runs = Rc::new(Cell::new(0));
    let recorder = Recorder::new();
    let (v, r) = (var.clone(), Rc::clone(&runs));
    let handle = observe(
        &tracker,
        move |cx| {
            r.set(r.get() + 1);
            Ok(SequenceOutput::Snapshot(v.get(cx)))
        },
        recorder.clone(),
    )
    .unwrap();
    recorder.take();

    // WHEN it is stopped and the backing data changes
    handle.stop();
    var.set(docs(&["a", "b"]));
    tracker.flush().unwrap();

    // THEN nothing is delivered and the provider never reruns
    assert!(recorder.is_empty());
    assert_eq!(runs.get(), 1);
    assert_eq!(handle.phase(), Phase::Stopped);
    assert!(handle.rendered().is_empty());
}

#[test]
fn test_stop_detaches_live_source() {
    let tracker = Tracker::new();
    let source = MemorySource::new();
    source.insert(json!({"_id": "a"})).unwrap();
    let recorder = Recorder::new();
    let s = source.clone();
    let handle = observe(
        &tracker,
        move |_| Ok(SequenceOutput::source(s.clone())),
        recorder.clone(),
    )
    .unwrap();
    recorder.take();
    assert_eq!(source.observer_count(), 1);

    handle.stop();
    assert_eq!(source.observer_count(), 0);
    assert!(!handle.is_live());

    source.insert(json!({"_id": "b"})).unwrap();
    assert!(recorder.is_empty());
}

#[test]
fn test_stop_is_idempotent() {
    let tracker = Tracker::new();
    let handle = observe(
        &tracker,
        |_| Ok(SequenceOutput::Snapshot(docs(&["a"]))),
        Recorder::new(),
    )
    .unwrap();
    let stopper = handle.stopper();

    handle.stop();
    handle.stop();
    stopper.stop();

    assert!(handle.is_stopped());
    assert!(stopper.is_stopped());
}

#[test]
fn test_stop_during_live_delivery_drops_queued_events() {
    let tracker = Tracker::new();
    let source = MemorySource::sorted_by("rank");
    source
        .extend(vec![json!({"_id": "x", "rank": 1}), json!({"_id": "y", "rank": 2})])
        .unwrap();

    let slot: Rc<RefCell<Option<StopHandle>>> = Rc::new(RefCell::new(None));
    let seen: Rc<RefCell<Vec<SequenceEvent>>> = Rc::new(RefCell::new(Vec::new()));
    let (stop_slot, log, s) = (Rc::clone(&slot), Rc::clone(&seen), source.clone());
    let handle = observe(
        &tracker,
        move |_| Ok(SequenceOutput::source(s.clone())),
        move |event: &SequenceEvent| {
            log.borrow_mut().push(event.clone());
            if let Some(stopper) = stop_slot.borrow().as_ref() {
                stopper.stop();
            }
        },
    )
    .unwrap();
    seen.borrow_mut().clear();
    *slot.borrow_mut() = Some(handle.stopper());

    // changed + moved_to; stopping on the first suppresses the second
    source.set_field(&Key::id("x"), "rank", json!(3)).unwrap();

    assert_eq!(seen.borrow().len(), 1);
    assert!(matches!(seen.borrow()[0], SequenceEvent::Changed { .. }));
    assert!(handle.is_stopped());
    assert_eq!(source.observer_count(), 0);
}

#[test]
fn test_dropping_handle_stops_observation() {
    let tracker = Tracker::new();
    let var: ReactiveVar<Vec<Value>> = ReactiveVar::new(vec![json!(1)]);
    let recorder = Recorder::new();
    let v = var.clone();
    let handle = observe(
        &tracker,
        move |cx| Ok(SequenceOutput::Snapshot(v.get(cx))),
        recorder.clone(),
    )
    .unwrap();
    let stopper = handle.stopper();
    recorder.take();

    drop(handle);
    var.set(vec![json!(2)]);
    tracker.flush().unwrap();

    assert!(stopper.is_stopped());
    assert!(recorder.is_empty());
}

#[test]
fn test_failed_rerun_keeps_live_bridge() {
    let tracker = Tracker::new();
    let source = MemorySource::new();
    source.insert(json!({"_id": "a"})).unwrap();
    let healthy = ReactiveVar::new(true);
    let recorder = Recorder::new();
    let (h, s) = (healthy.clone(), source.clone());
    let handle = observe(
        &tracker,
        move |cx| {
            if h.get(cx) {
                Ok(SequenceOutput::source(s.clone()))
            } else {
                Err(SeqObsError::provider("backing store offline"))
            }
        },
        recorder.clone(),
    )
    .unwrap();
    recorder.take();

    healthy.set(false);
    let err = tracker.flush().unwrap_err();
    assert!(matches!(err, SeqObsError::ProviderFailed { .. }));
    assert!(recorder.is_empty());
    assert_eq!(handle.phase(), Phase::Active);

    // Still bridged to the source from the last good run.
    assert!(handle.is_live());
    source.insert(json!({"_id": "b"})).unwrap();
    assert_eq!(recorder.len(), 1);
    assert_eq!(handle.rendered().len(), 2);
}
