#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{docs, names, strip_ids, Recorder};
use seqobs_core::{observe, Key, MemorySource, Phase, SequenceEvent, SequenceOutput, Tracker};
use serde_json::json;

#[test]
fn test_null_output_renders_nothing() {
    let tracker = Tracker::new();
    let recorder = Recorder::new();

    let handle = observe(&tracker, |_| Ok(SequenceOutput::Null), recorder.clone()).unwrap();

    assert!(recorder.is_empty());
    assert!(handle.rendered().is_empty());
    assert_eq!(handle.phase(), Phase::Active);
    assert!(!handle.is_live());
}

#[test]
fn test_keyed_array_is_added_in_order() {
    let tracker = Tracker::new();
    let recorder = Recorder::new();

    let _handle = observe(
        &tracker,
        |_| Ok(SequenceOutput::Snapshot(docs(&["13", "37", "42"]))),
        recorder.clone(),
    )
    .unwrap();

    let expected: Vec<SequenceEvent> = ["13", "37", "42"]
        .iter()
        .enumerate()
        .map(|(i, id)| SequenceEvent::AddedAt {
            key: Key::id(*id),
            item: json!({ "_id": id }),
            at_index: i,
            before: None,
        })
        .collect();
    assert_eq!(recorder.events(), expected);
}

#[test]
fn test_scalar_array_gets_generated_keys() {
    let tracker = Tracker::new();
    let recorder = Recorder::new();

    let handle = observe(
        &tracker,
        |_| Ok(SequenceOutput::items(vec![json!("A"), json!("B")])),
        recorder.clone(),
    )
    .unwrap();

    let events = recorder.events();
    assert!(events.iter().all(|e| e.key().is_generated()));
    assert_eq!(
        strip_ids(&events),
        vec![
            json!({"event": "added_at", "item": "A", "at_index": 0}),
            json!({"event": "added_at", "item": "B", "at_index": 1}),
        ]
    );
    assert_eq!(handle.rendered().len(), 2);
}

#[test]
fn test_live_source_contents_are_added_then_followed() {
    let tracker = Tracker::new();
    let recorder = Recorder::new();
    let source = MemorySource::new();
    source.extend(docs(&["a", "c"])).unwrap();

    let provided = source.clone();
    let handle = observe(
        &tracker,
        move |_| Ok(SequenceOutput::source(provided.clone())),
        recorder.clone(),
    )
    .unwrap();

    assert_eq!(names(&recorder.take()), vec!["added_at", "added_at"]);
    assert!(handle.is_live());

    // Delivered straight away; no flush needed for live changes.
    source.insert(json!({"_id": "b"})).unwrap();
    assert_eq!(
        recorder.take(),
        vec![SequenceEvent::AddedAt {
            key: Key::id("b"),
            item: json!({"_id": "b"}),
            at_index: 1,
            before: Some(Key::id("c")),
        }]
    );
    let keys: Vec<Key> = handle.rendered().keys().cloned().collect();
    assert_eq!(keys, vec![Key::id("a"), Key::id("b"), Key::id("c")]);
}

#[test]
fn test_each_observation_gets_its_own_id() {
    let tracker = Tracker::new();
    let a = observe(&tracker, |_| Ok(SequenceOutput::Null), Recorder::new()).unwrap();
    let b = observe(&tracker, |_| Ok(SequenceOutput::Null), Recorder::new()).unwrap();
    assert_ne!(a.id(), b.id());
}
