//! Diff computation.
//!
//! [`diff`] runs its phases against a private working copy of the rendered
//! state and applies each event to that copy as soon as it is produced, so
//! the reported indices are the ones a consumer will see when replaying the
//! events in order.

use crate::diff::lis::longest_increasing_subsequence;
use crate::errors::Result;
use crate::identity::{ChangePolicy, Key};
use crate::model::{RenderedState, SequenceEvent, Snapshot};
use std::collections::{HashMap, HashSet};

/// Compute the events that transform `old` into `new`.
///
/// # Errors
///
/// Returns `InconsistentState` if an event fails to apply to the working
/// copy, which indicates a bug in the differ rather than bad input.
pub fn diff(
    old: &RenderedState,
    new: &Snapshot,
    policy: ChangePolicy,
) -> Result<Vec<SequenceEvent>> {
    let mut work = Working {
        state: old.clone(),
        events: Vec::new(),
    };

    let new_pos: HashMap<&Key, usize> = new
        .entries()
        .iter()
        .enumerate()
        .map(|(i, (key, _))| (key, i))
        .collect();

    // 1. Removals, in old order.
    let gone: Vec<Key> = old
        .keys()
        .iter()
        .filter(|k| !new_pos.contains_key(k))
        .cloned()
        .collect();
    for key in gone {
        let item = old.get(&key).cloned().unwrap_or_default();
        work.emit(SequenceEvent::Removed { key, item })?;
    }

    // Everything left is common to both sides. Keys on the longest run whose
    // relative order already agrees with the new snapshot never move.
    let targets: Vec<usize> = work
        .state
        .keys()
        .iter()
        .filter_map(|k| new_pos.get(k).copied())
        .collect();
    let stable: HashSet<Key> = longest_increasing_subsequence(&targets)
        .into_iter()
        .filter_map(|i| work.state.key_at(i).cloned())
        .collect();

    // 2. Additions, in new order, each placed right after the nearest
    // preceding key that will not move.
    let mut anchor: Option<Key> = None;
    let mut added: HashSet<Key> = HashSet::new();
    for (key, item) in new.entries() {
        if work.state.contains(key) {
            if stable.contains(key) {
                anchor = Some(key.clone());
            }
            continue;
        }
        let at_index = anchor
            .as_ref()
            .and_then(|a| work.state.index_of(a))
            .map_or(0, |i| i + 1);
        let before = work.state.key_at(at_index).cloned();
        work.emit(SequenceEvent::AddedAt {
            key: key.clone(),
            item: item.clone(),
            at_index,
            before,
        })?;
        added.insert(key.clone());
        anchor = Some(key.clone());
    }

    // 3. Changes, in new order.
    for (key, new_item) in new.entries() {
        if added.contains(key) {
            continue;
        }
        let Some(old_item) = work.state.get(key).cloned() else {
            continue;
        };
        if policy.fires(&old_item, new_item) {
            work.emit(SequenceEvent::Changed {
                key: key.clone(),
                new_item: new_item.clone(),
                old_item,
            })?;
        }
    }

    // 4. Moves. Walking the new snapshot backwards, every key behind the
    // current one is already in its final place, so each unstable key is
    // moved once to sit right before its successor.
    let entries = new.entries();
    for (i, (key, _)) in entries.iter().enumerate().rev() {
        if stable.contains(key) || added.contains(key) {
            continue;
        }
        let successor = entries.get(i + 1).map(|(k, _)| k.clone());
        work.move_before(key, successor)?;
    }

    Ok(work.events)
}

struct Working {
    state: RenderedState,
    events: Vec<SequenceEvent>,
}

impl Working {
    fn emit(&mut self, event: SequenceEvent) -> Result<()> {
        self.state.apply(&event)?;
        self.events.push(event);
        Ok(())
    }

    fn move_before(&mut self, key: &Key, successor: Option<Key>) -> Result<()> {
        let Some(from_index) = self.state.index_of(key) else {
            return Ok(());
        };
        let last = self.state.len().saturating_sub(1);
        let to_index = match &successor {
            Some(next) => match self.state.index_of(next) {
                Some(pos) if pos > from_index => pos - 1,
                Some(pos) => pos,
                None => last,
            },
            None => last,
        };
        if to_index == from_index {
            return Ok(());
        }
        let item = self.state.get(key).cloned().unwrap_or_default();
        self.emit(SequenceEvent::MovedTo {
            key: key.clone(),
            item,
            from_index,
            to_index,
            before: successor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn snap(ids: &[&str]) -> Snapshot {
        Snapshot::from_items(ids.iter().map(|id| json!({ "_id": id })))
    }

    fn rendered(ids: &[&str]) -> RenderedState {
        RenderedState::from_snapshot(&snap(ids))
    }

    fn replay(old: &RenderedState, events: &[SequenceEvent]) -> RenderedState {
        let mut mirror = old.clone();
        for event in events {
            mirror.apply(event).unwrap();
        }
        mirror
    }

    #[test]
    fn test_identical_snapshots_yield_only_changes_under_always() {
        let old = rendered(&["a", "b"]);
        let events = diff(&old, &snap(&["a", "b"]), ChangePolicy::Always).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.name() == "changed"));
    }

    #[test]
    fn test_identical_snapshots_yield_nothing_when_different_only() {
        let old = rendered(&["a", "b"]);
        let events = diff(&old, &snap(&["a", "b"]), ChangePolicy::WhenDifferent).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_remove_add_change_order() {
        let old = rendered(&["13", "37"]);
        let events = diff(&old, &snap(&["13", "38"]), ChangePolicy::Always).unwrap();
        assert_eq!(
            events,
            vec![
                SequenceEvent::Removed {
                    key: Key::id("37"),
                    item: json!({"_id": "37"}),
                },
                SequenceEvent::AddedAt {
                    key: Key::id("38"),
                    item: json!({"_id": "38"}),
                    at_index: 1,
                    before: None,
                },
                SequenceEvent::Changed {
                    key: Key::id("13"),
                    new_item: json!({"_id": "13"}),
                    old_item: json!({"_id": "13"}),
                },
            ]
        );
    }

    #[test]
    fn test_single_move_for_swap() {
        let old = rendered(&["13", "37", "42"]);
        let events = diff(&old, &snap(&["37", "13", "42"]), ChangePolicy::WhenDifferent).unwrap();
        assert_eq!(
            events,
            vec![SequenceEvent::MovedTo {
                key: Key::id("37"),
                item: json!({"_id": "37"}),
                from_index: 1,
                to_index: 0,
                before: Some(Key::id("13")),
            }]
        );
    }

    #[test]
    fn test_move_to_tail() {
        let old = rendered(&["a", "b", "c"]);
        let events = diff(&old, &snap(&["b", "c", "a"]), ChangePolicy::WhenDifferent).unwrap();
        assert_eq!(
            events,
            vec![SequenceEvent::MovedTo {
                key: Key::id("a"),
                item: json!({"_id": "a"}),
                from_index: 0,
                to_index: 2,
                before: None,
            }]
        );
    }

    #[test]
    fn test_addition_at_front_and_between() {
        let old = rendered(&["b", "d"]);
        let events = diff(&old, &snap(&["a", "b", "c", "d"]), ChangePolicy::WhenDifferent).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            SequenceEvent::AddedAt { at_index: 0, before: Some(b), .. } if *b == Key::id("b")
        ));
        assert!(matches!(
            &events[1],
            SequenceEvent::AddedAt { at_index: 2, before: Some(d), .. } if *d == Key::id("d")
        ));
    }

    #[test]
    fn test_unkeyed_generations_share_nothing() {
        let old = RenderedState::from_snapshot(&Snapshot::from_items(vec![json!("A"), json!("B")]));
        let new = Snapshot::from_items(vec![json!("B"), json!("C")]);
        let events = diff(&old, &new, ChangePolicy::Always).unwrap();
        let names: Vec<&str> = events.iter().map(SequenceEvent::name).collect();
        assert_eq!(names, vec!["removed", "removed", "added_at", "added_at"]);
        let items: Vec<&Value> = events
            .iter()
            .map(|e| match e {
                SequenceEvent::Removed { item, .. } | SequenceEvent::AddedAt { item, .. } => item,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(items, vec![&json!("A"), &json!("B"), &json!("B"), &json!("C")]);
    }

    #[test]
    fn test_mixed_transition_replays_to_target() {
        let old = rendered(&["a", "b", "c", "d", "e"]);
        let new = snap(&["e", "x", "c", "a", "y", "d"]);
        let events = diff(&old, &new, ChangePolicy::WhenDifferent).unwrap();
        let mirror = replay(&old, &events);
        assert_eq!(mirror.to_snapshot(), new);
        let moves = events.iter().filter(|e| e.name() == "moved_to").count();
        // Survivors a, c, d, e; longest agreeing run has length 2.
        assert_eq!(moves, 2);
    }

    #[test]
    fn test_diff_does_not_touch_input() {
        let old = rendered(&["a", "b"]);
        let _ = diff(&old, &snap(&["b"]), ChangePolicy::Always).unwrap();
        assert_eq!(old.len(), 2);
    }
}
