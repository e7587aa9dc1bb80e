use crate::identity::Key;
use crate::model::SequenceEvent;
use serde_json::Value;

/// Consumer of canonical events.
///
/// Implement any of the four event methods; the rest default to no-ops.
/// The controller delivers through [`SequenceCallbacks::on_event`], which
/// dispatches to them unless overridden.
///
/// Callbacks may stop the observation or mutate the observed data; events
/// caused by such mutations are delivered after the current callback
/// returns.
pub trait SequenceCallbacks {
    fn added_at(&mut self, _key: &Key, _item: &Value, _at_index: usize, _before: Option<&Key>) {}

    fn changed(&mut self, _key: &Key, _new_item: &Value, _old_item: &Value) {}

    fn removed(&mut self, _key: &Key, _item: &Value) {}

    fn moved_to(
        &mut self,
        _key: &Key,
        _item: &Value,
        _from_index: usize,
        _to_index: usize,
        _before: Option<&Key>,
    ) {
    }

    fn on_event(&mut self, event: &SequenceEvent) {
        match event {
            SequenceEvent::AddedAt {
                key,
                item,
                at_index,
                before,
            } => self.added_at(key, item, *at_index, before.as_ref()),
            SequenceEvent::Changed {
                key,
                new_item,
                old_item,
            } => self.changed(key, new_item, old_item),
            SequenceEvent::Removed { key, item } => self.removed(key, item),
            SequenceEvent::MovedTo {
                key,
                item,
                from_index,
                to_index,
                before,
            } => self.moved_to(key, item, *from_index, *to_index, before.as_ref()),
        }
    }
}

impl<F> SequenceCallbacks for F
where
    F: FnMut(&SequenceEvent),
{
    fn on_event(&mut self, event: &SequenceEvent) {
        self(event)
    }
}

/// Callbacks that ignore every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCallbacks;

impl SequenceCallbacks for NoCallbacks {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Names(Vec<&'static str>);

    impl SequenceCallbacks for Names {
        fn added_at(&mut self, _: &Key, _: &Value, _: usize, _: Option<&Key>) {
            self.0.push("added_at");
        }

        fn removed(&mut self, _: &Key, _: &Value) {
            self.0.push("removed");
        }
    }

    #[test]
    fn test_default_dispatch_reaches_overridden_methods_only() {
        let mut names = Names::default();
        names.on_event(&SequenceEvent::AddedAt {
            key: Key::id("a"),
            item: json!({"_id": "a"}),
            at_index: 0,
            before: None,
        });
        names.on_event(&SequenceEvent::Changed {
            key: Key::id("a"),
            new_item: json!({"_id": "a"}),
            old_item: json!({"_id": "a"}),
        });
        names.on_event(&SequenceEvent::Removed {
            key: Key::id("a"),
            item: json!({"_id": "a"}),
        });
        assert_eq!(names.0, vec!["added_at", "removed"]);
    }

    #[test]
    fn test_closure_is_a_callback_set() {
        let mut count = 0;
        {
            let mut cb = |_: &SequenceEvent| count += 1;
            cb.on_event(&SequenceEvent::Removed {
                key: Key::id("a"),
                item: json!(null),
            });
        }
        assert_eq!(count, 1);
    }
}
