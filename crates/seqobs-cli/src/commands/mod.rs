pub mod diff;
pub mod replay;

use seqobs_core::SequenceEvent;
use serde_json::Value;

/// One event as a JSON object, optionally without its keys
pub fn event_json(event: &SequenceEvent, strip_ids: bool) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(event)?;
    if strip_ids {
        if let Some(fields) = value.as_object_mut() {
            fields.remove("key");
            fields.remove("before");
        }
    }
    Ok(value)
}
