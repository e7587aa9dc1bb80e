//! Diff command
//!
//! Usage: seqobs diff <OLD> <NEW> [--strip-ids] [--changes <POLICY>]

use clap::{Args, ValueEnum};
use seqobs_core::diff::diff;
use seqobs_core::{ChangePolicy, RenderedState, Snapshot};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// JSON array file holding the old sequence
    pub old: PathBuf,

    /// JSON array file holding the new sequence
    pub new: PathBuf,

    /// Omit keys from printed events
    #[arg(long)]
    pub strip_ids: bool,

    /// When common items report `changed`
    #[arg(long, value_enum, default_value_t = Changes::Always)]
    pub changes: Changes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Changes {
    Always,
    WhenDifferent,
}

impl From<Changes> for ChangePolicy {
    fn from(changes: Changes) -> Self {
        match changes {
            Changes::Always => ChangePolicy::Always,
            Changes::WhenDifferent => ChangePolicy::WhenDifferent,
        }
    }
}

/// Execute diff command
pub fn execute(args: DiffArgs) -> Result<(), Box<dyn std::error::Error>> {
    let old = read_array(&args.old)?;
    let new = read_array(&args.new)?;

    for line in diff_arrays(old, new, args.changes.into(), args.strip_ids)? {
        println!("{}", line);
    }
    Ok(())
}

/// Events that turn `old` into `new`, as JSON values.
pub fn diff_arrays(
    old: Vec<Value>,
    new: Vec<Value>,
    policy: ChangePolicy,
    strip_ids: bool,
) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let rendered = RenderedState::from_snapshot(&Snapshot::from_items(old));
    let events = diff(&rendered, &Snapshot::from_items(new), policy)?;
    let lines = events
        .iter()
        .map(|event| super::event_json(event, strip_ids))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}

fn read_array(path: &Path) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        _ => Err(format!("{}: expected a JSON array", path.display()).into()),
    }
}
