//! Replay command
//!
//! Usage: seqobs replay <SCRIPT> [--strip-ids] [--profile <PROFILE>]

use clap::Args;
use seqobs_core::logging_facility::{init, Profile};
use seqobs_core::{
    observe, Key, MemorySource, ReactiveVar, SeqObsError, SequenceEvent, SequenceOutput, Tracker,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Path to the JSON script
    pub script: PathBuf,

    /// Omit keys from printed events
    #[arg(long)]
    pub strip_ids: bool,

    /// Logging profile (development, production)
    #[arg(long, default_value = "production")]
    pub profile: Profile,
}

/// A scenario: named live sources, the provider's first output, then steps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSpec>,
    #[serde(default)]
    pub initial: OutputSpec,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub docs: Vec<Value>,
}

/// What the provider returns: `null`, an array, or `{"source": "<name>"}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OutputSpec {
    #[default]
    Null,
    Items(Vec<Value>),
    Source { source: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Change what the provider returns; takes effect at the next flush
    Set { output: OutputSpec },
    Insert { source: String, doc: Value },
    Update {
        source: String,
        id: Value,
        set: Map<String, Value>,
    },
    Remove { source: String, id: Value },
    Flush,
}

/// Execute replay command
pub fn execute(args: ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    init(args.profile);

    let text = std::fs::read_to_string(&args.script)?;
    let script: Script = serde_json::from_str(&text)?;

    for line in run_script(&script, args.strip_ids)? {
        println!("{}", line);
    }
    Ok(())
}

/// Run `script` and return every delivered event as a JSON value, in
/// delivery order.
pub fn run_script(
    script: &Script,
    strip_ids: bool,
) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let sources = build_sources(script)?;
    check_references(script, &sources)?;

    let tracker = Tracker::new();
    let output = ReactiveVar::new(script.initial.clone());
    let delivered: Rc<RefCell<Vec<SequenceEvent>>> = Rc::new(RefCell::new(Vec::new()));

    let provider_sources = sources.clone();
    let current = output.clone();
    let log = Rc::clone(&delivered);
    let handle = observe(
        &tracker,
        move |cx| resolve(&current.get(cx), &provider_sources),
        move |event: &SequenceEvent| log.borrow_mut().push(event.clone()),
    )?;

    for (index, step) in script.steps.iter().enumerate() {
        tracing::debug!(step = index, ?step, "replay step");
        match step {
            Step::Set { output: next } => output.set(next.clone()),
            Step::Insert { source, doc } => {
                source_named(&sources, source)?.insert(doc.clone())?;
            }
            Step::Update { source, id, set } => {
                let key = key_for(id)?;
                let fields = set.clone();
                source_named(&sources, source)?.update(&key, move |doc| doc.extend(fields))?;
            }
            Step::Remove { source, id } => {
                source_named(&sources, source)?.remove(&key_for(id)?)?;
            }
            Step::Flush => tracker.flush()?,
        }
    }
    tracker.flush()?;
    handle.stop();

    let events = delivered.borrow();
    let lines = events
        .iter()
        .map(|event| super::event_json(event, strip_ids))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}

fn build_sources(script: &Script) -> Result<BTreeMap<String, MemorySource>, SeqObsError> {
    let mut sources = BTreeMap::new();
    for (name, spec) in &script.sources {
        let source = match &spec.sort_by {
            Some(field) => MemorySource::sorted_by(field.clone()),
            None => MemorySource::new(),
        };
        source.extend(spec.docs.iter().cloned())?;
        sources.insert(name.clone(), source);
    }
    Ok(sources)
}

/// Reject scripts naming a source that does not exist before anything runs.
fn check_references(
    script: &Script,
    sources: &BTreeMap<String, MemorySource>,
) -> Result<(), SeqObsError> {
    let mut named: Vec<&str> = Vec::new();
    if let OutputSpec::Source { source } = &script.initial {
        named.push(source);
    }
    for step in &script.steps {
        match step {
            Step::Set {
                output: OutputSpec::Source { source },
            }
            | Step::Insert { source, .. }
            | Step::Update { source, .. }
            | Step::Remove { source, .. } => named.push(source),
            Step::Set { .. } | Step::Flush => {}
        }
    }
    for name in named {
        source_named(sources, name)?;
    }
    Ok(())
}

fn source_named<'a>(
    sources: &'a BTreeMap<String, MemorySource>,
    name: &str,
) -> Result<&'a MemorySource, SeqObsError> {
    sources.get(name).ok_or_else(|| SeqObsError::InvalidItem {
        reason: format!("unknown source '{}'", name),
    })
}

fn key_for(id: &Value) -> Result<Key, SeqObsError> {
    Key::from_id_value(id).ok_or_else(|| SeqObsError::InvalidItem {
        reason: "step id must not be null".to_string(),
    })
}

fn resolve(
    spec: &OutputSpec,
    sources: &BTreeMap<String, MemorySource>,
) -> seqobs_core::Result<SequenceOutput> {
    Ok(match spec {
        OutputSpec::Null => SequenceOutput::Null,
        OutputSpec::Items(items) => SequenceOutput::Snapshot(items.clone()),
        OutputSpec::Source { source } => {
            SequenceOutput::source(source_named(sources, source)?.clone())
        }
    })
}
