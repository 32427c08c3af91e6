//! `ProcessingItem`: the result record of a single task execution.
//!
//! Besides timing and provenance (`inputs`, `outputs`), an item carries
//! `posts`: payload bundles addressed by name to a downstream consumer, which is
//! either another task or the orchestration itself. The engine never inspects
//! outputs to route data; only explicitly addressed posts travel.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::clock::Clock;
use crate::error::Result;

/// Consumer name → payload object.
pub type Posts = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingItem {
    step_name: String,
    #[serde(default)]
    start_time: Option<f64>,
    #[serde(default)]
    end_time: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    inputs: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    outputs: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    posts: Posts,
}

impl ProcessingItem {
    /// Create an item whose `startTime` is the clock's current time.
    pub fn new(step_name: impl Into<String>, clock: &dyn Clock) -> Self {
        Self::with_start_time(step_name, clock.timestamp())
    }

    pub fn with_start_time(step_name: impl Into<String>, start_time: f64) -> Self {
        Self {
            step_name: step_name.into(),
            start_time: Some(start_time),
            end_time: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            posts: Posts::new(),
        }
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    pub fn is_done(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn posts(&self) -> &Posts {
        &self.posts
    }

    pub fn add_inputs<I, S>(&mut self, inputs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
    }

    pub fn add_outputs<I, S>(&mut self, outputs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(outputs.into_iter().map(Into::into));
    }

    /// Stamp `endTime`. A repeated call overwrites the previous value and logs
    /// a warning; it never fails.
    pub fn mark_done(&mut self, clock: &dyn Clock) {
        if let Some(previous) = self.end_time {
            warn!(
                step = %self.step_name,
                previous_end_time = previous,
                "end time overwritten: processing item was already marked done"
            );
        }
        self.end_time = Some(clock.timestamp());
    }

    /// Replace the whole posts map.
    pub fn set_posts(&mut self, posts: Posts) {
        self.posts = posts;
    }

    /// Leave `value` under `key` for `consumer`, keeping other keys already
    /// posted to the same consumer.
    pub fn post(&mut self, consumer: impl Into<String>, key: impl Into<String>, value: Value) {
        let bundle = self
            .posts
            .entry(consumer.into())
            .or_insert_with(|| Value::Object(Default::default()));
        if !bundle.is_object() {
            *bundle = Value::Object(Default::default());
        }
        if let Value::Object(map) = bundle {
            map.insert(key.into(), value);
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The non-empty post bundles addressed to `consumer`, in item order.
    pub fn posts_addressed_to<'a>(items: &'a [ProcessingItem], consumer: &str) -> Vec<&'a Value> {
        items
            .iter()
            .filter_map(|item| item.posts.get(consumer))
            .filter(|bundle| is_present(bundle))
            .collect()
    }

    /// Collect `posts[consumer][key]` across `items`, in item order.
    ///
    /// List payloads are flattened into the result; any other non-empty value
    /// is appended as a single element. Items with no matching post are skipped.
    pub fn extract_posts_for(items: &[ProcessingItem], consumer: &str, key: &str) -> Vec<Value> {
        let mut collected = Vec::new();
        for bundle in Self::posts_addressed_to(items, consumer) {
            match bundle.get(key) {
                Some(Value::Array(values)) => collected.extend(values.iter().cloned()),
                Some(value) if is_present(value) => collected.push(value.clone()),
                _ => {}
            }
        }
        collected
    }
}

/// JSON truthiness: null, false, zero and empty containers count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Older log entries may carry explicit `null` for list and map fields.
pub(crate) fn null_as_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    let opt: Option<T> = Option::deserialize(d)?;
    Ok(opt.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
