//! Planned GUI steps and the step-list file.
//!
//! On disk a plan is `{"text": [{"step": "i1.png", "action": "clic"}, ...]}`.
//! A bare array is accepted on load for files written by older planners.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Key of the envelope wrapping the step array
pub const ENVELOPE_KEY: &str = "text";

/// What to do once a template has been located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "clic")]
    Click,
    /// Paste generated code into the located element
    #[serde(rename = "texto")]
    PasteText,
}

/// One planned atomic action against a screen template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    #[serde(rename = "step")]
    pub template: String,
    pub action: Action,
}

impl Step {
    pub fn new(template: impl Into<String>, action: Action) -> Self {
        Self {
            template: template.into(),
            action,
        }
    }
}

/// Wire shape of a step: exactly `step` and `action`. A `value` key is
/// tolerated and dropped, since paste text never comes from the plan.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    step: String,
    action: Action,
    #[serde(default)]
    value: Option<Value>,
}

/// How a step list was wrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    Keyed,
    Bare,
}

#[derive(Serialize)]
struct KeyedRef<'a> {
    text: &'a [Step],
}

/// Ordered, immutable sequence of steps for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepList(Vec<Step>);

impl StepList {
    pub fn new(steps: Vec<Step>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.0.iter()
    }

    /// Validate a parsed JSON document as a step list.
    ///
    /// Errors describe the first offending step; callers wrap them in the
    /// error kind that fits their context.
    pub fn from_value(value: Value) -> std::result::Result<(Self, Envelope), String> {
        let (array, envelope) = match value {
            Value::Object(mut map) if map.contains_key(ENVELOPE_KEY) => {
                if map.len() > 1 {
                    debug!(keys = map.len(), "Ignoring extra keys next to the step array");
                }
                (map.remove(ENVELOPE_KEY).unwrap_or(Value::Null), Envelope::Keyed)
            }
            other => (other, Envelope::Bare),
        };

        let items = match array {
            Value::Array(items) => items,
            other => {
                return Err(format!(
                    "expected an array of steps, found {}",
                    json_kind(&other)
                ))
            }
        };

        let mut steps = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let raw: RawStep = serde_json::from_value(item)
                .map_err(|e| format!("step {}: {}", i + 1, e))?;
            if raw.value.is_some() {
                warn!(step = i + 1, template = %raw.step, "Ignoring 'value' key on planned step");
            }
            steps.push(Step::new(raw.step, raw.action));
        }

        Ok((Self(steps), envelope))
    }

    /// Load the persisted step list
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::StepList(format!("cannot read {}: {}", path.display(), e))
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|e| {
            Error::StepList(format!("cannot parse {}: {}", path.display(), e))
        })?;

        let (steps, envelope) = Self::from_value(value)
            .map_err(|e| Error::StepList(format!("{}: {}", path.display(), e)))?;
        if envelope == Envelope::Bare {
            warn!(
                path = %path.display(),
                "Step list has no '{}' key; treating the document as the step array",
                ENVELOPE_KEY
            );
        }
        Ok(steps)
    }

    /// Persist as `{"text": [...]}`, creating the parent directory
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&KeyedRef { text: &self.0 })?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a StepList {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
