//! Step inspection and construction helpers
//!
//! Steps are plain YAML mappings. Lookups here never fail: a step that is
//! not a mapping, or lacks the key, simply does not match.

use serde_yaml::{Mapping, Value};

/// String value of a step key, if the step is a mapping and the value a string
pub fn str_field<'a>(step: &'a Value, key: &str) -> Option<&'a str> {
    step.as_mapping()?.get(key)?.as_str()
}

pub fn has_id(step: &Value, id: &str) -> bool {
    str_field(step, "id") == Some(id)
}

/// Suffix match on `uses`, tolerating `./.github/actions/` style prefixes
pub fn uses_ends_with(step: &Value, suffix: &str) -> bool {
    str_field(step, "uses").is_some_and(|uses| uses.ends_with(suffix))
}

pub fn uses_starts_with(step: &Value, prefix: &str) -> bool {
    str_field(step, "uses").is_some_and(|uses| uses.starts_with(prefix))
}

/// Substring match on the display name
pub fn name_contains(step: &Value, needle: &str) -> bool {
    str_field(step, "name").is_some_and(|name| name.contains(needle))
}

/// Steps of a job, or an empty slice when `steps` is missing or malformed
pub fn job_steps(job: &Mapping) -> &[Value] {
    match job.get("steps") {
        Some(Value::Sequence(steps)) => steps.as_slice(),
        _ => &[],
    }
}

pub fn find_step(steps: &[Value], pred: impl Fn(&Value) -> bool) -> Option<usize> {
    steps.iter().position(pred)
}

/// Append a step, creating `steps` when missing or not a sequence
pub fn append_step(job: &mut Mapping, step: Value) {
    match job.get_mut("steps") {
        Some(Value::Sequence(steps)) => steps.push(step),
        _ => {
            job.insert(Value::from("steps"), Value::Sequence(vec![step]));
        }
    }
}

/// Set `key` to `want` unless it already equals it; returns whether it changed
pub fn ensure_entry(map: &mut Mapping, key: &str, want: Value) -> bool {
    if map.get(key) == Some(&want) {
        return false;
    }
    map.insert(Value::from(key), want);
    true
}

// ============================================================================
// STEP BUILDER
// ============================================================================

/// Fluent builder for step mappings; keys are emitted in call order
#[derive(Debug, Default)]
pub struct StepBuilder {
    fields: Mapping,
    with: Mapping,
}

impl StepBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(self, name: &str) -> Self {
        self.field("name", name)
    }

    pub fn id(self, id: &str) -> Self {
        self.field("id", id)
    }

    /// Conditional-execution expression (`if:`)
    pub fn condition(self, expr: &str) -> Self {
        self.field("if", expr)
    }

    pub fn uses(self, action: &str) -> Self {
        self.field("uses", action)
    }

    pub fn shell(self, shell: &str) -> Self {
        self.field("shell", shell)
    }

    pub fn run(self, body: &str) -> Self {
        self.field("run", body)
    }

    /// Add a `with:` parameter
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.with.insert(Value::from(key), value.into());
        self
    }

    fn field(mut self, key: &str, value: &str) -> Self {
        self.fields.insert(Value::from(key), Value::from(value));
        self
    }

    pub fn build(mut self) -> Value {
        if !self.with.is_empty() {
            self.fields.insert(Value::from("with"), Value::Mapping(self.with));
        }
        Value::Mapping(self.fields)
    }
}
