//! `ExecutorContext` (§4.2): what an executor sees and how it reports back.

use std::collections::BTreeMap;
use thunder_model::{ExecutorResult, Value};

use crate::substitution::substitute;

/// Read-only view of accumulated session context, handed to executors so
/// they can read prior inputs/outputs without mutating the session directly
/// (all persistence happens through [`ExecutorContext`]'s outputs, §4.2
/// "Executors are stateless").
#[derive(Debug, Clone)]
pub struct ContextView(Value);

impl ContextView {
    pub fn new(context: BTreeMap<String, Value>) -> Self {
        Self(Value::Map(context))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match &self.0 {
            Value::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_path(&self, path: &str) -> Option<&Value> {
        self.0.get_path(path)
    }
}

/// Per-node properties, substituted once at node entry (§4.2, §4.4).
#[derive(Debug, Clone, Default)]
pub struct Properties(BTreeMap<String, Value>);

impl Properties {
    /// Runs placeholder substitution over every string-bearing property in
    /// `raw` against `session_context`, wrapped as `{ "context": ... }` so
    /// `{{ context.<path> }}` placeholders resolve against it directly.
    pub fn substitute(raw: &BTreeMap<String, Value>, session_context: &BTreeMap<String, Value>) -> Self {
        let wrapped = Value::Map(BTreeMap::from([(
            "context".to_string(),
            Value::Map(session_context.clone()),
        )]));
        let substituted = raw
            .iter()
            .map(|(k, v)| (k.clone(), substitute_value(v, &wrapped)))
            .collect();
        Self(substituted)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn raw(&self) -> &BTreeMap<String, Value> {
        &self.0
    }
}

fn substitute_value(value: &Value, context: &Value) -> Value {
    match value {
        Value::String(s) => substitute(s, context),
        Value::Map(m) => Value::Map(
            m.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, context)))
                .collect(),
        ),
        Value::List(items) => Value::List(items.iter().map(|v| substitute_value(v, context)).collect()),
        other => other.clone(),
    }
}

/// Accumulates outputs an executor writes, along with which of those output
/// keys are sensitive and must be erased by the engine after the node
/// completes (§4.4, §9 "Sensitive set").
#[derive(Debug, Default)]
pub struct OutputSink {
    outputs: BTreeMap<String, Value>,
    sensitive_keys: Vec<String>,
}

impl OutputSink {
    pub fn write(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.outputs.insert(key.into(), value.into());
    }

    pub fn write_sensitive(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.outputs.insert(key.clone(), value.into());
        self.sensitive_keys.push(key);
    }

    pub fn into_result(self) -> (BTreeMap<String, Value>, Vec<String>) {
        (self.outputs, self.sensitive_keys)
    }
}

/// Everything an `Executor::execute` call needs (§4.2).
pub struct ExecutorContext {
    pub mode: Option<String>,
    pub context: ContextView,
    pub properties: Properties,
    pub node_id: String,
    pub application_id: String,
    pub organization_unit_id: Option<String>,
    pub sink: OutputSink,
}

impl ExecutorContext {
    pub fn new(
        mode: Option<String>,
        context: BTreeMap<String, Value>,
        raw_properties: &BTreeMap<String, Value>,
        node_id: impl Into<String>,
        application_id: impl Into<String>,
        organization_unit_id: Option<String>,
    ) -> Self {
        let properties = Properties::substitute(raw_properties, &context);
        Self {
            mode,
            context: ContextView::new(context),
            properties,
            node_id: node_id.into(),
            application_id: application_id.into(),
            organization_unit_id,
            sink: OutputSink::default(),
        }
    }
}

/// Helper to turn a finished [`ExecutorContext`]'s sink into an
/// [`ExecutorResult::Complete`].
pub fn complete_from_sink(sink: OutputSink) -> ExecutorResult {
    let (outputs, sensitive) = sink.into_result();
    ExecutorResult::complete_sensitive(outputs, sensitive)
}
