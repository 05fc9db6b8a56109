//! Context value kinds (§3 FlowSession.context).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value stored in flow session context, or produced by an executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Null,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Stringify for placeholder substitution when the target string is
    /// not a single bare placeholder (§4.2).
    pub fn to_display_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::Bool(b) => b.to_string(),
            Value::Bytes(b) => base64_url_encode(b),
            Value::List(_) | Value::Map(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
            Value::Null => String::new(),
        }
    }

    /// Resolve a dotted path (`a.b.c`) against a `Map` value. Unknown paths
    /// return `None`, which callers substitute as empty string per §4.2.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            match current {
                Value::Map(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Numeric-and-string-flexible equality used by claim-request matching
    /// (§4.7, GLOSSARY `CompareValues`).
    pub fn compare_loosely(&self, other: &serde_json::Value) -> bool {
        match (self, other) {
            (Value::String(a), serde_json::Value::String(b)) => a == b,
            (Value::Number(a), serde_json::Value::Number(b)) => {
                b.as_f64().map(|b| (*a - b).abs() < f64::EPSILON).unwrap_or(false)
            }
            (Value::Bool(a), serde_json::Value::Bool(b)) => a == b,
            (Value::String(a), serde_json::Value::Number(b)) => {
                a.parse::<f64>().ok().zip(b.as_f64()).map(|(a, b)| (a - b).abs() < f64::EPSILON).unwrap_or(false)
            }
            (Value::Number(a), serde_json::Value::String(b)) => {
                b.parse::<f64>().ok().map(|b| (*a - b).abs() < f64::EPSILON).unwrap_or(false)
            }
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::List(a.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(o) => {
                Value::Map(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::String(s) => serde_json::Value::String(s),
            Value::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Bytes(b) => serde_json::Value::String(base64_url_encode(&b)),
            Value::List(l) => serde_json::Value::Array(l.into_iter().map(Into::into).collect()),
            Value::Map(m) => {
                serde_json::Value::Object(m.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

fn base64_url_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_path_resolves_nested_map() {
        let mut inner = BTreeMap::new();
        inner.insert("applicationId".to_string(), Value::String("APP1".into()));
        let mut outer = BTreeMap::new();
        outer.insert("context".to_string(), Value::Map(inner));
        let root = Value::Map(outer);

        assert_eq!(
            root.get_path("context.applicationId"),
            Some(&Value::String("APP1".into()))
        );
        assert_eq!(root.get_path("context.missing"), None);
    }

    #[test]
    fn compare_loosely_handles_numeric_string_mismatch() {
        let v = Value::Number(42.0);
        assert!(v.compare_loosely(&serde_json::json!("42")));
        assert!(!v.compare_loosely(&serde_json::json!("43")));
    }
}
