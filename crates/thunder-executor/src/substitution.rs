//! Runtime placeholder substitution (§4.2, §9 "Placeholder language").
//!
//! `{{ context.<dotted.path> }}` with an optional `| default("x")` modifier.
//! Unknown paths resolve to the default, or empty string if none is given.
//! Deliberately minimal: there is no expression evaluation, only a single
//! path lookup per placeholder, so there is nothing here that "requires
//! execution" (§9).

use once_cell::sync::Lazy;
use regex::Regex;
use thunder_model::Value;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\{\{\s*context\.([a-zA-Z0-9_.]+)\s*(?:\|\s*default\(\s*"([^"]*)"\s*\)\s*)?\}\}"#,
    )
    .expect("placeholder regex is a fixed literal")
});

/// Substitutes every `{{ context.* }}` placeholder found in `template`
/// against `context`.
///
/// When the entire string is a single placeholder, the resolved value keeps
/// its native [`Value`] kind. Otherwise each placeholder is stringified via
/// [`Value::to_display_string`] and spliced into the surrounding text.
pub fn substitute(template: &str, context: &Value) -> Value {
    if let Some(whole_match) = PLACEHOLDER.find(template) {
        if whole_match.start() == 0 && whole_match.end() == template.len() {
            let caps = PLACEHOLDER.captures(template).expect("match implies captures");
            return resolve_one(&caps, context);
        }
    }

    let replaced = PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
        resolve_one(caps, context).to_display_string()
    });
    Value::String(replaced.into_owned())
}

fn resolve_one(caps: &regex::Captures, context: &Value) -> Value {
    let path = &caps[1];
    let resolved = context.get_path(path);
    match resolved {
        Some(v) => v.clone(),
        None => match caps.get(2) {
            Some(default) => Value::String(default.as_str().to_string()),
            None => Value::String(String::new()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ctx(pairs: &[(&str, Value)]) -> Value {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        Value::Map(BTreeMap::from([("context".to_string(), Value::Map(map))]))
    }

    #[test]
    fn substitutes_bare_placeholder_preserving_type() {
        let context = ctx(&[("applicationId", Value::String("APP1".into()))]);
        let result = substitute("{{ context.applicationId }}", &context);
        assert_eq!(result, Value::String("APP1".into()));
    }

    #[test]
    fn substitutes_embedded_placeholder_as_string() {
        let context = ctx(&[("applicationId", Value::String("APP1".into()))]);
        let result = substitute("app={{ context.applicationId }}!", &context);
        assert_eq!(result, Value::String("app=APP1!".into()));
    }

    #[test]
    fn unknown_path_resolves_to_empty_string() {
        let context = ctx(&[]);
        let result = substitute("{{ context.missing }}", &context);
        assert_eq!(result, Value::String(String::new()));
    }

    #[test]
    fn unknown_path_uses_default_modifier() {
        let context = ctx(&[]);
        let result = substitute(r#"{{ context.missing | default("x") }}"#, &context);
        assert_eq!(result, Value::String("x".into()));
    }
}
