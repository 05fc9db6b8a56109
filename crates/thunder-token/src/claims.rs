//! Claim resolver (C7, §4.7): merges scope-implied claims with explicit
//! `claims` request parameters, gated by a per-app attribute allow-list.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use thunder_model::IndividualClaim;

/// Standard OIDC scope-to-claim mapping (§4.7 rule 2 fallback), used when
/// the app does not declare its own `scope_claims` entry for a scope.
fn standard_scope_claims(scope: &str) -> &'static [&'static str] {
    match scope {
        "profile" => &[
            "name",
            "family_name",
            "given_name",
            "middle_name",
            "nickname",
            "preferred_username",
            "picture",
            "website",
            "gender",
            "birthdate",
            "zoneinfo",
            "locale",
            "updated_at",
        ],
        "email" => &["email", "email_verified"],
        "phone" => &["phone_number", "phone_number_verified"],
        "address" => &["address"],
        _ => &[],
    }
}

/// Loosely compares a stored attribute value against an `IndividualClaim`
/// constraint (`value` equality or `values` membership), numeric/string
/// flexible per `CompareValues` in the glossary.
fn matches_constraint(claim: &IndividualClaim, attribute: &JsonValue) -> bool {
    if claim.is_unconstrained() {
        return true;
    }
    if let Some(expected) = &claim.value {
        if loosely_equal(expected, attribute) {
            return true;
        }
    }
    if let Some(expected_values) = &claim.values {
        return expected_values.iter().any(|v| loosely_equal(v, attribute));
    }
    false
}

fn loosely_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::String(a), JsonValue::String(b)) => a == b,
        (JsonValue::Bool(a), JsonValue::Bool(b)) => a == b,
        (JsonValue::Number(a), JsonValue::Number(b)) => {
            a.as_f64().zip(b.as_f64()).map(|(a, b)| (a - b).abs() < f64::EPSILON).unwrap_or(false)
        }
        (JsonValue::String(a), JsonValue::Number(b)) | (JsonValue::Number(b), JsonValue::String(a)) => {
            a.parse::<f64>().ok().zip(b.as_f64()).map(|(a, b)| (a - b).abs() < f64::EPSILON).unwrap_or(false)
        }
        _ => a == b,
    }
}

/// `BuildClaims(scopes, requested_claims, user_attributes, app_scope_map, allowed_attributes)`
/// (§4.7). Returns the claim map to merge into an ID token / userinfo response.
pub fn build_claims(
    scopes: &[String],
    requested_claims: &BTreeMap<String, IndividualClaim>,
    user_attributes: &serde_json::Map<String, JsonValue>,
    app_scope_map: &BTreeMap<String, Vec<String>>,
    allowed_attributes: &[String],
) -> BTreeMap<String, JsonValue> {
    let mut result = BTreeMap::new();

    // Rule 1: openid absent, or nothing to draw claims from.
    if !scopes.iter().any(|s| s == "openid") || user_attributes.is_empty() {
        return result;
    }
    // Rule 4: app must opt in to the explicit-claims surface at all, and
    // scope claims are likewise gated by the allow-list below.
    if allowed_attributes.is_empty() {
        return result;
    }
    let allowed: std::collections::HashSet<&str> =
        allowed_attributes.iter().map(String::as_str).collect();

    // Rule 2: scope claims.
    for scope in scopes {
        let claim_names: Vec<&str> = app_scope_map
            .get(scope)
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_else(|| standard_scope_claims(scope).to_vec());
        for name in claim_names {
            if !allowed.contains(name) {
                continue;
            }
            if let Some(value) = user_attributes.get(name) {
                if !value.is_null() {
                    result.insert(name.to_string(), value.clone());
                }
            }
        }
    }

    // Rule 3: explicit claims, overriding scope claims when both match.
    for (name, constraint) in requested_claims {
        if !allowed.contains(name.as_str()) {
            continue;
        }
        let Some(value) = user_attributes.get(name) else { continue };
        if value.is_null() {
            continue;
        }
        if matches_constraint(constraint, value) {
            result.insert(name.clone(), value.clone());
        } else {
            // Requested with an unmet constraint: drop even a previously
            // included scope-claim value for this name (§4.7 example).
            result.remove(name);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, JsonValue)]) -> serde_json::Map<String, JsonValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn no_openid_scope_yields_empty() {
        let result = build_claims(
            &["profile".to_string()],
            &BTreeMap::new(),
            &attrs(&[("name", json!("A"))]),
            &BTreeMap::new(),
            &["name".to_string()],
        );
        assert!(result.is_empty());
    }

    #[test]
    fn empty_allow_list_yields_empty_even_with_requested_claims() {
        let mut requested = BTreeMap::new();
        requested.insert(
            "email".to_string(),
            IndividualClaim { essential: None, value: Some(json!("x@y")), values: None },
        );
        let result = build_claims(
            &["openid".to_string(), "email".to_string()],
            &requested,
            &attrs(&[("email", json!("x@y"))]),
            &BTreeMap::new(),
            &[],
        );
        assert!(result.is_empty());
    }

    #[test]
    fn scope_claims_filtered_by_allow_list() {
        let result = build_claims(
            &["openid".to_string(), "profile".to_string()],
            &BTreeMap::new(),
            &attrs(&[
                ("given_name", json!("A")),
                ("family_name", json!("B")),
                ("email", json!("x@y")),
            ]),
            &BTreeMap::new(),
            &["given_name".to_string(), "family_name".to_string()],
        );
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("given_name"), Some(&json!("A")));
        assert!(!result.contains_key("email"));
    }

    #[test]
    fn explicit_claim_value_mismatch_yields_empty() {
        let mut requested = BTreeMap::new();
        requested.insert(
            "email".to_string(),
            IndividualClaim { essential: None, value: Some(json!("z@w")), values: None },
        );
        let result = build_claims(
            &["openid".to_string(), "email".to_string()],
            &requested,
            &attrs(&[("email", json!("x@y"))]),
            &BTreeMap::new(),
            &["email".to_string()],
        );
        assert!(result.is_empty());
    }

    #[test]
    fn explicit_claim_overrides_scope_claim() {
        let mut requested = BTreeMap::new();
        requested.insert(
            "email".to_string(),
            IndividualClaim { essential: None, value: Some(json!("x@y")), values: None },
        );
        let result = build_claims(
            &["openid".to_string(), "email".to_string()],
            &requested,
            &attrs(&[("email", json!("x@y"))]),
            &BTreeMap::new(),
            &["email".to_string()],
        );
        assert_eq!(result.get("email"), Some(&json!("x@y")));
    }

    #[test]
    fn app_scope_map_overrides_standard_mapping() {
        let mut app_scope_map = BTreeMap::new();
        app_scope_map.insert("profile".to_string(), vec!["nickname".to_string()]);
        let result = build_claims(
            &["openid".to_string(), "profile".to_string()],
            &BTreeMap::new(),
            &attrs(&[("nickname", json!("Ace")), ("name", json!("A"))]),
            &app_scope_map,
            &["nickname".to_string(), "name".to_string()],
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("nickname"), Some(&json!("Ace")));
    }
}
