//! AuthAssert executor (§4.3): terminal executor in authentication flows,
//! bridges the flow engine to the token endpoint via a signed short-lived
//! assertion JWT.

use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::sync::Arc;
use thunder_crypto::{generate_jwt, SigningKey};
use thunder_executor::{complete_from_sink, Executor, ExecutorContext};
use thunder_model::{ExecutorResult, ThunderError, ThunderResult, Value};

const ASSERTION_VALIDITY_SECONDS: i64 = 60;

pub struct AuthAssertExecutor {
    signing_key: Arc<SigningKey>,
    issuer: String,
}

impl AuthAssertExecutor {
    pub fn new(signing_key: Arc<SigningKey>, issuer: impl Into<String>) -> Self {
        Self {
            signing_key,
            issuer: issuer.into(),
        }
    }
}

#[async_trait]
impl Executor for AuthAssertExecutor {
    fn name(&self) -> &str {
        "AuthAssert"
    }

    async fn execute(&self, mut ctx: ExecutorContext) -> ThunderResult<ExecutorResult> {
        let user_id = ctx
            .context
            .get_str("userId")
            .ok_or_else(|| ThunderError::invalid_request("missing userId in session context"))?
            .to_string();

        let allowed_attributes: Vec<String> = match ctx.properties.get("userAttributes") {
            Some(Value::List(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            _ => Vec::new(),
        };

        let mut user_attributes = JsonMap::new();
        for name in &allowed_attributes {
            if let Some(value) = ctx.context.get(name) {
                user_attributes.insert(name.clone(), value_to_json(value));
            }
        }

        let mut claims = JsonMap::new();
        claims.insert("user_attributes".to_string(), JsonValue::Object(user_attributes));

        let (token, _iat) = generate_jwt(
            &self.signing_key,
            &user_id,
            JsonValue::String(ctx.application_id.clone()),
            &self.issuer,
            ASSERTION_VALIDITY_SECONDS,
            claims,
        )
        .await?;

        ctx.sink.write("assertion", token);
        Ok(complete_from_sink(std::mem::take(&mut ctx.sink)))
    }
}

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Number(n) => serde_json::json!(n),
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Bytes(b) => JsonValue::String(base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            b,
        )),
        Value::List(items) => JsonValue::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => JsonValue::Object(map.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect()),
        Value::Null => JsonValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn test_signing_key() -> SigningKey {
        const PRIV: &str = include_str!("../../thunder-crypto/testdata/rsa_test_key.pem");
        SigningKey::from_pem(PRIV, "test-rsa").unwrap()
    }

    #[tokio::test]
    async fn produces_assertion_with_sub_and_aud() {
        let executor = AuthAssertExecutor::new(Arc::new(test_signing_key()), "https://issuer.example");

        let mut properties = BTreeMap::new();
        properties.insert(
            "userAttributes".to_string(),
            Value::List(vec![Value::String("given_name".into())]),
        );
        let mut context = BTreeMap::new();
        context.insert("userId".to_string(), Value::String("U".into()));
        context.insert("given_name".to_string(), Value::String("Ada".into()));

        let ctx = ExecutorContext::new(None, context, &properties, "node1", "app-1", None);
        let result = executor.execute(ctx).await.unwrap();
        let assertion = result.outputs.get("assertion").unwrap().as_str().unwrap();

        let parts: Vec<&str> = assertion.split('.').collect();
        assert_eq!(parts.len(), 3);
        let payload_json = base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, parts[1]).unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&payload_json).unwrap();
        assert_eq!(payload["sub"], "U");
        assert_eq!(payload["aud"], "app-1");
    }
}
