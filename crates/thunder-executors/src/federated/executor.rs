//! Federated OIDC/OAuth executor (§4.3): synthesises an authorization
//! request on first invocation, exchanges the returned code and validates
//! the identity assertion on resumption.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::Algorithm;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thunder_crypto::{verify_jwt, JwksClient, KeySource};
use thunder_executor::{complete_from_sink, Executor, ExecutorContext};
use thunder_model::{ExecutorResult, Idp, IdpService, ThunderError, ThunderResult, Value};
use url::Url;

/// `Oidc` validates `id_token` and calls `userinfo_endpoint`; `OAuth`
/// (GitHub) has no `id_token` and resolves identity via userinfo alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FederatedKind {
    Oidc,
    OAuth,
}

pub struct FederatedExecutor {
    kind: FederatedKind,
    name: &'static str,
    idps: Arc<dyn IdpService>,
    http: reqwest::Client,
}

impl FederatedExecutor {
    pub fn new(kind: FederatedKind, name: &'static str, idps: Arc<dyn IdpService>) -> Self {
        Self {
            kind,
            name,
            idps,
            http: reqwest::Client::new(),
        }
    }

    fn state_key(node_id: &str) -> String {
        format!("__federated_{node_id}")
    }

    async fn begin(&self, ctx: &mut ExecutorContext, idp: &Idp, redirect_uri: &str) -> ThunderResult<ExecutorResult> {
        let state = random_token();
        let nonce = random_token();
        let code_verifier = random_token();
        let code_challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));

        let mut url = Url::parse(&idp.authorization_endpoint)
            .map_err(|e| ThunderError::external_request_failed(format!("invalid authorization_endpoint: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &idp.client_id);
            query.append_pair("redirect_uri", redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &idp.scopes.join(" "));
            query.append_pair("state", &state);
            if self.kind == FederatedKind::Oidc {
                query.append_pair("nonce", &nonce);
            }
            query.append_pair("code_challenge", &code_challenge);
            query.append_pair("code_challenge_method", "S256");
        }

        let mut pending = std::collections::BTreeMap::new();
        pending.insert("state".to_string(), Value::String(state));
        pending.insert("nonce".to_string(), Value::String(nonce));
        pending.insert("codeVerifier".to_string(), Value::String(code_verifier));
        ctx.sink
            .write_sensitive(Self::state_key(&ctx.node_id), Value::Map(pending));

        let (outputs, sensitive) = std::mem::take(&mut ctx.sink).into_result();
        Ok(ExecutorResult::redirect(url.to_string(), sensitive, outputs))
    }

    async fn resume(
        &self,
        ctx: &mut ExecutorContext,
        idp: &Idp,
        redirect_uri: &str,
        pending: &std::collections::BTreeMap<String, Value>,
    ) -> ThunderResult<ExecutorResult> {
        let returned_state = ctx.context.get_str("state").unwrap_or_default();
        let expected_state = pending.get("state").and_then(Value::as_str).unwrap_or_default();
        if returned_state != expected_state {
            return Ok(ExecutorResult::failed("AuthorizationFailed", "state parameter mismatch"));
        }

        let Some(code) = ctx.context.get_str("code") else {
            return Ok(ExecutorResult::failed("AuthorizationFailed", "missing authorization code"));
        };
        let code_verifier = pending.get("codeVerifier").and_then(Value::as_str).unwrap_or_default();

        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
        ];
        let client_secret = idp.client_secret.clone().unwrap_or_default();
        let mut request = self.http.post(&idp.token_endpoint);
        if idp.token_endpoint_auth_method == "client_secret_basic" {
            request = request.basic_auth(&idp.client_id, Some(&client_secret));
        } else {
            form.push(("client_id", &idp.client_id));
            form.push(("client_secret", &client_secret));
        }

        let response = request
            .form(&form)
            .send()
            .await
            .map_err(|e| ThunderError::external_request_failed(format!("token exchange transport error: {e}")))?;
        if !response.status().is_success() {
            return Ok(ExecutorResult::failed("TokenExchangeFailed", "IDP rejected the token exchange"));
        }
        let token_response: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ThunderError::external_request_failed(format!("malformed token response: {e}")))?;
        let access_token = token_response
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ThunderError::external_request_failed("token response missing access_token"))?;

        if self.kind == FederatedKind::Oidc {
            let id_token = match token_response.get("id_token").and_then(|v| v.as_str()) {
                Some(t) => t,
                None => return Ok(ExecutorResult::failed("IDTokenInvalid", "token response missing id_token")),
            };
            let jwks_uri = idp
                .jwks_uri
                .clone()
                .ok_or_else(|| ThunderError::external_request_failed("IDP has no jwks_uri configured"))?;
            let jwks = JwksClient::new(jwks_uri);
            let claims = match verify_jwt(
                id_token,
                &idp.client_id,
                &idp.issuer,
                KeySource::Jwks(&jwks),
                &[Algorithm::RS256, Algorithm::ES256, Algorithm::EdDSA],
            )
            .await
            {
                Ok(claims) => claims,
                Err(_) => return Ok(ExecutorResult::failed("IDTokenInvalid", "id_token signature/claims check failed")),
            };
            let expected_nonce = pending.get("nonce").and_then(Value::as_str).unwrap_or_default();
            if claims.get("nonce").and_then(|v| v.as_str()) != Some(expected_nonce) {
                return Ok(ExecutorResult::failed("IDTokenInvalid", "nonce mismatch"));
            }
        }

        let userinfo_endpoint = idp
            .userinfo_endpoint
            .clone()
            .ok_or_else(|| ThunderError::external_request_failed("IDP has no userinfo_endpoint configured"))?;
        let userinfo: serde_json::Value = self
            .http
            .get(&userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ThunderError::external_request_failed(format!("userinfo transport error: {e}")))?
            .json()
            .await
            .map_err(|e| ThunderError::external_request_failed(format!("malformed userinfo response: {e}")))?;

        ctx.sink.write(Self::state_key(&ctx.node_id), Value::Null);
        for (key, value) in userinfo_outputs(&userinfo) {
            ctx.sink.write(key, value);
        }
        Ok(complete_from_sink(std::mem::take(&mut ctx.sink)))
    }
}

fn userinfo_outputs(userinfo: &serde_json::Value) -> Vec<(&'static str, Value)> {
    const FIELDS: &[&str] = &[
        "sub",
        "email",
        "email_verified",
        "name",
        "given_name",
        "family_name",
        "picture",
        "locale",
    ];
    FIELDS
        .iter()
        .filter_map(|&field| userinfo.get(field).map(|v| (field, json_to_value(v))))
        .collect()
}

fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
        other => Value::String(other.to_string()),
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[async_trait]
impl Executor for FederatedExecutor {
    fn name(&self) -> &str {
        self.name
    }

    async fn execute(&self, mut ctx: ExecutorContext) -> ThunderResult<ExecutorResult> {
        let idp_id = ctx
            .properties
            .get_str("idpId")
            .ok_or_else(|| ThunderError::invalid_request("missing idpId property"))?
            .to_string();
        let redirect_uri = ctx
            .properties
            .get_str("redirectUri")
            .ok_or_else(|| ThunderError::invalid_request("missing redirectUri property"))?
            .to_string();
        let idp = self.idps.get(&idp_id).await?;

        let node_id = ctx.node_id.clone();
        let pending = match ctx.context.get(&Self::state_key(&node_id)) {
            Some(Value::Map(pending)) => Some(pending.clone()),
            _ => None,
        };

        match pending {
            Some(pending) => self.resume(&mut ctx, &idp, &redirect_uri, &pending).await,
            None => self.begin(&mut ctx, &idp, &redirect_uri).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use thunder_model::ExecutorStatus;

    struct FakeIdps(Idp);

    #[async_trait]
    impl IdpService for FakeIdps {
        async fn get(&self, _idp_id: &str) -> ThunderResult<Idp> {
            Ok(self.0.clone())
        }
    }

    fn google_idp() -> Idp {
        Idp {
            id: "google".into(),
            name: "Google".into(),
            authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_endpoint: "https://oauth2.googleapis.com/token".into(),
            userinfo_endpoint: Some("https://openidconnect.googleapis.com/v1/userinfo".into()),
            jwks_uri: Some("https://www.googleapis.com/oauth2/v3/certs".into()),
            issuer: "https://accounts.google.com".into(),
            client_id: "client1".into(),
            client_secret: Some("secret1".into()),
            scopes: vec!["openid".into(), "email".into()],
            token_endpoint_auth_method: "client_secret_basic".into(),
        }
    }

    #[tokio::test]
    async fn begin_redirects_with_persisted_state() {
        let executor = FederatedExecutor::new(FederatedKind::Oidc, "GoogleOIDC", Arc::new(FakeIdps(google_idp())));
        let mut properties = BTreeMap::new();
        properties.insert("idpId".to_string(), Value::String("google".into()));
        properties.insert("redirectUri".to_string(), Value::String("https://app.example/callback".into()));
        let ctx = ExecutorContext::new(None, BTreeMap::new(), &properties, "node1", "app1", None);
        let result = executor.execute(ctx).await.unwrap();
        assert_eq!(result.status, Some(ExecutorStatus::Redirect));
        assert!(result.redirect_url.unwrap().contains("state="));
        assert!(!result.sensitive_outputs.is_empty());
    }

    #[tokio::test]
    async fn resume_without_matching_state_fails() {
        let executor = FederatedExecutor::new(FederatedKind::Oidc, "GoogleOIDC", Arc::new(FakeIdps(google_idp())));
        let mut properties = BTreeMap::new();
        properties.insert("idpId".to_string(), Value::String("google".into()));
        properties.insert("redirectUri".to_string(), Value::String("https://app.example/callback".into()));

        let mut pending = BTreeMap::new();
        pending.insert("state".to_string(), Value::String("expected-state".into()));
        pending.insert("nonce".to_string(), Value::String("n".into()));
        pending.insert("codeVerifier".to_string(), Value::String("v".into()));

        let mut context = BTreeMap::new();
        context.insert("__federated_node1".to_string(), Value::Map(pending));
        context.insert("state".to_string(), Value::String("wrong-state".into()));
        context.insert("code".to_string(), Value::String("auth-code".into()));

        let ctx = ExecutorContext::new(None, context, &properties, "node1", "app1", None);
        let result = executor.execute(ctx).await.unwrap();
        assert_eq!(result.status, Some(ExecutorStatus::Failed));
        assert_eq!(result.failure.unwrap().code, "AuthorizationFailed");
    }
}
