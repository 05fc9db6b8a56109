//! Token builder (C6, §4.6): mints access, refresh, and ID tokens.

use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeMap;
use thunder_crypto::{generate_jwt, SigningKey};
use thunder_model::{ClaimsRequest, OAuthApp, ThunderResult};

use crate::claims::build_claims;

/// `global.jwt.*`/`global.oauth.refresh_token.*` fallbacks consulted when an
/// app does not override them (§4.6 "Issuer/validity resolution").
#[derive(Debug, Clone)]
pub struct GlobalTokenConfig {
    pub issuer: String,
    pub access_token_validity: i64,
    pub id_token_validity: i64,
    pub refresh_token_validity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    Id,
}

/// `act` claim for token-exchange delegation chains (§4.6 `BuildAccessToken`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ActorClaim {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act: Option<Box<ActorClaim>>,
}

/// The uniform shape every `Build*Token` operation returns (§4.6).
#[derive(Debug, Clone)]
pub struct TokenResult {
    pub token: String,
    pub issued_at: i64,
    pub expires_in: i64,
    pub kind: TokenKind,
    pub scopes: Vec<String>,
    pub client_id: String,
    pub subject: String,
    pub audience: String,
    pub user_attributes: Map<String, JsonValue>,
}

pub struct AccessTokenContext<'a> {
    pub app: &'a OAuthApp,
    pub subject: &'a str,
    pub scopes: &'a [String],
    pub grant_type: &'a str,
    pub user_attributes: &'a Map<String, JsonValue>,
    pub claims_request: &'a ClaimsRequest,
    pub actor: Option<ActorClaim>,
}

pub struct RefreshTokenContext<'a> {
    pub app: &'a OAuthApp,
    pub access_token_subject: &'a str,
    pub access_token_audience: &'a str,
    pub scopes: &'a [String],
    pub grant_type: &'a str,
    pub user_attributes: &'a Map<String, JsonValue>,
    pub claims_request: &'a ClaimsRequest,
}

pub struct IdTokenContext<'a> {
    pub app: &'a OAuthApp,
    pub subject: &'a str,
    pub scopes: &'a [String],
    pub user_attributes: &'a Map<String, JsonValue>,
    pub claims_request: &'a ClaimsRequest,
    /// Unix timestamp of the authentication event; 0 when not applicable
    /// (e.g. refresh-token-only flows).
    pub auth_time: i64,
}

/// Mints OAuth2/OIDC tokens for a single application using the process-wide
/// signing key (§4.1 "alg is determined by the server signing key").
pub struct TokenBuilder {
    signing_key: std::sync::Arc<SigningKey>,
    global: GlobalTokenConfig,
}

impl TokenBuilder {
    pub fn new(signing_key: std::sync::Arc<SigningKey>, global: GlobalTokenConfig) -> Self {
        Self { signing_key, global }
    }

    fn issuer(&self, app: &OAuthApp) -> String {
        app.token.issuer.clone().unwrap_or_else(|| self.global.issuer.clone())
    }

    /// §4.6 `BuildAccessToken`.
    pub async fn build_access_token(&self, ctx: AccessTokenContext<'_>) -> ThunderResult<TokenResult> {
        let issuer = self.issuer(ctx.app);
        let validity = ctx
            .app
            .token
            .access_token
            .as_ref()
            .and_then(|c| c.validity)
            .unwrap_or(self.global.access_token_validity);

        let mut claims = Map::new();
        claims.insert("scope".into(), json!(ctx.scopes.join(" ")));
        claims.insert("client_id".into(), json!(ctx.app.client_id));
        claims.insert("grant_type".into(), json!(ctx.grant_type));
        if let Some(actor) = &ctx.actor {
            claims.insert(
                "act".into(),
                serde_json::to_value(actor)
                    .map_err(|e| thunder_model::ThunderError::internal(format!("actor claim serialization failed: {e}")))?,
            );
        }

        let allowed = ctx
            .app
            .token
            .access_token
            .as_ref()
            .map(|c| c.user_attributes.as_slice())
            .unwrap_or(&[]);
        for name in allowed {
            if let Some(value) = ctx.user_attributes.get(name) {
                if !value.is_null() {
                    claims.insert(name.clone(), value.clone());
                }
            }
        }

        if !ctx.claims_request.userinfo.is_empty() {
            let serialized = serde_json::to_string(&ctx.claims_request.userinfo)
                .map_err(|e| thunder_model::ThunderError::internal(format!("claims_request serialization failed: {e}")))?;
            claims.insert("claims".into(), json!(serialized));
        }

        let (token, issued_at) = generate_jwt(
            &self.signing_key,
            ctx.subject,
            json!(ctx.app.client_id),
            &issuer,
            validity,
            claims,
        )
        .await?;

        Ok(TokenResult {
            token,
            issued_at,
            expires_in: validity,
            kind: TokenKind::Access,
            scopes: ctx.scopes.to_vec(),
            client_id: ctx.app.client_id.clone(),
            subject: ctx.subject.to_string(),
            audience: ctx.app.client_id.clone(),
            user_attributes: ctx.user_attributes.clone(),
        })
    }

    /// §4.6 `BuildRefreshToken`. Self-addressed: subject is the client,
    /// audience is the issuer.
    pub async fn build_refresh_token(&self, ctx: RefreshTokenContext<'_>) -> ThunderResult<TokenResult> {
        let issuer = self.issuer(ctx.app);
        let validity = self.global.refresh_token_validity;

        let mut claims = Map::new();
        claims.insert("scope".into(), json!(ctx.scopes.join(" ")));
        claims.insert("access_token_sub".into(), json!(ctx.access_token_subject));
        claims.insert("access_token_aud".into(), json!(ctx.access_token_audience));
        claims.insert("grant_type".into(), json!(ctx.grant_type));

        let configured_attributes = ctx
            .app
            .token
            .access_token
            .as_ref()
            .map(|c| c.user_attributes.as_slice())
            .unwrap_or(&[]);
        if !configured_attributes.is_empty() {
            let present: Map<String, JsonValue> = configured_attributes
                .iter()
                .filter_map(|name| ctx.user_attributes.get(name).map(|v| (name.clone(), v.clone())))
                .collect();
            if !present.is_empty() {
                claims.insert("access_token_user_attributes".into(), JsonValue::Object(present));
            }
        }
        if !ctx.claims_request.is_empty() {
            let serialized = serde_json::to_value(ctx.claims_request)
                .map_err(|e| thunder_model::ThunderError::internal(format!("claims_request serialization failed: {e}")))?;
            claims.insert("access_token_claims_request".into(), serialized);
        }

        let (token, issued_at) = generate_jwt(
            &self.signing_key,
            &ctx.app.client_id,
            json!(issuer),
            &issuer,
            validity,
            claims,
        )
        .await?;

        Ok(TokenResult {
            token,
            issued_at,
            expires_in: validity,
            kind: TokenKind::Refresh,
            scopes: ctx.scopes.to_vec(),
            client_id: ctx.app.client_id.clone(),
            subject: ctx.app.client_id.clone(),
            audience: issuer,
            user_attributes: ctx.user_attributes.clone(),
        })
    }

    /// §4.6 `BuildIDToken`. User claims come from C7 (`build_claims`).
    pub async fn build_id_token(&self, ctx: IdTokenContext<'_>) -> ThunderResult<TokenResult> {
        let issuer = self.issuer(ctx.app);
        let validity = ctx
            .app
            .token
            .id_token
            .as_ref()
            .and_then(|c| c.validity)
            .unwrap_or(self.global.id_token_validity);

        let mut claims = Map::new();
        if ctx.auth_time > 0 {
            claims.insert("auth_time".into(), json!(ctx.auth_time));
        }

        let allowed = ctx
            .app
            .token
            .id_token
            .as_ref()
            .map(|c| c.user_attributes.clone())
            .unwrap_or_default();
        let resolved = build_claims(
            ctx.scopes,
            &ctx.claims_request.id_token,
            ctx.user_attributes,
            &ctx.app.scope_claims,
            &allowed,
        );
        for (name, value) in resolved {
            claims.insert(name, value);
        }

        let (token, issued_at) = generate_jwt(
            &self.signing_key,
            ctx.subject,
            json!(ctx.app.client_id),
            &issuer,
            validity,
            claims,
        )
        .await?;

        Ok(TokenResult {
            token,
            issued_at,
            expires_in: validity,
            kind: TokenKind::Id,
            scopes: ctx.scopes.to_vec(),
            client_id: ctx.app.client_id.clone(),
            subject: ctx.subject.to_string(),
            audience: ctx.app.client_id.clone(),
            user_attributes: ctx.user_attributes.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use thunder_model::{AppTokenConfig, TokenKindConfig};

    const PRIV: &str = include_str!("../../thunder-crypto/testdata/rsa_test_key.pem");

    fn signing_key() -> std::sync::Arc<SigningKey> {
        std::sync::Arc::new(SigningKey::from_pem(PRIV, "test-rsa").unwrap())
    }

    fn global() -> GlobalTokenConfig {
        GlobalTokenConfig {
            issuer: "https://issuer.example".into(),
            access_token_validity: 3600,
            id_token_validity: 3600,
            refresh_token_validity: 86_400,
        }
    }

    fn app_with_attrs(attrs: &[&str]) -> OAuthApp {
        OAuthApp {
            client_id: "app-1".into(),
            token: AppTokenConfig {
                access_token: Some(TokenKindConfig {
                    validity: None,
                    user_attributes: attrs.iter().map(|s| s.to_string()).collect(),
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn decode_claims(token: &str) -> Map<String, JsonValue> {
        let payload = token.split('.').nth(1).unwrap();
        let bytes = base64::Engine::decode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            payload,
        )
        .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn access_token_includes_filtered_attributes_only() {
        let builder = TokenBuilder::new(signing_key(), global());
        let app = app_with_attrs(&["given_name", "family_name"]);
        let mut attrs = Map::new();
        attrs.insert("given_name".into(), json!("A"));
        attrs.insert("family_name".into(), json!("B"));
        attrs.insert("email".into(), json!("x@y"));

        let result = builder
            .build_access_token(AccessTokenContext {
                app: &app,
                subject: "U",
                scopes: &["openid".to_string(), "profile".to_string()],
                grant_type: "authorization_code",
                user_attributes: &attrs,
                claims_request: &ClaimsRequest::default(),
                actor: None,
            })
            .await
            .unwrap();

        let claims = decode_claims(&result.token);
        assert_eq!(claims.get("scope").unwrap(), "openid profile");
        assert_eq!(claims.get("given_name").unwrap(), "A");
        assert_eq!(claims.get("family_name").unwrap(), "B");
        assert!(!claims.contains_key("email"));
    }

    #[tokio::test]
    async fn refresh_token_is_self_addressed() {
        let builder = TokenBuilder::new(signing_key(), global());
        let app = app_with_attrs(&[]);

        let result = builder
            .build_refresh_token(RefreshTokenContext {
                app: &app,
                access_token_subject: "U",
                access_token_audience: "app-1",
                scopes: &["openid".to_string()],
                grant_type: "authorization_code",
                user_attributes: &Map::new(),
                claims_request: &ClaimsRequest::default(),
            })
            .await
            .unwrap();

        assert_eq!(result.subject, "app-1");
        assert_eq!(result.audience, "https://issuer.example");
        let claims = decode_claims(&result.token);
        assert_eq!(claims.get("access_token_sub").unwrap(), "U");
    }

    #[tokio::test]
    async fn id_token_carries_resolved_user_claims() {
        let builder = TokenBuilder::new(signing_key(), global());
        let app = OAuthApp {
            client_id: "app-1".into(),
            token: AppTokenConfig {
                id_token: Some(TokenKindConfig {
                    validity: None,
                    user_attributes: vec!["email".to_string()],
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut attrs = Map::new();
        attrs.insert("email".into(), json!("x@y"));

        let result = builder
            .build_id_token(IdTokenContext {
                app: &app,
                subject: "U",
                scopes: &["openid".to_string(), "email".to_string()],
                user_attributes: &attrs,
                claims_request: &ClaimsRequest::default(),
                auth_time: 1_700_000_000,
            })
            .await
            .unwrap();

        let claims = decode_claims(&result.token);
        assert_eq!(claims.get("email").unwrap(), "x@y");
        assert_eq!(claims.get("auth_time").unwrap(), 1_700_000_000);
    }
}
