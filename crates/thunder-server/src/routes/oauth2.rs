//! `POST /oauth2/token` (§4.8, §6 "Wire protocol — token endpoint").
//!
//! RFC 6749 `application/x-www-form-urlencoded` request, JSON response.
//! Grants supported: `authorization_code`, `client_credentials`,
//! `refresh_token`, `urn:ietf:params:oauth:grant-type:token-exchange`.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use axum::Json;
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use thunder_crypto::{verify_jwt, KeySource};
use thunder_model::{ClaimsRequest, OAuthApp};
use thunder_token::{AccessTokenContext, ActorClaim, IdTokenContext, RefreshTokenContext};

use crate::state::AppState;

const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub subject_token: Option<String>,
    #[serde(default)]
    pub subject_token_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub scope: String,
}

#[derive(Debug, Serialize)]
pub struct OAuthError {
    pub error: &'static str,
    pub error_description: String,
}

impl OAuthError {
    fn new(error: &'static str, description: impl Into<String>) -> Self {
        Self { error, error_description: description.into() }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = match self.error {
            "invalid_client" => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(self)).into_response()
    }
}

fn parse_scopes(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| s.split_whitespace().map(str::to_string).collect()).unwrap_or_default()
}

/// `client_secret_basic` (Authorization header) or `client_secret_post`
/// (body fields) — both forms are accepted, matching RFC 6749 §2.3.1.
fn authenticate_client(headers: &HeaderMap, req: &TokenRequest, app: &OAuthApp) -> Result<(), OAuthError> {
    if app.public_client {
        return Ok(());
    }
    let (client_id, client_secret) = basic_auth_credentials(headers)
        .or_else(|| req.client_id.clone().zip(req.client_secret.clone()))
        .ok_or_else(|| OAuthError::new("invalid_client", "missing client credentials"))?;

    if client_id != app.client_id || Some(client_secret) != app.client_secret {
        return Err(OAuthError::new("invalid_client", "client authentication failed"));
    }
    Ok(())
}

fn basic_auth_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (id, secret) = text.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(req): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, OAuthError> {
    match req.grant_type.as_str() {
        "authorization_code" => authorization_code_grant(state, headers, req).await,
        "client_credentials" => client_credentials_grant(state, headers, req).await,
        "refresh_token" => refresh_token_grant(state, headers, req).await,
        TOKEN_EXCHANGE_GRANT => token_exchange_grant(state, headers, req).await,
        other => Err(OAuthError::new("unsupported_grant_type", format!("unknown grant_type '{other}'"))),
    }
}

async fn authorization_code_grant(
    state: AppState,
    headers: HeaderMap,
    req: TokenRequest,
) -> Result<Json<TokenResponse>, OAuthError> {
    let code = req.code.clone().ok_or_else(|| OAuthError::new("invalid_request", "missing code"))?;
    // Single-use: removed under the DashMap shard lock before anything else
    // runs, so a racing second redemption of the same code always misses.
    let grant = state
        .auth_codes
        .redeem(&code)
        .ok_or_else(|| OAuthError::new("invalid_grant", "authorization code is unknown or already redeemed"))?;

    let app = state
        .applications
        .get(&grant.application_id)
        .await
        .map_err(|_| OAuthError::new("invalid_grant", "application no longer exists"))?;

    if !state.config.security.skip_token_endpoint_auth {
        authenticate_client(&headers, &req, &app)?;
    }

    if let Some(expected) = &grant.redirect_uri {
        if req.redirect_uri.as_deref() != Some(expected.as_str()) {
            return Err(OAuthError::new("invalid_grant", "redirect_uri does not match the authorization request"));
        }
    }

    let mut claims = Map::new();
    claims.insert("assertion".to_string(), serde_json::json!(grant.assertion));
    let access = state
        .token_builder
        .build_access_token(AccessTokenContext {
            app: &app,
            subject: &grant.subject,
            scopes: &grant.scopes,
            grant_type: "authorization_code",
            user_attributes: &claims,
            claims_request: &grant.claims_request,
            actor: None,
        })
        .await
        .map_err(|e| OAuthError::new("server_error", e.message))?;

    let refresh = state
        .token_builder
        .build_refresh_token(RefreshTokenContext {
            app: &app,
            access_token_subject: &access.subject,
            access_token_audience: &access.audience,
            scopes: &grant.scopes,
            grant_type: "authorization_code",
            user_attributes: &claims,
            claims_request: &grant.claims_request,
        })
        .await
        .map_err(|e| OAuthError::new("server_error", e.message))?;

    let id_token = if grant.scopes.iter().any(|s| s == "openid") {
        let minted = state
            .token_builder
            .build_id_token(IdTokenContext {
                app: &app,
                subject: &grant.subject,
                scopes: &grant.scopes,
                user_attributes: &claims,
                claims_request: &grant.claims_request,
                auth_time: chrono::Utc::now().timestamp(),
            })
            .await
            .map_err(|e| OAuthError::new("server_error", e.message))?;
        Some(minted.token)
    } else {
        None
    };

    Ok(Json(TokenResponse {
        access_token: access.token,
        token_type: "Bearer",
        expires_in: access.expires_in,
        refresh_token: Some(refresh.token),
        id_token,
        scope: grant.scopes.join(" "),
    }))
}

async fn client_credentials_grant(
    state: AppState,
    headers: HeaderMap,
    req: TokenRequest,
) -> Result<Json<TokenResponse>, OAuthError> {
    let client_id = req.client_id.clone().ok_or_else(|| OAuthError::new("invalid_request", "missing client_id"))?;
    let app = state
        .applications
        .get(&client_id)
        .await
        .map_err(|_| OAuthError::new("invalid_client", "unknown client"))?;

    if !state.config.security.skip_token_endpoint_auth {
        authenticate_client(&headers, &req, &app)?;
    }

    let scopes = parse_scopes(req.scope.as_deref());
    let access = state
        .token_builder
        .build_access_token(AccessTokenContext {
            app: &app,
            subject: &app.client_id,
            scopes: &scopes,
            grant_type: "client_credentials",
            user_attributes: &Map::new(),
            claims_request: &ClaimsRequest::default(),
            actor: None,
        })
        .await
        .map_err(|e| OAuthError::new("server_error", e.message))?;

    Ok(Json(TokenResponse {
        access_token: access.token,
        token_type: "Bearer",
        expires_in: access.expires_in,
        refresh_token: None,
        id_token: None,
        scope: scopes.join(" "),
    }))
}

async fn refresh_token_grant(
    state: AppState,
    headers: HeaderMap,
    req: TokenRequest,
) -> Result<Json<TokenResponse>, OAuthError> {
    let refresh_token = req
        .refresh_token
        .clone()
        .ok_or_else(|| OAuthError::new("invalid_request", "missing refresh_token"))?;

    let issuer = state.config.jwt.issuer.clone();
    let claims = verify_jwt(
        &refresh_token,
        &issuer,
        &issuer,
        KeySource::PublicKey(&state.decoding_key),
        &[Algorithm::RS256, Algorithm::ES256, Algorithm::EdDSA],
    )
    .await
    .map_err(|_| OAuthError::new("invalid_grant", "refresh token is invalid or expired"))?;

    let client_id = claims.get("sub").and_then(|v| v.as_str()).unwrap_or_default();
    let access_token_sub = claims.get("access_token_sub").and_then(|v| v.as_str()).unwrap_or_default();
    let scope = claims.get("scope").and_then(|v| v.as_str()).unwrap_or_default();
    let scopes = parse_scopes(Some(scope));

    let app = state
        .applications
        .get(client_id)
        .await
        .map_err(|_| OAuthError::new("invalid_grant", "application no longer exists"))?;

    if !state.config.security.skip_token_endpoint_auth {
        authenticate_client(&headers, &req, &app)?;
    }

    let attrs = claims
        .get("access_token_user_attributes")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let access = state
        .token_builder
        .build_access_token(AccessTokenContext {
            app: &app,
            subject: access_token_sub,
            scopes: &scopes,
            grant_type: "refresh_token",
            user_attributes: &attrs,
            claims_request: &ClaimsRequest::default(),
            actor: None,
        })
        .await
        .map_err(|e| OAuthError::new("server_error", e.message))?;

    Ok(Json(TokenResponse {
        access_token: access.token,
        token_type: "Bearer",
        expires_in: access.expires_in,
        refresh_token: Some(refresh_token),
        id_token: None,
        scope: scopes.join(" "),
    }))
}

/// `urn:ietf:params:oauth:grant-type:token-exchange` (RFC 8693): mints a
/// delegated access token carrying an `act` claim chaining back to the
/// original subject token's principal.
async fn token_exchange_grant(
    state: AppState,
    headers: HeaderMap,
    req: TokenRequest,
) -> Result<Json<TokenResponse>, OAuthError> {
    let subject_token = req
        .subject_token
        .clone()
        .ok_or_else(|| OAuthError::new("invalid_request", "missing subject_token"))?;
    if req.subject_token_type.as_deref() != Some("urn:ietf:params:oauth:token-type:access_token") {
        return Err(OAuthError::new("invalid_request", "unsupported subject_token_type"));
    }
    let client_id = req.client_id.clone().ok_or_else(|| OAuthError::new("invalid_request", "missing client_id"))?;
    let app = state
        .applications
        .get(&client_id)
        .await
        .map_err(|_| OAuthError::new("invalid_client", "unknown client"))?;

    if !state.config.security.skip_token_endpoint_auth {
        authenticate_client(&headers, &req, &app)?;
    }

    let issuer = state.config.jwt.issuer.clone();
    let subject_claims = verify_jwt(
        &subject_token,
        &app.client_id,
        &issuer,
        KeySource::PublicKey(&state.decoding_key),
        &[Algorithm::RS256, Algorithm::ES256, Algorithm::EdDSA],
    )
    .await
    .map_err(|_| OAuthError::new("invalid_grant", "subject_token is invalid or expired"))?;

    let subject = subject_claims.get("sub").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let scopes = parse_scopes(req.scope.as_deref());

    let access = state
        .token_builder
        .build_access_token(AccessTokenContext {
            app: &app,
            subject: &subject,
            scopes: &scopes,
            grant_type: TOKEN_EXCHANGE_GRANT,
            user_attributes: &Map::new(),
            claims_request: &ClaimsRequest::default(),
            actor: Some(ActorClaim { sub: app.client_id.clone(), iss: Some(issuer), act: None }),
        })
        .await
        .map_err(|e| OAuthError::new("server_error", e.message))?;

    Ok(Json(TokenResponse {
        access_token: access.token,
        token_type: "Bearer",
        expires_in: access.expires_in,
        refresh_token: None,
        id_token: None,
        scope: scopes.join(" "),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scopes_splits_on_whitespace() {
        assert_eq!(parse_scopes(Some("openid profile")), vec!["openid", "profile"]);
        assert_eq!(parse_scopes(None), Vec::<String>::new());
    }
}
