//! `GET /.well-known/openid-configuration` and `GET /.well-known/jwks.json`
//! (§4.8, §6 "Discovery documents"). Both are derived entirely from
//! process-wide state computed once at startup; neither touches a
//! collaborator.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OidcConfiguration {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    pub response_types_supported: Vec<&'static str>,
    pub grant_types_supported: Vec<&'static str>,
    pub subject_types_supported: Vec<&'static str>,
    pub id_token_signing_alg_values_supported: Vec<&'static str>,
    pub scopes_supported: Vec<&'static str>,
    pub token_endpoint_auth_methods_supported: Vec<&'static str>,
    pub claims_supported: Vec<&'static str>,
}

pub async fn openid_configuration(State(state): State<AppState>) -> Json<OidcConfiguration> {
    let issuer = state.config.jwt.issuer.clone();
    Json(OidcConfiguration {
        authorization_endpoint: format!("{issuer}/flow/authn"),
        token_endpoint: format!("{issuer}/oauth2/token"),
        jwks_uri: format!("{issuer}/.well-known/jwks.json"),
        issuer,
        response_types_supported: vec!["code"],
        grant_types_supported: vec![
            "authorization_code",
            "client_credentials",
            "refresh_token",
            "urn:ietf:params:oauth:grant-type:token-exchange",
        ],
        subject_types_supported: vec!["public"],
        id_token_signing_alg_values_supported: vec!["RS256", "ES256", "ES384", "EdDSA"],
        scopes_supported: vec!["openid", "profile", "email", "phone", "address"],
        token_endpoint_auth_methods_supported: vec!["client_secret_basic", "client_secret_post", "none"],
        claims_supported: vec!["sub", "iss", "aud", "exp", "iat", "name", "email", "phone_number", "address"],
    })
}

pub async fn jwks(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json((*state.jwks_document).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwks_document_wraps_keys_array() {
        let doc = serde_json::json!({"keys": [{"kty": "RSA"}]});
        assert!(doc["keys"].is_array());
    }
}
