//! # thunder-server
//!
//! The HTTP façade (§4.8; component C8) that fronts the flow engine and
//! token builder, plus [`main`]'s binary entry point.
//!
//! ## Architecture
//!
//! - `config` - `ThunderConfig`, layered TOML + env (§6)
//! - `state` - `AppState`, the process-wide handles every route shares
//! - `collaborators` - in-memory stand-ins for the out-of-scope admin APIs
//! - `flow_defs` - loads flow graph definitions from `<thunder_home>/flows`
//! - `auth_code_store` - single-use authorization code store
//! - `error_response` - `ThunderError` -> HTTP status mapping (§7)
//! - `jwt_middleware` - bearer-token guard for protected routes
//! - `routes` - `/flow/*`, `/oauth2/token`, `/.well-known/*` handlers

pub mod auth_code_store;
pub mod collaborators;
pub mod config;
pub mod error_response;
pub mod flow_defs;
pub mod jwt_middleware;
pub mod routes;
pub mod state;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full `Router`: public discovery and token routes, and flow
/// routes gated behind the bearer-token guard (§6 "protected routes").
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/flow/authn", post(routes::flow::start_authn))
        .route("/flow/register", post(routes::flow::start_register))
        .route("/flow/execute", post(routes::flow::execute))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_middleware::require_bearer_token));

    let public = Router::new()
        .route("/flow/meta", get(routes::flow::meta))
        .route("/oauth2/token", post(routes::oauth2::token))
        .route("/.well-known/openid-configuration", get(routes::wellknown::openid_configuration))
        .route("/.well-known/jwks.json", get(routes::wellknown::jwks));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let priv_pem = include_str!("../../thunder-crypto/testdata/rsa_test_key.pem");
        let signing_key = Arc::new(thunder_crypto::SigningKey::from_pem(priv_pem, "test-rsa").unwrap());
        let pub_pem = include_str!("../../thunder-crypto/testdata/rsa_test_key.pub.pem");
        let decoding_key =
            Arc::new(jsonwebtoken::DecodingKey::from_rsa_pem(pub_pem.as_bytes()).unwrap());
        let jwks_document = Arc::new(serde_json::json!({"keys": []}));

        let executors = Arc::new(thunder_executor::ExecutorRegistry::new());
        let flow_engine = Arc::new(
            thunder_flow::FlowEngine::new(Vec::new(), executors, Arc::new(thunder_flow::InMemorySessionStore::new()))
                .unwrap(),
        );
        let token_builder = Arc::new(thunder_token::TokenBuilder::new(
            signing_key.clone(),
            thunder_token::GlobalTokenConfig {
                issuer: "https://issuer.example".to_string(),
                access_token_validity: 3600,
                id_token_validity: 3600,
                refresh_token_validity: 86_400,
            },
        ));

        AppState {
            flow_engine,
            token_builder,
            signing_key,
            decoding_key,
            jwks_document,
            applications: Arc::new(crate::collaborators::InMemoryApplications::new(Vec::new())),
            ous: Arc::new(crate::collaborators::InMemoryOus::new(Vec::new())),
            auth_codes: Arc::new(crate::auth_code_store::AuthCodeStore::new()),
            config: Arc::new(crate::config::ThunderConfig {
                jwt: crate::config::JwtConfig { issuer: "https://issuer.example".to_string(), validity_period: 3600 },
                oauth: crate::config::OauthConfig::default(),
                security: crate::config::SecurityConfig {
                    crypto_file: "/dev/null".to_string(),
                    skip_jwt_middleware: false,
                    skip_token_endpoint_auth: true,
                },
                webauthn: crate::config::WebauthnConfig {
                    rp_id: "example.com".to_string(),
                    rp_name: "Example".to_string(),
                    allowed_origins: Vec::new(),
                },
                immutable_resources: crate::config::ImmutableResourcesConfig::default(),
                server: crate::config::ServerBindConfig::default(),
                log: crate::config::LogConfig::default(),
            }),
        }
    }

    #[tokio::test]
    async fn protected_route_rejects_missing_bearer_token() {
        let router = build_router(test_state());
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/flow/authn")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"applicationId":"app-1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn discovery_document_is_public() {
        let router = build_router(test_state());
        let response = router
            .oneshot(Request::builder().uri("/.well-known/openid-configuration").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
