//! Bearer-token guard applied to the flow routes (§6 "JWT middleware").
//! The bearer token here is the *integrating application's* own access
//! token, typically minted for it via `client_credentials` — not an
//! end-user credential, since the whole point of the flow routes is to
//! collect end-user credentials before any of those exist. Skippable via
//! `security.skip_jwt_middleware` for local development. Adapted from the
//! authentication middleware this façade's router borrows its
//! `from_fn_with_state` wiring pattern from.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::Algorithm;
use thunder_crypto::{verify_jwt, KeySource};

use crate::state::AppState;

pub async fn require_bearer_token(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if state.config.security.skip_jwt_middleware {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let issuer = state.config.jwt.issuer.clone();
    verify_jwt(
        token,
        &issuer,
        &issuer,
        KeySource::PublicKey(&state.decoding_key),
        &[Algorithm::RS256, Algorithm::ES256, Algorithm::ES384, Algorithm::EdDSA],
    )
    .await
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(next.run(request).await)
}
