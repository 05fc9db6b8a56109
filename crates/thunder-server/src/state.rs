//! Shared, process-wide state the façade hands to every route (§9 "Global
//! state. The signing key, the executor registry, the app/IDP/sender
//! caches, and the session store are process-wide").

use std::sync::Arc;

use jsonwebtoken::DecodingKey;
use thunder_crypto::SigningKey;
use thunder_flow::FlowEngine;
use thunder_model::{ApplicationService, OuService};
use thunder_token::TokenBuilder;

use crate::auth_code_store::AuthCodeStore;
use crate::config::ThunderConfig;

#[derive(Clone)]
pub struct AppState {
    pub flow_engine: Arc<FlowEngine>,
    pub token_builder: Arc<TokenBuilder>,
    pub signing_key: Arc<SigningKey>,
    /// Public half of `signing_key`, used to verify refresh tokens and
    /// token-exchange subject tokens this process itself minted.
    pub decoding_key: Arc<DecodingKey>,
    /// Precomputed `/.well-known/jwks.json` body.
    pub jwks_document: Arc<serde_json::Value>,
    pub applications: Arc<dyn ApplicationService>,
    pub ous: Arc<dyn OuService>,
    pub auth_codes: Arc<AuthCodeStore>,
    pub config: Arc<ThunderConfig>,
}
