//! Relying-party configuration and credential storage seam for WebAuthn
//! (§4.3, §6 `webauthn.{rp_id, rp_name, allowed_origins[]}`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thunder_model::ThunderResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelyingPartyConfig {
    pub rp_id: String,
    pub rp_name: String,
    pub allowed_origins: Vec<String>,
}

/// A previously-registered credential: COSE public key bytes and the last
/// observed signature counter, keyed by credential id (§4.3 counter
/// monotonicity invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub credential_id: String,
    pub user_id: String,
    pub cose_public_key: Vec<u8>,
    pub counter: u32,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, credential_id: &str) -> ThunderResult<Option<StoredCredential>>;
    async fn get_by_user(&self, user_id: &str) -> ThunderResult<Vec<StoredCredential>>;
    async fn save(&self, credential: StoredCredential) -> ThunderResult<()>;
    async fn update_counter(&self, credential_id: &str, counter: u32) -> ThunderResult<()>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientDataJson {
    #[serde(rename = "type")]
    pub r#type: String,
    pub challenge: String,
    pub origin: String,
    #[serde(default)]
    pub cross_origin: Option<bool>,
}
