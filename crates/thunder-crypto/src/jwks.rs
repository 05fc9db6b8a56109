//! Cached JWKS fetch/resolve, used by `KeySource::Jwks` (§4.1) and the
//! federated OIDC executors (§4.3) to validate ID tokens issued by IDPs.

use jsonwebtoken::DecodingKey;
use moka::future::Cache;
use std::time::Duration;
use thunder_model::{ThunderError, ThunderResult};

use crate::jwk::jwk_to_public_key;

/// JWKS documents are cached per URL for this long before a background
/// refetch; stale entries are still served while the refetch is in flight.
const JWKS_CACHE_TTL: Duration = Duration::from_secs(600);

pub struct JwksClient {
    http: reqwest::Client,
    jwks_url: String,
    cache: Cache<String, DecodingKey>,
}

impl std::fmt::Debug for JwksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksClient")
            .field("jwks_url", &self.jwks_url)
            .finish()
    }
}

impl JwksClient {
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            jwks_url: jwks_url.into(),
            cache: Cache::builder().time_to_live(JWKS_CACHE_TTL).build(),
        }
    }

    /// Resolve a `kid` to a verification key, fetching and caching the full
    /// JWKS document on a cache miss.
    pub async fn resolve(&self, kid: &str) -> ThunderResult<DecodingKey> {
        if let Some(key) = self.cache.get(kid).await {
            return Ok(key);
        }

        let doc = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| ThunderError::external_request_failed(format!("JWKS fetch failed: {e}")))?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ThunderError::external_request_failed(format!("JWKS body invalid: {e}")))?;

        let keys = doc
            .get("keys")
            .and_then(|k| k.as_array())
            .ok_or_else(|| ThunderError::external_request_failed("JWKS document has no keys array"))?;

        let mut resolved = None;
        for entry in keys {
            let entry_kid = entry.get("kid").and_then(|k| k.as_str());
            let key = jwk_to_public_key(entry)?;
            if let Some(entry_kid) = entry_kid {
                self.cache.insert(entry_kid.to_string(), key.clone()).await;
                if entry_kid == kid {
                    resolved = Some(key);
                }
            }
        }

        resolved.ok_or_else(|| ThunderError::invalid_token(format!("no JWKS entry for kid {kid}")))
    }
}
