//! Compact-JWS sign/verify (§4.1).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use thunder_model::{ThunderError, ThunderResult};
use uuid::Uuid;

use crate::keys::SigningKey;

/// Clock-skew tolerance applied on `exp` (§4.1).
pub const CLOCK_SKEW_SECONDS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredClaims {
    pub sub: String,
    pub aud: JsonValue,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    pub jti: String,
}

/// Where a verifier sources the public key material from.
pub enum KeySource<'a> {
    /// A single, already-resolved public key (e.g. our own signing key's
    /// public half, or a per-app configured key).
    PublicKey(&'a DecodingKey),
    /// Resolve by `kid` against a cached JWKS document (federated IDPs).
    Jwks(&'a crate::jwks::JwksClient),
}

/// Signs `claims` merged with registered claims and returns the compact
/// token together with `iat` (§4.1 `GenerateJWT`).
pub async fn generate_jwt(
    signing_key: &SigningKey,
    sub: &str,
    aud: JsonValue,
    iss: &str,
    validity_seconds: i64,
    mut claims: Map<String, JsonValue>,
) -> ThunderResult<(String, i64)> {
    let now = chrono::Utc::now().timestamp();
    let registered = RegisteredClaims {
        sub: sub.to_string(),
        aud,
        iss: iss.to_string(),
        iat: now,
        exp: now + validity_seconds,
        nbf: None,
        jti: Uuid::new_v4().to_string(),
    };
    let mut payload = serde_json::to_value(&registered)
        .map_err(|e| ThunderError::internal(format!("claim serialization failed: {e}")))?
        .as_object()
        .cloned()
        .unwrap_or_default();
    payload.append(&mut claims);

    let mut header = Header::new(signing_key.algorithm);
    header.kid = Some(signing_key.key_id.clone());

    let token = encode(&header, &payload, signing_key.encoding_key())
        .map_err(|e| ThunderError::internal(format!("JWT signing failed: {e}")))?;
    Ok((token, now))
}

/// Verifies a compact JWS against the expected audience/issuer (§4.1
/// `VerifyJWT`). `aud` may be a single string or an array per RFC 7519;
/// membership is checked either way.
pub async fn verify_jwt(
    token: &str,
    expected_aud: &str,
    expected_iss: &str,
    key_source: KeySource<'_>,
    allowed_algorithms: &[Algorithm],
) -> ThunderResult<Map<String, JsonValue>> {
    let header = jsonwebtoken::decode_header(token)
        .map_err(|_| ThunderError::invalid_token("malformed token header"))?;

    if !allowed_algorithms.contains(&header.alg) {
        return Err(ThunderError::invalid_token("unsupported signing algorithm"));
    }

    let decoding_key = match key_source {
        KeySource::PublicKey(key) => key.clone(),
        KeySource::Jwks(jwks) => {
            let kid = header
                .kid
                .as_deref()
                .ok_or_else(|| ThunderError::invalid_token("token is missing kid"))?;
            jwks.resolve(kid).await?
        }
    };

    let mut validation = Validation::new(header.alg);
    validation.set_audience(&[expected_aud]);
    validation.set_issuer(&[expected_iss]);
    validation.leeway = CLOCK_SKEW_SECONDS;

    let data = decode::<Map<String, JsonValue>>(token, &decoding_key, &validation)
        .map_err(|_| ThunderError::invalid_token("signature, expiry, issuer, or audience check failed"))?;

    verify_audience_membership(&data.claims, expected_aud)?;
    Ok(data.claims)
}

fn verify_audience_membership(
    claims: &Map<String, JsonValue>,
    expected_aud: &str,
) -> ThunderResult<()> {
    let Some(aud) = claims.get("aud") else {
        return Err(ThunderError::invalid_token("token is missing aud"));
    };
    let ok = match aud {
        JsonValue::String(s) => s == expected_aud,
        JsonValue::Array(items) => {
            let set: HashSet<&str> = items.iter().filter_map(|v| v.as_str()).collect();
            set.contains(expected_aud)
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ThunderError::invalid_token("audience mismatch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::EncodingKey;

    fn rsa_key_pair() -> (SigningKey, DecodingKey) {
        // Deterministic small test RSA key pair (2048-bit, PKCS#1 PEM) — not
        // used anywhere near real key material; stable fixture only.
        const PRIV: &str = include_str!("../testdata/rsa_test_key.pem");
        const PUB: &str = include_str!("../testdata/rsa_test_key.pub.pem");
        let signing = SigningKey {
            algorithm: Algorithm::RS256,
            key_id: "test-rsa".into(),
            encoding_key: EncodingKey::from_rsa_pem(PRIV.as_bytes()).unwrap(),
        };
        let decoding = DecodingKey::from_rsa_pem(PUB.as_bytes()).unwrap();
        (signing, decoding)
    }

    #[tokio::test]
    async fn round_trips_sign_then_verify() {
        let (signing, decoding) = rsa_key_pair();
        let (token, iat) = generate_jwt(
            &signing,
            "U",
            JsonValue::String("app-1".into()),
            "https://issuer.example",
            300,
            Map::new(),
        )
        .await
        .unwrap();
        assert!(iat > 0);

        let claims = verify_jwt(
            &token,
            "app-1",
            "https://issuer.example",
            KeySource::PublicKey(&decoding),
            &[Algorithm::RS256],
        )
        .await
        .unwrap();
        assert_eq!(claims.get("sub").unwrap(), "U");
    }

    #[tokio::test]
    async fn rejects_audience_mismatch() {
        let (signing, decoding) = rsa_key_pair();
        let (token, _) = generate_jwt(
            &signing,
            "U",
            JsonValue::String("app-1".into()),
            "https://issuer.example",
            300,
            Map::new(),
        )
        .await
        .unwrap();

        let result = verify_jwt(
            &token,
            "app-2",
            "https://issuer.example",
            KeySource::PublicKey(&decoding),
            &[Algorithm::RS256],
        )
        .await;
        assert!(result.is_err());
    }
}
