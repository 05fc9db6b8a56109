//! Process-wide signing key, loaded once at init from `security.crypto_file`
//! (§6 Configuration) and never mutated afterward (§5 "Shared resources").

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use std::fmt;
use std::path::Path;
use thunder_model::{ThunderError, ThunderResult};

/// A loaded PEM signing key together with the JWS `alg` it signs with.
///
/// `alg` is inferred from the PEM's key type, matching §4.1: "alg is
/// determined by the server signing key".
pub struct SigningKey {
    pub algorithm: Algorithm,
    pub key_id: String,
    encoding_key: EncodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .field("encoding_key", &"<redacted>")
            .finish()
    }
}

impl SigningKey {
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// Loads a PEM-encoded private key from disk. Supports RSA (PKCS#1/PKCS#8),
    /// EC (SEC1/PKCS#8), and Ed25519 (PKCS#8) keys; the algorithm family is
    /// inferred from the PEM header, and the key size selects RS256 vs
    /// RS384/RS512 callers may override via `with_algorithm`.
    pub fn load_from_pem_file(path: &Path, key_id: impl Into<String>) -> ThunderResult<Self> {
        let pem = std::fs::read_to_string(path).map_err(|e| {
            ThunderError::internal(format!("failed to read signing key file: {e}"))
        })?;
        Self::from_pem(&pem, key_id)
    }

    pub fn from_pem(pem: &str, key_id: impl Into<String>) -> ThunderResult<Self> {
        let key_id = key_id.into();
        let header = pem
            .lines()
            .find(|l| l.starts_with("-----BEGIN"))
            .unwrap_or_default();

        let (algorithm, encoding_key) = if header.contains("EC PRIVATE KEY")
            || header.contains("EC ")
        {
            (
                Algorithm::ES256,
                EncodingKey::from_ec_pem(pem.as_bytes()).map_err(|e| {
                    ThunderError::internal(format!("invalid EC private key: {e}"))
                })?,
            )
        } else if header.contains("PRIVATE KEY") && pem.contains("BEGIN PRIVATE KEY") {
            // PKCS#8: could be RSA, EC, or Ed25519. Try in order of likelihood.
            if let Ok(k) = EncodingKey::from_ed_pem(pem.as_bytes()) {
                (Algorithm::EdDSA, k)
            } else if let Ok(k) = EncodingKey::from_ec_pem(pem.as_bytes()) {
                (Algorithm::ES256, k)
            } else {
                (
                    Algorithm::RS256,
                    EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
                        ThunderError::internal(format!("invalid PKCS#8 private key: {e}"))
                    })?,
                )
            }
        } else {
            (
                Algorithm::RS256,
                EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
                    ThunderError::internal(format!("invalid RSA private key: {e}"))
                })?,
            )
        };

        Ok(Self {
            algorithm,
            key_id,
            encoding_key,
        })
    }

    /// Override the inferred algorithm, e.g. to select RS512 over RS256 for
    /// an RSA key, or ES384/ES512 for a larger EC curve.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

/// Loads the public half of a signing key from its own PEM (SubjectPublicKeyInfo
/// or PKCS#1, depending on family), used by the token endpoint to verify
/// tokens this process itself minted (refresh tokens, token-exchange subject
/// tokens) without a round trip through JWKS.
pub fn load_public_decoding_key(pem_path: &Path, algorithm: Algorithm) -> ThunderResult<DecodingKey> {
    let pem = std::fs::read_to_string(pem_path)
        .map_err(|e| ThunderError::internal(format!("failed to read public key file: {e}")))?;
    decoding_key_from_pem(&pem, algorithm)
}

fn decoding_key_from_pem(pem: &str, algorithm: Algorithm) -> ThunderResult<DecodingKey> {
    match algorithm {
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 | Algorithm::PS256 | Algorithm::PS384 | Algorithm::PS512 => {
            DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| ThunderError::internal(format!("invalid RSA public key: {e}")))
        }
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem.as_bytes())
            .map_err(|e| ThunderError::internal(format!("invalid EC public key: {e}"))),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem.as_bytes())
            .map_err(|e| ThunderError::internal(format!("invalid Ed25519 public key: {e}"))),
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Err(ThunderError::unsupported_key("HMAC algorithms are not supported for the process signing key"))
        }
    }
}
