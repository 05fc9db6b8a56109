//! Compact JWE-shaped encryption for sensitive session context when a flow
//! session is persisted to an external store (§4.5 "stored encrypted at rest
//! using C1's JWE when persistence is external").
//!
//! Implements `A256GCM` content encryption with a process-wide symmetric key
//! (direct key agreement, `alg=dir`), which is sufficient for a single-issuer
//! at-rest encryption use case; a full multi-recipient JWE is out of scope.

use base64::Engine;
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use thunder_model::{ThunderError, ThunderResult};

const JWE_HEADER: &str = r#"{"alg":"dir","enc":"A256GCM"}"#;

pub struct SessionCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCipher").finish()
    }
}

impl SessionCipher {
    pub fn new(key_bytes: &[u8; 32]) -> ThunderResult<Self> {
        let unbound = UnboundKey::new(&AES_256_GCM, key_bytes)
            .map_err(|_| ThunderError::internal("invalid A256GCM key material"))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypts `plaintext` (typically the JSON-serialised sensitive subset
    /// of `FlowSession.context`) into a compact `header.iv.ciphertext.tag`
    /// string, base64url-unpadded per segment (JWE Compact Serialization
    /// shape, §4.1/§4.5).
    pub fn encrypt(&self, plaintext: &[u8]) -> ThunderResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| ThunderError::internal("RNG failure generating IV"))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.to_vec();
        let aad = Aad::from(JWE_HEADER.as_bytes());
        let tag = self
            .key
            .seal_in_place_separate_tag(nonce, aad, &mut in_out)
            .map_err(|_| ThunderError::internal("encryption failed"))?;

        let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        Ok(format!(
            "{}.{}.{}.{}",
            b64.encode(JWE_HEADER),
            b64.encode(nonce_bytes),
            b64.encode(&in_out),
            b64.encode(tag.as_ref()),
        ))
    }

    pub fn decrypt(&self, compact: &str) -> ThunderResult<Vec<u8>> {
        let parts: Vec<&str> = compact.split('.').collect();
        let [_header, iv, ciphertext, tag] = parts[..] else {
            return Err(ThunderError::internal("malformed JWE compact value"));
        };

        let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let iv = b64
            .decode(iv)
            .map_err(|_| ThunderError::internal("malformed JWE iv"))?;
        let mut body = b64
            .decode(ciphertext)
            .map_err(|_| ThunderError::internal("malformed JWE ciphertext"))?;
        let tag = b64
            .decode(tag)
            .map_err(|_| ThunderError::internal("malformed JWE tag"))?;
        body.extend_from_slice(&tag);

        let nonce_bytes: [u8; NONCE_LEN] = iv
            .try_into()
            .map_err(|_| ThunderError::internal("malformed JWE iv length"))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);
        let aad = Aad::from(JWE_HEADER.as_bytes());

        let plaintext = self
            .key
            .open_in_place(nonce, aad, &mut body)
            .map_err(|_| ThunderError::internal("decryption failed or data tampered"))?;
        Ok(plaintext.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let cipher = SessionCipher::new(&[7u8; 32]).unwrap();
        let compact = cipher.encrypt(b"{\"password\":\"p1\"}").unwrap();
        let plaintext = cipher.decrypt(&compact).unwrap();
        assert_eq!(plaintext, b"{\"password\":\"p1\"}");
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let cipher = SessionCipher::new(&[7u8; 32]).unwrap();
        let mut compact = cipher.encrypt(b"secret").unwrap();
        compact.push('A');
        assert!(cipher.decrypt(&compact).is_err());
    }
}
