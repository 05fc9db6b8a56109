//! Authenticator data parsing (WebAuthn §6.1 layout, referenced by §4.3).

use thunder_model::{ThunderError, ThunderResult};

pub const FLAG_USER_PRESENT: u8 = 0x01;
pub const FLAG_ATTESTED_CREDENTIAL_DATA: u8 = 0x40;

pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub sign_count: u32,
    pub attested_credential: Option<AttestedCredentialData>,
}

pub struct AttestedCredentialData {
    pub credential_id: Vec<u8>,
    pub cose_public_key: Vec<u8>,
}

impl AuthenticatorData {
    pub fn user_present(&self) -> bool {
        self.flags & FLAG_USER_PRESENT != 0
    }
}

/// Parses the raw `authenticator_data` byte string (§4.3): 32-byte rpIdHash,
/// 1-byte flags, 4-byte big-endian signCount, and — when the
/// attested-credential-data flag is set — aaguid(16) + credIdLen(2) +
/// credId + a CBOR-encoded COSE public key.
pub fn parse_authenticator_data(bytes: &[u8]) -> ThunderResult<AuthenticatorData> {
    if bytes.len() < 37 {
        return Err(ThunderError::invalid_request("authenticator data too short"));
    }
    let mut rp_id_hash = [0u8; 32];
    rp_id_hash.copy_from_slice(&bytes[0..32]);
    let flags = bytes[32];
    let sign_count = u32::from_be_bytes([bytes[33], bytes[34], bytes[35], bytes[36]]);

    let attested_credential = if flags & FLAG_ATTESTED_CREDENTIAL_DATA != 0 {
        let mut offset = 37;
        if bytes.len() < offset + 16 + 2 {
            return Err(ThunderError::invalid_request("truncated attested credential data"));
        }
        offset += 16; // aaguid, unused
        let cred_id_len = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]) as usize;
        offset += 2;
        if bytes.len() < offset + cred_id_len {
            return Err(ThunderError::invalid_request("truncated credential id"));
        }
        let credential_id = bytes[offset..offset + cred_id_len].to_vec();
        offset += cred_id_len;
        let cose_public_key = bytes[offset..].to_vec();
        Some(AttestedCredentialData {
            credential_id,
            cose_public_key,
        })
    } else {
        None
    };

    Ok(AuthenticatorData {
        rp_id_hash,
        flags,
        sign_count,
        attested_credential,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_authenticator_data_without_attested_credential() {
        let mut bytes = vec![0u8; 37];
        bytes[32] = FLAG_USER_PRESENT;
        bytes[33..37].copy_from_slice(&1u32.to_be_bytes());
        let parsed = parse_authenticator_data(&bytes).unwrap();
        assert!(parsed.user_present());
        assert_eq!(parsed.sign_count, 1);
        assert!(parsed.attested_credential.is_none());
    }

    #[test]
    fn rejects_truncated_data() {
        assert!(parse_authenticator_data(&[0u8; 10]).is_err());
    }
}
