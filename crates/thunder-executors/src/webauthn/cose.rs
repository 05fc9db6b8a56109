//! COSE key parsing (CBOR-encoded public keys carried in WebAuthn
//! attestation/registration data, GLOSSARY "COSE key").

use ciborium::Value as Cbor;
use thunder_model::{ThunderError, ThunderResult};

#[derive(Debug, Clone)]
pub enum CoseKey {
    Ec2 { curve: i64, x: Vec<u8>, y: Vec<u8> },
    Okp { curve: i64, x: Vec<u8> },
    Rsa { n: Vec<u8>, e: Vec<u8> },
}

const COSE_KTY_EC2: i128 = 2;
const COSE_KTY_OKP: i128 = 1;
const COSE_KTY_RSA: i128 = 3;

/// Parses a CBOR-encoded COSE_Key map into a [`CoseKey`].
pub fn parse_cose_key(bytes: &[u8]) -> ThunderResult<CoseKey> {
    let value: Cbor = ciborium::de::from_reader(bytes)
        .map_err(|e| ThunderError::unsupported_key(format!("malformed COSE key CBOR: {e}")))?;

    let Cbor::Map(entries) = value else {
        return Err(ThunderError::unsupported_key("COSE key is not a CBOR map"));
    };

    let get_int = |label: i128| -> Option<&Cbor> {
        entries.iter().find_map(|(k, v)| match k {
            Cbor::Integer(i) if i128::from(*i) == label => Some(v),
            _ => None,
        })
    };

    let kty = get_int(1)
        .and_then(|v| v.as_integer())
        .map(i128::from)
        .ok_or_else(|| ThunderError::unsupported_key("COSE key missing kty"))?;

    match kty {
        COSE_KTY_EC2 => {
            let curve = get_int(-1)
                .and_then(|v| v.as_integer())
                .map(i128::from)
                .ok_or_else(|| ThunderError::unsupported_key("COSE EC2 key missing crv"))?;
            let x = get_int(-2)
                .and_then(|v| v.as_bytes())
                .ok_or_else(|| ThunderError::unsupported_key("COSE EC2 key missing x"))?
                .clone();
            let y = get_int(-3)
                .and_then(|v| v.as_bytes())
                .ok_or_else(|| ThunderError::unsupported_key("COSE EC2 key missing y"))?
                .clone();
            Ok(CoseKey::Ec2 {
                curve: curve as i64,
                x,
                y,
            })
        }
        COSE_KTY_OKP => {
            let curve = get_int(-1)
                .and_then(|v| v.as_integer())
                .map(i128::from)
                .ok_or_else(|| ThunderError::unsupported_key("COSE OKP key missing crv"))?;
            let x = get_int(-2)
                .and_then(|v| v.as_bytes())
                .ok_or_else(|| ThunderError::unsupported_key("COSE OKP key missing x"))?
                .clone();
            Ok(CoseKey::Okp {
                curve: curve as i64,
                x,
            })
        }
        COSE_KTY_RSA => {
            let n = get_int(-1)
                .and_then(|v| v.as_bytes())
                .ok_or_else(|| ThunderError::unsupported_key("COSE RSA key missing n"))?
                .clone();
            let e = get_int(-2)
                .and_then(|v| v.as_bytes())
                .ok_or_else(|| ThunderError::unsupported_key("COSE RSA key missing e"))?
                .clone();
            Ok(CoseKey::Rsa { n, e })
        }
        other => Err(ThunderError::unsupported_key(format!("unsupported COSE kty {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_map(pairs: Vec<(Cbor, Cbor)>) -> Vec<u8> {
        let value = Cbor::Map(pairs);
        let mut out = Vec::new();
        ciborium::ser::into_writer(&value, &mut out).unwrap();
        out
    }

    #[test]
    fn parses_ec2_p256_key() {
        let bytes = encode_map(vec![
            (Cbor::Integer(1.into()), Cbor::Integer(2.into())), // kty: EC2
            (Cbor::Integer(3.into()), Cbor::Integer((-7).into())), // alg: ES256
            (Cbor::Integer((-1).into()), Cbor::Integer(1.into())), // crv: P-256
            (Cbor::Integer((-2).into()), Cbor::Bytes(vec![1u8; 32])),
            (Cbor::Integer((-3).into()), Cbor::Bytes(vec![2u8; 32])),
        ]);
        let key = parse_cose_key(&bytes).unwrap();
        match key {
            CoseKey::Ec2 { curve, x, y } => {
                assert_eq!(curve, 1);
                assert_eq!(x, vec![1u8; 32]);
                assert_eq!(y, vec![2u8; 32]);
            }
            _ => panic!("expected EC2"),
        }
    }

    #[test]
    fn rejects_unsupported_kty() {
        let bytes = encode_map(vec![(Cbor::Integer(1.into()), Cbor::Integer(4.into()))]);
        assert!(parse_cose_key(&bytes).is_err());
    }
}
