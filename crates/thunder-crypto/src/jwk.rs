//! JWK <-> public-key conversion with on-curve / length validation (§4.1).

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk};
use jsonwebtoken::{Algorithm, DecodingKey};
use thunder_model::{ThunderError, ThunderResult};

/// Expected coordinate byte lengths for the EC curves we support (§4.1).
fn expected_ec_coordinate_len(crv: &str) -> Option<usize> {
    match crv {
        "P-256" => Some(32),
        "P-384" => Some(48),
        "P-521" => Some(66),
        _ => None,
    }
}

/// Converts a JWK (as a `serde_json::Value` map, e.g. one entry of a JWKS
/// document) into a verification key.
///
/// Fails with `UNSUPPORTED_KEY` (`ErrorKind::UnsupportedKey`) when: `kty` is
/// not one of `RSA`/`EC`/`OKP`; the EC curve is not P-256/P-384/P-521; the
/// coordinate length does not match the curve; or the OKP curve is not
/// Ed25519 with a 32-byte public key.
pub fn jwk_to_public_key(jwk_json: &serde_json::Value) -> ThunderResult<DecodingKey> {
    let jwk: Jwk = serde_json::from_value(jwk_json.clone())
        .map_err(|e| ThunderError::unsupported_key(format!("malformed JWK: {e}")))?;

    validate_jwk_shape(&jwk)?;

    DecodingKey::from_jwk(&jwk)
        .map_err(|e| ThunderError::unsupported_key(format!("unsupported key material: {e}")))
}

fn validate_jwk_shape(jwk: &Jwk) -> ThunderResult<()> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => Ok(()),
        AlgorithmParameters::EllipticCurve(ec) => {
            let crv = format!("{:?}", ec.curve);
            let expected_len = expected_ec_coordinate_len(&crv)
                .ok_or_else(|| ThunderError::unsupported_key(format!("unsupported EC curve {crv}")))?;

            let x = decode_b64url(&ec.x)?;
            let y = decode_b64url(&ec.y)?;
            if x.len() != expected_len || y.len() != expected_len {
                return Err(ThunderError::unsupported_key(
                    "EC coordinate length mismatch for curve",
                ));
            }
            if !on_curve(&crv, &x, &y) {
                return Err(ThunderError::unsupported_key("EC point is not on curve"));
            }
            Ok(())
        }
        AlgorithmParameters::OctetKeyPair(okp) => {
            let crv = format!("{:?}", okp.curve);
            if crv != "Ed25519" {
                return Err(ThunderError::unsupported_key(format!(
                    "unsupported OKP curve {crv}"
                )));
            }
            let x = decode_b64url(&okp.x)?;
            if x.len() != 32 {
                return Err(ThunderError::unsupported_key(
                    "Ed25519 public key must be 32 bytes",
                ));
            }
            Ok(())
        }
        AlgorithmParameters::OctetKey(_) => {
            Err(ThunderError::unsupported_key("symmetric keys are not supported for verification"))
        }
    }
}

/// The reverse of [`jwk_to_public_key`]: builds the JWK this process
/// publishes at `/.well-known/jwks.json` from its own public key PEM
/// (§4.1 "algorithm advertised in JWKS").
pub fn public_jwk_from_pem(pem: &str, algorithm: Algorithm, key_id: &str) -> ThunderResult<serde_json::Value> {
    use base64::Engine;
    let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD;

    match algorithm {
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
            use rsa::pkcs8::DecodePublicKey;
            use rsa::traits::PublicKeyParts;
            let key = rsa::RsaPublicKey::from_public_key_pem(pem)
                .map_err(|e| ThunderError::unsupported_key(format!("invalid RSA public key: {e}")))?;
            Ok(serde_json::json!({
                "kty": "RSA",
                "use": "sig",
                "kid": key_id,
                "alg": alg_name(algorithm),
                "n": b64.encode(key.n().to_bytes_be()),
                "e": b64.encode(key.e().to_bytes_be()),
            }))
        }
        Algorithm::ES256 => {
            use p256::pkcs8::DecodePublicKey;
            let key = p256::PublicKey::from_public_key_pem(pem)
                .map_err(|e| ThunderError::unsupported_key(format!("invalid EC public key: {e}")))?;
            let point = key.to_encoded_point(false);
            Ok(serde_json::json!({
                "kty": "EC",
                "use": "sig",
                "kid": key_id,
                "alg": "ES256",
                "crv": "P-256",
                "x": b64.encode(point.x().ok_or_else(|| ThunderError::unsupported_key("missing x coordinate"))?),
                "y": b64.encode(point.y().ok_or_else(|| ThunderError::unsupported_key("missing y coordinate"))?),
            }))
        }
        Algorithm::ES384 => {
            use p384::pkcs8::DecodePublicKey;
            let key = p384::PublicKey::from_public_key_pem(pem)
                .map_err(|e| ThunderError::unsupported_key(format!("invalid EC public key: {e}")))?;
            let point = key.to_encoded_point(false);
            Ok(serde_json::json!({
                "kty": "EC",
                "use": "sig",
                "kid": key_id,
                "alg": "ES384",
                "crv": "P-384",
                "x": b64.encode(point.x().ok_or_else(|| ThunderError::unsupported_key("missing x coordinate"))?),
                "y": b64.encode(point.y().ok_or_else(|| ThunderError::unsupported_key("missing y coordinate"))?),
            }))
        }
        Algorithm::EdDSA => {
            use ed25519_dalek::pkcs8::DecodePublicKey;
            let key = ed25519_dalek::VerifyingKey::from_public_key_pem(pem)
                .map_err(|e| ThunderError::unsupported_key(format!("invalid Ed25519 public key: {e}")))?;
            Ok(serde_json::json!({
                "kty": "OKP",
                "use": "sig",
                "kid": key_id,
                "alg": "EdDSA",
                "crv": "Ed25519",
                "x": b64.encode(key.as_bytes()),
            }))
        }
        other => Err(ThunderError::unsupported_key(format!("unsupported signing algorithm {other:?}"))),
    }
}

fn alg_name(algorithm: Algorithm) -> &'static str {
    match algorithm {
        Algorithm::RS256 => "RS256",
        Algorithm::RS384 => "RS384",
        Algorithm::RS512 => "RS512",
        _ => "RS256",
    }
}

fn decode_b64url(s: &str) -> ThunderResult<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| ThunderError::unsupported_key(format!("invalid base64url in JWK: {e}")))
}

/// Validates that (x, y) lies on the named NIST curve via each curve's own
/// point-decoding, which rejects off-curve or malformed coordinates. §4.1
/// requires this check at conversion time so malformed JWKS entries fail
/// fast with `UNSUPPORTED_KEY` rather than a confusing verify failure later.
fn on_curve(crv: &str, x: &[u8], y: &[u8]) -> bool {
    let point = {
        let mut p = Vec::with_capacity(1 + x.len() + y.len());
        p.push(0x04);
        p.extend_from_slice(x);
        p.extend_from_slice(y);
        p
    };
    match crv {
        "P-256" => {
            let encoded = match p256::EncodedPoint::from_bytes(&point) {
                Ok(e) => e,
                Err(_) => return false,
            };
            bool::from(p256::PublicKey::from_encoded_point(&encoded).is_some())
        }
        "P-384" => {
            let encoded = match p384::EncodedPoint::from_bytes(&point) {
                Ok(e) => e,
                Err(_) => return false,
            };
            bool::from(p384::PublicKey::from_encoded_point(&encoded).is_some())
        }
        // P-521 has no maintained RustCrypto curve impl in this workspace's
        // dependency set; length validation above is the best available check.
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> serde_json::Value {
        serde_json::from_str(include_str!("../testdata/jwks_fixture.json")).unwrap()
    }

    #[test]
    fn public_jwk_from_pem_round_trips_through_jwk_to_public_key() {
        const PUB: &str = include_str!("../testdata/rsa_test_key.pub.pem");
        let jwk = public_jwk_from_pem(PUB, Algorithm::RS256, "test-rsa").unwrap();
        assert_eq!(jwk["kty"], "RSA");
        assert_eq!(jwk["kid"], "test-rsa");
        jwk_to_public_key(&jwk).unwrap();
    }

    #[test]
    fn accepts_valid_rsa_jwk() {
        let keys = fixture();
        let rsa = &keys["keys"][0];
        assert_eq!(rsa["kty"], "RSA");
        jwk_to_public_key(rsa).unwrap();
    }

    #[test]
    fn accepts_valid_ec_p256_jwk() {
        let keys = fixture();
        let ec = &keys["keys"][1];
        jwk_to_public_key(ec).unwrap();
    }

    #[test]
    fn accepts_valid_ed25519_jwk() {
        let keys = fixture();
        let okp = &keys["keys"][2];
        jwk_to_public_key(okp).unwrap();
    }

    #[test]
    fn rejects_ec_with_wrong_coordinate_length() {
        let mut ec = fixture()["keys"][1].clone();
        ec["x"] = serde_json::Value::String("AAAA".into());
        let err = jwk_to_public_key(&ec).unwrap_err();
        assert_eq!(err.kind, thunder_model::ErrorKind::UnsupportedKey);
    }

    #[test]
    fn rejects_unknown_kty() {
        let bad = serde_json::json!({"kty": "UNKNOWN"});
        assert!(jwk_to_public_key(&bad).is_err());
    }
}
