//! # thunder-crypto
//!
//! JOSE primitives backing the Thunder identity platform's token service and
//! session store.
//!
//! ## Architecture
//!
//! - `keys` - process-wide signing key, loaded once from PEM at init
//! - `jws` - compact JWS `GenerateJWT`/`VerifyJWT`
//! - `jwk` - `JWKToPublicKey` with on-curve/length validation
//! - `jwks` - cached JWKS client for federated IDP key resolution
//! - `jwe` - at-rest encryption for sensitive session context

pub mod jwe;
pub mod jwk;
pub mod jwks;
pub mod jws;
pub mod keys;

pub use jwe::SessionCipher;
pub use jwk::{jwk_to_public_key, public_jwk_from_pem};
pub use jwks::JwksClient;
pub use jws::{generate_jwt, verify_jwt, KeySource, RegisteredClaims, CLOCK_SKEW_SECONDS};
pub use keys::{load_public_decoding_key, SigningKey};
