//! Passkey/WebAuthn relying-party executor (§4.3).

mod authdata;
mod cose;
mod executor;
mod types;
mod verify;

pub use cose::{parse_cose_key, CoseKey};
pub use executor::WebauthnExecutor;
pub use types::{ClientDataJson, CredentialStore, RelyingPartyConfig, StoredCredential};
