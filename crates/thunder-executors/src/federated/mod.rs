//! Federated OIDC/OAuth executors (§4.3): Google, generic OIDC, and GitHub.

mod executor;

pub use executor::{FederatedExecutor, FederatedKind};
