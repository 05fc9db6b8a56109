//! Concrete executors (§4.3) that plug into [`thunder_executor::ExecutorRegistry`].

mod auth_assert;
mod credentials;
pub mod federated;
mod http_request;
mod provisioning;
mod sms_otp;
mod user_type_resolver;
pub mod webauthn;

pub use auth_assert::AuthAssertExecutor;
pub use credentials::CredentialsExecutor;
pub use federated::{FederatedExecutor, FederatedKind};
pub use http_request::HttpRequestExecutor;
pub use provisioning::ProvisioningExecutor;
pub use sms_otp::SmsOtpExecutor;
pub use user_type_resolver::UserTypeResolverExecutor;
pub use webauthn::{CredentialStore, RelyingPartyConfig, StoredCredential, WebauthnExecutor};
