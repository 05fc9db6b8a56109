//! External collaborator interfaces (§6). These are deliberately out of
//! scope for this workspace (admin CRUD, user/app/IDP storage, notification
//! delivery) but the core depends on them at these seams; each is a trait so
//! the core can be exercised in tests with an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ThunderResult;
use crate::token::OAuthApp;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub user_type: String,
    pub organization_unit_id: Option<String>,
    /// Free-form JSON attribute bag (claims source, §4.7).
    pub attributes: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserGroup {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_user(&self, id: &str) -> ThunderResult<UserRecord>;
    async fn get_user_groups(&self, id: &str, limit: u32, offset: u32) -> ThunderResult<Vec<UserGroup>>;
    async fn find_by_attribute(&self, name: &str, value: &str) -> ThunderResult<Option<UserRecord>>;
    async fn create_user(&self, attributes: serde_json::Value) -> ThunderResult<UserRecord>;
}

#[async_trait]
pub trait ApplicationService: Send + Sync {
    async fn get(&self, application_id: &str) -> ThunderResult<OAuthApp>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Idp {
    pub id: String,
    pub name: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    pub issuer: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// `client_secret_basic` or `client_secret_post` (§4.3 Federated OIDC).
    #[serde(default)]
    pub token_endpoint_auth_method: String,
}

#[async_trait]
pub trait IdpService: Send + Sync {
    async fn get(&self, idp_id: &str) -> ThunderResult<Idp>;
}

#[async_trait]
pub trait NotificationSenderService: Send + Sync {
    async fn send(&self, sender_id: &str, payload: serde_json::Value) -> ThunderResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationUnit {
    pub handle: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub tos_uri: Option<String>,
    #[serde(default)]
    pub policy_uri: Option<String>,
    #[serde(default)]
    pub cookie_policy_uri: Option<String>,
}

#[async_trait]
pub trait OuService: Send + Sync {
    async fn get(&self, id: &str) -> ThunderResult<OrganizationUnit>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthnResult {
    pub user_id: String,
    pub user_type: String,
    #[serde(default)]
    pub organization_unit_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub available_attributes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthnFailureKind {
    UserNotFound,
    AuthenticationFailed,
    SystemError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnFailure {
    pub kind: AuthnFailureKind,
    pub message: String,
}

#[async_trait]
pub trait AuthnProvider: Send + Sync {
    async fn authenticate(
        &self,
        identifiers: BTreeMap<String, String>,
        credentials: BTreeMap<String, String>,
        metadata: BTreeMap<String, String>,
    ) -> Result<AuthnResult, AuthnFailure>;
}
