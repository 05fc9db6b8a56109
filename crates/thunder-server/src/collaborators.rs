//! In-memory implementations of the external collaborator traits (§6: user,
//! application, IDP, notification, and organization-unit storage are
//! deliberately out of scope). This binary seeds them once from a JSON
//! fixture under `-thunderHome` (`collaborators.json`) so the façade is
//! runnable standalone; a deployment backed by a real directory/database
//! swaps these structs for its own trait implementations without touching
//! the rest of the workspace.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thunder_executors::{CredentialStore, StoredCredential};
use thunder_model::{
    ApplicationService, AuthnFailure, AuthnFailureKind, AuthnProvider, AuthnResult, Idp, IdpService,
    NotificationSenderService, OAuthApp, OrganizationUnit, OuService, ThunderError, ThunderResult, UserGroup,
    UserRecord, UserService,
};

#[derive(Debug, Default, Deserialize)]
pub struct CollaboratorSeed {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub applications: Vec<OAuthApp>,
    #[serde(default)]
    pub idps: Vec<Idp>,
    #[serde(default)]
    pub organization_units: Vec<OrganizationUnit>,
}

impl CollaboratorSeed {
    pub fn load(thunder_home: &Path) -> ThunderResult<Self> {
        let path = thunder_home.join("collaborators.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ThunderError::internal(format!("failed to read collaborator seed: {e}")))?;
        serde_json::from_str(&raw).map_err(|e| ThunderError::internal(format!("invalid collaborator seed: {e}")))
    }
}

pub struct InMemoryUsers {
    by_id: DashMap<String, UserRecord>,
}

impl InMemoryUsers {
    pub fn new(seed: Vec<UserRecord>) -> Self {
        Self { by_id: seed.into_iter().map(|u| (u.id.clone(), u)).collect() }
    }
}

#[async_trait]
impl UserService for InMemoryUsers {
    async fn get_user(&self, id: &str) -> ThunderResult<UserRecord> {
        self.by_id.get(id).map(|r| r.clone()).ok_or_else(|| ThunderError::user_not_found(format!("no user {id}")))
    }

    async fn get_user_groups(&self, _id: &str, _limit: u32, _offset: u32) -> ThunderResult<Vec<UserGroup>> {
        Ok(Vec::new())
    }

    async fn find_by_attribute(&self, name: &str, value: &str) -> ThunderResult<Option<UserRecord>> {
        Ok(self
            .by_id
            .iter()
            .find(|entry| entry.value().attributes.get(name).and_then(|v| v.as_str()) == Some(value))
            .map(|entry| entry.value().clone()))
    }

    async fn create_user(&self, attributes: serde_json::Value) -> ThunderResult<UserRecord> {
        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_type: "person".to_string(),
            organization_unit_id: None,
            attributes,
        };
        self.by_id.insert(record.id.clone(), record.clone());
        Ok(record)
    }
}

pub struct InMemoryApplications {
    by_id: DashMap<String, OAuthApp>,
}

impl InMemoryApplications {
    pub fn new(seed: Vec<OAuthApp>) -> Self {
        Self { by_id: seed.into_iter().map(|a| (a.client_id.clone(), a)).collect() }
    }
}

#[async_trait]
impl ApplicationService for InMemoryApplications {
    async fn get(&self, application_id: &str) -> ThunderResult<OAuthApp> {
        self.by_id
            .get(application_id)
            .map(|r| r.clone())
            .ok_or_else(|| ThunderError::resource_not_found(format!("no application {application_id}")))
    }
}

pub struct InMemoryIdps {
    by_id: DashMap<String, Idp>,
}

impl InMemoryIdps {
    pub fn new(seed: Vec<Idp>) -> Self {
        Self { by_id: seed.into_iter().map(|i| (i.id.clone(), i)).collect() }
    }
}

#[async_trait]
impl IdpService for InMemoryIdps {
    async fn get(&self, idp_id: &str) -> ThunderResult<Idp> {
        self.by_id.get(idp_id).map(|r| r.clone()).ok_or_else(|| ThunderError::resource_not_found(format!("no idp {idp_id}")))
    }
}

pub struct InMemoryOus {
    by_handle: DashMap<String, OrganizationUnit>,
}

impl InMemoryOus {
    pub fn new(seed: Vec<OrganizationUnit>) -> Self {
        Self { by_handle: seed.into_iter().map(|o| (o.handle.clone(), o)).collect() }
    }
}

#[async_trait]
impl OuService for InMemoryOus {
    async fn get(&self, id: &str) -> ThunderResult<OrganizationUnit> {
        self.by_handle
            .get(id)
            .map(|r| r.clone())
            .ok_or_else(|| ThunderError::resource_not_found(format!("no organization unit {id}")))
    }
}

/// Logs notifications instead of delivering them; a real deployment swaps
/// this for an SMS/email gateway client.
pub struct LoggingNotificationSender;

#[async_trait]
impl NotificationSenderService for LoggingNotificationSender {
    async fn send(&self, sender_id: &str, payload: serde_json::Value) -> ThunderResult<()> {
        tracing::info!(sender_id, %payload, "notification suppressed: no sender backend configured");
        Ok(())
    }
}

/// Authenticates against the seeded user attribute bag by exact match on
/// every supplied identifier/credential pair, e.g. `{"username": "..."}` /
/// `{"password": "..."}` compared against the user's `attributes` object.
pub struct AttributeMatchAuthnProvider {
    users: std::sync::Arc<InMemoryUsers>,
}

impl AttributeMatchAuthnProvider {
    pub fn new(users: std::sync::Arc<InMemoryUsers>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl AuthnProvider for AttributeMatchAuthnProvider {
    async fn authenticate(
        &self,
        identifiers: BTreeMap<String, String>,
        credentials: BTreeMap<String, String>,
        _metadata: BTreeMap<String, String>,
    ) -> Result<AuthnResult, AuthnFailure> {
        for user in self.users.by_id.iter() {
            let attrs = user.value().attributes.as_object().cloned().unwrap_or_default();
            let identifiers_match = identifiers
                .iter()
                .all(|(k, v)| attrs.get(k).and_then(|a| a.as_str()) == Some(v.as_str()));
            let credentials_match = credentials
                .iter()
                .all(|(k, v)| attrs.get(k).and_then(|a| a.as_str()) == Some(v.as_str()));
            if identifiers_match && credentials_match {
                return Ok(AuthnResult {
                    user_id: user.value().id.clone(),
                    user_type: user.value().user_type.clone(),
                    organization_unit_id: user.value().organization_unit_id.clone(),
                    token: None,
                    available_attributes: attrs.keys().cloned().collect(),
                });
            }
        }
        Err(AuthnFailure { kind: AuthnFailureKind::UserNotFound, message: "no matching user".to_string() })
    }
}

/// `CredentialStore` for the WebAuthn executor, keyed by credential id.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    by_id: DashMap<String, StoredCredential>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, credential_id: &str) -> ThunderResult<Option<StoredCredential>> {
        Ok(self.by_id.get(credential_id).map(|r| r.clone()))
    }

    async fn get_by_user(&self, user_id: &str) -> ThunderResult<Vec<StoredCredential>> {
        Ok(self.by_id.iter().filter(|e| e.value().user_id == user_id).map(|e| e.value().clone()).collect())
    }

    async fn save(&self, credential: StoredCredential) -> ThunderResult<()> {
        self.by_id.insert(credential.credential_id.clone(), credential);
        Ok(())
    }

    async fn update_counter(&self, credential_id: &str, counter: u32) -> ThunderResult<()> {
        if let Some(mut entry) = self.by_id.get_mut(credential_id) {
            entry.counter = counter;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, username: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            user_type: "person".to_string(),
            organization_unit_id: None,
            attributes: serde_json::json!({"username": username, "password": "correct horse"}),
        }
    }

    #[tokio::test]
    async fn user_service_finds_by_attribute() {
        let users = InMemoryUsers::new(vec![user("u-1", "alice")]);
        let found = users.find_by_attribute("username", "alice").await.unwrap();
        assert_eq!(found.unwrap().id, "u-1");
        assert!(users.find_by_attribute("username", "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn authn_provider_matches_identifier_and_credential() {
        let users = std::sync::Arc::new(InMemoryUsers::new(vec![user("u-1", "alice")]));
        let provider = AttributeMatchAuthnProvider::new(users);

        let mut identifiers = BTreeMap::new();
        identifiers.insert("username".to_string(), "alice".to_string());
        let mut credentials = BTreeMap::new();
        credentials.insert("password".to_string(), "correct horse".to_string());

        let result = provider.authenticate(identifiers.clone(), credentials, BTreeMap::new()).await.unwrap();
        assert_eq!(result.user_id, "u-1");

        let mut wrong_credentials = BTreeMap::new();
        wrong_credentials.insert("password".to_string(), "wrong".to_string());
        assert!(provider.authenticate(identifiers, wrong_credentials, BTreeMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn credential_store_round_trips_counter_updates() {
        let store = InMemoryCredentialStore::new();
        store
            .save(StoredCredential {
                credential_id: "cred-1".to_string(),
                user_id: "u-1".to_string(),
                cose_public_key: vec![1, 2, 3],
                counter: 0,
            })
            .await
            .unwrap();
        store.update_counter("cred-1", 5).await.unwrap();
        assert_eq!(store.get("cred-1").await.unwrap().unwrap().counter, 5);
    }
}
