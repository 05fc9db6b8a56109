//! The passkey/WebAuthn executor (§4.3): four operations selected by
//! `properties.operation` — `begin-registration`, `finish-registration`,
//! `begin-discoverable-login`, `finish-login`.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thunder_executor::{complete_from_sink, Executor, ExecutorContext};
use thunder_model::{ExecutorResult, ThunderError, ThunderResult, Value};

use super::authdata::{parse_authenticator_data, FLAG_USER_PRESENT};
use super::cose::parse_cose_key;
use super::types::{ClientDataJson, CredentialStore, RelyingPartyConfig, StoredCredential};
use super::verify::{signed_message, verify_signature};

const CHALLENGE_BYTES: usize = 32;

pub struct WebauthnExecutor {
    config: RelyingPartyConfig,
    store: Arc<dyn CredentialStore>,
}

impl WebauthnExecutor {
    pub fn new(config: RelyingPartyConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self { config, store }
    }

    fn begin_registration(&self) -> ThunderResult<ExecutorResult> {
        let mut outputs = std::collections::BTreeMap::new();
        outputs.insert("challenge".to_string(), Value::String(new_challenge()));
        outputs.insert("rpId".to_string(), Value::String(self.config.rp_id.clone()));
        outputs.insert("rpName".to_string(), Value::String(self.config.rp_name.clone()));
        Ok(ExecutorResult::complete(outputs))
    }

    fn begin_discoverable_login(&self) -> ThunderResult<ExecutorResult> {
        let mut outputs = std::collections::BTreeMap::new();
        outputs.insert("challenge".to_string(), Value::String(new_challenge()));
        outputs.insert("rpId".to_string(), Value::String(self.config.rp_id.clone()));
        Ok(ExecutorResult::complete(outputs))
    }

    async fn finish_registration(&self, ctx: &mut ExecutorContext) -> ThunderResult<ExecutorResult> {
        let client_data_b64 = required_str(ctx, "clientDataJSON")?;
        let authenticator_data_b64 = required_str(ctx, "attestationObject.authData")?;
        let raw_cose_key_b64 = required_str(ctx, "credentialPublicKey")?;
        let credential_id = required_str(ctx, "credentialId")?;
        let expected_challenge = required_str(ctx, "expectedChallenge")?;
        let user_id = required_str(ctx, "userId")?;

        let client_data_json = decode_b64url(client_data_b64)?;
        let client_data: ClientDataJson = serde_json::from_slice(&client_data_json)
            .map_err(|e| ThunderError::invalid_request(format!("malformed clientDataJSON: {e}")))?;

        if client_data.r#type != "webauthn.create" {
            return Ok(ExecutorResult::failed("InvalidClientData", "unexpected clientData.type"));
        }
        if client_data.challenge != expected_challenge {
            return Ok(ExecutorResult::failed("ChallengeMismatch", "challenge does not match"));
        }
        if !self.config.allowed_origins.iter().any(|o| o == &client_data.origin) {
            return Ok(ExecutorResult::failed("OriginMismatch", "origin not allowed"));
        }

        let authenticator_data_bytes = decode_b64url(authenticator_data_b64)?;
        let auth_data = parse_authenticator_data(&authenticator_data_bytes)?;
        if !rp_id_hash_matches(&auth_data.rp_id_hash, &self.config.rp_id) {
            return Ok(ExecutorResult::failed("RpIdMismatch", "rpIdHash does not match"));
        }
        if auth_data.flags & FLAG_USER_PRESENT == 0 {
            return Ok(ExecutorResult::failed("UserNotPresent", "user presence flag not set"));
        }

        let cose_public_key = decode_b64url(raw_cose_key_b64)?;
        parse_cose_key(&cose_public_key)?; // validates shape before storing

        self.store
            .save(StoredCredential {
                credential_id: credential_id.to_string(),
                user_id: user_id.to_string(),
                cose_public_key,
                counter: auth_data.sign_count,
            })
            .await?;

        ctx.sink.write("credentialId", credential_id.to_string());
        Ok(complete_from_sink(std::mem::take(&mut ctx.sink)))
    }

    async fn finish_login(&self, ctx: &mut ExecutorContext) -> ThunderResult<ExecutorResult> {
        let client_data_b64 = required_str(ctx, "clientDataJSON")?;
        let authenticator_data_b64 = required_str(ctx, "authenticatorData")?;
        let signature_b64 = required_str(ctx, "signature")?;
        let credential_id = required_str(ctx, "credentialId")?;
        let expected_challenge = required_str(ctx, "expectedChallenge")?;

        let client_data_json = decode_b64url(client_data_b64)?;
        let client_data: ClientDataJson = serde_json::from_slice(&client_data_json)
            .map_err(|e| ThunderError::invalid_request(format!("malformed clientDataJSON: {e}")))?;

        if client_data.r#type != "webauthn.get" {
            return Ok(ExecutorResult::failed("InvalidClientData", "unexpected clientData.type"));
        }
        if client_data.challenge != expected_challenge {
            return Ok(ExecutorResult::failed("ChallengeMismatch", "challenge does not match"));
        }
        if !self.config.allowed_origins.iter().any(|o| o == &client_data.origin) {
            return Ok(ExecutorResult::failed("OriginMismatch", "origin not allowed"));
        }

        let Some(stored) = self.store.get(credential_id).await? else {
            return Ok(ExecutorResult::failed("UnknownCredential", "credential not registered"));
        };

        let authenticator_data_bytes = decode_b64url(authenticator_data_b64)?;
        let auth_data = parse_authenticator_data(&authenticator_data_bytes)?;
        if !rp_id_hash_matches(&auth_data.rp_id_hash, &self.config.rp_id) {
            return Ok(ExecutorResult::failed("RpIdMismatch", "rpIdHash does not match"));
        }
        if auth_data.flags & FLAG_USER_PRESENT == 0 {
            return Ok(ExecutorResult::failed("UserNotPresent", "user presence flag not set"));
        }

        let cose_key = parse_cose_key(&stored.cose_public_key)?;
        let signature_bytes = decode_b64url(signature_b64)?;
        let message = signed_message(&authenticator_data_bytes, &client_data_json);
        if verify_signature(&cose_key, &message, &signature_bytes).is_err() {
            return Ok(ExecutorResult::failed("InvalidSignature", "signature verification failed"));
        }

        // Counter monotonicity (§4.3): first use may carry counter 0; any
        // non-increasing counter thereafter indicates a cloned authenticator.
        if stored.counter != 0 && auth_data.sign_count <= stored.counter {
            return Ok(ExecutorResult::failed("CloneDetected", "signature counter did not increase"));
        }
        self.store.update_counter(credential_id, auth_data.sign_count).await?;

        ctx.sink.write("userId", stored.user_id.clone());
        Ok(complete_from_sink(std::mem::take(&mut ctx.sink)))
    }
}

#[async_trait]
impl Executor for WebauthnExecutor {
    fn name(&self) -> &str {
        "Webauthn"
    }

    async fn execute(&self, mut ctx: ExecutorContext) -> ThunderResult<ExecutorResult> {
        match ctx.properties.get_str("operation") {
            Some("begin-registration") => self.begin_registration(),
            Some("begin-discoverable-login") => self.begin_discoverable_login(),
            Some("finish-registration") => self.finish_registration(&mut ctx).await,
            Some("finish-login") => self.finish_login(&mut ctx).await,
            Some(other) => Err(ThunderError::invalid_request(format!("unknown webauthn operation {other}"))),
            None => Err(ThunderError::invalid_request("webauthn executor requires an operation property")),
        }
    }
}

fn required_str<'a>(ctx: &'a ExecutorContext, key: &str) -> ThunderResult<&'a str> {
    ctx.context
        .get_str(key)
        .ok_or_else(|| ThunderError::invalid_request(format!("missing required input {key}")))
}

fn decode_b64url(value: &str) -> ThunderResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| ThunderError::invalid_request(format!("invalid base64url: {e}")))
}

fn rp_id_hash_matches(hash: &[u8; 32], rp_id: &str) -> bool {
    Sha256::digest(rp_id.as_bytes()).as_slice() == hash
}

fn new_challenge() -> String {
    let mut bytes = [0u8; CHALLENGE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use thunder_model::ExecutorStatus;
    use tokio::sync::Mutex;

    struct MemStore(Mutex<Vec<StoredCredential>>);

    #[async_trait]
    impl CredentialStore for MemStore {
        async fn get(&self, credential_id: &str) -> ThunderResult<Option<StoredCredential>> {
            Ok(self.0.lock().await.iter().find(|c| c.credential_id == credential_id).cloned())
        }

        async fn get_by_user(&self, user_id: &str) -> ThunderResult<Vec<StoredCredential>> {
            Ok(self.0.lock().await.iter().filter(|c| c.user_id == user_id).cloned().collect())
        }

        async fn save(&self, credential: StoredCredential) -> ThunderResult<()> {
            self.0.lock().await.push(credential);
            Ok(())
        }

        async fn update_counter(&self, credential_id: &str, counter: u32) -> ThunderResult<()> {
            for cred in self.0.lock().await.iter_mut() {
                if cred.credential_id == credential_id {
                    cred.counter = counter;
                }
            }
            Ok(())
        }
    }

    fn config() -> RelyingPartyConfig {
        RelyingPartyConfig {
            rp_id: "example.com".to_string(),
            rp_name: "Example".to_string(),
            allowed_origins: vec!["https://example.com".to_string()],
        }
    }

    #[tokio::test]
    async fn begin_registration_returns_challenge() {
        let executor = WebauthnExecutor::new(config(), Arc::new(MemStore(Mutex::new(vec![]))));
        let mut properties = BTreeMap::new();
        properties.insert("operation".to_string(), Value::String("begin-registration".into()));
        let ctx = ExecutorContext::new(None, BTreeMap::new(), &properties, "node1", "app1", None);
        let result = executor.execute(ctx).await.unwrap();
        assert_eq!(result.status, Some(ExecutorStatus::Complete));
        assert!(result.outputs.contains_key("challenge"));
    }

    #[tokio::test]
    async fn unknown_operation_is_invalid_request() {
        let executor = WebauthnExecutor::new(config(), Arc::new(MemStore(Mutex::new(vec![]))));
        let mut properties = BTreeMap::new();
        properties.insert("operation".to_string(), Value::String("bogus".into()));
        let ctx = ExecutorContext::new(None, BTreeMap::new(), &properties, "node1", "app1", None);
        assert!(executor.execute(ctx).await.is_err());
    }

    #[tokio::test]
    async fn finish_login_rejects_unknown_credential() {
        let executor = WebauthnExecutor::new(config(), Arc::new(MemStore(Mutex::new(vec![]))));
        let mut properties = BTreeMap::new();
        properties.insert("operation".to_string(), Value::String("finish-login".into()));

        let client_data = serde_json::json!({
            "type": "webauthn.get",
            "challenge": "chal",
            "origin": "https://example.com",
        });
        let mut context = BTreeMap::new();
        context.insert(
            "clientDataJSON".to_string(),
            Value::String(URL_SAFE_NO_PAD.encode(serde_json::to_vec(&client_data).unwrap())),
        );
        context.insert("authenticatorData".to_string(), Value::String(URL_SAFE_NO_PAD.encode([0u8; 37])));
        context.insert("signature".to_string(), Value::String(URL_SAFE_NO_PAD.encode([0u8; 8])));
        context.insert("credentialId".to_string(), Value::String("missing-cred".into()));
        context.insert("expectedChallenge".to_string(), Value::String("chal".into()));

        let ctx = ExecutorContext::new(None, context, &properties, "node1", "app1", None);
        let result = executor.execute(ctx).await.unwrap();
        assert_eq!(result.status, Some(ExecutorStatus::Failed));
        assert_eq!(result.failure.unwrap().code, "UnknownCredential");
    }
}
