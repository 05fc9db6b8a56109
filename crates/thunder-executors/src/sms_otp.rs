//! SMS OTP executor (§4.3): `send` mode issues a one-time code via a
//! notification sender, `verify` mode checks a submitted code against the
//! stored hash.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thunder_executor::{complete_from_sink, Executor, ExecutorContext};
use thunder_model::{ExecutorResult, NotificationSenderService, ThunderError, ThunderResult, Value};
use uuid::Uuid;

const OTP_VALIDITY_SECONDS: i64 = 300;
const MAX_ATTEMPTS: i64 = 5;

pub struct SmsOtpExecutor {
    sender: Arc<dyn NotificationSenderService>,
}

impl SmsOtpExecutor {
    pub fn new(sender: Arc<dyn NotificationSenderService>) -> Self {
        Self { sender }
    }

    fn state_key(node_id: &str) -> String {
        format!("__sms_otp_{node_id}")
    }

    async fn send(&self, ctx: &mut ExecutorContext) -> ThunderResult<ExecutorResult> {
        let mobile = ctx
            .context
            .get_str("mobileNumber")
            .ok_or_else(|| ThunderError::invalid_request("missing mobileNumber input"))?
            .to_string();
        let sender_id = ctx
            .properties
            .get_str("senderId")
            .ok_or_else(|| ThunderError::invalid_request("missing senderId property"))?
            .to_string();

        let code = generate_code();
        let hash = hash_code(&code);
        let send_id = Uuid::new_v4().to_string();
        let expires_at = (Utc::now() + Duration::seconds(OTP_VALIDITY_SECONDS)).timestamp();

        let mut state = std::collections::BTreeMap::new();
        state.insert("hash".to_string(), Value::String(hash));
        state.insert("expiresAt".to_string(), Value::Number(expires_at as f64));
        state.insert("attempts".to_string(), Value::Number(0.0));
        state.insert("sendId".to_string(), Value::String(send_id.clone()));

        self.sender
            .send(
                &sender_id,
                serde_json::json!({ "mobileNumber": mobile, "code": code }),
            )
            .await?;

        ctx.sink
            .write_sensitive(Self::state_key(&ctx.node_id.clone()), Value::Map(state));
        ctx.sink.write("sendId", send_id);
        Ok(complete_from_sink(std::mem::take(&mut ctx.sink)))
    }

    async fn verify(&self, ctx: &mut ExecutorContext) -> ThunderResult<ExecutorResult> {
        let code_input = ctx
            .context
            .get_str("code")
            .ok_or_else(|| ThunderError::invalid_request("missing code input"))?
            .to_string();

        let state_key = Self::state_key(&ctx.node_id.clone());
        let Some(Value::Map(state)) = ctx.context.get(&state_key) else {
            return Ok(ExecutorResult::failed("OTPExpired", "no pending OTP for this node"));
        };

        let stored_hash = state
            .get("hash")
            .and_then(Value::as_str)
            .ok_or_else(|| ThunderError::internal("corrupted OTP state: missing hash"))?;
        let expires_at = state
            .get("expiresAt")
            .and_then(Value::as_f64)
            .ok_or_else(|| ThunderError::internal("corrupted OTP state: missing expiresAt"))? as i64;
        let attempts = state.get("attempts").and_then(Value::as_f64).unwrap_or(0.0) as i64;

        if Utc::now().timestamp() > expires_at {
            return Ok(ExecutorResult::failed("OTPExpired", "OTP has expired"));
        }
        if attempts >= MAX_ATTEMPTS {
            return Ok(ExecutorResult::failed("TooManyAttempts", "maximum verification attempts exceeded"));
        }

        if hash_code(&code_input) == stored_hash {
            ctx.sink.write(Self::state_key(&ctx.node_id.clone()), Value::Null);
            Ok(complete_from_sink(std::mem::take(&mut ctx.sink)))
        } else {
            let mut updated = state.clone();
            updated.insert("attempts".to_string(), Value::Number((attempts + 1) as f64));
            ctx.sink
                .write_sensitive(Self::state_key(&ctx.node_id.clone()), Value::Map(updated));
            if attempts + 1 >= MAX_ATTEMPTS {
                Ok(ExecutorResult::failed("TooManyAttempts", "maximum verification attempts exceeded"))
            } else {
                Ok(ExecutorResult::failed("InvalidOTP", "submitted code does not match"))
            }
        }
    }
}

#[async_trait]
impl Executor for SmsOtpExecutor {
    fn name(&self) -> &str {
        "SMSOTP"
    }

    async fn execute(&self, mut ctx: ExecutorContext) -> ThunderResult<ExecutorResult> {
        match ctx.mode.as_deref() {
            Some("send") => self.send(&mut ctx).await,
            Some("verify") => self.verify(&mut ctx).await,
            other => Err(ThunderError::invalid_request(format!(
                "SMSOTP executor requires mode send or verify, got {other:?}"
            ))),
        }
    }
}

fn generate_code() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{value:06}")
}

fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use thunder_model::ExecutorStatus;

    struct FakeSender;

    #[async_trait]
    impl NotificationSenderService for FakeSender {
        async fn send(&self, _sender_id: &str, _payload: serde_json::Value) -> ThunderResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn send_then_wrong_verify_increments_attempts() {
        let executor = SmsOtpExecutor::new(Arc::new(FakeSender));

        let mut send_props = BTreeMap::new();
        send_props.insert("senderId".to_string(), Value::String("sender1".into()));
        let mut send_context = BTreeMap::new();
        send_context.insert("mobileNumber".to_string(), Value::String("+15551234".into()));
        let mut send_ctx = ExecutorContext::new(Some("send".into()), send_context, &send_props, "otpNode", "app1", None);
        send_ctx.node_id = "otpNode".to_string();
        let send_result = executor.execute(send_ctx).await.unwrap();
        assert_eq!(send_result.status, Some(ExecutorStatus::Complete));

        let state = send_result.outputs.get("__sms_otp_otpNode").cloned().unwrap();

        let mut verify_context = BTreeMap::new();
        verify_context.insert("code".to_string(), Value::String("000000".into()));
        verify_context.insert("__sms_otp_otpNode".to_string(), state);
        let verify_ctx = ExecutorContext::new(Some("verify".into()), verify_context, &BTreeMap::new(), "otpNode", "app1", None);
        let verify_result = executor.execute(verify_ctx).await.unwrap();
        assert_eq!(verify_result.status, Some(ExecutorStatus::Failed));
        assert!(matches!(
            verify_result.failure.unwrap().code.as_str(),
            "InvalidOTP" | "TooManyAttempts"
        ));
    }
}
