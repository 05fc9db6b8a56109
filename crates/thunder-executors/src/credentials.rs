//! Credentials executor (§4.3).

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thunder_executor::{complete_from_sink, Executor, ExecutorContext};
use thunder_model::{AuthnFailureKind, AuthnProvider, ExecutorResult, ThunderResult};

pub struct CredentialsExecutor {
    provider: Arc<dyn AuthnProvider>,
}

impl CredentialsExecutor {
    pub fn new(provider: Arc<dyn AuthnProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Executor for CredentialsExecutor {
    fn name(&self) -> &str {
        "Credentials"
    }

    async fn execute(&self, mut ctx: ExecutorContext) -> ThunderResult<ExecutorResult> {
        let identifiers = read_string_map(&ctx, "identifiers");
        let credentials = read_string_map(&ctx, "credentials");

        if identifiers.is_empty() || credentials.is_empty() {
            return Ok(ExecutorResult::failed(
                "EmptyAttributesOrCredentials",
                "identifiers or credentials were empty",
            ));
        }

        let metadata = BTreeMap::new();
        match self
            .provider
            .authenticate(identifiers, credentials, metadata)
            .await
        {
            Ok(result) => {
                ctx.sink.write("userId", result.user_id);
                ctx.sink.write("userType", result.user_type);
                if let Some(ou) = result.organization_unit_id {
                    ctx.sink.write("organizationUnitId", ou);
                }
                if let Some(token) = result.token {
                    ctx.sink.write_sensitive("providerToken", token);
                }
                ctx.sink.write(
                    "availableAttributes",
                    thunder_model::Value::List(
                        result
                            .available_attributes
                            .into_iter()
                            .map(thunder_model::Value::String)
                            .collect(),
                    ),
                );
                Ok(complete_from_sink(ctx.sink))
            }
            Err(failure) => {
                let (code, description) = match failure.kind {
                    AuthnFailureKind::UserNotFound => ("UserNotFound", failure.message),
                    AuthnFailureKind::AuthenticationFailed => ("InvalidCredentials", failure.message),
                    AuthnFailureKind::SystemError => ("InternalError", failure.message),
                };
                Ok(ExecutorResult::failed(code, description))
            }
        }
    }
}

/// Reads a context key expected to hold a `Value::Map` of strings, the
/// typical shape of `identifiers`/`credentials` (§4.3).
fn read_string_map(ctx: &ExecutorContext, key: &str) -> BTreeMap<String, String> {
    match ctx.context.get(key) {
        Some(thunder_model::Value::Map(m)) => m
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
        _ => BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait as at;
    use std::collections::BTreeMap as Map;
    use thunder_model::{AuthnFailure, AuthnResult, ExecutorStatus, Value};

    struct FakeProvider {
        outcome: Result<AuthnResult, AuthnFailure>,
    }

    #[at]
    impl AuthnProvider for FakeProvider {
        async fn authenticate(
            &self,
            _identifiers: Map<String, String>,
            _credentials: Map<String, String>,
            _metadata: Map<String, String>,
        ) -> Result<AuthnResult, AuthnFailure> {
            self.outcome.clone()
        }
    }

    fn context_with(identifiers: Map<String, Value>, credentials: Map<String, Value>) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert("identifiers".to_string(), Value::Map(identifiers));
        context.insert("credentials".to_string(), Value::Map(credentials));
        context
    }

    #[tokio::test]
    async fn happy_path_writes_user_id() {
        let executor = CredentialsExecutor::new(Arc::new(FakeProvider {
            outcome: Ok(AuthnResult {
                user_id: "U".into(),
                user_type: "person".into(),
                organization_unit_id: None,
                token: None,
                available_attributes: vec![],
            }),
        }));

        let context = context_with(
            Map::from([("username".to_string(), Value::String("u1".into()))]),
            Map::from([("password".to_string(), Value::String("p1".into()))]),
        );
        let ctx = ExecutorContext::new(None, context, &Map::new(), "node1", "app1", None);
        let result = executor.execute(ctx).await.unwrap();
        assert_eq!(result.status, Some(ExecutorStatus::Complete));
        assert_eq!(result.outputs.get("userId"), Some(&Value::String("U".into())));
    }

    #[tokio::test]
    async fn empty_credentials_fails_without_calling_provider() {
        let executor = CredentialsExecutor::new(Arc::new(FakeProvider {
            outcome: Err(AuthnFailure {
                kind: AuthnFailureKind::SystemError,
                message: "should not be reached".into(),
            }),
        }));
        let context = context_with(Map::new(), Map::new());
        let ctx = ExecutorContext::new(None, context, &Map::new(), "node1", "app1", None);
        let result = executor.execute(ctx).await.unwrap();
        assert_eq!(result.status, Some(ExecutorStatus::Failed));
        assert_eq!(result.failure.unwrap().code, "EmptyAttributesOrCredentials");
    }
}
