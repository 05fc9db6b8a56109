//! Provisioning executor (§4.3): used in registration flows, merges
//! accumulated attributes into a user record (create or link).

use async_trait::async_trait;
use std::sync::Arc;
use thunder_executor::{complete_from_sink, Executor, ExecutorContext};
use thunder_model::{ExecutorResult, ThunderResult, UserService, Value};

pub struct ProvisioningExecutor {
    users: Arc<dyn UserService>,
}

impl ProvisioningExecutor {
    pub fn new(users: Arc<dyn UserService>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Executor for ProvisioningExecutor {
    fn name(&self) -> &str {
        "Provisioning"
    }

    async fn execute(&self, mut ctx: ExecutorContext) -> ThunderResult<ExecutorResult> {
        let attribute_names: Vec<String> = match ctx.properties.get("attributes") {
            Some(Value::List(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            _ => return Ok(ExecutorResult::failed("UserSchemaViolation", "no attributes declared for provisioning")),
        };

        let mut attributes = serde_json::Map::new();
        for name in &attribute_names {
            match ctx.context.get(name) {
                Some(value) => {
                    attributes.insert(name.clone(), value_to_json(value));
                }
                None => {
                    return Ok(ExecutorResult::failed(
                        "UserSchemaViolation",
                        format!("required attribute {name} missing from context"),
                    ))
                }
            }
        }

        let unique_key = ctx.properties.get_str("uniqueAttribute");
        if let Some(unique_key) = unique_key {
            if let Some(existing_value) = attributes.get(unique_key).and_then(|v| v.as_str()) {
                if self
                    .users
                    .find_by_attribute(unique_key, existing_value)
                    .await?
                    .is_some()
                {
                    return Ok(ExecutorResult::failed("DuplicateUser", format!("{unique_key} already registered")));
                }
            }
        }

        let user = self.users.create_user(serde_json::Value::Object(attributes)).await?;

        ctx.sink.write("userId", user.id);
        ctx.sink.write("userType", user.user_type);
        Ok(complete_from_sink(std::mem::take(&mut ctx.sink)))
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Number(n) => serde_json::json!(n),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Bytes(b) => serde_json::Value::String(base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            b,
        )),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect()),
        Value::Null => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use thunder_model::{ExecutorStatus, UserGroup, UserRecord};

    struct FakeUsers {
        existing_email: Option<String>,
    }

    #[async_trait]
    impl UserService for FakeUsers {
        async fn get_user(&self, _id: &str) -> ThunderResult<UserRecord> {
            unimplemented!()
        }

        async fn get_user_groups(&self, _id: &str, _limit: u32, _offset: u32) -> ThunderResult<Vec<UserGroup>> {
            Ok(vec![])
        }

        async fn find_by_attribute(&self, _name: &str, value: &str) -> ThunderResult<Option<UserRecord>> {
            if self.existing_email.as_deref() == Some(value) {
                Ok(Some(UserRecord {
                    id: "existing".into(),
                    user_type: "person".into(),
                    organization_unit_id: None,
                    attributes: serde_json::json!({}),
                }))
            } else {
                Ok(None)
            }
        }

        async fn create_user(&self, attributes: serde_json::Value) -> ThunderResult<UserRecord> {
            Ok(UserRecord {
                id: "new-user".into(),
                user_type: "person".into(),
                organization_unit_id: None,
                attributes,
            })
        }
    }

    #[tokio::test]
    async fn creates_user_when_no_duplicate() {
        let executor = ProvisioningExecutor::new(Arc::new(FakeUsers { existing_email: None }));
        let mut properties = BTreeMap::new();
        properties.insert(
            "attributes".to_string(),
            Value::List(vec![Value::String("email".into())]),
        );
        properties.insert("uniqueAttribute".to_string(), Value::String("email".into()));
        let mut context = BTreeMap::new();
        context.insert("email".to_string(), Value::String("a@b.com".into()));

        let ctx = ExecutorContext::new(None, context, &properties, "node1", "app1", None);
        let result = executor.execute(ctx).await.unwrap();
        assert_eq!(result.status, Some(ExecutorStatus::Complete));
        assert_eq!(result.outputs.get("userId"), Some(&Value::String("new-user".into())));
    }

    #[tokio::test]
    async fn duplicate_email_fails() {
        let executor = ProvisioningExecutor::new(Arc::new(FakeUsers {
            existing_email: Some("a@b.com".into()),
        }));
        let mut properties = BTreeMap::new();
        properties.insert(
            "attributes".to_string(),
            Value::List(vec![Value::String("email".into())]),
        );
        properties.insert("uniqueAttribute".to_string(), Value::String("email".into()));
        let mut context = BTreeMap::new();
        context.insert("email".to_string(), Value::String("a@b.com".into()));

        let ctx = ExecutorContext::new(None, context, &properties, "node1", "app1", None);
        let result = executor.execute(ctx).await.unwrap();
        assert_eq!(result.status, Some(ExecutorStatus::Failed));
        assert_eq!(result.failure.unwrap().code, "DuplicateUser");
    }
}
