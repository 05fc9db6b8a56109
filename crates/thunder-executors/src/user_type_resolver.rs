//! UserTypeResolver executor (§4.3): deterministically selects a user type
//! implied by context, or suspends with a select prompt.

use async_trait::async_trait;
use thunder_executor::{complete_from_sink, Executor, ExecutorContext};
use thunder_model::{ExecutorResult, InputDecl, InputType, ThunderResult, Value};

pub struct UserTypeResolverExecutor;

#[async_trait]
impl Executor for UserTypeResolverExecutor {
    fn name(&self) -> &str {
        "UserTypeResolver"
    }

    async fn execute(&self, mut ctx: ExecutorContext) -> ThunderResult<ExecutorResult> {
        if let Some(user_type) = ctx.context.get_str("userType") {
            ctx.sink.write("userType", user_type.to_string());
            return Ok(complete_from_sink(std::mem::take(&mut ctx.sink)));
        }

        let candidates: Vec<String> = match ctx.properties.get("candidates") {
            Some(Value::List(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            _ => Vec::new(),
        };

        if candidates.len() == 1 {
            ctx.sink.write("userType", candidates.into_iter().next().unwrap());
            return Ok(complete_from_sink(std::mem::take(&mut ctx.sink)));
        }

        Ok(ExecutorResult::incomplete(vec![InputDecl {
            r#ref: "userType".to_string(),
            identifier: "userType".to_string(),
            r#type: InputType::Select,
            required: true,
            options: Some(candidates),
        }]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use thunder_model::ExecutorStatus;

    #[tokio::test]
    async fn single_candidate_resolves_without_prompt() {
        let executor = UserTypeResolverExecutor;
        let mut properties = BTreeMap::new();
        properties.insert("candidates".to_string(), Value::List(vec![Value::String("person".into())]));
        let ctx = ExecutorContext::new(None, BTreeMap::new(), &properties, "node1", "app1", None);
        let result = executor.execute(ctx).await.unwrap();
        assert_eq!(result.status, Some(ExecutorStatus::Complete));
        assert_eq!(result.outputs.get("userType"), Some(&Value::String("person".into())));
    }

    #[tokio::test]
    async fn ambiguous_candidates_return_incomplete_select() {
        let executor = UserTypeResolverExecutor;
        let mut properties = BTreeMap::new();
        properties.insert(
            "candidates".to_string(),
            Value::List(vec![Value::String("person".into()), Value::String("service".into())]),
        );
        let ctx = ExecutorContext::new(None, BTreeMap::new(), &properties, "node1", "app1", None);
        let result = executor.execute(ctx).await.unwrap();
        assert_eq!(result.status, Some(ExecutorStatus::Incomplete));
        assert_eq!(result.next_inputs.unwrap().len(), 1);
    }
}
