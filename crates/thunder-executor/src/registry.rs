//! Executor registry (§9): a name→executor map, process-wide and immutable
//! after init. Dual-role executors (e.g. SMS OTP `send`/`verify`) register
//! once under one name; the `mode` requested by the node is threaded through
//! [`ExecutorContext::mode`] rather than requiring separate registrations.

use std::collections::HashMap;
use std::sync::Arc;
use thunder_model::{ThunderError, ThunderResult};

use crate::executor::Executor;

#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, executor: Arc<dyn Executor>) {
        self.executors.insert(executor.name().to_string(), executor);
    }

    pub fn get(&self, name: &str) -> ThunderResult<Arc<dyn Executor>> {
        self.executors
            .get(name)
            .cloned()
            .ok_or_else(|| ThunderError::resource_not_found(format!("no executor registered as {name}")))
    }

    pub fn names(&self) -> Vec<&str> {
        self.executors.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutorContext;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use thunder_model::ExecutorResult;

    struct Noop;

    #[async_trait]
    impl Executor for Noop {
        fn name(&self) -> &str {
            "Noop"
        }

        async fn execute(&self, _ctx: ExecutorContext) -> ThunderResult<ExecutorResult> {
            Ok(ExecutorResult::complete(BTreeMap::new()))
        }
    }

    #[test]
    fn registers_and_resolves_by_name() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(Noop));
        assert!(registry.get("Noop").is_ok());
        assert!(registry.get("Missing").is_err());
    }
}
