//! The executor contract (§4.2):
//!
//! ```text
//! Executor.Execute(ctx: ExecutorContext) -> ExecutorResult
//! ```

use async_trait::async_trait;
use thunder_model::{ExecutorResult, ThunderResult};

use crate::context::ExecutorContext;

/// An executor invoked by a `TASK_EXECUTION` node.
///
/// Executors are stateless singletons, safe to call concurrently across
/// sessions (§4.2, §5, §9 "Executor registry"): all per-session state lives
/// in [`ExecutorContext`]/the session, never in `Self`.
#[async_trait]
pub trait Executor: Send + Sync {
    /// The `executor.name` this implementation answers to in the flow graph.
    fn name(&self) -> &str;

    async fn execute(&self, ctx: ExecutorContext) -> ThunderResult<ExecutorResult>;
}
