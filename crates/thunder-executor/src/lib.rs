//! # thunder-executor
//!
//! The executor runtime contract (§4.2, component C2): what an executor
//! reads, how runtime placeholders are resolved into its properties, and the
//! process-wide registry the flow engine dispatches through.
//!
//! ## Architecture
//!
//! - `substitution` - `{{ context.<path> }}` placeholder resolution
//! - `context` - `ExecutorContext`, `ContextView`, `Properties`, `OutputSink`
//! - `executor` - the `Executor` trait
//! - `registry` - process-wide `ExecutorRegistry`

pub mod context;
pub mod executor;
pub mod registry;
pub mod substitution;

pub use context::{complete_from_sink, ContextView, ExecutorContext, OutputSink, Properties};
pub use executor::Executor;
pub use registry::ExecutorRegistry;
pub use substitution::substitute;
