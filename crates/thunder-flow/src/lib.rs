//! # thunder-flow
//!
//! The flow graph interpreter and session store (§4.4, §4.5; components C4,
//! C5) that drive Thunder's authentication and registration flows.
//!
//! ## Architecture
//!
//! - `validation` - graph invariants checked at definition load
//! - `session_store` - at-most-one-owner `FlowSession` store
//! - `engine` - the `START`/`PROMPT`/`TASK_EXECUTION`/`END` state machine

mod engine;
mod session_store;
mod validation;

pub use engine::FlowEngine;
pub use session_store::InMemorySessionStore;
pub use validation::validate_flow_definition;
