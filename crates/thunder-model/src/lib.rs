//! # thunder-model
//!
//! Shared data model for the Thunder identity platform: the flow graph
//! representation, mutable session state, the executor contract, token/claim
//! shaping inputs, and the workspace-wide error taxonomy.
//!
//! ## Architecture
//!
//! - `error` - `ThunderError`/`ErrorKind`, the §7 error taxonomy
//! - `value` - `Value`, the tagged context-value kind used in session context
//! - `flow_def` - `FlowDefinition`/`Node`/`Prompt`, the immutable flow graph
//! - `session` - `FlowSession`, mutable per-flow state
//! - `executor_result` - `ExecutorResult`, what an executor hands back to the engine
//! - `flow_step` - `FlowStep`, the wire response of `Start`/`Continue`
//! - `token` - `TokenConfig`/`ClaimsRequest`/`OAuthApp`, token-shaping inputs

pub mod collaborators;
pub mod error;
pub mod executor_result;
pub mod flow_def;
pub mod flow_step;
pub mod session;
pub mod token;
pub mod value;

pub use collaborators::{
    ApplicationService, AuthnFailure, AuthnFailureKind, AuthnProvider, AuthnResult, Idp, IdpService,
    NotificationSenderService, OrganizationUnit, OuService, UserGroup, UserRecord, UserService,
};
pub use error::{ErrorKind, FailureReason, ThunderError, ThunderResult};
pub use executor_result::{ExecutorResult, ExecutorStatus};
pub use flow_def::{
    ExecutorRef, FlowDefinition, FlowType, InputDecl, InputType, Node, NodeId, Prompt, PromptAction,
};
pub use flow_step::{FlowStatus, FlowStep, FlowStepData, FlowStepType};
pub use session::{FlowSession, Suspension, SuspensionKind, FLOW_SESSION_TTL_SECONDS, MAX_NODE_VISITS};
pub use token::{AppTokenConfig, ClaimsRequest, IndividualClaim, OAuthApp, TokenKindConfig, UserInfoConfig};
pub use value::Value;
