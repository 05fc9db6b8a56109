//! Error taxonomy shared by every Thunder crate.
//!
//! Mirrors the kind-based error table in the design (§7): each [`ErrorKind`]
//! maps to exactly one HTTP status at the façade via [`ErrorKind::http_status`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result alias used throughout the workspace.
pub type ThunderResult<T> = std::result::Result<T, ThunderError>;

/// Error classification for programmatic handling and HTTP status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or missing required request fields.
    InvalidRequest,
    /// Credentials executor rejected the supplied identifiers/credentials.
    InvalidCredentials,
    /// JOSE verification or token endpoint rejected a token.
    InvalidToken,
    /// Authn provider could not find the user.
    UserNotFound,
    /// App/OU/flow lookup failed.
    ResourceNotFound,
    /// Two concurrent `Continue` calls raced for the same flow.
    ConcurrentFlow,
    /// Session TTL exceeded.
    FlowExpired,
    /// Per-node visit cap exceeded.
    FlowLoopDetected,
    /// Provisioning executor rejected the merged attributes.
    UserSchemaViolation,
    /// Provisioning executor found a conflicting existing user.
    DuplicateUser,
    /// A federated IDP, HTTP callout, or notification sender failed.
    ExternalRequestFailed,
    /// A JWK/key could not be interpreted.
    UnsupportedKey,
    /// Catch-all for anything else.
    InternalError,
}

impl ErrorKind {
    /// HTTP status this error kind maps to at the façade (§7 table).
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::InvalidRequest => 400,
            ErrorKind::InvalidCredentials => 401,
            ErrorKind::InvalidToken => 401,
            ErrorKind::UserNotFound => 404,
            ErrorKind::ResourceNotFound => 404,
            ErrorKind::ConcurrentFlow => 409,
            ErrorKind::FlowExpired => 410,
            ErrorKind::FlowLoopDetected => 422,
            ErrorKind::UserSchemaViolation => 422,
            ErrorKind::DuplicateUser => 409,
            ErrorKind::ExternalRequestFailed => 502,
            ErrorKind::UnsupportedKey => 400,
            ErrorKind::InternalError => 500,
        }
    }
}

/// A code/description pair surfaced to clients on failed flow outcomes
/// (`FlowStep.failure_reason`) and executor failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub code: String,
    pub description: String,
}

/// The workspace-wide error type.
///
/// Deliberately does not carry a `source` chain into `Display` output:
/// §7 requires that sensitive data never appear in error descriptions or
/// logs, so descriptions are short, static, non-interpolated strings
/// wherever the underlying cause could carry session context.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct ThunderError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ThunderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidCredentials, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidToken, message)
    }

    pub fn user_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserNotFound, message)
    }

    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceNotFound, message)
    }

    pub fn concurrent_flow(flow_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::ConcurrentFlow,
            format!("flow {flow_id} is already being advanced"),
        )
    }

    pub fn flow_expired(flow_id: impl fmt::Display) -> Self {
        Self::new(ErrorKind::FlowExpired, format!("flow {flow_id} expired"))
    }

    pub fn flow_loop_detected(node_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::FlowLoopDetected,
            format!("node {node_id} exceeded the per-session visit cap"),
        )
    }

    pub fn user_schema_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserSchemaViolation, message)
    }

    pub fn duplicate_user(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateUser, message)
    }

    pub fn external_request_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalRequestFailed, message)
    }

    pub fn unsupported_key(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedKey, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Render this error as the `{code, description}` pair the engine
    /// attaches to `FlowStep.failure_reason` / `ExecutorResult.failure`.
    pub fn as_failure_reason(&self) -> FailureReason {
        FailureReason {
            code: format!("{:?}", self.kind),
            description: self.message.clone(),
        }
    }
}
