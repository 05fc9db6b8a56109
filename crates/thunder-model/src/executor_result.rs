//! Contract produced by every executor (§3 `ExecutorResult`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::FailureReason;
use crate::flow_def::InputDecl;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutorStatus {
    Complete,
    Incomplete,
    Failed,
    Redirect,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorResult {
    pub status: Option<ExecutorStatus>,
    #[serde(default)]
    pub outputs: BTreeMap<String, Value>,
    /// Output keys the engine must erase after the node completes (§9
    /// "Sensitive set" — declared by the executor, never inferred by name).
    #[serde(default)]
    pub sensitive_outputs: Vec<String>,
    #[serde(default)]
    pub next_inputs: Option<Vec<InputDecl>>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub failure: Option<FailureReason>,
}

impl ExecutorResult {
    pub fn complete(outputs: BTreeMap<String, Value>) -> Self {
        Self {
            status: Some(ExecutorStatus::Complete),
            outputs,
            ..Default::default()
        }
    }

    pub fn complete_sensitive(
        outputs: BTreeMap<String, Value>,
        sensitive_outputs: Vec<String>,
    ) -> Self {
        Self {
            status: Some(ExecutorStatus::Complete),
            outputs,
            sensitive_outputs,
            ..Default::default()
        }
    }

    pub fn incomplete(next_inputs: Vec<InputDecl>) -> Self {
        Self {
            status: Some(ExecutorStatus::Incomplete),
            next_inputs: Some(next_inputs),
            ..Default::default()
        }
    }

    pub fn redirect(url: impl Into<String>, sensitive_outputs: Vec<String>, outputs: BTreeMap<String, Value>) -> Self {
        Self {
            status: Some(ExecutorStatus::Redirect),
            redirect_url: Some(url.into()),
            sensitive_outputs,
            outputs,
            ..Default::default()
        }
    }

    pub fn failed(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            status: Some(ExecutorStatus::Failed),
            failure: Some(FailureReason {
                code: code.into(),
                description: description.into(),
            }),
            ..Default::default()
        }
    }
}
