//! Wire response produced by `Start`/`Continue` (§4.4 `FlowStep`, §6).

use serde::{Deserialize, Serialize};

use crate::error::FailureReason;
use crate::flow_def::InputDecl;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStatus {
    Incomplete,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStepType {
    View,
    Redirection,
    Internal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowStepData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<InputDecl>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStep {
    pub flow_id: Uuid,
    pub flow_status: FlowStatus,
    pub r#type: FlowStepType,
    #[serde(default)]
    pub data: FlowStepData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

impl FlowStep {
    pub fn incomplete(flow_id: Uuid, inputs: Vec<InputDecl>) -> Self {
        Self {
            flow_id,
            flow_status: FlowStatus::Incomplete,
            r#type: FlowStepType::View,
            data: FlowStepData {
                inputs: Some(inputs),
                ..Default::default()
            },
            assertion: None,
            failure_reason: None,
        }
    }

    pub fn redirection(flow_id: Uuid, redirect_url: impl Into<String>) -> Self {
        Self {
            flow_id,
            flow_status: FlowStatus::Incomplete,
            r#type: FlowStepType::Redirection,
            data: FlowStepData {
                redirect_url: Some(redirect_url.into()),
                ..Default::default()
            },
            assertion: None,
            failure_reason: None,
        }
    }

    pub fn complete(flow_id: Uuid, assertion: Option<String>) -> Self {
        Self {
            flow_id,
            flow_status: FlowStatus::Complete,
            r#type: FlowStepType::Internal,
            data: FlowStepData::default(),
            assertion,
            failure_reason: None,
        }
    }

    pub fn failed(flow_id: Uuid, failure_reason: FailureReason) -> Self {
        Self {
            flow_id,
            flow_status: FlowStatus::Failed,
            r#type: FlowStepType::Internal,
            data: FlowStepData::default(),
            assertion: None,
            failure_reason: Some(failure_reason),
        }
    }
}
