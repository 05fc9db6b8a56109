//! Mutable, per-flow session state (§3 `FlowSession`).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::flow_def::{FlowType, NodeId};
use crate::value::Value;

/// Default sliding TTL: 10 minutes after last progress (§3, §5).
pub const FLOW_SESSION_TTL_SECONDS: i64 = 600;

/// Per-node visit cap before the engine fails with `FlowLoopDetected` (§4.4).
pub const MAX_NODE_VISITS: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SuspensionKind {
    Redirect,
    Prompt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suspension {
    pub kind: SuspensionKind,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSession {
    pub flow_id: Uuid,
    pub flow_handle: String,
    pub flow_type: FlowType,
    pub current_node_id: NodeId,
    pub application_id: String,
    #[serde(default)]
    pub organization_unit_id: Option<String>,
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
    #[serde(default)]
    pub sensitive_keys: BTreeSet<String>,
    #[serde(default)]
    pub suspension: Option<Suspension>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Per-node-id visit counters, bounding pathological cycles (§4.4).
    #[serde(default)]
    pub node_visits: BTreeMap<NodeId, u32>,
}

impl FlowSession {
    pub fn new(
        flow_handle: impl Into<String>,
        flow_type: FlowType,
        current_node_id: impl Into<String>,
        application_id: impl Into<String>,
        organization_unit_id: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            flow_id: Uuid::new_v4(),
            flow_handle: flow_handle.into(),
            flow_type,
            current_node_id: current_node_id.into(),
            application_id: application_id.into(),
            organization_unit_id,
            context: BTreeMap::new(),
            sensitive_keys: BTreeSet::new(),
            suspension: None,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(FLOW_SESSION_TTL_SECONDS),
        node_visits: BTreeMap::new(),
        }
    }

    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now > self.expires_at
    }

    /// Resets the sliding TTL; call whenever the session advances (§3, §5).
    pub fn touch(&mut self, now: chrono::DateTime<chrono::Utc>) {
        self.expires_at = now + chrono::Duration::seconds(FLOW_SESSION_TTL_SECONDS);
    }

    /// Merge inputs/outputs into context, marking `keys` sensitive.
    pub fn merge_context(&mut self, values: BTreeMap<String, Value>, sensitive: &[String]) {
        for (k, v) in values {
            self.context.insert(k, v);
        }
        for k in sensitive {
            self.sensitive_keys.insert(k.clone());
        }
    }

    /// Erase every key currently marked sensitive (§4.4 invariant).
    pub fn erase_sensitive(&mut self) {
        for key in std::mem::take(&mut self.sensitive_keys) {
            self.context.remove(&key);
        }
    }

    /// Record a visit to `node_id`, returning the new visit count.
    pub fn record_visit(&mut self, node_id: &str) -> u32 {
        let counter = self.node_visits.entry(node_id.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    pub fn context_view(&self) -> Value {
        Value::Map(self.context.clone())
    }
}
