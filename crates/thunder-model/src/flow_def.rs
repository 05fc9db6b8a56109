//! Immutable flow graph definitions (§3 `FlowDefinition`, `Node`).
//!
//! The graph is data, not code (§9 "Graph interpreter over closures"): nodes
//! are a tagged-variant enum, referenced by id only, so loaders, exporters,
//! and the engine in `thunder-flow` all walk the same representation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::Value;

pub type NodeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowType {
    Authentication,
    Registration,
}

/// Input declaration on a `PROMPT` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDecl {
    pub r#ref: String,
    pub identifier: String,
    pub r#type: InputType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputType {
    TextInput,
    PasswordInput,
    OtpInput,
    Select,
    Hidden,
    WebauthnResponse,
}

impl InputType {
    /// Whether inputs of this declared type are sensitive and must be
    /// erased from session context after the consuming task runs (§4.4).
    pub fn is_sensitive(self) -> bool {
        matches!(
            self,
            InputType::PasswordInput | InputType::OtpInput | InputType::WebauthnResponse
        )
    }
}

/// An action a `PROMPT` node exposes; disambiguated on resume by `action_ref`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptAction {
    pub r#ref: String,
    pub next_node: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub inputs: Vec<InputDecl>,
    pub actions: Vec<PromptAction>,
    /// Opaque to the engine; presentation hints only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_components: Option<serde_json::Value>,
}

impl Prompt {
    pub fn find_action(&self, action_ref: &str) -> Option<&PromptAction> {
        self.actions.iter().find(|a| a.r#ref == action_ref)
    }
}

/// Reference to an executor and the dual-role mode it should run in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorRef {
    pub name: String,
    #[serde(default)]
    pub mode: Option<String>,
}

/// Sum-variant node (§3). Nodes are referenced by id only; never embed a
/// child node inside a parent (§9 "Cyclic references").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Node {
    Start {
        on_success: NodeId,
    },
    Prompt {
        prompts: Vec<Prompt>,
    },
    TaskExecution {
        executor: ExecutorRef,
        #[serde(default)]
        properties: BTreeMap<String, Value>,
        on_success: NodeId,
        #[serde(default)]
        on_incomplete: Option<NodeId>,
        #[serde(default)]
        on_failure: Option<NodeId>,
    },
    End,
}

impl Node {
    /// Successor node ids this node can transition to, for graph validation.
    pub fn successors(&self) -> Vec<&NodeId> {
        match self {
            Node::Start { on_success } => vec![on_success],
            Node::Prompt { prompts } => prompts
                .iter()
                .flat_map(|p| p.actions.iter().map(|a| &a.next_node))
                .collect(),
            Node::TaskExecution {
                on_success,
                on_incomplete,
                on_failure,
                ..
            } => {
                let mut v = vec![on_success];
                v.extend(on_incomplete.iter());
                v.extend(on_failure.iter());
                v
            }
            Node::End => vec![],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Node::End)
    }
}

/// Immutable, named graph identified by `handle` (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub handle: String,
    pub flow_type: FlowType,
    pub nodes: BTreeMap<NodeId, Node>,
}

impl FlowDefinition {
    pub fn start_node_id(&self) -> Option<&NodeId> {
        self.nodes.iter().find_map(|(id, n)| match n {
            Node::Start { .. } => Some(id),
            _ => None,
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }
}
