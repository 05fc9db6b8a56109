//! Graph validation, run at definition load (§4.4 "Graph validation").

use std::collections::{HashSet, VecDeque};
use thunder_model::{FlowDefinition, Node, ThunderError, ThunderResult};

pub fn validate_flow_definition(def: &FlowDefinition) -> ThunderResult<()> {
    let start_ids: Vec<&String> = def
        .nodes
        .iter()
        .filter(|(_, n)| matches!(n, Node::Start { .. }))
        .map(|(id, _)| id)
        .collect();
    if start_ids.len() != 1 {
        return Err(ThunderError::invalid_request(format!(
            "flow {} must have exactly one START node, found {}",
            def.handle,
            start_ids.len()
        )));
    }
    let start_id = start_ids[0];

    for (id, node) in &def.nodes {
        for successor in node.successors() {
            if !def.nodes.contains_key(successor) {
                return Err(ThunderError::invalid_request(format!(
                    "flow {}: node {id} references unknown successor {successor}",
                    def.handle
                )));
            }
        }
    }

    if !end_reachable_from(def, start_id) {
        return Err(ThunderError::invalid_request(format!(
            "flow {}: no END node reachable from START",
            def.handle
        )));
    }

    Ok(())
}

fn end_reachable_from(def: &FlowDefinition, start_id: &str) -> bool {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(start_id.to_string());
    visited.insert(start_id.to_string());

    while let Some(id) = queue.pop_front() {
        let Some(node) = def.nodes.get(&id) else { continue };
        if node.is_terminal() {
            return true;
        }
        for successor in node.successors() {
            if visited.insert(successor.clone()) {
                queue.push_back(successor.clone());
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use thunder_model::{ExecutorRef, FlowType};

    fn flow_with(nodes: BTreeMap<String, Node>) -> FlowDefinition {
        FlowDefinition {
            handle: "test".to_string(),
            flow_type: FlowType::Authentication,
            nodes,
        }
    }

    #[test]
    fn accepts_minimal_valid_flow() {
        let nodes = BTreeMap::from([
            ("start".to_string(), Node::Start { on_success: "end".to_string() }),
            ("end".to_string(), Node::End),
        ]);
        assert!(validate_flow_definition(&flow_with(nodes)).is_ok());
    }

    #[test]
    fn rejects_dangling_successor() {
        let nodes = BTreeMap::from([(
            "start".to_string(),
            Node::Start { on_success: "missing".to_string() },
        )]);
        assert!(validate_flow_definition(&flow_with(nodes)).is_err());
    }

    #[test]
    fn rejects_no_end_reachable() {
        let nodes = BTreeMap::from([(
            "start".to_string(),
            Node::Start { on_success: "task".to_string() },
        ), (
            "task".to_string(),
            Node::TaskExecution {
                executor: ExecutorRef { name: "Noop".into(), mode: None },
                properties: BTreeMap::new(),
                on_success: "task".to_string(),
                on_incomplete: None,
                on_failure: None,
            },
        )]);
        assert!(validate_flow_definition(&flow_with(nodes)).is_err());
    }
}
