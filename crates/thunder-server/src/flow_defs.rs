//! Loads flow graph definitions from `<thunder_home>/flows/*.json` (§4.4).
//! Each file holds one `FlowDefinition`, whose own `handle` field is what
//! `/flow/authn` and `/flow/register` look up (conventionally `login` and
//! `register`).

use std::path::Path;
use thunder_model::{FlowDefinition, ThunderError, ThunderResult};

pub fn load_all(thunder_home: &Path) -> ThunderResult<Vec<FlowDefinition>> {
    let dir = thunder_home.join("flows");
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut definitions = Vec::new();
    let entries = std::fs::read_dir(&dir)
        .map_err(|e| ThunderError::internal(format!("failed to read flows directory: {e}")))?;
    for entry in entries {
        let entry = entry.map_err(|e| ThunderError::internal(format!("failed to read flow entry: {e}")))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ThunderError::internal(format!("failed to read {}: {e}", path.display())))?;
        let definition: FlowDefinition = serde_json::from_str(&raw)
            .map_err(|e| ThunderError::internal(format!("invalid flow definition {}: {e}", path.display())))?;
        definitions.push(definition);
    }
    Ok(definitions)
}
