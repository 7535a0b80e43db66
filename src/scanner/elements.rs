use serde_json::Value;

use super::FlowElement;

/// Metadata keys holding flow nodes (things on the canvas).
const NODE_KEYS: &[&str] = &[
    "start",
    "actionCalls",
    "apexPluginCalls",
    "assignments",
    "collectionProcessors",
    "customErrors",
    "decisions",
    "loops",
    "orchestratedStages",
    "recordCreates",
    "recordDeletes",
    "recordLookups",
    "recordRollbacks",
    "recordUpdates",
    "screens",
    "steps",
    "subflows",
    "transforms",
    "waits",
];

const VARIABLE_KEYS: &[&str] = &["variables"];

const RESOURCE_KEYS: &[&str] = &[
    "choices",
    "constants",
    "dynamicChoiceSets",
    "formulas",
    "stages",
    "textTemplates",
];

/// Lists the nodes, variables, and resources declared in a Flow's metadata.
///
/// Each key may hold an array or, for single-valued elements such as
/// `start`, one object. Elements without a `name` take the key as their name.
pub fn extract_elements(metadata: &Value) -> Vec<FlowElement> {
    let groups = [
        (NODE_KEYS, "node"),
        (VARIABLE_KEYS, "variable"),
        (RESOURCE_KEYS, "resource"),
    ];

    let mut elements = Vec::new();
    for (keys, meta_type) in groups {
        for key in keys.iter().copied() {
            let items: Vec<&Value> = match metadata.get(key) {
                Some(Value::Array(items)) => items.iter().collect(),
                Some(item @ Value::Object(_)) => vec![item],
                _ => continue,
            };

            for item in items {
                let name = item
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(key)
                    .to_string();
                elements.push(FlowElement {
                    name,
                    element_type: key.to_string(),
                    meta_type: meta_type.to_string(),
                });
            }
        }
    }

    elements
}
