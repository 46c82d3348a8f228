//! Data models for factory types, placed factories and the edges between them

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One declared input or output of a factory type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceIO {
    pub id: String,
    pub name: String,
    pub rate: f64, // units per minute at scale 1
}

impl ResourceIO {
    pub fn new(id: &str, name: &str, rate: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            rate,
        }
    }
}

/// Template describing what a factory consumes and produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryType {
    pub id: String,
    pub name: String,
    pub inputs: Vec<ResourceIO>,
    pub outputs: Vec<ResourceIO>,
}

impl FactoryType {
    pub fn input(&self, id: &str) -> Option<&ResourceIO> {
        self.inputs.iter().find(|i| i.id == id)
    }

    pub fn output(&self, id: &str) -> Option<&ResourceIO> {
        self.outputs.iter().find(|o| o.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Per-node payload, stored under `data` in the saved record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryNodeData {
    pub label: String,
    pub factory_type: FactoryType,
    pub scale: u32,
    #[serde(default)]
    pub input_status: BTreeMap<String, bool>,
}

/// A factory placed on the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryNode {
    pub id: String,
    #[serde(rename = "type", default = "default_node_kind")]
    pub kind: String,
    #[serde(default)]
    pub position: Position,
    pub data: FactoryNodeData,
}

pub const FACTORY_NODE_KIND: &str = "factory";

fn default_node_kind() -> String {
    FACTORY_NODE_KIND.to_string()
}

impl FactoryNode {
    pub fn factory_type(&self) -> &FactoryType {
        &self.data.factory_type
    }

    pub fn scale(&self) -> u32 {
        self.data.scale
    }

    /// Whether every declared input is currently satisfied
    pub fn is_satisfied(&self) -> bool {
        self.data
            .factory_type
            .inputs
            .iter()
            .all(|i| self.data.input_status.get(&i.id).copied().unwrap_or(false))
    }
}

/// Directed link from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub source_handle: String,
    pub target: String,
    pub target_handle: String,
}

impl Edge {
    pub fn new(source: &str, source_handle: &str, target: &str, target_handle: &str) -> Self {
        Self {
            id: edge_id(source, source_handle, target, target_handle),
            source: source.to_string(),
            source_handle: source_handle.to_string(),
            target: target.to_string(),
            target_handle: target_handle.to_string(),
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Edge ids follow the diagram library convention so saved records stay interchangeable
pub fn edge_id(source: &str, source_handle: &str, target: &str, target_handle: &str) -> String {
    format!("reactflow__edge-{source}{source_handle}-{target}{target_handle}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_uses_stored_field_names() {
        let json = r#"{
            "id": "factory-1",
            "type": "factory",
            "position": { "x": 10.0, "y": 20.5 },
            "data": {
                "label": "Steel Factory #1",
                "factoryType": {
                    "id": "steel",
                    "name": "Steel Factory",
                    "inputs": [{ "id": "iron-ore", "name": "Iron Ore", "rate": 120 }],
                    "outputs": []
                },
                "scale": 2,
                "inputStatus": { "iron-ore": true }
            }
        }"#;

        let node: FactoryNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.kind, "factory");
        assert_eq!(node.scale(), 2);
        assert_eq!(node.position.y, 20.5);
        assert_eq!(node.factory_type().input("iron-ore").unwrap().rate, 120.0);
        assert!(node.is_satisfied());

        let value = serde_json::to_value(&node).unwrap();
        assert!(value["data"]["factoryType"].is_object());
        assert_eq!(value["data"]["inputStatus"]["iron-ore"], true);
    }

    #[test]
    fn test_missing_input_status_counts_as_unsatisfied() {
        let json = r#"{
            "id": "factory-1",
            "data": {
                "label": "x",
                "factoryType": {
                    "id": "t", "name": "T",
                    "inputs": [{ "id": "a", "name": "A", "rate": 1 }],
                    "outputs": []
                },
                "scale": 1
            }
        }"#;
        let node: FactoryNode = serde_json::from_str(json).unwrap();
        assert!(node.data.input_status.is_empty());
        assert!(!node.is_satisfied());
    }

    #[test]
    fn test_edge_id_and_handles() {
        let edge = Edge::new("factory-1", "copper-wire", "factory-2", "copper-wire");
        assert_eq!(
            edge.id,
            "reactflow__edge-factory-1copper-wire-factory-2copper-wire"
        );
        let value = serde_json::to_value(&edge).unwrap();
        assert_eq!(value["sourceHandle"], "copper-wire");
        assert_eq!(value["targetHandle"], "copper-wire");
        assert!(edge.touches("factory-2"));
        assert!(!edge.touches("factory-3"));
    }
}
