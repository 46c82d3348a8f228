//! Owned plan graph and its mutation API
//!
//! Every mutation re-evaluates the affected nodes before returning, so callers
//! always observe up-to-date input status.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calculator;
use crate::models::{
    Edge, FACTORY_NODE_KIND, FactoryNode, FactoryNodeData, FactoryType, Position,
};

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("factory '{0}' not found")]
    NodeNotFound(String),

    #[error("connection '{0}' not found")]
    EdgeNotFound(String),

    #[error("factory '{node}' has no output '{port}'")]
    NoSuchOutput { node: String, port: String },

    #[error("factory '{node}' has no input '{port}'")]
    NoSuchInput { node: String, port: String },

    #[error("scale must be at least 1")]
    InvalidScale,

    #[error("no factory ids left to assign")]
    IdsExhausted,
}

/// The plan: placed factories, their connections and the id counter
///
/// Serializes as the stored record `{ nodes, edges, nodeCount }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryGraph {
    #[serde(default)]
    pub nodes: Vec<FactoryNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub node_count: u32,
}

impl FactoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&FactoryNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut FactoryNode, GraphError> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Re-evaluate `node_id` and its direct downstream neighbours
    pub fn propagate(&mut self, node_id: &str) -> Vec<String> {
        calculator::propagate(&mut self.nodes, &self.edges, node_id)
    }

    /// Bring a loaded plan back in line with its invariants, then re-evaluate it
    ///
    /// Zero scales become 1 and the id counter is raised past every
    /// `factory-N` id already present. Every node touched by an edge is
    /// propagated once, in first-seen edge order; unconnected nodes are
    /// evaluated on their own so no stale status survives the load.
    pub fn refresh_all(&mut self) {
        self.repair();

        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        for edge in &self.edges {
            for id in [&edge.source, &edge.target] {
                if seen.insert(id.clone()) {
                    order.push(id.clone());
                }
            }
        }

        for id in &order {
            self.propagate(id);
        }

        let unconnected: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| !seen.contains(&n.id))
            .map(|n| n.id.clone())
            .collect();
        for id in &unconnected {
            self.propagate(id);
        }

        debug!(
            connected = order.len(),
            unconnected = unconnected.len(),
            "refreshed factories"
        );
    }

    fn repair(&mut self) {
        for node in &mut self.nodes {
            if node.data.scale == 0 {
                warn!(node = %node.id, "Stored scale 0 raised to 1");
                node.data.scale = 1;
            }
        }

        let highest = self
            .nodes
            .iter()
            .filter_map(|n| n.id.strip_prefix("factory-")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        if highest > self.node_count {
            warn!(
                stored = self.node_count,
                highest, "Stored factory counter behind existing ids"
            );
            self.node_count = highest;
        }
    }

    /// Place a new factory and return its id
    ///
    /// Ids already taken are skipped, so the counter never hands out a duplicate.
    pub fn add_factory(
        &mut self,
        factory_type: &FactoryType,
        position: Position,
    ) -> Result<String, GraphError> {
        let (n, id) = loop {
            let n = self
                .node_count
                .checked_add(1)
                .ok_or(GraphError::IdsExhausted)?;
            self.node_count = n;
            let id = format!("factory-{n}");
            if self.node(&id).is_none() {
                break (n, id);
            }
        };

        self.nodes.push(FactoryNode {
            id: id.clone(),
            kind: FACTORY_NODE_KIND.to_string(),
            position,
            data: FactoryNodeData {
                label: format!("{} #{}", factory_type.name, n),
                factory_type: factory_type.clone(),
                scale: 1,
                input_status: Default::default(),
            },
        });
        self.propagate(&id);

        info!(node = %id, factory_type = %factory_type.id, "added factory");
        Ok(id)
    }

    /// Remove a factory together with every connection touching it
    pub fn remove_factory(&mut self, node_id: &str) -> Result<FactoryNode, GraphError> {
        let idx = self
            .nodes
            .iter()
            .position(|n| n.id == node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
        let removed = self.nodes.remove(idx);

        let downstream: BTreeSet<String> = self
            .edges
            .iter()
            .filter(|e| e.source == node_id && e.target != node_id)
            .map(|e| e.target.clone())
            .collect();
        self.edges.retain(|e| !e.touches(node_id));

        for target in &downstream {
            self.propagate(target);
        }

        info!(node = node_id, "removed factory");
        Ok(removed)
    }

    /// Connect an output port to an input port and return the edge id
    ///
    /// Connecting the same ports twice returns the existing edge.
    pub fn connect(
        &mut self,
        source: &str,
        source_handle: &str,
        target: &str,
        target_handle: &str,
    ) -> Result<String, GraphError> {
        let source_node = self
            .node(source)
            .ok_or_else(|| GraphError::NodeNotFound(source.to_string()))?;
        if source_node.factory_type().output(source_handle).is_none() {
            return Err(GraphError::NoSuchOutput {
                node: source.to_string(),
                port: source_handle.to_string(),
            });
        }
        let target_node = self
            .node(target)
            .ok_or_else(|| GraphError::NodeNotFound(target.to_string()))?;
        if target_node.factory_type().input(target_handle).is_none() {
            return Err(GraphError::NoSuchInput {
                node: target.to_string(),
                port: target_handle.to_string(),
            });
        }

        let edge = Edge::new(source, source_handle, target, target_handle);
        let id = edge.id.clone();
        if self.edge(&id).is_some() {
            debug!(edge = %id, "connection already exists");
            return Ok(id);
        }

        self.edges.push(edge);
        self.propagate(target);

        info!(edge = %id, "connected");
        Ok(id)
    }

    /// Delete a connection, re-evaluating both former endpoints
    pub fn disconnect(&mut self, edge_id: &str) -> Result<Edge, GraphError> {
        let idx = self
            .edges
            .iter()
            .position(|e| e.id == edge_id)
            .ok_or_else(|| GraphError::EdgeNotFound(edge_id.to_string()))?;
        let edge = self.edges.remove(idx);

        self.propagate(&edge.source);
        self.propagate(&edge.target);

        info!(edge = edge_id, "disconnected");
        Ok(edge)
    }

    pub fn set_scale(&mut self, node_id: &str, scale: u32) -> Result<(), GraphError> {
        if scale == 0 {
            return Err(GraphError::InvalidScale);
        }
        self.node_mut(node_id)?.data.scale = scale;
        self.propagate(node_id);

        info!(node = node_id, scale, "scale changed");
        Ok(())
    }

    pub fn increment_scale(&mut self, node_id: &str) -> Result<u32, GraphError> {
        let scale = self.node_mut(node_id)?.data.scale.saturating_add(1);
        self.set_scale(node_id, scale)?;
        Ok(scale)
    }

    /// Lower the scale by one, never below 1
    pub fn decrement_scale(&mut self, node_id: &str) -> Result<u32, GraphError> {
        let scale = self.node_mut(node_id)?.data.scale.saturating_sub(1).max(1);
        self.set_scale(node_id, scale)?;
        Ok(scale)
    }

    pub fn move_factory(&mut self, node_id: &str, position: Position) -> Result<(), GraphError> {
        self.node_mut(node_id)?.position = position;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory_types::presets;
    use crate::models::ResourceIO;

    fn preset(id: &str) -> FactoryType {
        presets().into_iter().find(|t| t.id == id).unwrap()
    }

    fn wire_consumer(rate: f64) -> FactoryType {
        FactoryType {
            id: "custom-1".to_string(),
            name: "Wire Consumer".to_string(),
            inputs: vec![ResourceIO::new("copper-wire", "Copper Wire", rate)],
            outputs: vec![ResourceIO::new("cable", "Cable", 40.0)],
        }
    }

    fn cable_consumer() -> FactoryType {
        FactoryType {
            id: "custom-2".to_string(),
            name: "Cable Consumer".to_string(),
            inputs: vec![ResourceIO::new("cable", "Cable", 40.0)],
            outputs: vec![],
        }
    }

    fn status(graph: &FactoryGraph, node: &str, input: &str) -> Option<bool> {
        graph.node(node)?.data.input_status.get(input).copied()
    }

    #[test]
    fn test_add_factory_assigns_ids_and_evaluates() {
        let mut graph = FactoryGraph::new();
        let a = graph.add_factory(&preset("steel"), Position { x: 1.0, y: 2.0 }).unwrap();
        let b = graph.add_factory(&preset("copper"), Position::default()).unwrap();

        assert_eq!(a, "factory-1");
        assert_eq!(b, "factory-2");
        assert_eq!(graph.node_count, 2);
        assert_eq!(graph.node(&a).unwrap().data.label, "Steel Factory #1");
        assert_eq!(graph.node(&a).unwrap().scale(), 1);
        assert_eq!(status(&graph, &a, "iron-ore"), Some(false));
    }

    #[test]
    fn test_connect_then_disconnect() {
        let mut graph = FactoryGraph::new();
        let copper = graph.add_factory(&preset("copper"), Position::default()).unwrap();
        let consumer = graph.add_factory(&wire_consumer(100.0), Position::default()).unwrap();

        let edge = graph
            .connect(&copper, "copper-wire", &consumer, "copper-wire")
            .unwrap();
        assert_eq!(status(&graph, &consumer, "copper-wire"), Some(true));

        graph.disconnect(&edge).unwrap();
        assert!(graph.edges.is_empty());
        assert_eq!(status(&graph, &consumer, "copper-wire"), Some(false));
    }

    #[test]
    fn test_connect_is_idempotent() {
        let mut graph = FactoryGraph::new();
        let copper = graph.add_factory(&preset("copper"), Position::default()).unwrap();
        let consumer = graph.add_factory(&wire_consumer(100.0), Position::default()).unwrap();

        let first = graph.connect(&copper, "copper-wire", &consumer, "copper-wire").unwrap();
        let second = graph.connect(&copper, "copper-wire", &consumer, "copper-wire").unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn test_connect_rejects_unknown_ports_and_nodes() {
        let mut graph = FactoryGraph::new();
        let copper = graph.add_factory(&preset("copper"), Position::default()).unwrap();
        let steel = graph.add_factory(&preset("steel"), Position::default()).unwrap();

        assert_eq!(
            graph.connect(&copper, "copper-wire", &steel, "copper-wire"),
            Err(GraphError::NoSuchInput {
                node: steel.clone(),
                port: "copper-wire".to_string()
            })
        );
        assert_eq!(
            graph.connect(&copper, "iron-ore", &steel, "iron-ore"),
            Err(GraphError::NoSuchOutput {
                node: copper.clone(),
                port: "iron-ore".to_string()
            })
        );
        assert_eq!(
            graph.connect("factory-9", "copper-wire", &steel, "iron-ore"),
            Err(GraphError::NodeNotFound("factory-9".to_string()))
        );
        assert!(graph.edges.is_empty());
        assert_eq!(
            graph.disconnect("nope"),
            Err(GraphError::EdgeNotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_scale_changes_reevaluate_target_and_downstream() {
        let mut graph = FactoryGraph::new();
        let copper = graph.add_factory(&preset("copper"), Position::default()).unwrap();
        let consumer = graph.add_factory(&wire_consumer(100.0), Position::default()).unwrap();
        graph.connect(&copper, "copper-wire", &consumer, "copper-wire").unwrap();

        graph.set_scale(&consumer, 2).unwrap();
        assert_eq!(status(&graph, &consumer, "copper-wire"), Some(false));

        // raising the source fixes the consumer one hop away
        graph.set_scale(&copper, 2).unwrap();
        assert_eq!(status(&graph, &consumer, "copper-wire"), Some(true));

        assert_eq!(graph.set_scale(&copper, 0), Err(GraphError::InvalidScale));
    }

    #[test]
    fn test_scale_update_does_not_reach_two_hops() {
        let mut graph = FactoryGraph::new();
        let copper = graph.add_factory(&preset("copper"), Position::default()).unwrap();
        let middle = graph.add_factory(&wire_consumer(100.0), Position::default()).unwrap();
        let last = graph.add_factory(&cable_consumer(), Position::default()).unwrap();
        graph.connect(&copper, "copper-wire", &middle, "copper-wire").unwrap();
        graph.connect(&middle, "cable", &last, "cable").unwrap();
        assert_eq!(status(&graph, &last, "cable"), Some(true));

        let before = graph.node(&last).unwrap().data.input_status.clone();
        graph.set_scale(&last, 1).unwrap();
        graph.set_scale(&copper, 3).unwrap();
        assert_eq!(graph.node(&last).unwrap().data.input_status, before);

        // the middle node's scale does reach the last one
        graph.set_scale(&middle, 2).unwrap();
        assert_eq!(status(&graph, &middle, "copper-wire"), Some(true));
        assert_eq!(status(&graph, &last, "cable"), Some(true));
    }

    #[test]
    fn test_increment_and_decrement_scale() {
        let mut graph = FactoryGraph::new();
        let steel = graph.add_factory(&preset("steel"), Position::default()).unwrap();

        assert_eq!(graph.increment_scale(&steel).unwrap(), 2);
        assert_eq!(graph.decrement_scale(&steel).unwrap(), 1);
        assert_eq!(graph.decrement_scale(&steel).unwrap(), 1);
        assert_eq!(
            graph.increment_scale("factory-5"),
            Err(GraphError::NodeNotFound("factory-5".to_string()))
        );
    }

    #[test]
    fn test_remove_factory_drops_edges_and_updates_downstream() {
        let mut graph = FactoryGraph::new();
        let copper = graph.add_factory(&preset("copper"), Position::default()).unwrap();
        let consumer = graph.add_factory(&wire_consumer(100.0), Position::default()).unwrap();
        graph.connect(&copper, "copper-wire", &consumer, "copper-wire").unwrap();

        let removed = graph.remove_factory(&copper).unwrap();
        assert_eq!(removed.id, copper);
        assert!(graph.edges.is_empty());
        assert_eq!(status(&graph, &consumer, "copper-wire"), Some(false));

        // ids are never reused
        let next = graph.add_factory(&preset("steel"), Position::default()).unwrap();
        assert_eq!(next, "factory-3");
    }

    #[test]
    fn test_move_factory() {
        let mut graph = FactoryGraph::new();
        let steel = graph.add_factory(&preset("steel"), Position::default()).unwrap();
        graph.move_factory(&steel, Position { x: 50.0, y: -3.0 }).unwrap();
        assert_eq!(graph.node(&steel).unwrap().position, Position { x: 50.0, y: -3.0 });
    }

    #[test]
    fn test_refresh_all_repairs_stale_status() {
        let mut graph = FactoryGraph::new();
        let copper = graph.add_factory(&preset("copper"), Position::default()).unwrap();
        let consumer = graph.add_factory(&wire_consumer(100.0), Position::default()).unwrap();
        graph.connect(&copper, "copper-wire", &consumer, "copper-wire").unwrap();

        let json = serde_json::to_string(&graph).unwrap();
        let mut loaded: FactoryGraph = serde_json::from_str(&json).unwrap();
        for node in &mut loaded.nodes {
            node.data.input_status.clear();
        }

        loaded.refresh_all();
        assert_eq!(loaded, graph);
        assert_eq!(loaded.node_count, 2);
    }

    #[test]
    fn test_missing_counter_does_not_reuse_ids() {
        let mut graph = FactoryGraph::new();
        graph.add_factory(&preset("steel"), Position::default()).unwrap();
        let mut value = serde_json::to_value(&graph).unwrap();
        value.as_object_mut().unwrap().remove("nodeCount");

        let mut loaded: FactoryGraph = serde_json::from_value(value).unwrap();
        assert_eq!(loaded.node_count, 0);
        loaded.refresh_all();
        assert_eq!(loaded.node_count, 1);

        let id = loaded.add_factory(&preset("copper"), Position::default()).unwrap();
        assert_eq!(id, "factory-2");
        assert_eq!(loaded.nodes.iter().filter(|n| n.id == id).count(), 1);
    }

    #[test]
    fn test_add_factory_skips_taken_ids() {
        let mut graph = FactoryGraph::new();
        graph.add_factory(&preset("steel"), Position::default()).unwrap();
        graph.add_factory(&preset("steel"), Position::default()).unwrap();
        // counter pulled behind without a refresh
        graph.node_count = 0;

        let id = graph.add_factory(&preset("copper"), Position::default()).unwrap();
        assert_eq!(id, "factory-3");
        assert_eq!(graph.node(&id).unwrap().data.label, "Copper Factory #3");
    }

    #[test]
    fn test_exhausted_counter_is_an_error() {
        let mut graph = FactoryGraph::new();
        graph.node_count = u32::MAX;
        assert_eq!(
            graph.add_factory(&preset("steel"), Position::default()),
            Err(GraphError::IdsExhausted)
        );
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn test_refresh_all_repairs_zero_scale() {
        let mut graph = FactoryGraph::new();
        let steel = graph.add_factory(&preset("steel"), Position::default()).unwrap();
        graph.nodes[0].data.scale = 0;

        graph.refresh_all();
        assert_eq!(graph.node(&steel).unwrap().scale(), 1);
        assert_eq!(status(&graph, &steel, "iron-ore"), Some(false));
    }

    #[test]
    fn test_refresh_all_clears_stale_status_on_unconnected_nodes() {
        let mut graph = FactoryGraph::new();
        let steel = graph.add_factory(&preset("steel"), Position::default()).unwrap();
        graph.nodes[0]
            .data
            .input_status
            .insert("iron-ore".to_string(), true);

        graph.refresh_all();
        assert_eq!(status(&graph, &steel, "iron-ore"), Some(false));
    }

    #[test]
    fn test_stored_record_shape() {
        let mut graph = FactoryGraph::new();
        graph.add_factory(&preset("steel"), Position::default()).unwrap();
        let value = serde_json::to_value(&graph).unwrap();
        assert_eq!(value["nodeCount"], 1);
        assert!(value["nodes"].is_array());
        assert!(value["edges"].is_array());
        assert_eq!(value["nodes"][0]["type"], "factory");
    }
}
