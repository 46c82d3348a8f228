//! Input satisfaction logic
//!
//! A node's input is satisfied when the production flowing into its port,
//! each upstream output scaled by its node's multiplier, meets the node's own
//! scaled demand. Recomputation only reaches one hop downstream of the node
//! that changed.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::models::{Edge, FactoryNode};

/// Supplied vs. demanded rate for one declared input of a node
#[derive(Debug, Clone, PartialEq)]
pub struct InputSupply {
    pub input_id: String,
    pub input_name: String,
    pub supplied: f64,
    pub demanded: f64,
}

impl InputSupply {
    pub fn satisfied(&self) -> bool {
        self.supplied >= self.demanded
    }
}

/// Compute supplied and demanded rates for every declared input of `node`
///
/// Edges whose source node or source output no longer exists contribute nothing.
pub fn input_report(node: &FactoryNode, edges: &[Edge], nodes: &[FactoryNode]) -> Vec<InputSupply> {
    let by_id: HashMap<&str, &FactoryNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let scale = f64::from(node.scale());

    node.factory_type()
        .inputs
        .iter()
        .map(|input| {
            let supplied = edges
                .iter()
                .filter(|e| e.target == node.id && e.target_handle == input.id)
                .map(|e| {
                    let Some(source) = by_id.get(e.source.as_str()) else {
                        trace!(edge = %e.id, "source node missing, contributes nothing");
                        return 0.0;
                    };
                    source
                        .factory_type()
                        .output(&e.source_handle)
                        .map_or(0.0, |o| o.rate * f64::from(source.scale()))
                })
                .sum::<f64>();

            InputSupply {
                input_id: input.id.clone(),
                input_name: input.name.clone(),
                supplied,
                demanded: input.rate * scale,
            }
        })
        .collect()
}

/// Return a copy of `node` with its input status recomputed from `edges`
pub fn evaluate(node: &FactoryNode, edges: &[Edge], nodes: &[FactoryNode]) -> FactoryNode {
    let input_status = input_report(node, edges, nodes)
        .into_iter()
        .map(|s| {
            let ok = s.satisfied();
            (s.input_id, ok)
        })
        .collect();

    let mut updated = node.clone();
    updated.data.input_status = input_status;
    updated
}

/// Re-evaluate `node_id` and then every node it directly feeds
///
/// Does not chase further than one hop. Returns the ids that were rewritten,
/// in evaluation order; an unknown id rewrites nothing.
pub fn propagate(nodes: &mut [FactoryNode], edges: &[Edge], node_id: &str) -> Vec<String> {
    let Some(idx) = nodes.iter().position(|n| n.id == node_id) else {
        debug!(node = node_id, "propagate on unknown node ignored");
        return Vec::new();
    };

    let updated = evaluate(&nodes[idx], edges, nodes);
    nodes[idx] = updated;
    let mut touched = vec![node_id.to_string()];

    let downstream: BTreeSet<&str> = edges
        .iter()
        .filter(|e| e.source == node_id)
        .map(|e| e.target.as_str())
        .collect();

    for target in downstream {
        if let Some(i) = nodes.iter().position(|n| n.id == target) {
            let updated = evaluate(&nodes[i], edges, nodes);
            nodes[i] = updated;
            touched.push(target.to_string());
        }
    }

    debug!(node = node_id, touched = touched.len(), "propagated input status");
    touched
}

/// One input that is not getting enough supply
#[derive(Debug, Clone)]
pub struct Shortfall {
    pub node_id: String,
    pub label: String,
    pub input_id: String,
    pub supplied: f64,
    pub demanded: f64,
}

/// Summary of the whole plan
#[derive(Debug)]
pub struct PlanSummary {
    pub factory_count: usize,
    pub connection_count: usize,
    pub shortfalls: Vec<Shortfall>,
    pub production: Vec<(String, f64)>,
    pub demand: Vec<(String, f64)>,
}

/// Aggregate scaled production and demand per item and list every unmet input
pub fn summarize(nodes: &[FactoryNode], edges: &[Edge]) -> PlanSummary {
    let mut production: BTreeMap<String, f64> = BTreeMap::new();
    let mut demand: BTreeMap<String, f64> = BTreeMap::new();
    let mut shortfalls = Vec::new();

    for node in nodes {
        let scale = f64::from(node.scale());
        for output in &node.factory_type().outputs {
            *production.entry(output.name.clone()).or_default() += output.rate * scale;
        }
        for supply in input_report(node, edges, nodes) {
            *demand.entry(supply.input_name.clone()).or_default() += supply.demanded;
            if !supply.satisfied() {
                shortfalls.push(Shortfall {
                    node_id: node.id.clone(),
                    label: node.data.label.clone(),
                    input_id: supply.input_id,
                    supplied: supply.supplied,
                    demanded: supply.demanded,
                });
            }
        }
    }

    PlanSummary {
        factory_count: nodes.len(),
        connection_count: edges.len(),
        shortfalls,
        production: production.into_iter().collect(),
        demand: demand.into_iter().collect(),
    }
}

/// Format one node with its ports the way the editor lays them out
pub fn format_node(node: &FactoryNode, edges: &[Edge], nodes: &[FactoryNode]) -> String {
    let mut output = String::new();
    let scale = f64::from(node.scale());

    output.push_str(&format!("{} [{}] {}x\n", node.data.label, node.id, node.scale()));
    output.push_str("  Inputs:\n");
    for supply in input_report(node, edges, nodes) {
        let mark = if supply.satisfied() { "ok" } else { "SHORT" };
        output.push_str(&format!(
            "    {:<20} {:>8.1}/m  supplied {:>8.1}/m  {}\n",
            supply.input_name, supply.demanded, supply.supplied, mark
        ));
    }
    output.push_str("  Outputs:\n");
    for o in &node.factory_type().outputs {
        output.push_str(&format!("    {:<20} {:>8.1}/m\n", o.name, o.rate * scale));
    }

    output
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Plan Summary ===")?;
        writeln!(
            f,
            "{} factories, {} connections",
            self.factory_count, self.connection_count
        )?;
        writeln!(f)?;

        writeln!(f, "Production:")?;
        for (name, rate) in &self.production {
            writeln!(f, "  {} @ {:.1}/m", name, rate)?;
        }
        writeln!(f)?;

        writeln!(f, "Demand:")?;
        for (name, rate) in &self.demand {
            writeln!(f, "  {} @ {:.1}/m", name, rate)?;
        }
        writeln!(f)?;

        if self.shortfalls.is_empty() {
            writeln!(f, "All inputs satisfied")?;
        } else {
            writeln!(f, "Unsatisfied inputs:")?;
            for s in &self.shortfalls {
                writeln!(
                    f,
                    "  {} [{}] {}: {:.1}/m of {:.1}/m",
                    s.label, s.node_id, s.input_id, s.supplied, s.demanded
                )?;
            }
        }

        Ok(())
    }
}
