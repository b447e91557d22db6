//! Layered execution planning.
//!
//! Layer 0 holds every node without predecessors; removing a layer exposes
//! the next one. All nodes in a layer are mutually independent given all
//! earlier layers and safe to schedule in parallel. Layer-by-layer
//! synchronization trades some parallelism for predictable progress
//! reporting; the critical path is reported so users can see when layering
//! under-parallelizes.
use std::collections::HashMap;

use serde::Serialize;

use crate::graph::error::GraphSystemError;
use crate::graph::DependencyGraph;

/// One set of mutually independent step names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionLayer {
    pub index: usize,
    pub nodes: Vec<String>,
}

/// The ordered layers plus critical-path analysis
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub layers: Vec<ExecutionLayer>,
    /// The longest source-to-sink node chain
    pub critical_path: Vec<String>,
    /// Size of the widest layer
    pub max_parallelism: usize,
}

impl ExecutionPlan {
    /// Build the plan from a validated graph.
    ///
    /// Layering is Kahn's algorithm run wave by wave; a shortfall against the
    /// node count means a cycle.
    pub fn from_graph(graph: &DependencyGraph) -> std::result::Result<Self, GraphSystemError> {
        let mut remaining: HashMap<&str, usize> = graph
            .nodes()
            .iter()
            .map(|n| (n.as_str(), graph.predecessors_of(n).len()))
            .collect();

        let mut layers = Vec::new();
        let mut placed = 0usize;

        let mut current: Vec<&str> = graph
            .nodes()
            .iter()
            .filter(|n| remaining[n.as_str()] == 0)
            .map(|n| n.as_str())
            .collect();

        while !current.is_empty() {
            placed += current.len();
            let mut next = Vec::new();
            for node in &current {
                for succ in graph.successors_of(node) {
                    if let Some(degree) = remaining.get_mut(succ.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(succ.as_str());
                        }
                    }
                }
            }
            layers.push(ExecutionLayer {
                index: layers.len(),
                nodes: current.iter().map(|s| s.to_string()).collect(),
            });
            // Layer membership order follows the graph's node order
            // (alphabetical by step name); siblings carry no ordering
            // guarantee beyond determinism.
            next.sort_by_key(|n| graph.nodes().iter().position(|g| g == n));
            current = next;
        }

        if placed < graph.node_count() {
            return Err(graph
                .topological_sort()
                .err()
                .unwrap_or(GraphSystemError::CycleDetected { cycle_path: vec![] }));
        }

        let critical_path = critical_path(graph, &layers);
        let max_parallelism = layers.iter().map(|l| l.nodes.len()).max().unwrap_or(0);

        Ok(Self {
            layers,
            critical_path,
            max_parallelism,
        })
    }

    /// Number of layers; the lower bound on sequential waves
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Total node count across all layers
    pub fn node_count(&self) -> usize {
        self.layers.iter().map(|l| l.nodes.len()).sum()
    }

    /// The layer index a node lives in
    pub fn layer_of(&self, node: &str) -> Option<usize> {
        self.layers
            .iter()
            .find(|l| l.nodes.iter().any(|n| n == node))
            .map(|l| l.index)
    }
}

/// Longest chain through the DAG, computed over the layered order so every
/// predecessor is settled before its successors.
fn critical_path(graph: &DependencyGraph, layers: &[ExecutionLayer]) -> Vec<String> {
    let mut depth: HashMap<&str, usize> = HashMap::new();
    let mut parent: HashMap<&str, &str> = HashMap::new();

    for layer in layers {
        for node in &layer.nodes {
            let mut best = 0usize;
            let mut best_parent: Option<&str> = None;
            for pred in graph.predecessors_of(node) {
                let d = depth.get(pred.as_str()).copied().unwrap_or(0);
                if d + 1 > best {
                    best = d + 1;
                    best_parent = Some(pred.as_str());
                }
            }
            depth.insert(node.as_str(), best);
            if let Some(p) = best_parent {
                parent.insert(node.as_str(), p);
            }
        }
    }

    let Some((mut node, _)) = depth.iter().max_by_key(|(node, d)| {
        // Deepest chain; ties go to the earliest node in graph order.
        (**d, std::cmp::Reverse(graph.nodes().iter().position(|g| g == **node)))
    }) else {
        return Vec::new();
    };

    let mut path = vec![node.to_string()];
    while let Some(p) = parent.get(node) {
        path.push(p.to_string());
        node = p;
    }
    path.reverse();
    path
}
