//! # Weft Core Dependency Graph
//!
//! This module builds a typed DAG from declarative step configurations and
//! turns it into an execution plan.
//!
//! ## Core Concepts & Components:
//!
//! - **[`DependencyGraph`]**: Nodes (step names), typed edges, and adjacency.
//!   Validates acyclicity and produces a Kahn topological order.
//! - **[`DependencyEdge`] / [`DepType`]**: A directed arc between two steps,
//!   tagged with where it came from (data reference, explicit `depends_on`,
//!   resource, temporal).
//! - **[`ExecutionPlan`](plan::ExecutionPlan)**: Layered grouping of the
//!   nodes; every node in a layer is independent given all earlier layers.
//!   Carries the critical path and the maximum layer width.
//! - **[`DependencySource`](source::DependencySource)**: Pluggable extractors
//!   that inspect step specs and yield inbound edges.
//! - **Exporters** ([`export`]): read-only Mermaid / GraphViz / text
//!   renderings and a summary.
pub mod error;
pub mod export;
pub mod plan;
pub mod source;

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::graph::error::GraphSystemError;

/// Where a dependency edge came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DepType {
    /// A parameter references an upstream output
    Data,
    /// Listed in `depends_on`
    Explicit,
    /// Shared-resource ordering
    Resource,
    /// Pure temporal ordering
    Temporal,
}

/// A directed arc between two step names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub dep_type: DepType,
    /// Source-specific detail, e.g. the referenced output name
    pub metadata: Option<String>,
}

impl DependencyEdge {
    pub fn new(from: &str, to: &str, dep_type: DepType) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            dep_type,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: &str) -> Self {
        self.metadata = Some(metadata.to_string());
        self
    }
}

/// Dependency graph over step names.
///
/// Invariants: no cycles (checked by [`validate`](Self::validate) and the
/// sort), every edge endpoint exists in the node set, adjacency is consistent
/// with the edge list.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Node names in insertion order
    nodes: Vec<String>,
    node_set: HashSet<String>,
    edges: Vec<DependencyEdge>,
    /// to -> froms
    preds: HashMap<String, Vec<String>>,
    /// from -> tos
    succs: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; adding a known name again is a no-op
    pub fn add_node(&mut self, name: &str) {
        if self.node_set.insert(name.to_string()) {
            self.nodes.push(name.to_string());
        }
    }

    /// Add an edge. Both endpoints must already be nodes. Exact duplicate
    /// edges are dropped.
    pub fn add_edge(&mut self, edge: DependencyEdge) -> std::result::Result<(), GraphSystemError> {
        if !self.node_set.contains(&edge.from) || !self.node_set.contains(&edge.to) {
            return Err(GraphSystemError::MissingEndpoint {
                from: edge.from,
                to: edge.to,
            });
        }
        if self.edges.contains(&edge) {
            return Ok(());
        }
        let preds = self.preds.entry(edge.to.clone()).or_default();
        if !preds.contains(&edge.from) {
            preds.push(edge.from.clone());
        }
        let succs = self.succs.entry(edge.from.clone()).or_default();
        if !succs.contains(&edge.to) {
            succs.push(edge.to.clone());
        }
        self.edges.push(edge);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_set.contains(name)
    }

    /// Node names in insertion order
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Direct predecessors of a node
    pub fn predecessors_of(&self, name: &str) -> &[String] {
        self.preds.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Direct successors of a node
    pub fn successors_of(&self, name: &str) -> &[String] {
        self.succs.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// All transitive successors of the given seed nodes (excluding seeds
    /// unless reachable from another seed). Used for soft-fail skip
    /// propagation and resume planning.
    pub fn descendants_of(&self, seeds: &HashSet<String>) -> HashSet<String> {
        let mut out = HashSet::new();
        let mut queue: VecDeque<&str> = seeds.iter().map(|s| s.as_str()).collect();
        while let Some(node) = queue.pop_front() {
            for succ in self.successors_of(node) {
                if out.insert(succ.clone()) {
                    queue.push_back(succ);
                }
            }
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Kahn's algorithm. Nodes with equal standing come out in insertion
    /// order, so the result is deterministic for a given configuration.
    pub fn topological_sort(&self) -> std::result::Result<Vec<String>, GraphSystemError> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.predecessors_of(n).len()))
            .collect();

        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .filter(|n| in_degree[n.as_str()] == 0)
            .map(|n| n.as_str())
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = queue.pop_front() {
            order.push(node.to_string());
            for succ in self.successors_of(node) {
                if let Some(degree) = in_degree.get_mut(succ.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(succ);
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            return Err(GraphSystemError::CycleDetected {
                cycle_path: self.find_cycle_path().unwrap_or_default(),
            });
        }
        Ok(order)
    }

    /// Cycles make Kahn's algorithm come up short; DFS back-traversal finds
    /// one concrete cycle path for the error report.
    fn find_cycle_path(&self) -> Option<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: HashSet<&str> = HashSet::new();
        let mut path: Vec<&str> = Vec::new();

        for node in &self.nodes {
            if !visited.contains(node.as_str()) {
                if let Some(cycle) =
                    self.cycle_dfs(node.as_str(), &mut visited, &mut stack, &mut path)
                {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn cycle_dfs<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        stack.insert(node);
        path.push(node);

        for succ in self.successors_of(node) {
            let succ = succ.as_str();
            if stack.contains(succ) {
                // Trim the DFS path down to the actual cycle and close it.
                let start = path.iter().position(|n| *n == succ).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(succ.to_string());
                return Some(cycle);
            }
            if !visited.contains(succ) {
                if let Some(cycle) = self.cycle_dfs(succ, visited, stack, path) {
                    return Some(cycle);
                }
            }
        }

        path.pop();
        stack.remove(node);
        None
    }

    /// Check acyclicity without producing an order
    pub fn validate(&self) -> std::result::Result<(), GraphSystemError> {
        if let Some(cycle_path) = self.find_cycle_path() {
            return Err(GraphSystemError::CycleDetected { cycle_path });
        }
        Ok(())
    }
}

// Re-export important types
pub use plan::{ExecutionLayer, ExecutionPlan};
pub use source::{DataDependencySource, DependencySource, ExplicitDependencySource};

// Test module declaration
#[cfg(test)]
mod tests;
