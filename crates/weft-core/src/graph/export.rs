//! Graph exporters: pure read-only transforms to Mermaid, GraphViz dot, and
//! plain text, plus a summary of the plan shape.
use serde::Serialize;

use crate::graph::plan::ExecutionPlan;
use crate::graph::{DepType, DependencyGraph};

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Mermaid,
    Graphviz,
    Text,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "mermaid" => Some(ExportFormat::Mermaid),
            "graphviz" | "dot" => Some(ExportFormat::Graphviz),
            "text" => Some(ExportFormat::Text),
            _ => None,
        }
    }
}

/// Render the graph in the requested format
pub fn render(graph: &DependencyGraph, format: ExportFormat) -> String {
    match format {
        ExportFormat::Mermaid => to_mermaid(graph),
        ExportFormat::Graphviz => to_graphviz(graph),
        ExportFormat::Text => to_text(graph),
    }
}

fn edge_label(dep_type: DepType) -> &'static str {
    match dep_type {
        DepType::Data => "data",
        DepType::Explicit => "explicit",
        DepType::Resource => "resource",
        DepType::Temporal => "temporal",
    }
}

pub fn to_mermaid(graph: &DependencyGraph) -> String {
    let mut out = String::from("graph TD\n");
    for node in graph.nodes() {
        out.push_str(&format!("    {}[\"{}\"]\n", node, node));
    }
    for edge in graph.edges() {
        match edge.dep_type {
            DepType::Data => {
                let label = edge.metadata.as_deref().unwrap_or("data");
                out.push_str(&format!("    {} -->|{}| {}\n", edge.from, label, edge.to));
            }
            other => {
                out.push_str(&format!(
                    "    {} -.->|{}| {}\n",
                    edge.from,
                    edge_label(other),
                    edge.to
                ));
            }
        }
    }
    out
}

pub fn to_graphviz(graph: &DependencyGraph) -> String {
    let mut out = String::from("digraph pipeline {\n    rankdir=TB;\n");
    for node in graph.nodes() {
        out.push_str(&format!("    \"{}\" [shape=box];\n", node));
    }
    for edge in graph.edges() {
        let style = match edge.dep_type {
            DepType::Data => "solid",
            _ => "dashed",
        };
        out.push_str(&format!(
            "    \"{}\" -> \"{}\" [label=\"{}\", style={}];\n",
            edge.from,
            edge.to,
            edge_label(edge.dep_type),
            style
        ));
    }
    out.push_str("}\n");
    out
}

pub fn to_text(graph: &DependencyGraph) -> String {
    let mut out = String::new();
    for node in graph.nodes() {
        let preds = graph.predecessors_of(node);
        if preds.is_empty() {
            out.push_str(&format!("{}\n", node));
        } else {
            out.push_str(&format!("{} <- {}\n", node, preds.join(", ")));
        }
    }
    out
}

/// Shape summary of a graph and its plan
#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub layers: usize,
    pub max_parallelism: usize,
    pub critical_path: Vec<String>,
}

impl GraphSummary {
    pub fn new(graph: &DependencyGraph, plan: &ExecutionPlan) -> Self {
        Self {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            layers: plan.depth(),
            max_parallelism: plan.max_parallelism,
            critical_path: plan.critical_path.clone(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "nodes: {}\nedges: {}\nlayers: {}\nmax parallelism: {}\ncritical path: {}\n",
            self.nodes,
            self.edges,
            self.layers,
            self.max_parallelism,
            self.critical_path.join(" -> ")
        )
    }
}
