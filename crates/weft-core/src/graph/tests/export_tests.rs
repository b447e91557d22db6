use crate::graph::export::{render, ExportFormat, GraphSummary};
use crate::graph::plan::ExecutionPlan;
use crate::graph::{DepType, DependencyEdge, DependencyGraph};

fn sample() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    graph.add_node("load");
    graph.add_node("report");
    graph
        .add_edge(
            DependencyEdge::new("load", "report", DepType::Data).with_metadata("raw"),
        )
        .expect("edge");
    graph
}

#[test]
fn mermaid_contains_nodes_and_labeled_edges() {
    let out = render(&sample(), ExportFormat::Mermaid);
    assert!(out.starts_with("graph TD"));
    assert!(out.contains("load[\"load\"]"));
    assert!(out.contains("load -->|raw| report"));
}

#[test]
fn graphviz_is_a_digraph() {
    let out = render(&sample(), ExportFormat::Graphviz);
    assert!(out.starts_with("digraph pipeline {"));
    assert!(out.contains("\"load\" -> \"report\""));
    assert!(out.trim_end().ends_with('}'));
}

#[test]
fn text_lists_predecessors() {
    let out = render(&sample(), ExportFormat::Text);
    assert!(out.contains("load\n"));
    assert!(out.contains("report <- load"));
}

#[test]
fn format_parsing() {
    assert_eq!(ExportFormat::parse("mermaid"), Some(ExportFormat::Mermaid));
    assert_eq!(ExportFormat::parse("dot"), Some(ExportFormat::Graphviz));
    assert_eq!(ExportFormat::parse("TEXT"), Some(ExportFormat::Text));
    assert_eq!(ExportFormat::parse("png"), None);
}

#[test]
fn summary_reports_shape() {
    let graph = sample();
    let plan = ExecutionPlan::from_graph(&graph).expect("plan");
    let summary = GraphSummary::new(&graph, &plan);
    assert_eq!(summary.nodes, 2);
    assert_eq!(summary.edges, 1);
    assert_eq!(summary.layers, 2);
    let rendered = summary.render();
    assert!(rendered.contains("critical path: load -> report"));
}
