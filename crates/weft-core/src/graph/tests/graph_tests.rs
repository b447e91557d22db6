use std::collections::HashSet;

use crate::graph::error::GraphSystemError;
use crate::graph::{DepType, DependencyEdge, DependencyGraph};

fn linear_graph() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    graph.add_node("load");
    graph.add_node("clean");
    graph.add_node("report");
    graph
        .add_edge(DependencyEdge::new("load", "clean", DepType::Data))
        .expect("edge");
    graph
        .add_edge(DependencyEdge::new("clean", "report", DepType::Data))
        .expect("edge");
    graph
}

#[test]
fn adjacency_matches_edges() {
    let graph = linear_graph();
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.predecessors_of("clean"), ["load".to_string()]);
    assert_eq!(graph.successors_of("clean"), ["report".to_string()]);
    assert!(graph.predecessors_of("load").is_empty());
}

#[test]
fn duplicate_edges_collapse() {
    let mut graph = linear_graph();
    graph
        .add_edge(DependencyEdge::new("load", "clean", DepType::Data))
        .expect("edge");
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.predecessors_of("clean").len(), 1);
}

#[test]
fn edges_require_known_endpoints() {
    let mut graph = DependencyGraph::new();
    graph.add_node("load");
    match graph.add_edge(DependencyEdge::new("load", "ghost", DepType::Explicit)) {
        Err(GraphSystemError::MissingEndpoint { to, .. }) => assert_eq!(to, "ghost"),
        other => panic!("expected MissingEndpoint, got {:?}", other),
    }
}

#[test]
fn topological_sort_respects_every_edge() {
    let graph = linear_graph();
    let order = graph.topological_sort().expect("sort");
    assert_eq!(order, ["load", "clean", "report"]);
}

#[test]
fn cycle_is_reported_with_a_real_path() {
    let mut graph = DependencyGraph::new();
    graph.add_node("a");
    graph.add_node("b");
    graph
        .add_edge(DependencyEdge::new("a", "b", DepType::Explicit))
        .expect("edge");
    graph
        .add_edge(DependencyEdge::new("b", "a", DepType::Explicit))
        .expect("edge");

    match graph.topological_sort() {
        Err(GraphSystemError::CycleDetected { cycle_path }) => {
            // The path closes on itself and touches both nodes.
            assert!(cycle_path.len() >= 3);
            assert_eq!(cycle_path.first(), cycle_path.last());
            let members: HashSet<&str> = cycle_path.iter().map(|s| s.as_str()).collect();
            assert!(members.contains("a"));
            assert!(members.contains("b"));
        }
        other => panic!("expected CycleDetected, got {:?}", other),
    }
    assert!(graph.validate().is_err());
}

#[test]
fn descendants_cover_transitive_successors() {
    let graph = linear_graph();
    let seeds: HashSet<String> = ["load".to_string()].into_iter().collect();
    let descendants = graph.descendants_of(&seeds);
    assert!(descendants.contains("clean"));
    assert!(descendants.contains("report"));
    assert!(!descendants.contains("load"));
}

#[test]
fn validate_accepts_acyclic_graphs() {
    assert!(linear_graph().validate().is_ok());
}
