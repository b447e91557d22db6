use crate::graph::plan::ExecutionPlan;
use crate::graph::{DepType, DependencyEdge, DependencyGraph};

fn diamond() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for node in ["a", "b", "c", "d"] {
        graph.add_node(node);
    }
    graph
        .add_edge(DependencyEdge::new("a", "b", DepType::Data))
        .expect("edge");
    graph
        .add_edge(DependencyEdge::new("a", "c", DepType::Data))
        .expect("edge");
    graph
        .add_edge(DependencyEdge::new("b", "d", DepType::Explicit))
        .expect("edge");
    graph
        .add_edge(DependencyEdge::new("c", "d", DepType::Explicit))
        .expect("edge");
    graph
}

#[test]
fn diamond_layers() {
    let plan = ExecutionPlan::from_graph(&diamond()).expect("plan");
    let layers: Vec<Vec<String>> = plan.layers.iter().map(|l| l.nodes.clone()).collect();
    assert_eq!(
        layers,
        vec![
            vec!["a".to_string()],
            vec!["b".to_string(), "c".to_string()],
            vec!["d".to_string()],
        ]
    );
    assert_eq!(plan.depth(), 3);
    assert_eq!(plan.max_parallelism, 2);
}

#[test]
fn every_node_lands_in_exactly_one_layer() {
    let plan = ExecutionPlan::from_graph(&diamond()).expect("plan");
    assert_eq!(plan.node_count(), 4);
    for node in ["a", "b", "c", "d"] {
        assert!(plan.layer_of(node).is_some());
    }
}

#[test]
fn predecessors_always_live_in_earlier_layers() {
    let graph = diamond();
    let plan = ExecutionPlan::from_graph(&graph).expect("plan");
    for layer in &plan.layers {
        for node in &layer.nodes {
            for pred in graph.predecessors_of(node) {
                let pred_layer = plan.layer_of(pred).expect("pred layer");
                assert!(pred_layer < layer.index);
            }
        }
    }
}

#[test]
fn critical_path_is_the_longest_chain() {
    let plan = ExecutionPlan::from_graph(&diamond()).expect("plan");
    assert_eq!(plan.critical_path.len(), 3);
    assert_eq!(plan.critical_path.first().map(|s| s.as_str()), Some("a"));
    assert_eq!(plan.critical_path.last().map(|s| s.as_str()), Some("d"));
}

#[test]
fn independent_nodes_share_one_layer() {
    let mut graph = DependencyGraph::new();
    graph.add_node("x");
    graph.add_node("y");
    let plan = ExecutionPlan::from_graph(&graph).expect("plan");
    assert_eq!(plan.depth(), 1);
    assert_eq!(plan.max_parallelism, 2);
    assert_eq!(plan.critical_path.len(), 1);
}

#[test]
fn cyclic_graph_fails_to_plan() {
    let mut graph = DependencyGraph::new();
    graph.add_node("a");
    graph.add_node("b");
    graph
        .add_edge(DependencyEdge::new("a", "b", DepType::Data))
        .expect("edge");
    graph
        .add_edge(DependencyEdge::new("b", "a", DepType::Data))
        .expect("edge");
    assert!(ExecutionPlan::from_graph(&graph).is_err());
}
