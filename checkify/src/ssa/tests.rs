use super::*;
use crate::category::core::{Literal, Object, Operation, ScalarOp, TensorOp};
use open_hypergraphs::lax::OpenHypergraph;
use test_log::test;

type Term = OpenHypergraph<Object, Operation>;

fn neg() -> Operation {
    Operation::Tensor(TensorOp::Map(ScalarOp::Neg))
}

fn add() -> Operation {
    Operation::Tensor(TensorOp::Map(ScalarOp::Add))
}

// Two independent negations followed by an add of their results.
fn diamond() -> Term {
    let mut graph = OpenHypergraph::empty();
    let x = graph.new_node(Object::Tensor);
    let y = graph.new_node(Object::Tensor);
    let nx = graph.new_node(Object::Tensor);
    let ny = graph.new_node(Object::Tensor);
    let z = graph.new_node(Object::Tensor);

    graph.new_edge(
        neg(),
        lax::Hyperedge {
            sources: vec![x],
            targets: vec![nx],
        },
    );
    graph.new_edge(
        neg(),
        lax::Hyperedge {
            sources: vec![y],
            targets: vec![ny],
        },
    );
    graph.new_edge(
        add(),
        lax::Hyperedge {
            sources: vec![nx, ny],
            targets: vec![z],
        },
    );

    graph.sources = vec![x, y];
    graph.targets = vec![z];
    graph
}

#[test]
fn test_parallel_ssa_layers() {
    let decomposition = parallel_ssa(diamond()).unwrap();
    log::debug!("{decomposition}");

    assert_eq!(decomposition.len(), 3);
    assert_eq!(decomposition.layers.len(), 2);
    assert_eq!(decomposition.layers[0].len(), 2);
    assert_eq!(decomposition.layers[1][0].op, add());
    assert_eq!(decomposition.sources.len(), 2);
    assert_eq!(decomposition.targets.len(), 1);
}

#[test]
fn test_program_order_breaks_ties_by_edge_id() {
    // Edge 0 depends on edge 2; edge 1 is independent.
    let mut graph: Term = OpenHypergraph::empty();
    let a = graph.new_node(Object::Tensor);
    let b = graph.new_node(Object::Tensor);
    let c = graph.new_node(Object::Tensor);

    graph.new_edge(
        neg(),
        lax::Hyperedge {
            sources: vec![a],
            targets: vec![b],
        },
    );
    graph.new_edge(
        Operation::Literal(Literal::F32(1.0)),
        lax::Hyperedge {
            sources: vec![],
            targets: vec![c],
        },
    );
    graph.new_edge(
        Operation::Literal(Literal::F32(2.0)),
        lax::Hyperedge {
            sources: vec![],
            targets: vec![a],
        },
    );
    graph.targets = vec![b, c];

    let decomposition = ssa(graph).unwrap();
    let order: Vec<usize> = decomposition.ops().map(|op| op.edge_id.0).collect();
    assert_eq!(order, vec![1, 2, 0]);
    assert!(decomposition.layers.iter().all(|layer| layer.len() == 1));
}

#[test]
fn test_program_order_is_topological() {
    let decomposition = ssa(diamond()).unwrap();
    let order: Vec<usize> = decomposition.ops().map(|op| op.edge_id.0).collect();
    assert_eq!(order, vec![0, 1, 2]);
}

#[test]
fn test_cycle_is_an_error() {
    let mut graph: Term = OpenHypergraph::empty();
    let a = graph.new_node(Object::Tensor);
    let b = graph.new_node(Object::Tensor);
    graph.new_edge(
        neg(),
        lax::Hyperedge {
            sources: vec![a],
            targets: vec![b],
        },
    );
    graph.new_edge(
        neg(),
        lax::Hyperedge {
            sources: vec![b],
            targets: vec![a],
        },
    );

    assert_eq!(ssa(graph.clone()).unwrap_err(), SSAError::Cycle);
    assert_eq!(parallel_ssa(graph).unwrap_err(), SSAError::Cycle);
}
