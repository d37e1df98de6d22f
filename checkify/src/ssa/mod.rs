//! Convert an OpenHypergraph to SSA form
use open_hypergraphs::array::vec::VecKind;
use open_hypergraphs::{lax, strict};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt::{self, Debug, Display};

/// A single static assignment of the form
/// `s₀, s₁, s₂, ... = op(t₀, t₁, ..., tn)`
/// where each `s_i`, `t_i` is a node of the term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SSA<O, A> {
    pub op: A,
    pub edge_id: lax::EdgeId,
    pub sources: Vec<(lax::NodeId, O)>, // source nodes and type labels
    pub targets: Vec<(lax::NodeId, O)>, // target nodes and type labels
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SSAError {
    /// The term has a cycle, so there is no order in which to evaluate its operations.
    Cycle,
}

/// A term split into boundary nodes and a sequence of layers of assignments.
/// Node ids of `sources`, `targets` and every [`SSA`] refer to the same (quotiented) term.
#[derive(Debug, Clone)]
pub struct Decomposition<O, A> {
    pub sources: Vec<(lax::NodeId, O)>,
    pub targets: Vec<(lax::NodeId, O)>,
    /// Operations in a layer depend only on operations in earlier layers.
    pub layers: Vec<Vec<SSA<O, A>>>,
}

impl<O, A> Decomposition<O, A> {
    /// All assignments, layer by layer.
    pub fn ops(&self) -> impl Iterator<Item = &SSA<O, A>> {
        self.layers.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decompose a term into layers of independent operations
pub fn parallel_ssa<O: Clone + PartialEq, A: Clone>(
    term: lax::OpenHypergraph<O, A>,
) -> Result<Decomposition<O, A>, SSAError> {
    let f: strict::OpenHypergraph<VecKind, O, A> = term.to_strict();

    // partial topological ordering on edges
    let (op_order, unvisited) = strict::layer::layered_operations(&f);
    if unvisited.0.contains(&1) {
        return Err(SSAError::Cycle);
    }

    let f = lax::OpenHypergraph::from_strict(f);
    let layers = op_order
        .iter()
        .filter(|layer| !layer.0.is_empty())
        .map(|layer| layer.0.iter().map(|edge_id| assignment(&f, *edge_id)).collect())
        .collect();
    Ok(decomposition(&f, layers))
}

/// Decompose a term into a total order of operations.
///
/// Among operations whose inputs are ready, the one added to the term first comes first, so for
/// terms built with the [`crate::category::lang`] builder this is the order in which operations
/// were written.
pub fn ssa<O: Clone + PartialEq, A: Clone>(
    term: lax::OpenHypergraph<O, A>,
) -> Result<Decomposition<O, A>, SSAError> {
    let f = lax::OpenHypergraph::from_strict(term.to_strict());
    let n_edges = f.hypergraph.edges.len();
    let n_nodes = f.hypergraph.nodes.len();

    // producers[n]: edges writing node n; consumers[n]: edges reading node n (with multiplicity)
    let mut producers = vec![Vec::new(); n_nodes];
    let mut consumers = vec![Vec::new(); n_nodes];
    for (edge_id, edge) in f.hypergraph.adjacency.iter().enumerate() {
        for node in &edge.targets {
            producers[node.0].push(edge_id);
        }
        for node in &edge.sources {
            consumers[node.0].push(edge_id);
        }
    }

    let mut pending: Vec<usize> = f
        .hypergraph
        .adjacency
        .iter()
        .map(|edge| edge.sources.iter().map(|n| producers[n.0].len()).sum())
        .collect();

    // Kahn's algorithm, breaking ties by smallest edge id
    let mut ready: BinaryHeap<Reverse<usize>> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(edge_id, _)| Reverse(edge_id))
        .collect();

    let mut order = Vec::with_capacity(n_edges);
    while let Some(Reverse(edge_id)) = ready.pop() {
        order.push(edge_id);
        for node in &f.hypergraph.adjacency[edge_id].targets {
            for consumer in &consumers[node.0] {
                pending[*consumer] -= 1;
                if pending[*consumer] == 0 {
                    ready.push(Reverse(*consumer));
                }
            }
        }
    }

    if order.len() != n_edges {
        return Err(SSAError::Cycle);
    }

    let layers = order
        .into_iter()
        .map(|edge_id| vec![assignment(&f, edge_id)])
        .collect();
    Ok(decomposition(&f, layers))
}

fn assignment<O: Clone, A: Clone>(f: &lax::OpenHypergraph<O, A>, edge_id: usize) -> SSA<O, A> {
    let lax::Hyperedge { sources, targets } = &f.hypergraph.adjacency[edge_id];
    SSA {
        op: f.hypergraph.edges[edge_id].clone(),
        edge_id: lax::EdgeId(edge_id),
        sources: label_nodes(f, sources),
        targets: label_nodes(f, targets),
    }
}

fn label_nodes<O: Clone, A>(
    f: &lax::OpenHypergraph<O, A>,
    nodes: &[lax::NodeId],
) -> Vec<(lax::NodeId, O)> {
    nodes
        .iter()
        .map(|id| (*id, f.hypergraph.nodes[id.0].clone()))
        .collect()
}

fn decomposition<O: Clone, A>(
    f: &lax::OpenHypergraph<O, A>,
    layers: Vec<Vec<SSA<O, A>>>,
) -> Decomposition<O, A> {
    Decomposition {
        sources: label_nodes(f, &f.sources),
        targets: label_nodes(f, &f.targets),
        layers,
    }
}

impl<O: Debug, A: Display> Display for SSA<O, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target_strs: Vec<String> = self
            .targets
            .iter()
            .map(|(node_id, _type)| format!("v{}", node_id.0))
            .collect();

        let source_strs: Vec<String> = self
            .sources
            .iter()
            .map(|(node_id, _type)| format!("v{}", node_id.0))
            .collect();

        write!(
            f,
            "{}:\t{} = {}({})",
            self.edge_id.0,
            target_strs.join(", "),
            self.op,
            source_strs.join(", ")
        )
    }
}

impl<O: Debug, A: Display> Display for Decomposition<O, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in self.ops() {
            writeln!(f, "{op}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
