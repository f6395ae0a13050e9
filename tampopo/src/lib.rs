//! Dependency ordering for small, named graphs.
//!
//! Used to lay out action pipelines where every step declares which steps have to
//! run before it. The ordering is deterministic: when several nodes are ready at
//! the same time, the one listed first in [`Graph::nodes`] wins.
use errors::SortError;
use std::collections::{BTreeSet, HashMap};
pub mod errors;

/// A type alias representing the edges of a directed graph, `(before, after)`.
pub type DAGAsAdjacencyList<Node> = Vec<(Node, Node)>;

/// A graph data structure used for topological sorting.
#[derive(Debug, Clone)]
pub struct Graph<Node> {
    /// Every node of the graph, in preference order
    pub nodes: Vec<Node>,
    /// Directed edges, `(a, b)` meaning `a` must come before `b`.
    pub edges: DAGAsAdjacencyList<Node>,
}

/// Kahn's algorithm with a stable tie-break.
///
/// Returns the nodes in an order where every edge `(a, b)` has `a` before `b`.
/// Among nodes without pending dependencies, the one with the lowest position in
/// `graph.nodes` is emitted first, so an unconstrained graph keeps its original
/// order.
///
/// # Example
/// ```
/// let nodes = vec!["build", "verify", "write"];
/// let edges = vec![("verify", "write"), ("build", "verify")];
/// let graph = tampopo::Graph { nodes, edges };
///
/// assert_eq!(tampopo::sort_graph(&graph), Ok(vec!["build", "verify", "write"]));
/// ```
pub fn sort_graph<Node: std::hash::Hash + Eq + Clone>(
    graph: &Graph<Node>,
) -> Result<Vec<Node>, SortError<Node>> {
    let position: HashMap<&Node, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node, i))
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); graph.nodes.len()];
    let mut in_degree: Vec<usize> = vec![0; graph.nodes.len()];

    for (src, dest) in &graph.edges {
        let Some(&from) = position.get(src) else {
            return Err(SortError::UnknownNode(src.clone()));
        };
        let Some(&to) = position.get(dest) else {
            return Err(SortError::UnknownNode(dest.clone()));
        };

        dependents[from].push(to);
        in_degree[to] += 1;
    }

    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(i, _)| i)
        .collect();

    let mut sorted: Vec<Node> = Vec::with_capacity(graph.nodes.len());

    while let Some(index) = ready.pop_first() {
        sorted.push(graph.nodes[index].clone());

        for &next in &dependents[index] {
            in_degree[next] -= 1;

            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if sorted.len() == graph.nodes.len() {
        Ok(sorted)
    } else {
        let stuck = in_degree
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(i, _)| graph.nodes[i].clone())
            .collect();

        Err(SortError::CycleDetected(stuck))
    }
}
