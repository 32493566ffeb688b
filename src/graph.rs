//! A generic directed graph over arbitrary node payloads, with strongly
//! connected components via Tarjan's algorithm.
//!
//! Grounded on the `petgraph`-based IR graph pattern: build a `DiGraph`,
//! derive SCCs once via `tarjan_scc`, and expose a meta-graph over those
//! components.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Dfs};

use crate::error::{invariant, Result};

/// A directed graph over `size` nodes `0..size`, built from an edge
/// description. `invert` swaps every edge's direction at construction time.
pub struct Graph<T> {
    nodes: Vec<T>,
    inner: DiGraph<(), ()>,
}

impl<T> Graph<T> {
    pub fn new(nodes: Vec<T>, successors: impl Fn(usize) -> Vec<usize>, invert: bool) -> Self {
        let mut inner = DiGraph::<(), ()>::new();
        let indices: Vec<NodeIndex> = (0..nodes.len()).map(|_| inner.add_node(())).collect();
        for (i, idx) in indices.iter().enumerate() {
            for succ in successors(i) {
                if invert {
                    inner.add_edge(indices[succ], *idx, ());
                } else {
                    inner.add_edge(*idx, indices[succ], ());
                }
            }
        }
        Self { nodes, inner }
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[T] {
        &self.nodes
    }

    pub fn node(&self, i: usize) -> &T {
        &self.nodes[i]
    }

    /// Nodes with in-degree 0, in node-index order.
    pub fn find_roots(&self) -> Vec<usize> {
        (0..self.size())
            .filter(|&i| self.inner.neighbors_directed(NodeIndex::new(i), petgraph::Direction::Incoming).next().is_none())
            .collect()
    }

    pub fn successors(&self, i: usize) -> Vec<usize> {
        self.inner.neighbors(NodeIndex::new(i)).map(|n| n.index()).collect()
    }

    /// Depth-first traversal from `root`, calling `visit` in either pre- or
    /// post-order.
    pub fn dfs_traversal(&self, root: usize, post_order: bool, mut visit: impl FnMut(usize)) {
        if post_order {
            let mut visited = std::collections::BTreeSet::new();
            self.dfs_post(root, &mut visited, &mut visit);
        } else {
            let mut dfs = Dfs::new(&self.inner, NodeIndex::new(root));
            while let Some(n) = dfs.next(&self.inner) {
                visit(n.index());
            }
        }
    }

    fn dfs_post(&self, node: usize, visited: &mut std::collections::BTreeSet<usize>, visit: &mut impl FnMut(usize)) {
        if !visited.insert(node) {
            return;
        }
        for succ in self.successors(node) {
            self.dfs_post(succ, visited, visit);
        }
        visit(node);
    }

    pub fn bfs_from(&self, root: usize) -> Vec<usize> {
        let mut bfs = Bfs::new(&self.inner, NodeIndex::new(root));
        let mut order = vec![];
        while let Some(n) = bfs.next(&self.inner) {
            order.push(n.index());
        }
        order
    }

    /// Strongly connected components, returned as a meta-graph whose nodes
    /// are the (node-index) members of each component and whose edges
    /// connect distinct components that have an edge between their members.
    ///
    /// Postcondition: the total member count across all SCC nodes equals
    /// `self.size()`.
    pub fn strongly_connected_components(&self) -> Result<Graph<Vec<usize>>> {
        let sccs = petgraph::algo::tarjan_scc(&self.inner);
        let components: Vec<Vec<usize>> = sccs.into_iter().map(|c| c.into_iter().map(|n| n.index()).collect()).collect();

        let total: usize = components.iter().map(|c| c.len()).sum();
        invariant(total == self.size(), "SCC decomposition lost or duplicated nodes")?;

        let mut owner = vec![0usize; self.size()];
        for (ci, members) in components.iter().enumerate() {
            for &m in members {
                owner[m] = ci;
            }
        }

        let members_by_component = components.clone();
        let successors = move |ci: usize| -> Vec<usize> {
            let mut out: std::collections::BTreeSet<usize> = std::collections::BTreeSet::new();
            for &m in &members_by_component[ci] {
                for s in self.successors(m) {
                    let target = owner[s];
                    if target != ci {
                        out.insert(target);
                    }
                }
            }
            out.into_iter().collect()
        };

        Ok(Graph::new(components, successors, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roots_are_nodes_with_no_incoming_edges() {
        // 0 -> 1 -> 2, 0 -> 2
        let graph = Graph::new(vec!['a', 'b', 'c'], |i| match i {
            0 => vec![1, 2],
            1 => vec![2],
            _ => vec![],
        }, false);
        assert_eq!(graph.find_roots(), vec![0]);
    }

    #[test]
    fn scc_preserves_node_count() {
        // a 3-cycle: 0 -> 1 -> 2 -> 0
        let graph = Graph::new(vec!['a', 'b', 'c'], |i| vec![(i + 1) % 3], false);
        let sccs = graph.strongly_connected_components().unwrap();
        let total: usize = sccs.nodes().iter().map(|c| c.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn scc_splits_independent_nodes() {
        let graph = Graph::new(vec!['a', 'b'], |_| vec![], false);
        let sccs = graph.strongly_connected_components().unwrap();
        assert_eq!(sccs.size(), 2);
    }
}
