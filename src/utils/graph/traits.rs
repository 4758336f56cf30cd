//! Trait definitions for graph abstractions.
//!
//! Graph algorithms in [`crate::utils::graph::algorithms`] are written against these traits, so
//! the same dominator and traversal code runs over the block draft during normalization and over
//! the finished [`crate::analysis::cfg::Cfg`].
//!
//! - [`GraphBase`] - Core properties: node count and node iteration
//! - [`Successors`] - Forward edge traversal (outgoing edges)
//! - [`Predecessors`] - Backward edge traversal (incoming edges)
//! - [`RootedGraph`] - Graphs with a designated entry node (for dominator computation)
//!
//! Adjacency queries return iterators rather than collections. A node reached over several
//! parallel edges may be reported more than once; the algorithms tolerate duplicates.

use crate::utils::graph::NodeId;

/// Core graph properties.
pub trait GraphBase {
    /// Number of node slots; valid ids are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Iterates over all node ids.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Forward adjacency.
pub trait Successors: GraphBase {
    /// Nodes reachable over one outgoing edge of `node`.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Backward adjacency.
pub trait Predecessors: GraphBase {
    /// Nodes with an edge into `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// A graph with a designated entry node.
pub trait RootedGraph: Successors + Predecessors {
    /// The entry node.
    fn entry(&self) -> NodeId;
}

/// Minimal edge-list graph for algorithm tests.
#[cfg(test)]
pub(crate) struct TestGraph {
    node_count: usize,
    edges: Vec<(NodeId, NodeId)>,
    entry: NodeId,
}

#[cfg(test)]
impl TestGraph {
    pub(crate) fn new(node_count: usize, edges: &[(usize, usize)]) -> Self {
        TestGraph {
            node_count,
            edges: edges
                .iter()
                .map(|&(from, to)| (NodeId::new(from), NodeId::new(to)))
                .collect(),
            entry: NodeId::new(0),
        }
    }
}

#[cfg(test)]
impl GraphBase for TestGraph {
    fn node_count(&self) -> usize {
        self.node_count
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.node_count).map(NodeId::new)
    }
}

#[cfg(test)]
impl Successors for TestGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.edges
            .iter()
            .filter(move |(src, _)| *src == node)
            .map(|(_, dst)| *dst)
    }
}

#[cfg(test)]
impl Predecessors for TestGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.edges
            .iter()
            .filter(move |(_, dst)| *dst == node)
            .map(|(src, _)| *src)
    }
}

#[cfg(test)]
impl RootedGraph for TestGraph {
    fn entry(&self) -> NodeId {
        self.entry
    }
}
