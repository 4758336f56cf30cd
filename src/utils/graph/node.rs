//! Node identifiers for the block graphs.
//!
//! [`NodeId`] indexes nodes of any graph implementing the traits in
//! [`crate::utils::graph`]. Control-flow blocks use it directly as their id
//! ([`crate::analysis::cfg::BlockId`]).

use std::fmt;

/// A strongly-typed identifier for nodes within a directed graph.
///
/// `NodeId` wraps a `usize` index into the arena of the owning graph. Block arenas hand them out
/// sequentially starting from 0; after finalization a control-flow graph renumbers its blocks so
/// that `NodeId(0)` is the start block and ids follow a depth-first preorder.
///
/// # Examples
///
/// ```rust
/// use std::collections::HashMap;
/// use flowscope::utils::graph::NodeId;
///
/// let a = NodeId::new(0);
/// let b = NodeId::new(1);
/// assert!(a < b);
///
/// let mut data: HashMap<NodeId, i32> = HashMap::new();
/// data.insert(a, 42);
/// assert_eq!(data[&a], 42);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index of this node.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for usize {
    #[inline]
    fn from(node: NodeId) -> Self {
        node.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_ordering() {
        let mut nodes = vec![NodeId::new(3), NodeId::new(1), NodeId::new(2)];
        nodes.sort();
        assert_eq!(nodes, vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)]);
    }

    #[test]
    fn test_node_id_formatting() {
        assert_eq!(format!("{:?}", NodeId::new(7)), "NodeId(7)");
        assert_eq!(NodeId::new(7).to_string(), "n7");
    }

    #[test]
    fn test_node_id_conversions() {
        let node: NodeId = 12.into();
        let raw: usize = node.into();
        assert_eq!(raw, 12);
        assert_eq!(node.index(), 12);
    }
}
