//! Dominator tree and dominance frontier computation.
//!
//! This module provides dominator computation for rooted directed graphs. The dominator tree
//! drives SSA construction (phi placement at dominance frontiers, renaming in dominator-tree
//! order) and the verification of SSA form.
//!
//! # Theory
//!
//! A node `d` **dominates** a node `n` if every path from the entry node to `n`
//! must pass through `d`. The **immediate dominator** of `n` (idom(n)) is the
//! unique node that strictly dominates `n` but does not strictly dominate any
//! other dominator of `n`.
//!
//! The dominator tree is formed by making each node's immediate dominator its
//! parent. The entry node is the root (it has no dominator).
//!
//! # Algorithm
//!
//! Immediate dominators are computed with the iterative algorithm of Cooper, Harvey and
//! Kennedy ("A Simple, Fast Dominance Algorithm", 2001): nodes are numbered in post-order,
//! and in reverse post-order each node's immediate dominator is recomputed as the common
//! ancestor of its already-processed predecessors until nothing changes. For the shallow,
//! mostly reducible graphs produced from structured source this converges in two or three
//! passes.
//!
//! Dominance frontiers follow the formulation of Cytron et al. (1991) as restated by Cooper,
//! Harvey and Kennedy: for every join node, walk up from each predecessor to the join's
//! immediate dominator.

use std::collections::HashSet;

use crate::utils::graph::{
    algorithms::traversal::reverse_postorder, NodeId, Predecessors, Successors,
};

/// Dominator tree of a rooted graph.
///
/// Nodes not reachable from the entry are not part of the tree: they have no immediate
/// dominator and dominate nothing but themselves.
///
/// # Examples
///
/// ```rust,ignore
/// let dom_tree = compute_dominators(&cfg, cfg.entry());
///
/// // entry dominates everything reachable
/// assert!(dom_tree.dominates(cfg.entry(), exit));
/// // a is the immediate dominator of b
/// assert_eq!(dom_tree.immediate_dominator(b), Some(a));
/// ```
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// The entry (root) node of the dominator tree
    entry: NodeId,
    /// Immediate dominator for each node; the entry maps to itself, unreachable nodes to `None`
    idom: Vec<Option<NodeId>>,
    /// Dominator-tree children of each node, in ascending id order
    children: Vec<Vec<NodeId>>,
}

impl DominatorTree {
    /// Returns the entry (root) node of the dominator tree.
    #[inline]
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the immediate dominator of a node, or `None` for the entry node and for
    /// unreachable nodes.
    #[inline]
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        if node == self.entry {
            None
        } else {
            self.idom.get(node.index()).copied().flatten()
        }
    }

    /// Returns `true` if `node` is reachable from the entry.
    #[inline]
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.idom.get(node.index()).is_some_and(Option::is_some)
    }

    /// Nodes that are not reachable from the entry, in ascending order.
    #[must_use]
    pub fn unreachable(&self) -> Vec<NodeId> {
        (0..self.idom.len())
            .map(NodeId::new)
            .filter(|node| !self.is_reachable(*node))
            .collect()
    }

    /// Checks if node `a` dominates node `b`.
    ///
    /// A node dominates itself. The entry node dominates all reachable nodes.
    ///
    /// # Complexity
    ///
    /// O(depth) where depth is the depth of `b` in the dominator tree.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        self.dominators(b).any(|dominator| dominator == a)
    }

    /// Checks if node `a` strictly dominates node `b`.
    ///
    /// Strict dominance excludes self-dominance: a strictly dominates b iff
    /// a dominates b and a ≠ b.
    #[inline]
    #[must_use]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns an iterator over all dominators of a node, from the node itself
    /// up to (and including) the entry node.
    #[must_use]
    pub fn dominators(&self, node: NodeId) -> DominatorIterator<'_> {
        DominatorIterator {
            tree: self,
            current: Some(node),
        }
    }

    /// Returns the depth of a node in the dominator tree.
    ///
    /// The entry node has depth 0.
    #[must_use]
    pub fn depth(&self, node: NodeId) -> usize {
        self.dominators(node).count().saturating_sub(1)
    }

    /// Returns the dominator-tree children of `node`.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.children.get(node.index()).map_or(&[], Vec::as_slice)
    }

    /// Returns the number of nodes covered by this tree.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.idom.len()
    }
}

/// Iterator over the dominator chain of a node.
pub struct DominatorIterator<'a> {
    tree: &'a DominatorTree,
    current: Option<NodeId>,
}

impl Iterator for DominatorIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = self.tree.immediate_dominator(node);
        Some(node)
    }
}

/// Computes the dominator tree of `graph` rooted at `entry`.
///
/// Predecessors that are not reachable from `entry` are ignored. If `entry` is out of bounds
/// every node is reported unreachable.
///
/// # Complexity
///
/// O(N · E) worst case, near-linear on structured control flow.
pub fn compute_dominators<G>(graph: &G, entry: NodeId) -> DominatorTree
where
    G: Predecessors + Successors,
{
    let n = graph.node_count();
    let mut idom: Vec<Option<NodeId>> = vec![None; n];

    if entry.index() < n {
        let rpo = reverse_postorder(graph, entry);

        // rpo position 0 is the entry; post-order number = n_reachable - 1 - rpo position
        let mut po_number = vec![usize::MAX; n];
        for (position, node) in rpo.iter().enumerate() {
            po_number[node.index()] = rpo.len() - 1 - position;
        }

        idom[entry.index()] = Some(entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &node in rpo.iter().skip(1) {
                let mut new_idom: Option<NodeId> = None;
                for pred in graph.predecessors(node) {
                    if idom[pred.index()].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, &po_number, entry, pred, current),
                    });
                }
                if new_idom.is_some() && idom[node.index()] != new_idom {
                    idom[node.index()] = new_idom;
                    changed = true;
                }
            }
        }
    }

    let mut children = vec![Vec::new(); n];
    for (index, dominator) in idom.iter().enumerate() {
        if let Some(dominator) = dominator {
            if index != entry.index() {
                children[dominator.index()].push(NodeId::new(index));
            }
        }
    }

    DominatorTree {
        entry,
        idom,
        children,
    }
}

/// Walks both fingers up the partial dominator tree until they meet.
fn intersect(
    idom: &[Option<NodeId>],
    po_number: &[usize],
    entry: NodeId,
    mut a: NodeId,
    mut b: NodeId,
) -> NodeId {
    while a != b {
        while po_number[a.index()] < po_number[b.index()] {
            a = idom[a.index()].unwrap_or(entry);
        }
        while po_number[b.index()] < po_number[a.index()] {
            b = idom[b.index()].unwrap_or(entry);
        }
    }
    a
}

/// Computes dominance frontiers for all nodes in a graph.
///
/// The dominance frontier of a node `n` is the set of all nodes `m` such that:
/// - `n` dominates a predecessor of `m`, but
/// - `n` does not strictly dominate `m`
///
/// Dominance frontiers are essential for placing φ-functions in SSA construction.
///
/// # Returns
///
/// A vector where `result[i]` contains the dominance frontier of node `i`. Unreachable nodes
/// have empty frontiers and never appear in one.
///
/// # Complexity
///
/// - Time: O(V + E) plus the size of the frontiers
/// - Space: O(V²) worst case for the frontiers
pub fn compute_dominance_frontiers<G>(graph: &G, dom_tree: &DominatorTree) -> Vec<HashSet<NodeId>>
where
    G: Predecessors,
{
    let n = graph.node_count();
    let mut frontiers: Vec<HashSet<NodeId>> = vec![HashSet::new(); n];

    for node in graph.node_ids() {
        if !dom_tree.is_reachable(node) {
            continue;
        }

        let mut preds: Vec<NodeId> = graph
            .predecessors(node)
            .filter(|pred| dom_tree.is_reachable(*pred))
            .collect();
        preds.sort_unstable();
        preds.dedup();
        if preds.len() < 2 {
            continue; // Not a join point
        }

        let idom_node = dom_tree.immediate_dominator(node);
        for pred in preds {
            let mut runner = Some(pred);
            while let Some(current) = runner {
                if Some(current) == idom_node {
                    break;
                }
                frontiers[current.index()].insert(node);
                runner = dom_tree.immediate_dominator(current);
            }
        }
    }

    frontiers
}
