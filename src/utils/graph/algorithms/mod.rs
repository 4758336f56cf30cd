//! Graph algorithms for program analysis.
//!
//! # Available Algorithms
//!
//! ## Traversal
//!
//! - [`dfs`] - Depth-first search traversal
//! - [`postorder`] - Postorder traversal
//! - [`reverse_postorder`] - Reverse postorder traversal (useful for data flow)
//! - [`reachable`] - Reachability from a start node
//!
//! ## Dominator Analysis
//!
//! - [`compute_dominators`] - Compute the dominator tree (Cooper–Harvey–Kennedy)
//! - [`compute_dominance_frontiers`] - Compute dominance frontiers for SSA
//! - [`DominatorTree`] - Result of dominator computation
//!
//! # Algorithm Selection
//!
//! | Algorithm | Time Complexity | Use Case |
//! |-----------|-----------------|----------|
//! | DFS | O(V + E) | Canonical block numbering, reachability |
//! | Reverse postorder | O(V + E) | Forward data flow, dominator fixpoint |
//! | Dominators | O(V · E) worst, near-linear in practice | SSA construction |
//! | Dominance frontiers | O(V + E + Σ DF) | Phi placement |

mod dominators;
mod traversal;

pub use dominators::{
    compute_dominance_frontiers, compute_dominators, DominatorIterator, DominatorTree,
};
pub use traversal::{dfs, postorder, reachable, reverse_postorder, DfsIterator};
