//! Generic directed-graph infrastructure for the block graphs.
//!
//! - [`NodeId`] - Strongly-typed node identifier
//! - [`GraphBase`], [`Successors`], [`Predecessors`], [`RootedGraph`] - Abstraction traits the
//!   algorithms are written against
//! - [`algorithms`] - Traversal, dominator and dominance-frontier computation
//!
//! Both the normalization draft and the finished control-flow graph implement the traits, so
//! the algorithms never depend on a concrete graph type.

pub mod algorithms;
mod node;
pub(crate) mod traits;

pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};
