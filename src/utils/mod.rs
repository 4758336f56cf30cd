//! Shared utilities: generic graph algorithms and Graphviz output.

mod dot;
pub mod graph;

pub use dot::escape_dot;
