//! Statement graph: one node per statement, wired by control flow.
//!
//! The [`StatementGraphBuilder`] walks a [`crate::syntax::FunctionBody`] and links its statements
//! through `next`, true/false and case edges. Compound statements are expanded into conditional,
//! switch and try nodes plus placeholder joints ([`PlaceholderKind`]) that give every construct a
//! single entry and exit while it is being built. Placeholders carry no code; the partitioner
//! splices them out before cutting blocks.
//!
//! Each node records its lexical scope id and the innermost try region part ([`RegionTag`])
//! enclosing it.
//!
//! [`RegionTag`]: crate::analysis::cfg::RegionTag

mod builder;
mod graph;
mod node;

pub use builder::StatementGraphBuilder;
pub use graph::{StatementGraph, StmtRegion};
pub use node::{
    BranchTest, CaseTarget, LoopRole, NodeKind, PlaceholderKind, PlainStmt, Slot, StatementNode,
    StmtId,
};

pub(crate) use graph::remove_one;
