//! Graph construction and analysis for function bodies.
//!
//! This module turns a [`crate::syntax::FunctionBody`] into a normalized control flow graph in
//! SSA form. It builds upon the generic graph infrastructure in [`crate::utils::graph`] for
//! traversal and dominance.
//!
//! # Architecture
//!
//! The pipeline is a chain of stages, each with its own representation:
//!
//! - [`stmtgraph`] - Statement graph with structural placeholder and try nodes
//! - [`partition`] - Splicing and greedy grouping of statement nodes into builder blocks
//! - [`cfg`] - Lowered blocks: the mutable draft and the finished [`Cfg`]
//! - [`normalize`] - Loop, switch, conditional-operator and try/finally rewrites of the draft
//! - [`ssa`] - Phi placement, renaming and trivial phi pruning
//!
//! ```text
//! FunctionBody ─► StatementGraph ─► BlockGraph ─► CfgDraft ─► (normalizers) ─► Cfg ─► SSA
//! ```
//!
//! # Usage
//!
//! Most callers go through [`crate::build_body`]; the stages can also be driven one by one:
//!
//! ```rust,ignore
//! use flowscope::analysis::{partition::partition, stmtgraph::StatementGraphBuilder};
//!
//! let graph = StatementGraphBuilder::new(256).build(&function)?;
//! let blocks = partition(graph)?;
//! println!("{} builder blocks", blocks.blocks().len());
//! ```

pub mod cfg;
pub mod normalize;
pub mod partition;
pub mod ssa;
pub mod stmtgraph;

// Re-export primary types at module level
pub use cfg::{BasicBlock, BlockFlags, BlockId, Cfg, CfgEdge, CfgEdgeKind, Diagnostic, Trap};
pub use ssa::{PhiNode, SsaForm};
