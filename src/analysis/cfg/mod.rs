//! Control Flow Graph (CFG) construction and analysis.
//!
//! This module holds the block-level representations of a body: the mutable [`CfgDraft`] the
//! normalizers rewrite, and the finished [`Cfg`] handed to consumers.
//!
//! # Architecture
//!
//! Both representations are arenas of [`BasicBlock`]s indexed by [`BlockId`] (an alias of the
//! generic [`crate::utils::graph::NodeId`]), so the shared algorithms in
//! [`crate::utils::graph::algorithms`] run over either of them.
//!
//! # Key Components
//!
//! - [`CfgDraft`] - Canonical blocks between lowering and finalization, with paired edge operations
//! - [`Cfg`] - The finished, renumbered graph with cached dominance information
//! - [`CfgEdge`] / [`CfgEdgeKind`] - Normal control flow edges
//! - [`Trap`] / [`TryRegion`] / [`RegionTag`] - Exceptional control flow
//! - [`Diagnostic`] - Non-fatal findings such as dropped unreachable code
//!
//! # Edge Types
//!
//! - **Fallthrough**: the single successor of a non-branching block
//! - **True/False**: the two targets of an `If` terminator
//! - **Case/Default**: multi-way dispatch, present only until switch normalization
//!
//! Exceptional flow is kept in separate successor and predecessor lists on every block.
//!
//! # Lazy Computation
//!
//! The dominator tree and dominance frontiers of a [`Cfg`] are computed on first access and
//! cached using [`std::sync::OnceLock`].

mod block;
mod diagnostic;
mod draft;
mod edge;
mod graph;
mod trap;

pub use block::{BasicBlock, BlockFlags, BlockId, BlockOrigin};
pub use diagnostic::Diagnostic;
pub use draft::{CfgDraft, LoopHeader, SwitchArm, SwitchDispatch};
pub use edge::{CfgEdge, CfgEdgeKind};
pub use graph::Cfg;
pub use trap::{RegionId, RegionPart, RegionTag, Trap, TryRegion};

pub(crate) use draft::check_terminators;
pub(crate) use graph::Finalized;
pub(crate) use trap::tag_chain_contains;
