//! # flowscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the flowscope library. Import this module to get quick access to the pipeline entry
//! points and the types of its result.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all flowscope operations
pub use crate::Error;

/// The result type used throughout flowscope
pub use crate::Result;

/// Pipeline switches and presets
pub use crate::BuildConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Pipeline drivers
pub use crate::{build_bodies, build_body, Body, BodyBuilder};

// ================================================================================================
// Graph Types
// ================================================================================================

/// Finished graphs and their parts
pub use crate::analysis::cfg::{
    BasicBlock, BlockFlags, BlockId, BlockOrigin, Cfg, CfgEdge, CfgEdgeKind, Diagnostic, Trap,
    TryRegion,
};

/// SSA summary and phi nodes
pub use crate::analysis::ssa::{PhiNode, PhiOperand, SsaForm};

/// Graph traits and the shared node id
pub use crate::utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors};

// ================================================================================================
// Instructions
// ================================================================================================

/// Instruction model and lowering collaborator
pub use crate::ir::{
    InstId, InstKind, Instruction, InstructionLowering, LocalId, LocalTable, LoweringContext,
    TsLowering,
};
