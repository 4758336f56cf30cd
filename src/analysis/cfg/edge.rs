//! Control flow edge types for the CFG.
//!
//! This module defines the edge representations used in the block graphs, providing semantic
//! information about how control flows between basic blocks. Exceptional flow is not an edge
//! kind: blocks keep exceptional successors in a separate list so normal-flow passes never have
//! to filter them out.

use std::fmt;

use strum::{Display, EnumCount};

use crate::analysis::cfg::BlockId;

/// The kind of control flow represented by an edge.
///
/// # Examples
///
/// ```rust
/// use flowscope::analysis::CfgEdgeKind;
///
/// assert!(CfgEdgeKind::True.is_conditional());
/// assert!(CfgEdgeKind::Case(2).is_switch());
/// assert!(!CfgEdgeKind::Fallthrough.is_conditional());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount)]
pub enum CfgEdgeKind {
    /// The single successor of a non-branching block.
    #[strum(to_string = "fallthrough")]
    Fallthrough,

    /// The "true" branch of a two-way conditional.
    #[strum(to_string = "true")]
    True,

    /// The "false" branch of a two-way conditional.
    #[strum(to_string = "false")]
    False,

    /// A switch case edge, carrying the position of the case among the non-default cases.
    ///
    /// Only present before switch normalization.
    #[strum(to_string = "case {0}")]
    Case(usize),

    /// The default edge of a switch.
    ///
    /// Only present before switch normalization.
    #[strum(to_string = "default")]
    Default,
}

impl CfgEdgeKind {
    /// Returns `true` if this is a conditional branch edge.
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self, Self::True | Self::False)
    }

    /// Returns `true` if this is a switch edge (case or default).
    #[must_use]
    pub const fn is_switch(&self) -> bool {
        matches!(self, Self::Case(_) | Self::Default)
    }
}

/// An edge in the control flow graph.
///
/// Each edge connects a source block to a target block and carries semantic information about the
/// type of control flow. The source is implied by the block owning the edge.
///
/// # Examples
///
/// ```rust
/// use flowscope::analysis::{CfgEdge, CfgEdgeKind};
/// use flowscope::utils::graph::NodeId;
///
/// let edge = CfgEdge::new(NodeId::new(1), CfgEdgeKind::Fallthrough);
/// assert_eq!(edge.target(), NodeId::new(1));
/// assert!(!edge.kind().is_conditional());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfgEdge {
    target: BlockId,
    kind: CfgEdgeKind,
}

impl CfgEdge {
    /// Creates a new CFG edge.
    #[must_use]
    pub const fn new(target: BlockId, kind: CfgEdgeKind) -> Self {
        Self { target, kind }
    }

    /// Returns the target block of this edge.
    #[must_use]
    pub const fn target(&self) -> BlockId {
        self.target
    }

    /// Returns the kind of control flow this edge represents.
    #[must_use]
    pub const fn kind(&self) -> CfgEdgeKind {
        self.kind
    }

    pub(crate) fn set_target(&mut self, target: BlockId) {
        self.target = target;
    }
}

impl fmt::Display for CfgEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}-> {}", self.kind, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::NodeId;

    #[test]
    fn test_edge_kind_classification() {
        assert!(CfgEdgeKind::True.is_conditional());
        assert!(CfgEdgeKind::False.is_conditional());
        assert!(!CfgEdgeKind::Default.is_conditional());
        assert!(CfgEdgeKind::Default.is_switch());
        assert!(!CfgEdgeKind::Fallthrough.is_switch());
    }

    #[test]
    fn test_edge_display() {
        let edge = CfgEdge::new(NodeId::new(3), CfgEdgeKind::Case(1));
        assert_eq!(edge.to_string(), "-case 1-> n3");
        assert_eq!(CfgEdgeKind::Fallthrough.to_string(), "fallthrough");
    }
}
