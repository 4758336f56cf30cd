//! Basic blocks shared by the draft arena and the finished graph.

use bitflags::bitflags;

use crate::{
    analysis::cfg::{CfgEdge, CfgEdgeKind, RegionTag},
    ir::Instruction,
    utils::graph::NodeId,
};

/// Identifier of a block inside a block arena.
///
/// Draft ids are arena positions. Once a draft is finalized into a [`crate::analysis::Cfg`]
/// blocks are renumbered in depth-first preorder and `BlockId(0)` is the start block.
pub type BlockId = NodeId;

bitflags! {
    /// Per-block properties recorded by the partitioner and the normalizers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BlockFlags: u8 {
        /// Test block of a `while` or `for` loop
        const LOOP_HEADER = 0x01;
        /// Block introduced by a pass rather than by a source statement
        const SYNTHETIC = 0x02;
        /// Target of exceptional control flow
        const EXCEPTION_ENTRY = 0x04;
        /// Exceptional-path copy of a `finally` block
        const FINALLY_COPY = 0x08;
        /// Block holding a synthesized `return`
        const RETURN = 0x10;
    }
}

/// Where a block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockOrigin {
    /// A block cut by the partitioner, with its builder-block id
    Partition(BlockId),
    /// An exceptional-path copy of the given draft block
    Copy(BlockId),
    /// A block created by a normalizer (pre-header, increment, comparison, diamond part, ...)
    Synthetic,
}

/// A basic block: straight-line instructions with at most one control transfer, at the tail.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub(crate) id: BlockId,
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) successors: Vec<CfgEdge>,
    pub(crate) predecessors: Vec<BlockId>,
    pub(crate) exceptional_successors: Vec<BlockId>,
    pub(crate) exceptional_predecessors: Vec<BlockId>,
    pub(crate) region: Option<RegionTag>,
    pub(crate) flags: BlockFlags,
    pub(crate) origin: BlockOrigin,
}

impl BasicBlock {
    pub(crate) fn new(
        id: BlockId,
        region: Option<RegionTag>,
        flags: BlockFlags,
        origin: BlockOrigin,
    ) -> Self {
        BasicBlock {
            id,
            instructions: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
            exceptional_successors: Vec::new(),
            exceptional_predecessors: Vec::new(),
            region,
            flags,
            origin,
        }
    }

    /// Block id.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Instructions in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Normal successors, in the order the terminator selects them (`True` before `False`).
    #[must_use]
    pub fn successors(&self) -> &[CfgEdge] {
        &self.successors
    }

    /// Normal predecessors, one entry per incoming edge.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    /// Handler blocks control may reach when an instruction of this block throws.
    #[must_use]
    pub fn exceptional_successors(&self) -> &[BlockId] {
        &self.exceptional_successors
    }

    /// Blocks whose exceptions are delivered to this block.
    #[must_use]
    pub fn exceptional_predecessors(&self) -> &[BlockId] {
        &self.exceptional_predecessors
    }

    /// Innermost try region part enclosing the block.
    #[must_use]
    pub fn region(&self) -> Option<RegionTag> {
        self.region
    }

    /// Block properties.
    #[must_use]
    pub fn flags(&self) -> BlockFlags {
        self.flags
    }

    /// Where the block came from.
    #[must_use]
    pub fn origin(&self) -> BlockOrigin {
        self.origin
    }

    /// Returns the control transfer ending this block, if any.
    #[must_use]
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|inst| inst.is_terminator())
    }

    /// Returns the target of the first edge of the given kind.
    #[must_use]
    pub fn edge_target(&self, kind: CfgEdgeKind) -> Option<BlockId> {
        self.successors
            .iter()
            .find(|edge| edge.kind() == kind)
            .map(CfgEdge::target)
    }

    /// Returns `true` if the block holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Distinct normal and exceptional predecessors, normal ones first.
    #[must_use]
    pub fn distinct_predecessors(&self) -> Vec<BlockId> {
        let mut result: Vec<BlockId> = Vec::new();
        for pred in self
            .predecessors
            .iter()
            .chain(self.exceptional_predecessors.iter())
        {
            if !result.contains(pred) {
                result.push(*pred);
            }
        }
        result
    }

    pub(crate) fn ends_in_terminator(&self) -> bool {
        self.terminator().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{InstKind, LoweringContext},
        syntax::SourcePosition,
    };

    #[test]
    fn test_terminator_and_edges() {
        let mut ctx = LoweringContext::new();
        let mut block = BasicBlock::new(
            NodeId::new(0),
            None,
            BlockFlags::SYNTHETIC,
            BlockOrigin::Synthetic,
        );
        assert!(block.is_empty());
        assert!(block.terminator().is_none());

        block
            .instructions
            .push(ctx.instruction(InstKind::Return(None), SourcePosition::default()));
        block
            .successors
            .push(CfgEdge::new(NodeId::new(4), CfgEdgeKind::False));
        assert!(block.ends_in_terminator());
        assert_eq!(block.edge_target(CfgEdgeKind::False), Some(NodeId::new(4)));
        assert_eq!(block.edge_target(CfgEdgeKind::True), None);
    }

    #[test]
    fn test_distinct_predecessors() {
        let mut block = BasicBlock::new(NodeId::new(2), None, BlockFlags::empty(), BlockOrigin::Synthetic);
        block.predecessors = vec![NodeId::new(1), NodeId::new(1), NodeId::new(0)];
        block.exceptional_predecessors = vec![NodeId::new(0), NodeId::new(5)];
        assert_eq!(
            block.distinct_predecessors(),
            vec![NodeId::new(1), NodeId::new(0), NodeId::new(5)]
        );
    }
}
