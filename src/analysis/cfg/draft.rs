//! The mutable block arena between lowering and finalization.
//!
//! A [`CfgDraft`] owns canonical blocks with the ids the partitioner gave them, the lowering
//! context of the body, the try-region table and two side tables that exist only until the
//! normalizers consume them: [`LoopHeader`] (for-loop init/update instructions) and
//! [`SwitchDispatch`] (multi-way dispatch). Every graph mutation goes through the paired edge
//! operations here so predecessor and successor lists stay symmetric at all times.

use std::collections::HashMap;

use log::trace;

use crate::{
    analysis::cfg::{
        BasicBlock, BlockFlags, BlockId, BlockOrigin, CfgEdge, CfgEdgeKind, RegionTag, Trap,
        TryRegion,
    },
    ir::{Instruction, LoweringContext, Operand},
    syntax::SourcePosition,
    utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors},
    Error, Result,
};

/// Lowered `init` and `update` parts of a `for` loop, attached to its header block.
#[derive(Debug, Clone, Default)]
pub struct LoopHeader {
    /// Instructions of the initializer statement
    pub init: Vec<Instruction>,
    /// Instructions of the update expression
    pub update: Vec<Instruction>,
}

/// One non-default case of a switch dispatch.
#[derive(Debug, Clone)]
pub struct SwitchArm {
    /// Instructions computing the case value
    pub instructions: Vec<Instruction>,
    /// The case value
    pub value: Operand,
    /// Position of the case clause
    pub position: SourcePosition,
}

/// Multi-way dispatch of a switch block. Case `i` leaves over the `Case(i)` edge.
#[derive(Debug, Clone)]
pub struct SwitchDispatch {
    /// The discriminant, computed by the block before its `Switch` terminator
    pub discriminant: Operand,
    /// Non-default cases in source order
    pub arms: Vec<SwitchArm>,
}

/// Canonical block arena under normalization.
#[derive(Debug)]
pub struct CfgDraft {
    pub(crate) blocks: Vec<BasicBlock>,
    pub(crate) removed: Vec<bool>,
    pub(crate) start: BlockId,
    pub(crate) ctx: LoweringContext,
    pub(crate) regions: Vec<TryRegion>,
    pub(crate) traps: Vec<Trap>,
    pub(crate) loop_headers: HashMap<BlockId, LoopHeader>,
    pub(crate) dispatches: HashMap<BlockId, SwitchDispatch>,
}

impl CfgDraft {
    pub(crate) fn new(ctx: LoweringContext, regions: Vec<TryRegion>) -> Self {
        CfgDraft {
            blocks: Vec::new(),
            removed: Vec::new(),
            start: NodeId::new(0),
            ctx,
            regions,
            traps: Vec::new(),
            loop_headers: HashMap::new(),
            dispatches: HashMap::new(),
        }
    }

    /// Appends a new, unlinked block.
    pub(crate) fn add_block(
        &mut self,
        region: Option<RegionTag>,
        flags: BlockFlags,
        origin: BlockOrigin,
    ) -> BlockId {
        let id = NodeId::new(self.blocks.len());
        self.blocks.push(BasicBlock::new(id, region, flags, origin));
        self.removed.push(false);
        id
    }

    /// The start block.
    #[must_use]
    pub fn start(&self) -> BlockId {
        self.start
    }

    /// Returns the block with the given id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    /// Returns `true` if the block has not been removed.
    #[must_use]
    pub fn is_live(&self, id: BlockId) -> bool {
        id.index() < self.blocks.len() && !self.removed[id.index()]
    }

    /// Ids of all blocks that were not removed, in arena order.
    #[must_use]
    pub fn live_blocks(&self) -> Vec<BlockId> {
        (0..self.blocks.len())
            .map(NodeId::new)
            .filter(|id| !self.removed[id.index()])
            .collect()
    }

    /// Number of blocks that were not removed.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.removed.iter().filter(|removed| !**removed).count()
    }

    /// Try regions of the body.
    #[must_use]
    pub fn regions(&self) -> &[TryRegion] {
        &self.regions
    }

    /// Traps recorded so far.
    #[must_use]
    pub fn traps(&self) -> &[Trap] {
        &self.traps
    }

    /// Loop-header side table.
    #[must_use]
    pub fn loop_header(&self, id: BlockId) -> Option<&LoopHeader> {
        self.loop_headers.get(&id)
    }

    /// Switch-dispatch side table.
    #[must_use]
    pub fn dispatch(&self, id: BlockId) -> Option<&SwitchDispatch> {
        self.dispatches.get(&id)
    }

    /// Adds a normal edge `from -> to`.
    pub(crate) fn add_edge(&mut self, from: BlockId, to: BlockId, kind: CfgEdgeKind) {
        self.blocks[from.index()]
            .successors
            .push(CfgEdge::new(to, kind));
        self.blocks[to.index()].predecessors.push(from);
    }

    /// Removes the `index`-th successor edge of `from`.
    pub(crate) fn remove_edge(&mut self, from: BlockId, index: usize) -> CfgEdge {
        let edge = self.blocks[from.index()].successors.remove(index);
        remove_one(&mut self.blocks[edge.target().index()].predecessors, from);
        edge
    }

    /// Removes every successor edge of `from`, returning them in order.
    pub(crate) fn take_successors(&mut self, from: BlockId) -> Vec<CfgEdge> {
        let edges = std::mem::take(&mut self.blocks[from.index()].successors);
        for edge in &edges {
            remove_one(&mut self.blocks[edge.target().index()].predecessors, from);
        }
        edges
    }

    /// Points the `index`-th successor edge of `from` at `to`, keeping its kind.
    pub(crate) fn redirect_edge(&mut self, from: BlockId, index: usize, to: BlockId) {
        let old = self.blocks[from.index()].successors[index].target();
        if old == to {
            return;
        }
        remove_one(&mut self.blocks[old.index()].predecessors, from);
        self.blocks[from.index()].successors[index].set_target(to);
        self.blocks[to.index()].predecessors.push(from);
        trace!("redirect {from} -> {old} to {to}");
    }

    /// Redirects every edge `from -> old` to `new`. Returns the number of edges moved.
    pub(crate) fn retarget(&mut self, from: BlockId, old: BlockId, new: BlockId) -> usize {
        let indices: Vec<usize> = self.blocks[from.index()]
            .successors
            .iter()
            .enumerate()
            .filter(|(_, edge)| edge.target() == old)
            .map(|(index, _)| index)
            .collect();
        for &index in &indices {
            self.redirect_edge(from, index, new);
        }
        indices.len()
    }

    /// Adds an exceptional edge `from -> handler`. Duplicates are ignored.
    pub(crate) fn add_exceptional_edge(&mut self, from: BlockId, handler: BlockId) {
        if self.blocks[from.index()]
            .exceptional_successors
            .contains(&handler)
        {
            return;
        }
        self.blocks[from.index()]
            .exceptional_successors
            .push(handler);
        self.blocks[handler.index()]
            .exceptional_predecessors
            .push(from);
    }

    /// Removes every edge into and out of `id`, normal and exceptional.
    pub(crate) fn unlink(&mut self, id: BlockId) {
        self.take_successors(id);
        while let Some(&pred) = self.blocks[id.index()].predecessors.last() {
            let index = self.blocks[pred.index()]
                .successors
                .iter()
                .position(|edge| edge.target() == id);
            match index {
                Some(index) => {
                    self.remove_edge(pred, index);
                }
                None => {
                    self.blocks[id.index()].predecessors.pop();
                }
            }
        }
        let handlers = std::mem::take(&mut self.blocks[id.index()].exceptional_successors);
        for handler in handlers {
            remove_one(
                &mut self.blocks[handler.index()].exceptional_predecessors,
                id,
            );
        }
        let protected = std::mem::take(&mut self.blocks[id.index()].exceptional_predecessors);
        for block in protected {
            remove_one(
                &mut self.blocks[block.index()].exceptional_successors,
                id,
            );
        }
    }

    /// Removes an unlinked block from the arena.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if the block still has edges.
    pub(crate) fn remove_block(&mut self, id: BlockId) -> Result<()> {
        let block = &self.blocks[id.index()];
        if !block.successors.is_empty()
            || !block.predecessors.is_empty()
            || !block.exceptional_successors.is_empty()
            || !block.exceptional_predecessors.is_empty()
        {
            return Err(invariant_error!("Block {} removed while still linked", id));
        }
        self.removed[id.index()] = true;
        self.blocks[id.index()].instructions.clear();
        self.loop_headers.remove(&id);
        self.dispatches.remove(&id);
        trace!("removed block {id}");
        Ok(())
    }

    /// Checks edge symmetry and the single-terminator rule on every live block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] for asymmetric edges or edges into removed blocks,
    /// and [`crate::Error::Invariant`] for a control transfer that is not the last instruction.
    pub fn check(&self) -> Result<()> {
        let mut normal: HashMap<(BlockId, BlockId), isize> = HashMap::new();
        let mut exceptional: HashMap<(BlockId, BlockId), isize> = HashMap::new();

        for id in self.live_blocks() {
            let block = self.block(id);
            for edge in &block.successors {
                if !self.is_live(edge.target()) {
                    return Err(Error::GraphError(format!(
                        "Edge {} -> {} targets a removed block",
                        id,
                        edge.target()
                    )));
                }
                *normal.entry((id, edge.target())).or_default() += 1;
            }
            for pred in &block.predecessors {
                *normal.entry((*pred, id)).or_default() -= 1;
            }
            for handler in &block.exceptional_successors {
                if !self.is_live(*handler) {
                    return Err(Error::GraphError(format!(
                        "Exceptional edge {id} -> {handler} targets a removed block"
                    )));
                }
                *exceptional.entry((id, *handler)).or_default() += 1;
            }
            for protected in &block.exceptional_predecessors {
                *exceptional.entry((*protected, id)).or_default() -= 1;
            }
            check_terminators(block)?;
        }

        if let Some(((from, to), _)) = normal.iter().find(|(_, count)| **count != 0) {
            return Err(Error::GraphError(format!(
                "Asymmetric edge {from} -> {to}"
            )));
        }
        if let Some(((from, to), _)) = exceptional.iter().find(|(_, count)| **count != 0) {
            return Err(Error::GraphError(format!(
                "Asymmetric exceptional edge {from} -> {to}"
            )));
        }
        Ok(())
    }
}

pub(crate) fn check_terminators(block: &BasicBlock) -> Result<()> {
    let count = block.instructions.len();
    if let Some(index) = block
        .instructions
        .iter()
        .position(Instruction::is_terminator)
    {
        if index + 1 != count {
            return Err(invariant_error!(
                "Block {} has a control transfer at {} of {} instructions",
                block.id,
                index,
                count
            ));
        }
    }
    Ok(())
}

fn remove_one(list: &mut Vec<BlockId>, value: BlockId) {
    if let Some(index) = list.iter().position(|item| *item == value) {
        list.remove(index);
    }
}

impl GraphBase for CfgDraft {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.blocks.len()).map(NodeId::new)
    }
}

impl Successors for CfgDraft {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        let block = &self.blocks[node.index()];
        block
            .successors
            .iter()
            .map(CfgEdge::target)
            .chain(block.exceptional_successors.iter().copied())
    }
}

impl Predecessors for CfgDraft {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        let block = &self.blocks[node.index()];
        block
            .predecessors
            .iter()
            .copied()
            .chain(block.exceptional_predecessors.iter().copied())
    }
}

impl RootedGraph for CfgDraft {
    fn entry(&self) -> NodeId {
        self.start
    }
}
