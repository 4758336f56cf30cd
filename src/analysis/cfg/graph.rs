//! The finished control flow graph.

use std::{
    collections::{HashMap, HashSet},
    fmt::Write,
    sync::OnceLock,
};

use log::{debug, warn};

use crate::{
    analysis::cfg::{
        draft::check_terminators, BasicBlock, BlockId, CfgDraft, CfgEdge, Diagnostic, Trap,
        TryRegion,
    },
    ir::{InstId, InstKind, Instruction, LocalTable, LoweringContext},
    utils::{
        escape_dot,
        graph::{
            algorithms::{self, reachable, DominatorTree},
            GraphBase, NodeId, Predecessors, RootedGraph, Successors,
        },
    },
    Error, Result,
};

/// A finished control flow graph.
///
/// Blocks are numbered in depth-first preorder from the start block, which is always
/// `BlockId(0)`. Every block is reachable from the start block over normal and exceptional edges,
/// and no block holds normalization leftovers (markers, `Switch` terminators, side tables).
///
/// The graph traits ([`GraphBase`], [`Successors`], [`Predecessors`], [`RootedGraph`]) view the
/// union of normal and exceptional edges. The dominator tree and the dominance frontiers are
/// computed lazily on first access and cached; the block structure never changes after
/// finalization, only instructions are rewritten (SSA renaming and phi insertion).
#[derive(Debug)]
pub struct Cfg {
    blocks: Vec<BasicBlock>,
    traps: Vec<Trap>,
    regions: Vec<TryRegion>,
    block_of: HashMap<InstId, BlockId>,
    remap: Vec<Option<BlockId>>,
    dominators: OnceLock<DominatorTree>,
    dominance_frontiers: OnceLock<Vec<HashSet<BlockId>>>,
}

/// Output of [`Cfg::from_draft`].
#[derive(Debug)]
pub(crate) struct Finalized {
    pub(crate) cfg: Cfg,
    pub(crate) ctx: LoweringContext,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

fn remapped(remap: &[Option<BlockId>], id: BlockId) -> Result<BlockId> {
    remap
        .get(id.index())
        .copied()
        .flatten()
        .ok_or_else(|| invariant_error!("Block {} survived finalization unlinked", id))
}

impl Cfg {
    /// Turns a normalized draft into a finished graph.
    ///
    /// Unreachable blocks are unlinked, dropped and reported as diagnostics. Surviving blocks are
    /// renumbered in depth-first preorder, traps and region entries are remapped, and traps left
    /// without protected or handler blocks are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if side tables were not consumed, or if the result fails [`Cfg::verify`].
    pub(crate) fn from_draft(mut draft: CfgDraft) -> Result<Finalized> {
        if !draft.loop_headers.is_empty() || !draft.dispatches.is_empty() {
            return Err(invariant_error!(
                "Finalizing a draft with {} loop headers and {} switch dispatches left",
                draft.loop_headers.len(),
                draft.dispatches.len()
            ));
        }

        let reach = reachable(&draft, draft.start);
        let mut diagnostics = Vec::new();
        for id in draft.live_blocks() {
            if reach[id.index()] {
                continue;
            }
            let block = draft.block(id);
            let position = block.instructions.first().map(Instruction::position);
            if let Some(position) = position {
                warn!("Unreachable code at {position} dropped");
            }
            diagnostics.push(Diagnostic::UnreachableBlock {
                origin: block.origin,
                position,
            });
            draft.unlink(id);
            draft.remove_block(id)?;
        }

        let order: Vec<BlockId> = algorithms::dfs(&draft, draft.start).collect();
        let mut remap: Vec<Option<BlockId>> = vec![None; draft.blocks.len()];
        for (index, old) in order.iter().enumerate() {
            remap[old.index()] = Some(NodeId::new(index));
        }

        let CfgDraft {
            blocks: old_blocks,
            ctx,
            regions: old_regions,
            traps: old_traps,
            ..
        } = draft;
        let mut slots: Vec<Option<BasicBlock>> = old_blocks.into_iter().map(Some).collect();

        let mut blocks = Vec::with_capacity(order.len());
        for old in &order {
            let mut block = slots[old.index()]
                .take()
                .ok_or_else(|| invariant_error!("Block {} visited twice", old))?;
            block.id = remapped(&remap, *old)?;
            for edge in &mut block.successors {
                edge.set_target(remapped(&remap, edge.target())?);
            }
            for list in [
                &mut block.predecessors,
                &mut block.exceptional_successors,
                &mut block.exceptional_predecessors,
            ] {
                for id in list.iter_mut() {
                    *id = remapped(&remap, *id)?;
                }
            }
            blocks.push(block);
        }

        let lookup = |id: BlockId| remap.get(id.index()).copied().flatten();
        let regions = old_regions
            .into_iter()
            .map(|region| TryRegion {
                catch_entry: region.catch_entry.and_then(lookup),
                finally_entry: region.finally_entry.and_then(lookup),
                ..region
            })
            .collect();
        let traps = old_traps
            .into_iter()
            .filter_map(|trap| {
                let try_blocks: Vec<BlockId> =
                    trap.try_blocks.iter().filter_map(|id| lookup(*id)).collect();
                let handlers: Vec<BlockId> =
                    trap.handlers.iter().filter_map(|id| lookup(*id)).collect();
                if try_blocks.is_empty() || handlers.is_empty() {
                    return None;
                }
                Some(Trap {
                    region: trap.region,
                    try_blocks,
                    handlers,
                })
            })
            .collect();

        let mut block_of = HashMap::new();
        for block in &blocks {
            for inst in &block.instructions {
                block_of.insert(inst.id(), block.id);
            }
        }

        let cfg = Cfg {
            blocks,
            traps,
            regions,
            block_of,
            remap,
            dominators: OnceLock::new(),
            dominance_frontiers: OnceLock::new(),
        };
        cfg.verify()?;
        debug!(
            "Finalized {} blocks, {} traps, {} unreachable",
            cfg.block_count(),
            cfg.traps.len(),
            diagnostics.len()
        );

        Ok(Finalized {
            cfg,
            ctx,
            diagnostics,
        })
    }

    /// The start block, always `BlockId(0)`.
    #[must_use]
    pub fn start(&self) -> BlockId {
        NodeId::new(0)
    }

    /// Returns the block with the given id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.index())
    }

    /// All blocks in id order.
    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Exception traps, innermost region first.
    #[must_use]
    pub fn traps(&self) -> &[Trap] {
        &self.traps
    }

    /// Try regions of the body with their entries remapped to final block ids.
    #[must_use]
    pub fn regions(&self) -> &[TryRegion] {
        &self.regions
    }

    /// Returns the block holding the given instruction.
    #[must_use]
    pub fn block_of(&self, inst: InstId) -> Option<BlockId> {
        self.block_of.get(&inst).copied()
    }

    /// Maps a draft block id to its final id, `None` if the block was dropped.
    #[must_use]
    pub fn final_id(&self, draft_id: BlockId) -> Option<BlockId> {
        self.remap.get(draft_id.index()).copied().flatten()
    }

    /// Iterates over every instruction with its block.
    pub fn instructions(&self) -> impl Iterator<Item = (BlockId, &Instruction)> {
        self.blocks.iter().flat_map(|block| {
            block
                .instructions
                .iter()
                .map(move |inst| (block.id, inst))
        })
    }

    /// Returns the dominator tree of this graph.
    ///
    /// Computed lazily on first access and cached. Dominance runs over normal and exceptional
    /// edges.
    #[must_use]
    pub fn dominators(&self) -> &DominatorTree {
        self.dominators
            .get_or_init(|| algorithms::compute_dominators(self, self.start()))
    }

    /// Returns the dominance frontiers, indexed by block id.
    #[must_use]
    pub fn dominance_frontiers(&self) -> &[HashSet<BlockId>] {
        self.dominance_frontiers
            .get_or_init(|| algorithms::compute_dominance_frontiers(self, self.dominators()))
    }

    /// Inserts `phi` at the head of `block`, after any phis already there.
    pub(crate) fn insert_phi(&mut self, block: BlockId, phi: Instruction) -> Result<()> {
        let id = phi.id();
        let target = self
            .blocks
            .get_mut(block.index())
            .ok_or_else(|| invariant_error!("Phi inserted into missing block {}", block))?;
        let position = target
            .instructions
            .iter()
            .position(|inst| inst.phi().is_none())
            .unwrap_or(target.instructions.len());
        target.instructions.insert(position, phi);
        self.block_of.insert(id, block);
        Ok(())
    }

    /// Removes the instruction with the given id.
    pub(crate) fn remove_instruction(&mut self, inst: InstId) -> Option<Instruction> {
        let block = self.block_of.remove(&inst)?;
        let instructions = &mut self.blocks[block.index()].instructions;
        let index = instructions.iter().position(|candidate| candidate.id() == inst)?;
        Some(instructions.remove(index))
    }

    /// Checks the structural invariants of a finished graph.
    ///
    /// - block ids match their positions and every block is reachable from the start block
    /// - normal and exceptional edges are symmetric
    /// - every block has at most one control transfer, and only at its tail
    /// - no markers or `Switch` terminators remain
    /// - two-way branches leave over exactly one `True` and one `False` edge
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] or [`crate::Error::Invariant`] describing the first
    /// violation found.
    pub fn verify(&self) -> Result<()> {
        let mut normal: HashMap<(BlockId, BlockId), isize> = HashMap::new();
        let mut exceptional: HashMap<(BlockId, BlockId), isize> = HashMap::new();

        for (index, block) in self.blocks.iter().enumerate() {
            if block.id.index() != index {
                return Err(Error::GraphError(format!(
                    "Block at position {index} carries id {}",
                    block.id
                )));
            }
            for edge in &block.successors {
                if edge.target().index() >= self.blocks.len() {
                    return Err(Error::GraphError(format!(
                        "Edge {} -> {} leaves the graph",
                        block.id,
                        edge.target()
                    )));
                }
                *normal.entry((block.id, edge.target())).or_default() += 1;
            }
            for pred in &block.predecessors {
                *normal.entry((*pred, block.id)).or_default() -= 1;
            }
            for handler in &block.exceptional_successors {
                if handler.index() >= self.blocks.len() {
                    return Err(Error::GraphError(format!(
                        "Exceptional edge {} -> {handler} leaves the graph",
                        block.id
                    )));
                }
                *exceptional.entry((block.id, *handler)).or_default() += 1;
            }
            for protected in &block.exceptional_predecessors {
                *exceptional.entry((*protected, block.id)).or_default() -= 1;
            }

            check_terminators(block)?;
            for inst in &block.instructions {
                match inst.kind() {
                    InstKind::Marker(marker) => {
                        return Err(invariant_error!(
                            "Block {} still holds marker group {}",
                            block.id,
                            marker.group()
                        ))
                    }
                    InstKind::Switch(_) => {
                        return Err(invariant_error!(
                            "Block {} still holds a multi-way switch",
                            block.id
                        ))
                    }
                    _ => {}
                }
            }
            if let Some(InstKind::If(_)) = block.terminator().map(Instruction::kind) {
                let kinds: Vec<_> = block.successors.iter().map(CfgEdge::kind).collect();
                if kinds.len() != 2 || !kinds.iter().all(|kind| kind.is_conditional()) {
                    return Err(invariant_error!(
                        "Branch block {} has edges {:?}",
                        block.id,
                        kinds
                    ));
                }
            }
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

        if !self.blocks.is_empty() {
            let reach = reachable(self, self.start());
            if let Some(index) = reach.iter().position(|reached| !reached) {
                return Err(Error::GraphError(format!(
                    "Block {} is not reachable from the start block",
                    NodeId::new(index)
                )));
            }
        }
        Ok(())
    }

    /// Generates a DOT representation for visualization with Graphviz.
    ///
    /// Exceptional edges are drawn dashed.
    #[must_use]
    pub fn to_dot(&self, locals: &LocalTable, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CFG {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"CFG: {}\";", escape_dot(name));
        }
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    edge [fontname=\"Courier\", fontsize=9];\n\n");

        for block in &self.blocks {
            let mut label = format!("B{}", block.id.index());
            if block.id == self.start() {
                label.push_str(" (start)");
            }
            label.push_str("\\l");
            for inst in &block.instructions {
                label.push_str(&escape_dot(&inst.display(locals).to_string()));
                label.push_str("\\l");
            }
            let _ = writeln!(dot, "    B{} [label=\"{label}\"];", block.id.index());
        }
        dot.push('\n');

        for block in &self.blocks {
            for edge in &block.successors {
                let _ = writeln!(
                    dot,
                    "    B{} -> B{} [label=\"{}\"];",
                    block.id.index(),
                    edge.target().index(),
                    edge.kind()
                );
            }
            for handler in &block.exceptional_successors {
                let _ = writeln!(
                    dot,
                    "    B{} -> B{} [style=dashed];",
                    block.id.index(),
                    handler.index()
                );
            }
        }

        dot.push_str("}\n");
        dot
    }
}

impl GraphBase for Cfg {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.blocks.len()).map(NodeId::new)
    }
}

impl Successors for Cfg {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        let block = &self.blocks[node.index()];
        block
            .successors
            .iter()
            .map(CfgEdge::target)
            .chain(block.exceptional_successors.iter().copied())
    }
}

impl Predecessors for Cfg {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        let block = &self.blocks[node.index()];
        block
            .predecessors
            .iter()
            .copied()
            .chain(block.exceptional_predecessors.iter().copied())
    }
}

impl RootedGraph for Cfg {
    fn entry(&self) -> NodeId {
        self.start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::cfg::{BlockFlags, BlockOrigin, CfgEdgeKind},
        ir::{Condition, Constant, Operand},
        syntax::{BinaryOp, SourcePosition},
    };

    /// 0 -> {2, 1}, 2 -> 3, 1 -> 3, plus an orphan 4 -> 3.
    fn diamond_with_orphan() -> CfgDraft {
        let mut draft = CfgDraft::new(LoweringContext::new(), Vec::new());
        for _ in 0..5 {
            draft.add_block(None, BlockFlags::empty(), BlockOrigin::Synthetic);
        }
        let branch = draft.ctx.instruction(
            InstKind::If(Condition {
                op: BinaryOp::Ne,
                lhs: Operand::Const(Constant::Bool(true)),
                rhs: Operand::Const(Constant::Bool(false)),
            }),
            SourcePosition::new(1, 1),
        );
        draft.block_mut(NodeId::new(0)).instructions.push(branch);
        let orphan = draft
            .ctx
            .instruction(InstKind::Return(None), SourcePosition::new(9, 3));
        draft.block_mut(NodeId::new(4)).instructions.push(orphan);

        draft.add_edge(NodeId::new(0), NodeId::new(2), CfgEdgeKind::True);
        draft.add_edge(NodeId::new(0), NodeId::new(1), CfgEdgeKind::False);
        draft.add_edge(NodeId::new(2), NodeId::new(3), CfgEdgeKind::Fallthrough);
        draft.add_edge(NodeId::new(1), NodeId::new(3), CfgEdgeKind::Fallthrough);
        draft.add_edge(NodeId::new(4), NodeId::new(3), CfgEdgeKind::Fallthrough);
        draft
    }

    #[test]
    fn test_finalize_renumbers_in_preorder() {
        let finalized = Cfg::from_draft(diamond_with_orphan()).expect("finalize");
        let cfg = finalized.cfg;
        assert_eq!(cfg.block_count(), 4);
        // preorder follows the true edge first: 0, 2, 3, 1
        assert_eq!(cfg.final_id(NodeId::new(2)), Some(NodeId::new(1)));
        assert_eq!(cfg.final_id(NodeId::new(3)), Some(NodeId::new(2)));
        assert_eq!(cfg.final_id(NodeId::new(1)), Some(NodeId::new(3)));
        assert_eq!(cfg.final_id(NodeId::new(4)), None);

        let merge = cfg.block(NodeId::new(2)).expect("merge block");
        assert_eq!(merge.predecessors().len(), 2);
        cfg.verify().expect("valid graph");
    }

    #[test]
    fn test_finalize_reports_unreachable() {
        let finalized = Cfg::from_draft(diamond_with_orphan()).expect("finalize");
        assert_eq!(
            finalized.diagnostics,
            vec![Diagnostic::UnreachableBlock {
                origin: BlockOrigin::Synthetic,
                position: Some(SourcePosition::new(9, 3)),
            }]
        );
    }

    #[test]
    fn test_dominators_are_cached() {
        let cfg = Cfg::from_draft(diamond_with_orphan())
            .expect("finalize")
            .cfg;
        let merge = NodeId::new(2);
        assert_eq!(cfg.dominators().immediate_dominator(merge), Some(cfg.start()));
        assert!(std::ptr::eq(cfg.dominators(), cfg.dominators()));
        assert!(cfg.dominance_frontiers()[1].contains(&merge));
    }

    #[test]
    fn test_to_dot_lists_edges() {
        let finalized = Cfg::from_draft(diamond_with_orphan()).expect("finalize");
        let locals = finalized.ctx.into_locals();
        let dot = finalized.cfg.to_dot(&locals, Some("diamond"));
        assert!(dot.contains("label=\"CFG: diamond\""));
        assert!(dot.contains("B0 -> B1 [label=\"true\"]"));
        assert!(dot.contains("if true != false"));
    }
}
