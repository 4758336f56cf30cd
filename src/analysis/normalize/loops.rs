//! `for` loop normalization.
//!
//! A `for` header block carries its lowered initializer and update in a
//! [`LoopHeader`](crate::analysis::cfg::LoopHeader) side table. This pass moves the initializer in
//! front of the loop and the update onto the back edges:
//!
//! ```text
//!   entry ──► [init] ──► header ──true──► body ──► [update] ──┐
//!                          ▲                                   │
//!                          └───────────────────────────────────┘
//! ```
//!
//! Back edges are the header predecessors the header dominates (the header itself included, for an
//! empty body). All other predecessors enter the loop. Dominance is taken over the normal edges
//! plus the handler edges trap normalization adds later, so a `continue` inside a catch clause is
//! still a back edge.

use log::trace;

use crate::{
    analysis::cfg::{
        BlockFlags, BlockId, BlockOrigin, CfgDraft, CfgEdge, CfgEdgeKind, LoopHeader, RegionPart,
        RegionTag,
    },
    analysis::normalize::NormalizePass,
    ir::InstructionLowering,
    utils::graph::{
        algorithms::compute_dominators, GraphBase, NodeId, Predecessors, Successors,
    },
    BuildConfig, Result,
};

/// The draft's normal edges plus an edge from every protected block to the handler that will
/// receive its exceptions.
struct ProtectedFlow {
    successors: Vec<Vec<NodeId>>,
    predecessors: Vec<Vec<NodeId>>,
}

impl ProtectedFlow {
    fn new(draft: &CfgDraft) -> Self {
        let count = draft.blocks.len();
        let mut flow = ProtectedFlow {
            successors: vec![Vec::new(); count],
            predecessors: vec![Vec::new(); count],
        };
        for id in draft.live_blocks() {
            let block = draft.block(id);
            for target in block.successors().iter().map(CfgEdge::target) {
                flow.link(id, target);
            }
            for handler in block.exceptional_successors() {
                flow.link(id, *handler);
            }
            for handler in handlers(draft, block.region()) {
                flow.link(id, handler);
            }
        }
        flow
    }

    fn link(&mut self, from: NodeId, to: NodeId) {
        if !self.successors[from.index()].contains(&to) {
            self.successors[from.index()].push(to);
            self.predecessors[to.index()].push(from);
        }
    }
}

/// Handler entries covering a block tagged `tag`, innermost region first.
fn handlers(draft: &CfgDraft, tag: Option<RegionTag>) -> Vec<BlockId> {
    let regions = draft.regions();
    let mut found = Vec::new();
    let mut current = tag;
    while let Some(tag) = current {
        let Some(region) = regions.get(tag.region.index()) else {
            break;
        };
        let finally = region.finally_entry.filter(|_| region.has_finally);
        let handler = match tag.part {
            RegionPart::Try => region.catch_entry.or(finally),
            RegionPart::Catch => finally,
            RegionPart::Finally => None,
        };
        found.extend(handler.filter(|entry| draft.is_live(*entry)));
        current = region.parent;
    }
    found
}

impl GraphBase for ProtectedFlow {
    fn node_count(&self) -> usize {
        self.successors.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.successors.len()).map(NodeId::new)
    }
}

impl Successors for ProtectedFlow {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.successors[node.index()].iter().copied()
    }
}

impl Predecessors for ProtectedFlow {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.predecessors[node.index()].iter().copied()
    }
}

/// Moves `for` initializers into a pre-header and updates into an increment block.
pub struct LoopNormalizer;

impl NormalizePass for LoopNormalizer {
    fn name(&self) -> &'static str {
        "loops"
    }

    fn run(
        &self,
        mut draft: CfgDraft,
        _lowering: &dyn InstructionLowering,
        _config: &BuildConfig,
    ) -> Result<CfgDraft> {
        let mut headers: Vec<BlockId> = draft.loop_headers.keys().copied().collect();
        headers.sort();
        for header in headers {
            if let Some(parts) = draft.loop_headers.remove(&header) {
                normalize_loop(&mut draft, header, parts)?;
            }
        }
        Ok(draft)
    }
}

fn normalize_loop(draft: &mut CfgDraft, header: BlockId, parts: LoopHeader) -> Result<()> {
    if !draft.is_live(header) {
        return Err(invariant_error!("Loop header {} was removed", header));
    }
    let dominators = compute_dominators(&ProtectedFlow::new(draft), draft.start());
    let mut reentry = Vec::new();
    let mut entry = Vec::new();
    for pred in draft.block(header).distinct_predecessors() {
        if pred == header || dominators.dominates(header, pred) {
            reentry.push(pred);
        } else {
            entry.push(pred);
        }
    }

    let region = draft.block(header).region();
    if !parts.init.is_empty() {
        let target = match entry[..] {
            [single] if can_host_init(draft, single, header) => single,
            _ => {
                let preheader =
                    draft.add_block(region, BlockFlags::SYNTHETIC, BlockOrigin::Synthetic);
                for pred in &entry {
                    draft.retarget(*pred, header, preheader);
                }
                draft.add_edge(preheader, header, CfgEdgeKind::Fallthrough);
                trace!("pre-header {preheader} for loop {header}");
                preheader
            }
        };
        draft.block_mut(target).instructions.extend(parts.init);
    }

    if !parts.update.is_empty() && !reentry.is_empty() {
        let increment = draft.add_block(region, BlockFlags::SYNTHETIC, BlockOrigin::Synthetic);
        draft.block_mut(increment).instructions = parts.update;
        for pred in &reentry {
            draft.retarget(*pred, header, increment);
        }
        draft.add_edge(increment, header, CfgEdgeKind::Fallthrough);
        trace!("increment {increment} for loop {header}");
    }
    Ok(())
}

fn can_host_init(draft: &CfgDraft, block: BlockId, header: BlockId) -> bool {
    let candidate = draft.block(block);
    matches!(candidate.successors(), [edge] if edge.target() == header)
        && !candidate.flags().contains(BlockFlags::LOOP_HEADER)
        && !candidate.ends_in_terminator()
        && candidate.region() == draft.block(header).region()
}
