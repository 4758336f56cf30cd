//! Block partitioning of a statement graph.
//!
//! After the structural nodes are spliced out ([`StatementGraph::splice_structural`]), runs of
//! statement nodes are grouped greedily into builder blocks:
//!
//! - a block grows along `next` while the following node has a single predecessor, is not a loop
//!   header, and lies in the same lexical scope and region part;
//! - conditionals, switches and exit statements end their block;
//! - every edge target and every region entry is the first node of its block.
//!
//! Blocks are seeded depth-first from the entry, false edges before true edges; nodes that are
//! unreachable from the entry are seeded afterwards in creation order so that they can be
//! reported later. Finally an empty start block is inserted when the first block has
//! predecessors, and a return is synthesized for control falling off the end of the body.
//!
//! [`lower`] then turns the builder blocks into a [`crate::analysis::cfg::CfgDraft`].

mod lower;
mod splice;

pub(crate) use lower::lower;

use log::debug;

use crate::{
    analysis::{
        cfg::{BlockFlags, BlockId, CfgEdgeKind, RegionTag},
        stmtgraph::{NodeKind, PlainStmt, Slot, StatementGraph, StmtId},
    },
    syntax::SourcePosition,
    utils::graph::NodeId,
    Result,
};

/// A group of statement nodes executed in sequence.
#[derive(Debug, Clone)]
pub struct BuilderBlock {
    pub(crate) id: BlockId,
    pub(crate) nodes: Vec<StmtId>,
    pub(crate) successors: Vec<(BlockId, CfgEdgeKind)>,
    pub(crate) predecessors: Vec<BlockId>,
    pub(crate) flags: BlockFlags,
}

impl BuilderBlock {
    /// Block id; also the id of the draft block lowered from it.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Statement nodes in execution order.
    #[must_use]
    pub fn nodes(&self) -> &[StmtId] {
        &self.nodes
    }

    /// Outgoing edges.
    #[must_use]
    pub fn successors(&self) -> &[(BlockId, CfgEdgeKind)] {
        &self.successors
    }

    /// Incoming edges, one entry per edge.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }
}

/// The partitioned statement graph.
#[derive(Debug)]
pub struct BlockGraph<'a> {
    pub(crate) graph: StatementGraph<'a>,
    pub(crate) blocks: Vec<BuilderBlock>,
    pub(crate) block_of: Vec<Option<BlockId>>,
    pub(crate) start: BlockId,
}

impl<'a> BlockGraph<'a> {
    /// The spliced statement graph.
    #[must_use]
    pub fn statement_graph(&self) -> &StatementGraph<'a> {
        &self.graph
    }

    /// Builder blocks in creation order.
    #[must_use]
    pub fn blocks(&self) -> &[BuilderBlock] {
        &self.blocks
    }

    /// The block execution starts in.
    #[must_use]
    pub fn start(&self) -> BlockId {
        self.start
    }

    /// The block holding `node`, if the node was assigned.
    #[must_use]
    pub fn block_of(&self, node: StmtId) -> Option<BlockId> {
        self.block_of.get(node.index()).copied().flatten()
    }

    /// Region part of a block: the region of its first node.
    #[must_use]
    pub fn region_of(&self, block: BlockId) -> Option<RegionTag> {
        self.blocks[block.index()]
            .nodes
            .first()
            .and_then(|node| self.graph.node(*node).region())
    }
}

/// Splices and partitions `graph`.
///
/// # Errors
///
/// Returns [`crate::Error::Invariant`] if the graph has an edge into the middle of a block or a
/// non-exit node without successor.
pub fn partition(mut graph: StatementGraph<'_>) -> Result<BlockGraph<'_>> {
    let spliced = graph.splice_structural()?;
    let len = graph.len();
    let mut partitioner = Partitioner {
        graph,
        blocks: Vec::new(),
        block_of: vec![None; len],
        slot_in_block: vec![0; len],
        fall_off: Vec::new(),
    };
    partitioner.assign();
    partitioner.split_at_leaders();
    partitioner.connect()?;
    let start = partitioner.insert_start();
    partitioner.synthesize_returns();

    debug!(
        "partitioned {} statement nodes into {} blocks ({} spliced)",
        len,
        partitioner.blocks.len(),
        spliced
    );
    Ok(BlockGraph {
        graph: partitioner.graph,
        blocks: partitioner.blocks,
        block_of: partitioner.block_of,
        start,
    })
}

struct Partitioner<'a> {
    graph: StatementGraph<'a>,
    blocks: Vec<BuilderBlock>,
    block_of: Vec<Option<BlockId>>,
    slot_in_block: Vec<usize>,
    fall_off: Vec<(BlockId, CfgEdgeKind)>,
}

impl Partitioner<'_> {
    fn new_block(&mut self, flags: BlockFlags) -> BlockId {
        let id = NodeId::new(self.blocks.len());
        self.blocks.push(BuilderBlock {
            id,
            nodes: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
            flags,
        });
        id
    }

    fn place(&mut self, node: StmtId, block: BlockId) {
        self.slot_in_block[node.index()] = self.blocks[block.index()].nodes.len();
        self.block_of[node.index()] = Some(block);
        self.blocks[block.index()].nodes.push(node);
    }

    fn is_assigned(&self, node: StmtId) -> bool {
        self.block_of[node.index()].is_some()
    }

    fn assign(&mut self) {
        let mut work = Vec::new();
        if let Some(first) = self.graph.node(self.graph.entry()).target(Slot::Next) {
            work.push(first);
        }

        let mut seed = 2;
        loop {
            while let Some(node) = work.pop() {
                self.grow(node, &mut work);
            }
            let orphan = (seed..self.graph.len()).map(StmtId).find(|id| {
                let node = self.graph.node(*id);
                !node.spliced && !self.is_assigned(*id)
            });
            match orphan {
                Some(id) => {
                    seed = id.index() + 1;
                    work.push(id);
                }
                None => break,
            }
        }
    }

    fn grow(&mut self, first: StmtId, work: &mut Vec<StmtId>) {
        if first == self.graph.exit() || self.is_assigned(first) {
            return;
        }
        let flags = if self.graph.node(first).is_loop_header() {
            BlockFlags::LOOP_HEADER
        } else {
            BlockFlags::empty()
        };
        let block = self.new_block(flags);

        let mut current = first;
        loop {
            self.place(current, block);
            let node = self.graph.node(current);
            if node.is_transfer() {
                break;
            }
            match node.target(Slot::Next) {
                Some(next) if self.extends(current, next) => current = next,
                _ => break,
            }
        }

        // Visiting order: false before true, default before cases.
        let node = self.graph.node(current);
        let visit: Vec<StmtId> = match node.kind() {
            NodeKind::Conditional {
                next_true,
                next_false,
                ..
            } => next_false.iter().chain(next_true.iter()).copied().collect(),
            NodeKind::Switch { cases, default, .. } => default
                .iter()
                .copied()
                .chain(cases.iter().filter_map(|case| case.target))
                .collect(),
            _ if node.is_exit_statement() => Vec::new(),
            _ => node.target(Slot::Next).into_iter().collect(),
        };
        for target in visit.into_iter().rev() {
            if target != self.graph.exit() && !self.is_assigned(target) {
                work.push(target);
            }
        }
    }

    fn extends(&self, current: StmtId, next: StmtId) -> bool {
        let (current, candidate) = (self.graph.node(current), self.graph.node(next));
        next != self.graph.exit()
            && !self.is_assigned(next)
            && candidate.predecessors().len() == 1
            && !candidate.is_loop_header()
            && candidate.scope() == current.scope()
            && candidate.region() == current.region()
    }

    /// Splits blocks so that every edge target and region entry starts a block.
    fn split_at_leaders(&mut self) {
        let mut leaders: Vec<StmtId> = Vec::new();
        for node in self.graph.nodes() {
            let Some(block) = self.block_of[node.id().index()] else {
                continue;
            };
            for (slot, target) in node.slots() {
                if target == self.graph.exit() {
                    continue;
                }
                let sequential = slot == Slot::Next
                    && self.block_of[target.index()] == Some(block)
                    && self.slot_in_block[target.index()]
                        == self.slot_in_block[node.id().index()] + 1;
                if !sequential {
                    leaders.push(target);
                }
            }
        }
        for region in self.graph.regions() {
            leaders.extend(region.catch_entry);
            leaders.extend(region.finally_entry);
        }

        leaders.retain(|node| {
            self.block_of[node.index()].is_some() && self.slot_in_block[node.index()] > 0
        });
        leaders.sort_by_key(|node| {
            (
                self.block_of[node.index()],
                std::cmp::Reverse(self.slot_in_block[node.index()]),
            )
        });
        leaders.dedup();

        for leader in leaders {
            let Some(block) = self.block_of[leader.index()] else {
                continue;
            };
            let at = self.slot_in_block[leader.index()];
            if at == 0 {
                continue;
            }
            let tail = self.blocks[block.index()].nodes.split_off(at);
            let flags = if self.graph.node(leader).is_loop_header() {
                BlockFlags::LOOP_HEADER
            } else {
                BlockFlags::empty()
            };
            let new = self.new_block(flags);
            for node in tail {
                self.place(node, new);
            }
        }
    }

    fn connect(&mut self) -> Result<()> {
        for index in 0..self.blocks.len() {
            let block = NodeId::new(index);
            let Some(last) = self.blocks[index].nodes.last().copied() else {
                continue;
            };
            let node = self.graph.node(last);
            let edges: Vec<(StmtId, CfgEdgeKind)> = match node.kind() {
                NodeKind::Plain { .. } if node.is_exit_statement() => Vec::new(),
                NodeKind::Plain { next, .. } => match next {
                    Some(next) => vec![(*next, CfgEdgeKind::Fallthrough)],
                    None => {
                        return Err(invariant_error!("Statement {} has no successor", last));
                    }
                },
                NodeKind::Conditional {
                    next_true,
                    next_false,
                    ..
                } => next_true
                    .map(|id| (id, CfgEdgeKind::True))
                    .into_iter()
                    .chain(next_false.map(|id| (id, CfgEdgeKind::False)))
                    .collect(),
                NodeKind::Switch { cases, default, .. } => cases
                    .iter()
                    .enumerate()
                    .filter_map(|(i, case)| case.target.map(|id| (id, CfgEdgeKind::Case(i))))
                    .chain(default.map(|id| (id, CfgEdgeKind::Default)))
                    .collect(),
                _ => {
                    return Err(invariant_error!(
                        "Node {} cannot end a block",
                        node.text()
                    ))
                }
            };

            for (target, kind) in edges {
                if target == self.graph.exit() {
                    self.fall_off.push((block, kind));
                    continue;
                }
                let Some(to) = self.block_of[target.index()] else {
                    return Err(invariant_error!("Edge target {} was never placed", target));
                };
                if self.slot_in_block[target.index()] != 0 {
                    return Err(invariant_error!(
                        "Edge {} -> {} enters the middle of a block",
                        last,
                        target
                    ));
                }
                self.add_edge(block, to, kind);
            }
        }
        Ok(())
    }

    fn add_edge(&mut self, from: BlockId, to: BlockId, kind: CfgEdgeKind) {
        self.blocks[from.index()].successors.push((to, kind));
        self.blocks[to.index()].predecessors.push(from);
    }

    /// Returns the start block, inserting an empty one when the first block is a branch target
    /// or the body has no statements.
    fn insert_start(&mut self) -> BlockId {
        let first = self
            .graph
            .node(self.graph.entry())
            .target(Slot::Next)
            .and_then(|node| self.block_of[node.index()]);
        match first {
            Some(first) if self.blocks[first.index()].predecessors.is_empty() => first,
            Some(first) => {
                let start = self.new_block(BlockFlags::empty());
                self.add_edge(start, first, CfgEdgeKind::Fallthrough);
                start
            }
            None => {
                let start = self.new_block(BlockFlags::empty());
                self.fall_off.push((start, CfgEdgeKind::Fallthrough));
                start
            }
        }
    }

    fn block_region(&self, block: BlockId) -> Option<RegionTag> {
        self.blocks[block.index()]
            .nodes
            .first()
            .and_then(|node| self.graph.node(*node).region())
    }

    fn synthesize_returns(&mut self) {
        if self.fall_off.is_empty() {
            return;
        }

        if let [(block, CfgEdgeKind::Fallthrough)] = self.fall_off[..] {
            let last = self.blocks[block.index()].nodes.last().copied();
            let plain = last.map_or(true, |node| {
                matches!(self.graph.node(node).kind(), NodeKind::Plain { .. })
            });
            if plain && self.block_region(block).is_none() {
                let exit = self.graph.node(self.graph.exit()).position();
                let (position, scope) = last.map_or((exit, 0), |node| {
                    let node = self.graph.node(node);
                    (node.position(), node.scope())
                });
                let ret = self.implicit_return(position, scope);
                self.place(ret, block);
                self.blocks[block.index()].flags |= BlockFlags::RETURN;
                self.fall_off.clear();
                return;
            }
        }

        let position = self.graph.node(self.graph.exit()).position();
        let ret = self.implicit_return(position, 0);
        let shared = self.new_block(BlockFlags::RETURN | BlockFlags::SYNTHETIC);
        self.place(ret, shared);
        for (block, kind) in std::mem::take(&mut self.fall_off) {
            self.add_edge(block, shared, kind);
        }
    }

    fn implicit_return(&mut self, position: SourcePosition, scope: u32) -> StmtId {
        let node = self.graph.add(
            NodeKind::Plain {
                stmt: PlainStmt::ImplicitReturn,
                next: None,
            },
            None,
            position,
            scope,
            None,
        );
        self.block_of.push(None);
        self.slot_in_block.push(0);
        node
    }
}
