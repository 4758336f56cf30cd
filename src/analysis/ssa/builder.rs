//! SSA construction.
//!
//! This module converts a finished [`Cfg`] into SSA form in place, following Cytron et al.:
//!
//! 1. **Phi placement**: every variable read in some block before that block defines it gets phis
//!    on the iterated dominance frontier of its defining blocks.
//! 2. **Renaming**: a depth-first walk of the dominator tree gives every definition a fresh
//!    version and rewrites every use to the version reaching it.
//! 3. **Pruning**: phis merging a single value are removed and their uses substituted, until no
//!    trivial phi remains.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut finalized = Cfg::from_draft(draft)?;
//! let form = SsaBuilder::new(&mut finalized.cfg, &mut finalized.ctx).build(true)?;
//! println!("{} phis", form.phi_count());
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, trace};

use crate::{
    analysis::{
        cfg::{BlockId, Cfg},
        ssa::{PhiNode, SsaForm},
    },
    ir::{InstId, InstKind, LocalId, LocalTable, LoweringContext},
    utils::graph::{NodeId, Successors},
    Error, Result,
};

/// Per-variable version stacks used during renaming.
#[derive(Debug, Default)]
struct VersionStacks {
    stacks: HashMap<LocalId, Vec<LocalId>>,
    counters: HashMap<LocalId, u32>,
}

impl VersionStacks {
    /// The version of `origin` reaching the current point, or `origin` itself when no
    /// definition reaches it.
    fn current(&self, origin: LocalId) -> LocalId {
        self.stacks
            .get(&origin)
            .and_then(|stack| stack.last())
            .copied()
            .unwrap_or(origin)
    }

    fn fresh(&mut self, locals: &mut LocalTable, origin: LocalId) -> LocalId {
        let counter = self.counters.entry(origin).or_insert(0);
        *counter += 1;
        let version = locals.version(origin, *counter);
        self.stacks.entry(origin).or_default().push(version);
        version
    }

    fn pop(&mut self, origin: LocalId) {
        if let Some(stack) = self.stacks.get_mut(&origin) {
            stack.pop();
        }
    }
}

/// Walk state for the explicit dominator-tree traversal.
enum Visit {
    Enter(BlockId),
    Leave(Vec<LocalId>),
}

/// Builds SSA form over a finished control flow graph.
///
/// The graph is rewritten in place: phis are inserted at block heads, definitions and uses are
/// replaced by versions from the context's [`LocalTable`]. Block structure is not touched.
pub struct SsaBuilder<'a> {
    cfg: &'a mut Cfg,
    ctx: &'a mut LoweringContext,
    stacks: VersionStacks,
    placed: usize,
}

impl<'a> SsaBuilder<'a> {
    /// Creates a builder over `cfg`, allocating phis and versions from `ctx`.
    pub fn new(cfg: &'a mut Cfg, ctx: &'a mut LoweringContext) -> Self {
        SsaBuilder {
            cfg,
            ctx,
            stacks: VersionStacks::default(),
            placed: 0,
        }
    }

    /// Places phis, renames all variables and optionally prunes trivial phis.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SsaError`] if a phi cannot be placed or filled, which only
    /// happens on a graph that fails [`Cfg::verify`].
    pub fn build(mut self, prune: bool) -> Result<SsaForm> {
        if self.cfg.block_count() == 0 {
            return Ok(SsaForm::default());
        }

        self.place_phis()?;
        self.rename()?;
        let pruned = if prune { self.prune_trivial_phis() } else { 0 };

        let phi_count = self
            .cfg
            .instructions()
            .filter(|(_, inst)| inst.phi().is_some())
            .count();
        let versions = self.stacks.counters.into_iter().collect::<BTreeMap<_, _>>();
        debug!(
            "SSA: {} phis placed, {} pruned, {} variables renamed",
            self.placed,
            pruned,
            versions.len()
        );
        Ok(SsaForm::new(phi_count, pruned, versions))
    }

    /// Collects the variables read before being written in some block, with the blocks
    /// defining them.
    fn upward_exposed(&self) -> (BTreeSet<LocalId>, HashMap<LocalId, Vec<BlockId>>) {
        let mut globals = BTreeSet::new();
        let mut def_blocks: HashMap<LocalId, Vec<BlockId>> = HashMap::new();

        for block in self.cfg.blocks() {
            let mut killed = HashSet::new();
            for inst in block.instructions() {
                for used in inst.uses() {
                    if !killed.contains(&used) {
                        globals.insert(used);
                    }
                }
                if let Some(def) = inst.def() {
                    killed.insert(def);
                    let blocks = def_blocks.entry(def).or_default();
                    if blocks.last() != Some(&block.id()) {
                        blocks.push(block.id());
                    }
                }
            }
        }
        (globals, def_blocks)
    }

    fn place_phis(&mut self) -> Result<()> {
        let (globals, def_blocks) = self.upward_exposed();
        let frontiers: Vec<Vec<BlockId>> = self
            .cfg
            .dominance_frontiers()
            .iter()
            .map(|frontier| {
                let mut sorted: Vec<BlockId> = frontier.iter().copied().collect();
                sorted.sort();
                sorted
            })
            .collect();

        for variable in globals {
            let Some(defined_in) = def_blocks.get(&variable) else {
                continue;
            };
            let mut has_phi: HashSet<BlockId> = HashSet::new();
            let mut defining: HashSet<BlockId> = defined_in.iter().copied().collect();
            let mut worklist = defined_in.clone();

            while let Some(block) = worklist.pop() {
                for frontier in &frontiers[block.index()] {
                    if !has_phi.insert(*frontier) {
                        continue;
                    }
                    self.insert_phi(*frontier, variable)?;
                    if defining.insert(*frontier) {
                        worklist.push(*frontier);
                    }
                }
            }
        }
        Ok(())
    }

    fn insert_phi(&mut self, block: BlockId, variable: LocalId) -> Result<()> {
        let target = self.cfg.block(block).ok_or_else(|| {
            Error::SsaError(format!("Phi for {variable} placed in missing block {block}"))
        })?;
        let predecessors = target.distinct_predecessors();
        let position = target
            .instructions()
            .first()
            .map(|inst| inst.position())
            .unwrap_or_default();

        let phi = PhiNode::with_predecessors(variable, &predecessors);
        let inst = self.ctx.instruction(InstKind::Phi(phi), position);
        self.cfg.insert_phi(block, inst)?;
        self.placed += 1;
        trace!("phi for {} in {block}", self.ctx.locals().display(variable));
        Ok(())
    }

    fn rename(&mut self) -> Result<()> {
        let count = self.cfg.block_count();
        let dominators = self.cfg.dominators();
        let children: Vec<Vec<BlockId>> = (0..count)
            .map(|index| dominators.children(NodeId::new(index)).to_vec())
            .collect();
        let successors: Vec<Vec<BlockId>> = (0..count)
            .map(|index| {
                let mut distinct: Vec<BlockId> = Vec::new();
                for succ in self.cfg.successors(NodeId::new(index)) {
                    if !distinct.contains(&succ) {
                        distinct.push(succ);
                    }
                }
                distinct
            })
            .collect();

        let mut walk = vec![Visit::Enter(self.cfg.start())];
        while let Some(visit) = walk.pop() {
            match visit {
                Visit::Enter(block) => {
                    let pushed = self.rename_block(block)?;
                    self.fill_successor_phis(block, &successors[block.index()])?;
                    walk.push(Visit::Leave(pushed));
                    for child in children[block.index()].iter().rev() {
                        walk.push(Visit::Enter(*child));
                    }
                }
                Visit::Leave(pushed) => {
                    for origin in pushed {
                        self.stacks.pop(origin);
                    }
                }
            }
        }
        Ok(())
    }

    /// Renames the uses and definitions of `block`, returning the originals it pushed.
    fn rename_block(&mut self, block: BlockId) -> Result<Vec<LocalId>> {
        let locals = self.ctx.locals_mut();
        let stacks = &mut self.stacks;
        let target = self
            .cfg
            .block_mut(block)
            .ok_or_else(|| Error::SsaError(format!("Renaming missing block {block}")))?;

        let mut pushed = Vec::new();
        for inst in &mut target.instructions {
            if let Some(phi) = inst.phi() {
                let origin = phi.origin();
                let version = stacks.fresh(locals, origin);
                inst.set_def(version);
                pushed.push(origin);
                continue;
            }
            inst.for_each_use_mut(|used| *used = stacks.current(*used));
            if let Some(def) = inst.def() {
                let version = stacks.fresh(locals, def);
                inst.set_def(version);
                pushed.push(def);
            }
        }
        Ok(pushed)
    }

    fn fill_successor_phis(&mut self, block: BlockId, successors: &[BlockId]) -> Result<()> {
        for succ in successors {
            let stacks = &self.stacks;
            let target = self.cfg.block_mut(*succ).ok_or_else(|| {
                Error::SsaError(format!("Edge {block} -> {succ} leaves the graph"))
            })?;
            for inst in &mut target.instructions {
                let Some(phi) = inst.phi_mut() else {
                    break;
                };
                let value = stacks.current(phi.origin());
                if !phi.set_operand(block, value) {
                    return Err(Error::SsaError(format!(
                        "Phi in {succ} has no slot for predecessor {block}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Removes phis merging a single value, substituting their result, until none is left.
    fn prune_trivial_phis(&mut self) -> usize {
        let mut pruned = 0;
        loop {
            let trivial: Option<(InstId, LocalId, LocalId)> =
                self.cfg.instructions().find_map(|(_, inst)| {
                    let phi = inst.phi()?;
                    phi.trivial_value()
                        .map(|value| (inst.id(), phi.result(), value))
                });
            let Some((id, result, value)) = trivial else {
                break;
            };

            self.cfg.remove_instruction(id);
            for index in 0..self.cfg.block_count() {
                if let Some(block) = self.cfg.block_mut(NodeId::new(index)) {
                    for inst in &mut block.instructions {
                        inst.for_each_use_mut(|used| {
                            if *used == result {
                                *used = value;
                            }
                        });
                    }
                }
            }
            trace!(
                "pruned trivial phi {} = {}",
                self.ctx.locals().display(result),
                self.ctx.locals().display(value)
            );
            pruned += 1;
        }
        pruned
    }
}
