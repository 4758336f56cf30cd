//! Exception-handling normalization.
//!
//! Try regions become [`Trap`] records mirrored by exceptional edges. For a region with a real
//! `finally`, the finally blocks are copied once for the exceptional path: the copy starts by
//! binding the in-flight exception and ends by rethrowing it wherever the original would leave
//! the finally body. The original finally blocks stay on the normal path only, and are dropped
//! when nothing enters them normally: a `return`, `break` or `continue` leaving the try runs its
//! own inline copy of the finally body.
//!
//! ```text
//! try { T } catch (e) { C } finally { F }
//!
//!   T ──► F ──► after            T ┄┄► C      (trap: try → catch)
//!   C ──► F                      C ┄┄► F'     (trap: catch → finally copy)
//!                                F' = %exc = caughtexception; F; throw %exc
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, trace};

use crate::{
    analysis::{
        cfg::{
            tag_chain_contains, BlockFlags, BlockId, BlockOrigin, CfgDraft, CfgEdge, CfgEdgeKind,
            RegionId, RegionPart, RegionTag, Trap,
        },
        normalize::NormalizePass,
    },
    ir::{InstKind, Instruction, InstructionLowering, LocalId, Operand, Rvalue},
    syntax::SourcePosition,
    BuildConfig, Result,
};

/// Records traps and duplicates finally blocks for the exceptional path.
pub struct TrapNormalizer;

impl NormalizePass for TrapNormalizer {
    fn name(&self) -> &'static str {
        "trap"
    }

    fn run(
        &self,
        mut draft: CfgDraft,
        _lowering: &dyn InstructionLowering,
        config: &BuildConfig,
    ) -> Result<CfgDraft> {
        let mut order: Vec<usize> = (0..draft.regions.len()).collect();
        order.sort_by_key(|index| {
            std::cmp::Reverse(draft.regions[*index].depth(&draft.regions))
        });
        for index in order {
            normalize_region(&mut draft, RegionId(index), config)?;
        }
        Ok(draft)
    }
}

fn members(draft: &CfgDraft, region: RegionId, part: RegionPart) -> Vec<BlockId> {
    let tag = RegionTag::new(region, part);
    draft
        .live_blocks()
        .into_iter()
        .filter(|block| tag_chain_contains(&draft.regions, draft.block(*block).region(), tag))
        .collect()
}

fn normalize_region(draft: &mut CfgDraft, id: RegionId, config: &BuildConfig) -> Result<()> {
    let region = draft.regions[id.index()].clone();
    let try_blocks = members(draft, id, RegionPart::Try);
    let mut catch_blocks = members(draft, id, RegionPart::Catch);
    if let Some(entry) = region.catch_entry {
        catch_blocks.retain(|block| *block != entry);
        catch_blocks.insert(0, entry);
    }

    let protected = if region.catch_entry.is_some() {
        &catch_blocks
    } else {
        &try_blocks
    };
    let handler = match region.finally_entry {
        Some(entry) if region.has_finally && !protected.is_empty() => {
            if config.duplicate_finally {
                Some(duplicate_finally(draft, id, entry, region.position)?)
            } else {
                draft.block_mut(entry).flags |= BlockFlags::EXCEPTION_ENTRY;
                Some(entry)
            }
        }
        _ => None,
    };
    if let Some(entry) = region.finally_entry.filter(|_| region.has_finally) {
        if handler != Some(entry) {
            discard_unentered_finally(draft, id, entry)?;
        }
    }

    if region.catch_entry.is_some() {
        if !try_blocks.is_empty() {
            record_trap(draft, id, try_blocks, catch_blocks.clone());
        }
        if let Some(handler) = handler {
            record_trap(draft, id, catch_blocks, vec![handler]);
        }
    } else if let Some(handler) = handler {
        record_trap(draft, id, try_blocks, vec![handler]);
    }
    Ok(())
}

fn record_trap(
    draft: &mut CfgDraft,
    region: RegionId,
    try_blocks: Vec<BlockId>,
    handlers: Vec<BlockId>,
) {
    let Some(&entry) = handlers.first() else {
        return;
    };
    for block in &try_blocks {
        draft.add_exceptional_edge(*block, entry);
    }
    trace!(
        "trap for {region}: {} protected blocks -> {entry}",
        try_blocks.len()
    );
    draft.traps.push(Trap {
        region,
        try_blocks,
        handlers,
    });
}

/// Blocks of the finally body of `region` reachable from `entry`, entry first.
fn finally_blocks(draft: &CfgDraft, region: RegionId, entry: BlockId) -> Result<Vec<BlockId>> {
    let tag = RegionTag::new(region, RegionPart::Finally);
    let in_finally = |draft: &CfgDraft, block: BlockId| {
        tag_chain_contains(&draft.regions, draft.block(block).region(), tag)
    };
    if !in_finally(draft, entry) {
        return Err(invariant_error!(
            "Finally entry {} of {} lies outside its region",
            entry,
            region
        ));
    }

    let mut originals = Vec::new();
    let mut seen = HashSet::from([entry]);
    let mut queue = VecDeque::from([entry]);
    while let Some(block) = queue.pop_front() {
        originals.push(block);
        let current = draft.block(block);
        let next = current
            .successors()
            .iter()
            .map(|edge| edge.target())
            .chain(current.exceptional_successors().iter().copied())
            .collect::<Vec<_>>();
        for target in next {
            if in_finally(draft, target) && seen.insert(target) {
                queue.push_back(target);
            }
        }
    }
    Ok(originals)
}

/// Removes the original finally blocks of `region` when no block outside them enters them.
/// Synthetic blocks only they reached go with them.
fn discard_unentered_finally(draft: &mut CfgDraft, region: RegionId, entry: BlockId) -> Result<()> {
    if entry == draft.start() {
        return Ok(());
    }
    let originals = finally_blocks(draft, region, entry)?;
    let entered = originals.iter().any(|block| {
        let block = draft.block(*block);
        block
            .predecessors()
            .iter()
            .chain(block.exceptional_predecessors())
            .any(|pred| !originals.contains(pred))
    });
    if entered {
        return Ok(());
    }

    let mut followers = Vec::new();
    for block in &originals {
        followers.extend(
            draft
                .block(*block)
                .successors()
                .iter()
                .map(CfgEdge::target)
                .filter(|target| !originals.contains(target)),
        );
        draft.unlink(*block);
        draft.remove_block(*block)?;
    }
    for block in followers {
        let follower = draft.block(block);
        if draft.is_live(block)
            && follower.flags().contains(BlockFlags::SYNTHETIC)
            && follower.predecessors().is_empty()
            && follower.exceptional_predecessors().is_empty()
        {
            draft.unlink(block);
            draft.remove_block(block)?;
        }
    }
    for trap in &mut draft.traps {
        trap.try_blocks.retain(|block| !originals.contains(block));
    }
    draft.traps.retain(|trap| !trap.try_blocks.is_empty());
    debug!(
        "dropped {} finally blocks of {region} left without entry",
        originals.len()
    );
    Ok(())
}

/// Copies the finally body of `region` for the exceptional path and returns the copy's entry.
fn duplicate_finally(
    draft: &mut CfgDraft,
    region: RegionId,
    entry: BlockId,
    position: SourcePosition,
) -> Result<BlockId> {
    let originals = finally_blocks(draft, region, entry)?;

    let mut copy_of: HashMap<BlockId, BlockId> = HashMap::new();
    for original in &originals {
        let source = draft.block(*original);
        let (region_tag, flags) = (source.region(), source.flags());
        let instructions = source.instructions().to_vec();
        let copy = draft.add_block(
            region_tag,
            flags | BlockFlags::FINALLY_COPY,
            BlockOrigin::Copy(*original),
        );
        let copied = instructions
            .iter()
            .map(|inst| draft.ctx.duplicate(inst))
            .collect();
        draft.block_mut(copy).instructions = copied;
        copy_of.insert(*original, copy);
    }

    let exception = draft.ctx.temporary();
    let entry_region = draft.block(entry).region();
    let mut rethrow: Option<BlockId> = None;
    for original in &originals {
        let copy = copy_of[original];
        let edges = draft.block(*original).successors().to_vec();
        let leaves_alone = matches!(&edges[..], [edge] if !copy_of.contains_key(&edge.target()));
        if leaves_alone && !draft.block(copy).ends_in_terminator() {
            let at = draft
                .block(copy)
                .instructions()
                .last()
                .map_or(position, |inst| inst.position());
            let throw = rethrow_instruction(draft, exception, at);
            draft.block_mut(copy).instructions.push(throw);
            continue;
        }
        for edge in edges {
            let target = match copy_of.get(&edge.target()) {
                Some(target) => *target,
                None => *rethrow.get_or_insert_with(|| {
                    let block = draft.add_block(
                        entry_region,
                        BlockFlags::SYNTHETIC | BlockFlags::FINALLY_COPY,
                        BlockOrigin::Synthetic,
                    );
                    let throw = rethrow_instruction(draft, exception, position);
                    draft.block_mut(block).instructions.push(throw);
                    block
                }),
            };
            draft.add_edge(copy, target, edge.kind());
        }
    }

    for original in &originals {
        let copy = copy_of[original];
        let handlers = draft.block(*original).exceptional_successors().to_vec();
        for handler in handlers {
            let target = copy_of.get(&handler).copied().unwrap_or(handler);
            draft.add_exceptional_edge(copy, target);
        }
    }
    let cloned: Vec<Trap> = draft
        .traps
        .iter()
        .filter_map(|trap| {
            let try_blocks: Vec<BlockId> = trap
                .try_blocks
                .iter()
                .filter_map(|block| copy_of.get(block).copied())
                .collect();
            if try_blocks.is_empty() {
                return None;
            }
            Some(Trap {
                region: trap.region,
                try_blocks,
                handlers: trap
                    .handlers
                    .iter()
                    .map(|block| copy_of.get(block).copied().unwrap_or(*block))
                    .collect(),
            })
        })
        .collect();
    draft.traps.extend(cloned);

    let bind = draft.ctx.instruction(
        InstKind::Assign {
            def: exception,
            value: Rvalue::CaughtException,
        },
        position,
    );
    let copied_entry = copy_of[&entry];
    let reentered = draft
        .block(entry)
        .predecessors()
        .iter()
        .any(|pred| copy_of.contains_key(pred));
    let handler = if reentered {
        let landing = draft.add_block(
            entry_region,
            BlockFlags::SYNTHETIC | BlockFlags::FINALLY_COPY | BlockFlags::EXCEPTION_ENTRY,
            BlockOrigin::Synthetic,
        );
        draft.block_mut(landing).instructions.push(bind);
        draft.add_edge(landing, copied_entry, CfgEdgeKind::Fallthrough);
        landing
    } else {
        let block = draft.block_mut(copied_entry);
        block.instructions.insert(0, bind);
        block.flags |= BlockFlags::EXCEPTION_ENTRY;
        copied_entry
    };

    debug!(
        "duplicated {} finally blocks of {region}, handler {handler}",
        originals.len()
    );
    Ok(handler)
}

fn rethrow_instruction(
    draft: &mut CfgDraft,
    exception: LocalId,
    position: SourcePosition,
) -> Instruction {
    draft
        .ctx
        .instruction(InstKind::Throw(Operand::Local(exception)), position)
}
