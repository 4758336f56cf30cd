//! Conditional-operator normalization.
//!
//! Lowering leaves ternaries and short-circuit operators inline as marker groups:
//!
//! ```text
//! prefix; @start n; test; @true n <cond>; T; @false n; F; @end n; rest
//! ```
//!
//! Each group is replaced by a diamond: the original block keeps `prefix; test; if <cond>`, two
//! fresh blocks hold `T` and `F`, and a merge block holds `rest` together with the original
//! successors. The first group of a block is always the outermost one, so nested groups end up in
//! one of the new blocks and are split when the worklist reaches them.
//!
//! Afterwards, going from the innermost group outwards, `x = t` aliases at the head of a merge are
//! folded into the branches (`t = a` becomes `x = a`) and merges left empty are bypassed.

use std::collections::HashSet;

use log::trace;

use crate::{
    analysis::{
        cfg::{BlockFlags, BlockId, BlockOrigin, CfgDraft, CfgEdgeKind},
        normalize::NormalizePass,
    },
    ir::{InstKind, Instruction, InstructionLowering, LocalId, Marker, Operand, Rvalue},
    BuildConfig, Result,
};

/// Splits marker groups into diamonds and eliminates result temporaries.
pub struct ConditionalNormalizer;

#[derive(Debug, Clone, Copy)]
struct Group {
    depth: usize,
    order: usize,
    merge: BlockId,
}

struct Diamond {
    on_true: BlockId,
    on_false: BlockId,
    merge: BlockId,
}

impl NormalizePass for ConditionalNormalizer {
    fn name(&self) -> &'static str {
        "conditional"
    }

    fn run(
        &self,
        mut draft: CfgDraft,
        _lowering: &dyn InstructionLowering,
        config: &BuildConfig,
    ) -> Result<CfgDraft> {
        let mut groups: Vec<Group> = Vec::new();
        let mut work: Vec<(BlockId, usize)> = draft
            .live_blocks()
            .into_iter()
            .rev()
            .map(|block| (block, 0))
            .collect();

        while let Some((block, depth)) = work.pop() {
            let Some(diamond) = split_first_group(&mut draft, block)? else {
                continue;
            };
            groups.push(Group {
                depth,
                order: groups.len(),
                merge: diamond.merge,
            });
            work.push((diamond.merge, depth));
            work.push((diamond.on_false, depth + 1));
            work.push((diamond.on_true, depth + 1));
            work.push((block, depth));
        }

        groups.sort_by(|a, b| b.depth.cmp(&a.depth).then(b.order.cmp(&a.order)));
        for group in &groups {
            if config.eliminate_temporaries {
                fold_alias(&mut draft, group.merge);
            }
            remove_empty_merge(&mut draft, group.merge)?;
        }
        Ok(draft)
    }
}

fn marker_index(
    instructions: &[Instruction],
    from: usize,
    wanted: impl Fn(&Marker) -> bool,
) -> Option<usize> {
    instructions
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, inst)| inst.marker().is_some_and(&wanted))
        .map(|(index, _)| index)
}

fn split_first_group(draft: &mut CfgDraft, block: BlockId) -> Result<Option<Diamond>> {
    let instructions = &draft.block(block).instructions;
    let Some(start) = marker_index(instructions, 0, |marker| {
        matches!(marker, Marker::ConditionStart(_))
    }) else {
        return Ok(None);
    };
    let group = instructions[start].marker().map_or(0, Marker::group);
    let on_true = marker_index(instructions, start + 1, |marker| {
        matches!(marker, Marker::BranchTrue { group: g, .. } if *g == group)
    });
    let on_false = on_true.and_then(|at| {
        marker_index(instructions, at + 1, |marker| {
            matches!(marker, Marker::BranchFalse(g) if *g == group)
        })
    });
    let end = on_false.and_then(|at| {
        marker_index(instructions, at + 1, |marker| {
            matches!(marker, Marker::ConditionEnd(g) if *g == group)
        })
    });
    let (Some(on_true), Some(on_false), Some(end)) = (on_true, on_false, end) else {
        return Err(invariant_error!(
            "Marker group {} in block {} is incomplete",
            group,
            block
        ));
    };

    let mut prefix = std::mem::take(&mut draft.block_mut(block).instructions);
    let rest = prefix.split_off(end + 1);
    prefix.pop();
    let false_part = prefix.split_off(on_false + 1);
    prefix.pop();
    let true_part = prefix.split_off(on_true + 1);
    let branch = prefix.pop();
    let test = prefix.split_off(start + 1);
    prefix.pop();

    let (condition, position) = match branch {
        Some(inst) => match inst.kind() {
            InstKind::Marker(Marker::BranchTrue { condition, .. }) => {
                (condition.clone(), inst.position())
            }
            _ => return Err(invariant_error!("Marker group {} lost its branch", group)),
        },
        None => return Err(invariant_error!("Marker group {} lost its branch", group)),
    };
    let branch = draft.ctx.instruction(InstKind::If(condition), position);
    prefix.extend(test);
    prefix.push(branch);

    let region = draft.block(block).region();
    let returns = draft.block(block).flags() & BlockFlags::RETURN;
    let cond = draft.block_mut(block);
    cond.instructions = prefix;
    cond.flags.remove(BlockFlags::RETURN);

    let on_true = draft.add_block(region, BlockFlags::SYNTHETIC, BlockOrigin::Synthetic);
    let on_false = draft.add_block(region, BlockFlags::SYNTHETIC, BlockOrigin::Synthetic);
    let merge = draft.add_block(region, BlockFlags::SYNTHETIC | returns, BlockOrigin::Synthetic);
    draft.block_mut(on_true).instructions = true_part;
    draft.block_mut(on_false).instructions = false_part;
    draft.block_mut(merge).instructions = rest;

    for edge in draft.take_successors(block) {
        draft.add_edge(merge, edge.target(), edge.kind());
    }
    draft.add_edge(block, on_true, CfgEdgeKind::True);
    draft.add_edge(block, on_false, CfgEdgeKind::False);
    draft.add_edge(on_true, merge, CfgEdgeKind::Fallthrough);
    draft.add_edge(on_false, merge, CfgEdgeKind::Fallthrough);
    trace!("group {group} of {block}: diamond {on_true}/{on_false} -> {merge}");

    Ok(Some(Diamond {
        on_true,
        on_false,
        merge,
    }))
}

/// Folds `alias = temp` at the head of `merge` into the definitions of `temp` in its
/// predecessors.
fn fold_alias(draft: &mut CfgDraft, merge: BlockId) {
    if !draft.is_live(merge) {
        return;
    }
    let block = draft.block(merge);
    let Some((alias, temp)) = block.instructions().first().and_then(|inst| match inst.kind() {
        InstKind::Assign {
            def,
            value: Rvalue::Use(Operand::Local(temp)),
        } => Some((*def, *temp)),
        _ => None,
    }) else {
        return;
    };
    if alias == temp || !draft.ctx.locals().is_temporary(temp) {
        return;
    }
    if !block.exceptional_predecessors().is_empty() || block.predecessors().is_empty() {
        return;
    }

    let preds = block.predecessors().to_vec();
    let distinct: HashSet<BlockId> = preds.iter().copied().collect();
    if distinct.len() != preds.len() {
        return;
    }
    let producers_ok = preds.iter().all(|pred| {
        let pred = draft.block(*pred);
        matches!(pred.successors(), [edge] if edge.target() == merge)
            && pred.instructions().last().and_then(|inst| inst.def()) == Some(temp)
    });
    if !producers_ok {
        return;
    }
    let (defs, uses) = count_defs_and_uses(draft, temp);
    if defs != preds.len() || uses != 1 {
        return;
    }

    for pred in &preds {
        if let Some(last) = draft.block_mut(*pred).instructions.last_mut() {
            last.set_def(alias);
        }
    }
    draft.block_mut(merge).instructions.remove(0);
    trace!("folded temporary into {} predecessors of {merge}", preds.len());
}

fn count_defs_and_uses(draft: &CfgDraft, local: LocalId) -> (usize, usize) {
    let mut defs = 0;
    let mut uses = 0;
    for block in draft.live_blocks() {
        for inst in draft.block(block).instructions() {
            if inst.def() == Some(local) {
                defs += 1;
            }
            uses += inst.uses().iter().filter(|used| **used == local).count();
        }
    }
    (defs, uses)
}

fn remove_empty_merge(draft: &mut CfgDraft, merge: BlockId) -> Result<()> {
    if !draft.is_live(merge) {
        return Ok(());
    }
    let block = draft.block(merge);
    let successor = match block.successors() {
        [edge] if edge.kind() == CfgEdgeKind::Fallthrough => edge.target(),
        _ => return Ok(()),
    };
    if !block.is_empty()
        || successor == merge
        || !block.exceptional_predecessors().is_empty()
        || !block.exceptional_successors().is_empty()
        || merge == draft.start()
    {
        return Ok(());
    }

    let mut preds = block.predecessors().to_vec();
    preds.dedup();
    for pred in preds {
        draft.retarget(pred, merge, successor);
    }
    draft.take_successors(merge);
    draft.remove_block(merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{
            partition::{lower, partition},
            stmtgraph::StatementGraphBuilder,
        },
        ir::TsLowering,
        syntax::{BinaryOp, Expr, FunctionBody, LogicalOp, Stmt},
    };

    fn normalized(body: &FunctionBody, config: &BuildConfig) -> CfgDraft {
        let graph = StatementGraphBuilder::new(64).build(body).expect("graph");
        let blocks = partition(graph).expect("partition");
        let draft = lower(&blocks, body, &TsLowering).expect("lower");
        let draft = ConditionalNormalizer
            .run(draft, &TsLowering, config)
            .expect("conditional");
        draft.check().expect("symmetric");
        draft
    }

    fn no_markers(draft: &CfgDraft) -> bool {
        draft.live_blocks().into_iter().all(|id| {
            draft
                .block(id)
                .instructions()
                .iter()
                .all(|inst| inst.marker().is_none())
        })
    }

    fn ternary_body() -> FunctionBody {
        FunctionBody::new(
            "f",
            vec!["c"],
            vec![
                Stmt::let_(
                    "x",
                    Some(Expr::conditional(
                        Expr::binary(BinaryOp::Gt, Expr::ident("c"), Expr::num(0.0)),
                        Expr::num(1.0),
                        Expr::num(2.0),
                    )),
                ),
                Stmt::return_(Some(Expr::ident("x"))),
            ],
        )
    }

    #[test]
    fn test_ternary_becomes_diamond() {
        let draft = normalized(&ternary_body(), &BuildConfig::default());
        assert!(no_markers(&draft));

        let start = draft.block(draft.start());
        assert!(matches!(
            start.terminator().map(Instruction::kind),
            Some(InstKind::If(_))
        ));
        let on_true = start.edge_target(CfgEdgeKind::True).expect("true");
        let on_false = start.edge_target(CfgEdgeKind::False).expect("false");
        let x = draft.ctx.locals().lookup("x").expect("x");
        for branch in [on_true, on_false] {
            let block = draft.block(branch);
            assert_eq!(block.instructions().len(), 1);
            assert_eq!(block.instructions()[0].def(), Some(x));
        }

        let merge = draft.block(on_true).successors()[0].target();
        assert_eq!(draft.block(on_false).successors()[0].target(), merge);
        assert!(matches!(
            draft.block(merge).instructions()[0].kind(),
            InstKind::Return(_)
        ));
    }

    #[test]
    fn test_temporaries_kept_when_disabled() {
        let config = BuildConfig {
            eliminate_temporaries: false,
            ..BuildConfig::default()
        };
        let draft = normalized(&ternary_body(), &config);
        let start = draft.block(draft.start());
        let on_true = start.edge_target(CfgEdgeKind::True).expect("true");
        let def = draft.block(on_true).instructions()[0].def().expect("def");
        assert!(draft.ctx.locals().is_temporary(def));
    }

    #[test]
    fn test_nested_ternary_resolves_chain() {
        let body = FunctionBody::new(
            "f",
            vec!["a", "b"],
            vec![
                Stmt::let_(
                    "x",
                    Some(Expr::conditional(
                        Expr::ident("a"),
                        Expr::conditional(Expr::ident("b"), Expr::num(1.0), Expr::num(2.0)),
                        Expr::num(3.0),
                    )),
                ),
                Stmt::return_(Some(Expr::ident("x"))),
            ],
        );
        let draft = normalized(&body, &BuildConfig::default());
        assert!(no_markers(&draft));

        let x = draft.ctx.locals().lookup("x").expect("x");
        let defs_of_x = draft
            .live_blocks()
            .into_iter()
            .flat_map(|id| draft.block(id).instructions().to_vec())
            .filter(|inst| inst.def() == Some(x))
            .count();
        assert_eq!(defs_of_x, 3);
        let temp_defs = draft
            .live_blocks()
            .into_iter()
            .flat_map(|id| draft.block(id).instructions().to_vec())
            .filter_map(|inst| inst.def())
            .filter(|def| draft.ctx.locals().is_temporary(*def))
            .count();
        assert_eq!(temp_defs, 0);
    }

    #[test]
    fn test_short_circuit_in_condition() {
        let body = FunctionBody::new(
            "f",
            vec!["a", "b"],
            vec![Stmt::if_(
                Expr::logical(LogicalOp::And, Expr::ident("a"), Expr::ident("b")),
                vec![Stmt::expr(Expr::call(Expr::ident("both"), vec![]))],
                None,
            )],
        );
        let draft = normalized(&body, &BuildConfig::default());
        assert!(no_markers(&draft));
        let ifs = draft
            .live_blocks()
            .into_iter()
            .filter(|id| {
                matches!(
                    draft.block(*id).terminator().map(Instruction::kind),
                    Some(InstKind::If(_))
                )
            })
            .count();
        assert_eq!(ifs, 2);
    }
}
