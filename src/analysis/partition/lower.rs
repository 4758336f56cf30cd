//! Lowering of builder blocks into the canonical draft.

use std::collections::HashMap;

use crate::{
    analysis::{
        cfg::{
            check_terminators, tag_chain_contains, BlockFlags, BlockId, BlockOrigin, CfgDraft,
            LoopHeader, RegionId, RegionPart, RegionTag, SwitchArm, SwitchDispatch,
        },
        partition::BlockGraph,
        stmtgraph::{BranchTest, LoopRole, NodeKind, PlainStmt, StatementNode, StmtId},
    },
    ir::{
        Condition, Constant, InstKind, Instruction, InstructionLowering, LocalId,
        LoweredCondition, LoweringContext, Operand, Rvalue,
    },
    syntax::{BinaryOp, FunctionBody, Stmt, StmtKind},
    Error, Result,
};

/// Lowers every builder block of `blocks` into a [`CfgDraft`] with the same block ids.
///
/// The start block receives one `p = @parameter(i)` identity per parameter. `for` loop headers
/// and switch blocks get their side-table entries for the normalizers.
///
/// # Errors
///
/// Propagates lowering errors, and returns [`Error::MissingLowering`] when a `return` or `throw`
/// lowers without its terminator.
pub(crate) fn lower(
    blocks: &BlockGraph<'_>,
    body: &FunctionBody,
    lowering: &dyn InstructionLowering,
) -> Result<CfgDraft> {
    let graph = &blocks.graph;
    let mut ctx = LoweringContext::new();
    let mut parameters = Vec::with_capacity(body.params.len());
    for (index, name) in body.params.iter().enumerate() {
        let local = ctx.locals_mut().parameter(name, index);
        parameters.push(ctx.instruction(
            InstKind::Assign {
                def: local,
                value: Rvalue::Parameter(index),
            },
            body.position,
        ));
    }

    let regions = graph
        .regions()
        .iter()
        .map(|region| region.to_try_region())
        .collect();
    let mut draft = CfgDraft::new(ctx, regions);
    for block in blocks.blocks() {
        let id = draft.add_block(
            blocks.region_of(block.id),
            block.flags,
            BlockOrigin::Partition(block.id),
        );
        debug_assert_eq!(id, block.id);
    }
    draft.start = blocks.start;
    draft.block_mut(blocks.start).instructions = parameters;

    let mut saved = HashMap::new();
    for block in blocks.blocks() {
        let mut instructions = Vec::new();
        for node in &block.nodes {
            lower_node(
                graph.node(*node),
                block.id,
                &mut draft,
                lowering,
                &mut saved,
                &mut instructions,
            )?;
        }
        let target = draft.block_mut(block.id);
        target.instructions.extend(instructions);
        check_terminators(target)?;
        for (to, kind) in &block.successors {
            draft.add_edge(block.id, *to, *kind);
        }
    }

    for (index, region) in graph.regions().iter().enumerate() {
        let catch_entry = region.catch_entry.and_then(|node| blocks.block_of(node));
        let finally_tag = RegionTag::new(RegionId(index), RegionPart::Finally);
        let finally_entry = region
            .finally_entry
            .filter(|node| {
                let tags = draft.regions();
                tag_chain_contains(tags, graph.node(*node).region(), finally_tag)
            })
            .and_then(|node| blocks.block_of(node));

        if let Some(entry) = catch_entry {
            draft.block_mut(entry).flags |= BlockFlags::EXCEPTION_ENTRY;
        }
        let record = &mut draft.regions[index];
        record.catch_entry = catch_entry;
        record.has_finally = region.has_finally && finally_entry.is_some();
        record.finally_entry = finally_entry;
    }

    Ok(draft)
}

fn lower_node(
    node: &StatementNode<'_>,
    block: BlockId,
    draft: &mut CfgDraft,
    lowering: &dyn InstructionLowering,
    saved: &mut HashMap<StmtId, LocalId>,
    out: &mut Vec<Instruction>,
) -> Result<()> {
    let position = node.position();
    match node.kind() {
        NodeKind::Plain {
            stmt: PlainStmt::Source(stmt),
            ..
        } => {
            let lowered = lowering.lower_statement(&mut draft.ctx, stmt)?;
            let expected = match stmt.kind {
                StmtKind::Return(_) => Some("return"),
                StmtKind::Throw(_) => Some("throw"),
                _ => None,
            };
            if let Some(expected) = expected {
                let terminated = lowered.last().is_some_and(|inst| {
                    matches!(
                        (inst.kind(), expected),
                        (InstKind::Return(_), "return") | (InstKind::Throw(_), "throw")
                    )
                });
                if !terminated {
                    return Err(Error::MissingLowering {
                        expected,
                        text: stmt.to_string(),
                        position,
                    });
                }
            }
            out.extend(lowered);
        }
        NodeKind::Plain {
            stmt: PlainStmt::CatchBind(name),
            ..
        } => {
            if let Some(name) = name {
                let local = draft.ctx.locals_mut().declare(name);
                out.push(draft.ctx.instruction(
                    InstKind::Assign {
                        def: local,
                        value: Rvalue::CaughtException,
                    },
                    position,
                ));
            }
        }
        NodeKind::Plain {
            stmt: PlainStmt::ImplicitReturn,
            ..
        } => out.push(draft.ctx.instruction(InstKind::Return(None), position)),
        NodeKind::Plain {
            stmt: PlainStmt::SaveReturn(value),
            ..
        } => {
            let lowered = lowering.lower_value(&mut draft.ctx, value, position)?;
            out.extend(lowered.instructions);
            let slot = *saved
                .entry(node.id())
                .or_insert_with(|| draft.ctx.temporary());
            out.push(lowering.generate_assign_for_value(
                &mut draft.ctx,
                slot,
                lowered.value,
                position,
            ));
        }
        NodeKind::Plain {
            stmt: PlainStmt::SavedReturn(from),
            ..
        } => {
            let value = from.map(|from| {
                Operand::Local(*saved.entry(from).or_insert_with(|| draft.ctx.temporary()))
            });
            out.push(draft.ctx.instruction(InstKind::Return(value), position));
        }
        NodeKind::Conditional { test, role, .. } => {
            if let Some(LoopRole::Header { init, update }) = role {
                if init.is_some() || update.is_some() {
                    let init = match init {
                        Some(init) => lowering.lower_statement(&mut draft.ctx, init)?,
                        None => Vec::new(),
                    };
                    let update = match update {
                        Some(update) => {
                            let stmt = Stmt {
                                kind: StmtKind::Expr((*update).clone()),
                                position,
                            };
                            lowering.lower_statement(&mut draft.ctx, &stmt)?
                        }
                        None => Vec::new(),
                    };
                    draft.loop_headers.insert(block, LoopHeader { init, update });
                }
            }
            let lowered = match test {
                BranchTest::Expr(expr) => {
                    lowering.lower_condition(&mut draft.ctx, expr, position)?
                }
                BranchTest::Always => LoweredCondition {
                    instructions: Vec::new(),
                    condition: Condition {
                        op: BinaryOp::Ne,
                        lhs: Operand::Const(Constant::Bool(true)),
                        rhs: Operand::Const(Constant::Bool(false)),
                    },
                },
            };
            out.extend(lowered.instructions);
            out.push(draft.ctx.instruction(InstKind::If(lowered.condition), position));
        }
        NodeKind::Switch {
            discriminant,
            cases,
            ..
        } => {
            let lowered = lowering.lower_value(&mut draft.ctx, discriminant, position)?;
            out.extend(lowered.instructions);
            let mut arms = Vec::with_capacity(cases.len());
            for case in cases {
                let value = lowering.lower_value(&mut draft.ctx, case.test, case.position)?;
                arms.push(SwitchArm {
                    instructions: value.instructions,
                    value: value.value,
                    position: case.position,
                });
            }
            out.push(
                draft
                    .ctx
                    .instruction(InstKind::Switch(lowered.value.clone()), position),
            );
            draft.dispatches.insert(
                block,
                SwitchDispatch {
                    discriminant: lowered.value,
                    arms,
                },
            );
        }
        NodeKind::Entry { .. }
        | NodeKind::Exit
        | NodeKind::Placeholder { .. }
        | NodeKind::Try { .. } => {
            return Err(invariant_error!(
                "Structural node {} reached lowering",
                node.text()
            ));
        }
    }
    Ok(())
}
