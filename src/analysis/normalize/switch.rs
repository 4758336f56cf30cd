//! Switch dispatch lowering into comparison chains.
//!
//! `switch (d) { case a: A; case b: B; default: D }` becomes
//!
//! ```text
//!   [.. d; if d === a] ─true─► A
//!          │false
//!   [a's code; if d === b] ─true─► B
//!          │false
//!          ▼
//!          D
//! ```
//!
//! The first comparison reuses the switch block; the following ones are synthetic.

use log::trace;

use crate::{
    analysis::{
        cfg::{BlockFlags, BlockId, BlockOrigin, CfgDraft, CfgEdgeKind, SwitchDispatch},
        normalize::NormalizePass,
    },
    ir::{InstKind, InstructionLowering},
    BuildConfig, Result,
};

/// Rewrites `Switch` terminators into chains of two-way comparisons.
pub struct SwitchNormalizer;

impl NormalizePass for SwitchNormalizer {
    fn name(&self) -> &'static str {
        "switch"
    }

    fn run(
        &self,
        mut draft: CfgDraft,
        lowering: &dyn InstructionLowering,
        _config: &BuildConfig,
    ) -> Result<CfgDraft> {
        let mut blocks: Vec<BlockId> = draft.dispatches.keys().copied().collect();
        blocks.sort();
        for block in blocks {
            if let Some(dispatch) = draft.dispatches.remove(&block) {
                rewrite_dispatch(&mut draft, block, dispatch, lowering)?;
            }
        }
        Ok(draft)
    }
}

fn rewrite_dispatch(
    draft: &mut CfgDraft,
    block: BlockId,
    dispatch: SwitchDispatch,
    lowering: &dyn InstructionLowering,
) -> Result<()> {
    let switch = draft.block_mut(block).instructions.pop();
    let position = match switch {
        Some(inst) if matches!(inst.kind(), InstKind::Switch(_)) => inst.position(),
        _ => return Err(invariant_error!("Block {} does not end in a switch", block)),
    };

    let edges = draft.take_successors(block);
    let mut cases = vec![None; dispatch.arms.len()];
    let mut default = None;
    for edge in &edges {
        match edge.kind() {
            CfgEdgeKind::Case(index) if index < cases.len() => cases[index] = Some(edge.target()),
            CfgEdgeKind::Default => default = Some(edge.target()),
            kind => {
                return Err(invariant_error!(
                    "Unexpected {} edge on switch block {}",
                    kind,
                    block
                ))
            }
        }
    }
    let default =
        default.ok_or_else(|| invariant_error!("Switch block {} has no default edge", block))?;

    if dispatch.arms.is_empty() {
        draft.add_edge(block, default, CfgEdgeKind::Fallthrough);
        return Ok(());
    }

    let region = draft.block(block).region();
    let count = dispatch.arms.len();
    let mut current = block;
    for (index, arm) in dispatch.arms.into_iter().enumerate() {
        let target = cases[index]
            .ok_or_else(|| invariant_error!("Switch block {} misses case {}", block, index))?;
        let test = lowering.generate_if_for_values(
            &mut draft.ctx,
            dispatch.discriminant.clone(),
            arm.value,
            arm.position,
        );
        let code = draft.block_mut(current);
        code.instructions.extend(arm.instructions);
        code.instructions.push(test);
        draft.add_edge(current, target, CfgEdgeKind::True);

        if index + 1 == count {
            draft.add_edge(current, default, CfgEdgeKind::False);
        } else {
            let next = draft.add_block(region, BlockFlags::SYNTHETIC, BlockOrigin::Synthetic);
            draft.add_edge(current, next, CfgEdgeKind::False);
            current = next;
        }
    }
    trace!("switch at {position} in {block} became {count} comparisons");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{
            partition::{lower, partition},
            stmtgraph::StatementGraphBuilder,
        },
        ir::{Instruction, TsLowering},
        syntax::{Expr, FunctionBody, Stmt, SwitchCase},
    };

    fn normalized(body: &FunctionBody) -> CfgDraft {
        let graph = StatementGraphBuilder::new(64).build(body).expect("graph");
        let blocks = partition(graph).expect("partition");
        let draft = lower(&blocks, body, &TsLowering).expect("lower");
        let draft = SwitchNormalizer
            .run(draft, &TsLowering, &BuildConfig::default())
            .expect("switch");
        draft.check().expect("symmetric");
        draft
    }

    fn call(name: &str) -> Stmt {
        Stmt::expr(Expr::call(Expr::ident(name), vec![]))
    }

    #[test]
    fn test_chain_of_comparisons() {
        let body = FunctionBody::new(
            "f",
            vec!["k"],
            vec![Stmt::switch(
                Expr::ident("k"),
                vec![
                    SwitchCase::case(Expr::num(1.0), vec![call("one"), Stmt::break_(None)]),
                    SwitchCase::case(Expr::num(2.0), vec![call("two"), Stmt::break_(None)]),
                    SwitchCase::default(vec![call("other")]),
                ],
            )],
        );
        let draft = normalized(&body);
        assert!(draft.dispatches.is_empty());

        let first = draft.start();
        let block = draft.block(first);
        assert!(matches!(
            block.terminator().map(Instruction::kind),
            Some(InstKind::If(_))
        ));
        let second = block.edge_target(CfgEdgeKind::False).expect("false edge");
        assert!(draft.block(second).flags().contains(BlockFlags::SYNTHETIC));
        assert!(draft.block(second).edge_target(CfgEdgeKind::True).is_some());
        assert!(draft.block(second).edge_target(CfgEdgeKind::False).is_some());

        let switch_left = draft.live_blocks().into_iter().any(|id| {
            draft
                .block(id)
                .instructions()
                .iter()
                .any(|inst| matches!(inst.kind(), InstKind::Switch(_)))
        });
        assert!(!switch_left);
    }

    #[test]
    fn test_default_only_becomes_fallthrough() {
        let body = FunctionBody::new(
            "f",
            vec!["k"],
            vec![Stmt::switch(
                Expr::ident("k"),
                vec![SwitchCase::default(vec![call("other")])],
            )],
        );
        let draft = normalized(&body);
        let start = draft.block(draft.start());
        assert!(start.terminator().is_none());
        assert_eq!(start.successors().len(), 1);
        assert_eq!(start.successors()[0].kind(), CfgEdgeKind::Fallthrough);
    }
}
