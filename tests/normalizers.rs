//! Shapes produced by the structural normalizers, observed through the public API.

use flowscope::{
    analysis::{BlockFlags, BlockId, CfgEdgeKind},
    ir::{Callee, Constant, InstKind, Instruction, Operand, Rvalue, TsLowering},
    syntax::{AssignOp, BinaryOp, CatchClause, Expr, FunctionBody, Stmt, SwitchCase},
    utils::graph::algorithms::reachable,
    Body, BodyBuilder, BuildConfig, Result,
};

fn call(name: &str) -> Stmt {
    Stmt::expr(Expr::call(Expr::ident(name), vec![]))
}

fn build(function: &FunctionBody, config: BuildConfig) -> Result<Body> {
    BodyBuilder::new(config, &TsLowering).build(function)
}

fn terminator(body: &Body, block: BlockId) -> Option<&InstKind> {
    body.cfg
        .block(block)
        .and_then(|b| b.terminator())
        .map(Instruction::kind)
}

#[test]
fn test_switch_becomes_strict_comparisons() -> Result<()> {
    let function = FunctionBody::new(
        "classify",
        vec!["k"],
        vec![Stmt::switch(
            Expr::ident("k"),
            vec![
                SwitchCase::case(Expr::num(1.0), vec![call("one")]),
                SwitchCase::case(Expr::num(2.0), vec![call("two"), Stmt::break_(None)]),
                SwitchCase::default(vec![call("other")]),
            ],
        )],
    );
    let body = build(&function, BuildConfig::cfg_only())?;

    let comparisons: Vec<_> = body
        .cfg
        .instructions()
        .filter_map(|(block, inst)| match inst.kind() {
            InstKind::If(condition) => Some((block, condition.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(comparisons.len(), 2);
    for (_, condition) in &comparisons {
        assert_eq!(condition.op, BinaryOp::StrictEq);
    }
    assert_eq!(comparisons[0].1.rhs, Operand::Const(Constant::Number(1.0)));

    // case 1 falls through into case 2
    let first = comparisons[0].0;
    let case_one = body
        .cfg
        .block(first)
        .and_then(|b| b.edge_target(CfgEdgeKind::True))
        .expect("case 1");
    let case_two = body
        .cfg
        .block(comparisons[1].0)
        .and_then(|b| b.edge_target(CfgEdgeKind::True))
        .expect("case 2");
    assert_eq!(
        body.cfg
            .block(case_one)
            .and_then(|b| b.edge_target(CfgEdgeKind::Fallthrough)),
        Some(case_two)
    );
    Ok(())
}

#[test]
fn test_while_loop_needs_no_increment() -> Result<()> {
    let function = FunctionBody::new(
        "spin",
        vec!["n"],
        vec![Stmt::while_(
            Expr::binary(BinaryOp::Gt, Expr::ident("n"), Expr::num(0.0)),
            vec![Stmt::expr(Expr::compound(
                AssignOp::SubAssign,
                Expr::ident("n"),
                Expr::num(1.0),
            ))],
        )],
    );
    let body = build(&function, BuildConfig::cfg_only())?;
    let header = body
        .cfg
        .blocks()
        .iter()
        .find(|block| block.flags().contains(BlockFlags::LOOP_HEADER))
        .expect("header");
    assert!(body
        .cfg
        .blocks()
        .iter()
        .all(|block| !block.flags().contains(BlockFlags::SYNTHETIC)
            || block.flags().contains(BlockFlags::RETURN)));

    let exit = header.edge_target(CfgEdgeKind::False).expect("exit");
    let reached = reachable(&body.cfg, exit);
    assert!(!reached[header.id().index()], "loop exit leads back into the loop");
    Ok(())
}

#[test]
fn test_do_while_condition_targets_body() -> Result<()> {
    let function = FunctionBody::new(
        "repeat",
        vec![],
        vec![Stmt::do_while(vec![call("step")], Expr::call(Expr::ident("more"), vec![]))],
    );
    let body = build(&function, BuildConfig::cfg_only())?;
    let step = body
        .cfg
        .blocks()
        .iter()
        .find(|block| {
            block
                .instructions()
                .iter()
                .any(|inst| matches!(inst.kind(), InstKind::Eval(Rvalue::Call { .. })))
        })
        .expect("body block");
    let test = body
        .cfg
        .blocks()
        .iter()
        .find(|block| matches!(terminator(&body, block.id()), Some(InstKind::If(_))))
        .expect("test block");
    assert_eq!(test.edge_target(CfgEdgeKind::True), Some(step.id()));
    Ok(())
}

fn ternary() -> FunctionBody {
    FunctionBody::new(
        "choose",
        vec!["a"],
        vec![
            Stmt::let_(
                "y",
                Some(Expr::conditional(Expr::ident("a"), Expr::num(1.0), Expr::num(2.0))),
            ),
            Stmt::return_(Some(Expr::ident("y"))),
        ],
    )
}

#[test]
fn test_ternary_temporary_kept_when_disabled() -> Result<()> {
    let config = BuildConfig {
        eliminate_temporaries: false,
        ..BuildConfig::cfg_only()
    };
    let body = build(&ternary(), config)?;
    let temporaries = body
        .cfg
        .instructions()
        .filter(|(_, inst)| inst.def().is_some_and(|def| body.locals.is_temporary(def)))
        .count();
    assert_eq!(temporaries, 2);

    let copy = body
        .cfg
        .instructions()
        .find(|(_, inst)| {
            matches!(inst.kind(), InstKind::Assign { value: Rvalue::Use(Operand::Local(local)), .. }
                if body.locals.is_temporary(*local))
        })
        .map(|(block, _)| block)
        .expect("copy out of the temporary");
    assert!(matches!(terminator(&body, copy), Some(InstKind::Return(_))));

    let folded = build(&ternary(), BuildConfig::cfg_only())?;
    assert_eq!(folded.cfg.block_count(), body.cfg.block_count());
    Ok(())
}

fn try_finally() -> FunctionBody {
    FunctionBody::new(
        "guarded",
        vec![],
        vec![Stmt::try_(
            vec![call("risky")],
            Some(CatchClause::new(Some("e"), vec![call("recover")])),
            Some(vec![call("cleanup")]),
        )],
    )
}

#[test]
fn test_finally_original_is_handler_without_duplication() -> Result<()> {
    let config = BuildConfig {
        duplicate_finally: false,
        ..BuildConfig::default()
    };
    let body = build(&try_finally(), config)?;
    assert!(body
        .cfg
        .blocks()
        .iter()
        .all(|block| !block.flags().contains(BlockFlags::FINALLY_COPY)));

    let finally_entry = body.cfg.regions()[0].finally_entry.expect("finally entry");
    assert!(body
        .cfg
        .traps()
        .iter()
        .any(|trap| trap.handler_entry() == Some(finally_entry)));
    let entry = body.cfg.block(finally_entry).expect("finally block");
    assert!(entry.flags().contains(BlockFlags::EXCEPTION_ENTRY));
    Ok(())
}

#[test]
fn test_finally_copy_protects_catch_blocks() -> Result<()> {
    let body = build(&try_finally(), BuildConfig::default())?;
    let catch_entry = body.cfg.regions()[0].catch_entry.expect("catch entry");
    let trap = body
        .cfg
        .traps()
        .iter()
        .find(|trap| trap.covers(catch_entry))
        .expect("catch blocks are protected");
    let handler = trap.handler_entry().expect("handler");
    let copy = body.cfg.block(handler).expect("copy");
    assert!(copy.flags().contains(BlockFlags::FINALLY_COPY));
    assert!(copy.exceptional_predecessors().contains(&catch_entry));

    // the exception value is bound first thing in the copy
    let bind = copy
        .instructions()
        .iter()
        .find(|inst| inst.phi().is_none())
        .expect("binding");
    assert!(matches!(
        bind.kind(),
        InstKind::Assign {
            value: Rvalue::CaughtException,
            ..
        }
    ));
    Ok(())
}

/// Blocks that call the function named `name`.
fn blocks_calling(body: &Body, name: &str) -> Vec<BlockId> {
    let Some(callee) = body.locals.lookup(name) else {
        return Vec::new();
    };
    let mut blocks: Vec<BlockId> = body
        .cfg
        .instructions()
        .filter(|(_, inst)| {
            matches!(
                inst.kind(),
                InstKind::Eval(Rvalue::Call {
                    callee: Callee::Value(Operand::Local(local)),
                    ..
                }) if *local == callee
            )
        })
        .map(|(block, _)| block)
        .collect();
    blocks.dedup();
    blocks
}

#[test]
fn test_return_in_try_runs_finally_first() -> Result<()> {
    // try { return a; } finally { a = 0; cleanup(); }
    let function = FunctionBody::new(
        "settle",
        vec!["a"],
        vec![Stmt::try_(
            vec![Stmt::return_(Some(Expr::ident("a")))],
            None,
            Some(vec![
                Stmt::expr(Expr::assign(Expr::ident("a"), Expr::num(0.0))),
                call("cleanup"),
            ]),
        )],
    );
    let body = build(&function, BuildConfig::cfg_only())?;
    assert!(body.diagnostics.is_empty(), "{:?}", body.diagnostics);

    let calls = blocks_calling(&body, "cleanup");
    assert_eq!(calls.len(), 2);
    let (copies, normal): (Vec<BlockId>, Vec<BlockId>) = calls.into_iter().partition(|id| {
        body.cfg
            .block(*id)
            .is_some_and(|block| block.flags().contains(BlockFlags::FINALLY_COPY))
    });
    assert_eq!(copies.len(), 1);
    assert!(matches!(terminator(&body, copies[0]), Some(InstKind::Throw(_))));

    // the value is saved before the finally body overwrites `a`
    let a = body.locals.lookup("a").expect("a");
    let mut exit = normal[0];
    while terminator(&body, exit).is_none() {
        exit = body
            .cfg
            .block(exit)
            .and_then(|block| block.edge_target(CfgEdgeKind::Fallthrough))
            .expect("falls through to the return");
    }
    match terminator(&body, exit) {
        Some(InstKind::Return(Some(Operand::Local(saved)))) => {
            assert_ne!(*saved, a);
            assert!(body.locals.is_temporary(*saved));
        }
        other => panic!("unexpected terminator {other:?}"),
    }
    Ok(())
}

#[test]
fn test_break_and_continue_leave_through_finally() -> Result<()> {
    // for (let i = 0; i < 9; i++) {
    //   try { if (i > 5) break; if (i > 2) continue; tick(); } finally { cleanup(); }
    // }
    let gt = |bound: f64| Expr::binary(BinaryOp::Gt, Expr::ident("i"), Expr::num(bound));
    let function = FunctionBody::new(
        "drain",
        vec![],
        vec![Stmt::for_(
            Some(Stmt::let_("i", Some(Expr::num(0.0)))),
            Some(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::num(9.0))),
            Some(Expr::post_increment(Expr::ident("i"))),
            vec![Stmt::try_(
                vec![
                    Stmt::if_(gt(5.0), vec![Stmt::break_(None)], None),
                    Stmt::if_(gt(2.0), vec![Stmt::continue_(None)], None),
                    call("tick"),
                ],
                None,
                Some(vec![call("cleanup")]),
            )],
        )],
    );
    let body = build(&function, BuildConfig::cfg_only())?;
    assert!(body.diagnostics.is_empty(), "{:?}", body.diagnostics);

    // fall-through, break, continue and the exceptional copy
    let calls = blocks_calling(&body, "cleanup");
    assert_eq!(calls.len(), 4);
    let copies = calls
        .iter()
        .filter(|id| {
            body.cfg
                .block(**id)
                .is_some_and(|block| block.flags().contains(BlockFlags::FINALLY_COPY))
        })
        .count();
    assert_eq!(copies, 1);

    // the continue path reaches the header through the increment block
    let header = body
        .cfg
        .blocks()
        .iter()
        .find(|block| block.flags().contains(BlockFlags::LOOP_HEADER))
        .expect("loop header");
    assert_eq!(header.distinct_predecessors().len(), 2);
    Ok(())
}
