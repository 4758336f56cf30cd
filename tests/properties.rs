//! Structural properties checked over a corpus of bodies.
//!
//! Every body of the corpus is built with the strict configuration and then checked for:
//! - edge symmetry and the single-terminator rule ([`Cfg::verify`])
//! - reachability of every block from the start block
//! - dominator and dominance-frontier consistency
//! - loop shape: every back edge of a `for` loop with an update runs through its increment block
//! - no unreachable-code diagnostics for bodies without dead code
//! - SSA single assignment and dominance of uses ([`flowscope::analysis::SsaForm::verify`])

use flowscope::{
    analysis::{BlockFlags, BlockId, Cfg},
    build_bodies,
    ir::{InstKind, TsLowering},
    syntax::{
        AssignOp, BinaryOp, CatchClause, Expr, FunctionBody, LogicalOp, Stmt, StmtKind,
        SwitchCase, UnaryOp,
    },
    utils::graph::{algorithms::reachable, NodeId, Predecessors, RootedGraph, Successors},
    Body, BodyBuilder, BuildConfig, Result,
};

fn call(name: &str) -> Stmt {
    Stmt::expr(Expr::call(Expr::ident(name), vec![]))
}

fn call_with(name: &str, arg: &str) -> Stmt {
    Stmt::expr(Expr::call(Expr::ident(name), vec![Expr::ident(arg)]))
}

fn assign(name: &str, value: Expr) -> Stmt {
    Stmt::expr(Expr::assign(Expr::ident(name), value))
}

fn lt(name: &str, bound: f64) -> Expr {
    Expr::binary(BinaryOp::Lt, Expr::ident(name), Expr::num(bound))
}

fn counting(var: &str, bound: f64, body: Vec<Stmt>) -> Stmt {
    Stmt::for_(
        Some(Stmt::let_(var, Some(Expr::num(0.0)))),
        Some(lt(var, bound)),
        Some(Expr::post_increment(Expr::ident(var))),
        body,
    )
}

fn corpus() -> Vec<FunctionBody> {
    vec![
        FunctionBody::new("empty", vec![], vec![]),
        FunctionBody::new(
            "straight",
            vec!["a", "b"],
            vec![
                Stmt::let_("s", Some(Expr::binary(BinaryOp::Add, Expr::ident("a"), Expr::ident("b")))),
                Stmt::return_(Some(Expr::ident("s"))),
            ],
        ),
        FunctionBody::new(
            "nested_loops",
            vec!["n"],
            vec![
                Stmt::let_("acc", Some(Expr::num(0.0))),
                counting(
                    "i",
                    10.0,
                    vec![counting(
                        "j",
                        5.0,
                        vec![Stmt::expr(Expr::compound(
                            AssignOp::AddAssign,
                            Expr::ident("acc"),
                            Expr::ident("j"),
                        ))],
                    )],
                ),
                Stmt::return_(Some(Expr::ident("acc"))),
            ],
        ),
        FunctionBody::new(
            "while_break_continue",
            vec!["n"],
            vec![
                Stmt::let_("i", Some(Expr::num(0.0))),
                Stmt::while_(
                    Expr::Bool(true),
                    vec![
                        Stmt::expr(Expr::post_increment(Expr::ident("i"))),
                        Stmt::if_(lt("i", 3.0), vec![Stmt::continue_(None)], None),
                        Stmt::if_(
                            Expr::binary(BinaryOp::Gt, Expr::ident("i"), Expr::ident("n")),
                            vec![Stmt::break_(None)],
                            None,
                        ),
                        call_with("log", "i"),
                    ],
                ),
                Stmt::return_(Some(Expr::ident("i"))),
            ],
        ),
        FunctionBody::new(
            "do_while",
            vec!["n"],
            vec![
                Stmt::let_("k", Some(Expr::ident("n"))),
                Stmt::do_while(
                    vec![Stmt::expr(Expr::compound(
                        AssignOp::SubAssign,
                        Expr::ident("k"),
                        Expr::num(1.0),
                    ))],
                    Expr::binary(BinaryOp::Gt, Expr::ident("k"), Expr::num(0.0)),
                ),
                Stmt::return_(Some(Expr::ident("k"))),
            ],
        ),
        FunctionBody::new(
            "labeled",
            vec![],
            vec![Stmt::labeled(
                "outer",
                counting(
                    "i",
                    4.0,
                    vec![counting(
                        "j",
                        4.0,
                        vec![
                            Stmt::if_(
                                Expr::binary(BinaryOp::StrictEq, Expr::ident("j"), Expr::ident("i")),
                                vec![Stmt::continue_(Some("outer"))],
                                None,
                            ),
                            Stmt::if_(lt("j", 0.0), vec![Stmt::break_(Some("outer"))], None),
                            call_with("visit", "j"),
                        ],
                    )],
                ),
            )],
        ),
        FunctionBody::new(
            "switch_fallthrough",
            vec!["k"],
            vec![
                Stmt::let_("r", Some(Expr::num(0.0))),
                Stmt::switch(
                    Expr::ident("k"),
                    vec![
                        SwitchCase::case(Expr::num(1.0), vec![assign("r", Expr::num(1.0))]),
                        SwitchCase::case(
                            Expr::num(2.0),
                            vec![assign("r", Expr::num(2.0)), Stmt::break_(None)],
                        ),
                        SwitchCase::case(Expr::num(3.0), vec![]),
                        SwitchCase::default(vec![assign("r", Expr::num(-1.0))]),
                    ],
                ),
                Stmt::return_(Some(Expr::ident("r"))),
            ],
        ),
        FunctionBody::new(
            "switch_without_default",
            vec!["k"],
            vec![Stmt::switch(
                Expr::ident("k"),
                vec![SwitchCase::case(Expr::num(0.0), vec![Stmt::return_(Some(Expr::num(1.0)))])],
            )],
        ),
        FunctionBody::new(
            "nested_ternary",
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
        ),
        FunctionBody::new(
            "short_circuit",
            vec!["a", "b", "c"],
            vec![
                Stmt::if_(
                    Expr::logical(
                        LogicalOp::Or,
                        Expr::logical(LogicalOp::And, Expr::ident("a"), Expr::ident("b")),
                        Expr::unary(UnaryOp::Not, Expr::ident("c")),
                    ),
                    vec![call("hit")],
                    Some(vec![call("miss")]),
                ),
                Stmt::let_(
                    "d",
                    Some(Expr::logical(LogicalOp::Coalesce, Expr::ident("a"), Expr::ident("c"))),
                ),
                Stmt::return_(Some(Expr::ident("d"))),
            ],
        ),
        FunctionBody::new(
            "try_catch_finally_in_loop",
            vec!["n"],
            vec![
                Stmt::let_("failures", Some(Expr::num(0.0))),
                counting(
                    "i",
                    3.0,
                    vec![Stmt::try_(
                        vec![
                            call_with("attempt", "i"),
                            Stmt::if_(lt("i", 1.0), vec![Stmt::continue_(None)], None),
                        ],
                        Some(CatchClause::new(
                            Some("e"),
                            vec![
                                Stmt::expr(Expr::post_increment(Expr::ident("failures"))),
                                Stmt::if_(
                                    Expr::binary(BinaryOp::Gt, Expr::ident("failures"), Expr::ident("n")),
                                    vec![Stmt::throw(Expr::ident("e"))],
                                    None,
                                ),
                            ],
                        )),
                        Some(vec![call("release")]),
                    )],
                ),
                Stmt::return_(Some(Expr::ident("failures"))),
            ],
        ),
        FunctionBody::new(
            "nested_try",
            vec![],
            vec![Stmt::try_(
                vec![
                    call("outer"),
                    Stmt::try_(
                        vec![call("inner")],
                        Some(CatchClause::new(None, vec![call("inner_recover")])),
                        Some(vec![call("inner_cleanup")]),
                    ),
                ],
                None,
                Some(vec![
                    Stmt::let_("t", Some(Expr::num(1.0))),
                    call_with("outer_cleanup", "t"),
                ]),
            )],
        ),
        FunctionBody::new(
            "return_in_finally",
            vec!["a"],
            vec![Stmt::try_(
                vec![Stmt::if_(Expr::ident("a"), vec![Stmt::throw(Expr::ident("a"))], None)],
                None,
                Some(vec![Stmt::return_(Some(Expr::num(0.0)))]),
            )],
        ),
        FunctionBody::new(
            "continue_in_catch",
            vec![],
            vec![counting(
                "i",
                3.0,
                vec![
                    Stmt::try_(
                        vec![call("risky")],
                        Some(CatchClause::new(Some("e"), vec![Stmt::continue_(None)])),
                        None,
                    ),
                    call_with("after", "i"),
                ],
            )],
        ),
        FunctionBody::new(
            "return_through_finally",
            vec!["a"],
            vec![
                Stmt::try_(
                    vec![
                        Stmt::if_(Expr::ident("a"), vec![Stmt::return_(Some(Expr::ident("a")))], None),
                        call("work"),
                    ],
                    None,
                    Some(vec![assign("a", Expr::num(0.0)), call("cleanup")]),
                ),
                Stmt::return_(Some(Expr::ident("a"))),
            ],
        ),
        FunctionBody::new(
            "jumps_through_finally",
            vec![],
            vec![counting(
                "i",
                5.0,
                vec![Stmt::try_(
                    vec![
                        Stmt::if_(lt("i", 1.0), vec![Stmt::continue_(None)], None),
                        Stmt::if_(
                            Expr::binary(BinaryOp::Gt, Expr::ident("i"), Expr::num(3.0)),
                            vec![Stmt::break_(None)],
                            None,
                        ),
                        call_with("work", "i"),
                    ],
                    Some(CatchClause::new(None, vec![Stmt::return_(None)])),
                    Some(vec![call("release")]),
                )],
            )],
        ),
        FunctionBody::new(
            "unreachable_tail",
            vec![],
            vec![
                Stmt::return_(Some(Expr::num(1.0))),
                call("dead"),
                Stmt::while_(Expr::ident("x"), vec![call("dead_loop")]),
            ],
        ),
        FunctionBody::new(
            "blocks_and_members",
            vec!["o"],
            vec![
                Stmt::block(vec![
                    Stmt::let_("v", Some(Expr::member(Expr::ident("o"), "value"))),
                    Stmt::expr(Expr::assign(Expr::member(Expr::ident("o"), "seen"), Expr::ident("v"))),
                ]),
                Stmt::if_(
                    Expr::ident("v"),
                    vec![Stmt::block(vec![Stmt::return_(Some(Expr::ident("v")))])],
                    None,
                ),
            ],
        ),
    ]
}

/// Number of `for` loops with an update expression.
fn counted_loops(stmts: &[Stmt]) -> usize {
    fn nested(stmt: &Stmt) -> usize {
        counted_loops(std::slice::from_ref(stmt))
    }
    stmts
        .iter()
        .map(|stmt| match &stmt.kind {
            StmtKind::For { update, body, .. } => usize::from(update.is_some()) + nested(body),
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::Labeled { body, .. } => nested(body),
            StmtKind::If {
                consequent,
                alternate,
                ..
            } => nested(consequent) + alternate.as_deref().map_or(0, nested),
            StmtKind::Block(stmts) => counted_loops(stmts),
            StmtKind::Switch { cases, .. } => cases.iter().map(|case| counted_loops(&case.body)).sum(),
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                counted_loops(block)
                    + handler.as_ref().map_or(0, |handler| counted_loops(&handler.body))
                    + finalizer.as_deref().map_or(0, counted_loops)
            }
            _ => 0,
        })
        .sum()
}

/// Checks that each loop header with an increment block is re-entered through it alone, and that
/// `expected` headers have one.
fn check_loop_shape(name: &str, cfg: &Cfg, expected: usize) {
    let dominators = cfg.dominators();
    let mut with_increment = 0;
    for header in cfg
        .blocks()
        .iter()
        .filter(|block| block.flags().contains(BlockFlags::LOOP_HEADER))
    {
        let back: Vec<BlockId> = header
            .distinct_predecessors()
            .into_iter()
            .filter(|pred| *pred == header.id() || dominators.dominates(header.id(), *pred))
            .collect();
        let increment = back.iter().copied().find(|pred| {
            cfg.block(*pred).is_some_and(|block| {
                block.flags().contains(BlockFlags::SYNTHETIC)
                    && !block.is_empty()
                    && matches!(block.successors(), [edge] if edge.target() == header.id())
            })
        });
        if let Some(increment) = increment {
            assert_eq!(
                back,
                vec![increment],
                "{name}: back edge into {} bypasses the update",
                header.id()
            );
            with_increment += 1;
        }
    }
    assert_eq!(with_increment, expected, "{name}: loops with an increment block");
}

fn strict(function: &FunctionBody) -> Result<Body> {
    BodyBuilder::new(BuildConfig::strict(), &TsLowering).build(function)
}

fn check_dominance(cfg: &Cfg) {
    let dominators = cfg.dominators();
    let start = cfg.entry();
    assert!(dominators.dominates(start, start));

    for index in 1..cfg.block_count() {
        let block = NodeId::new(index);
        let idom = dominators
            .immediate_dominator(block)
            .expect("every finished block has an immediate dominator");
        assert!(dominators.strictly_dominates(idom, block));
        assert!(cfg.predecessors(block).next().is_some());
    }

    let frontiers = cfg.dominance_frontiers();
    for index in 0..cfg.block_count() {
        let pred = NodeId::new(index);
        for succ in cfg.successors(pred) {
            let idom = dominators.immediate_dominator(succ);
            if idom == Some(pred) {
                continue;
            }
            let mut runner = Some(pred);
            while let Some(current) = runner {
                if Some(current) == idom {
                    break;
                }
                assert!(
                    frontiers[current.index()].contains(&succ),
                    "{succ} missing from the frontier of {current}"
                );
                runner = dominators.immediate_dominator(current);
            }
        }
    }
}

#[test]
fn test_corpus_structural_properties() -> Result<()> {
    for function in corpus() {
        let body = strict(&function)?;
        let cfg = &body.cfg;
        cfg.verify()?;

        assert!(reachable(cfg, cfg.start()).into_iter().all(|reached| reached));
        for block in cfg.blocks() {
            let count = block.instructions().len();
            for (index, inst) in block.instructions().iter().enumerate() {
                if inst.is_terminator() {
                    assert_eq!(index + 1, count, "{}: terminator mid-block", function.name);
                }
                assert!(!matches!(inst.kind(), InstKind::Marker(_) | InstKind::Switch(_)));
            }
            for edge in block.successors() {
                let target = cfg.block(edge.target()).expect("edge target");
                let back = target.predecessors().iter().filter(|p| **p == block.id()).count();
                let forward = block
                    .successors()
                    .iter()
                    .filter(|e| e.target() == edge.target())
                    .count();
                assert_eq!(back, forward, "{}: asymmetric edge", function.name);
            }
        }
        check_dominance(cfg);
        check_loop_shape(&function.name, cfg, counted_loops(&function.body));
        if function.name != "unreachable_tail" {
            assert!(
                body.diagnostics.is_empty(),
                "{}: {:?}",
                function.name,
                body.diagnostics
            );
        }
    }
    Ok(())
}

#[test]
fn test_corpus_ssa_single_assignment() -> Result<()> {
    for function in corpus() {
        let body = strict(&function)?;
        let ssa = body.ssa.as_ref().expect("strict builds SSA");
        ssa.verify(&body.cfg, &body.locals)?;

        for (original, count) in ssa.versions() {
            assert_eq!(body.locals.versions_of(original).len(), count as usize);
        }
    }
    Ok(())
}

#[test]
fn test_unreachable_code_reported_not_kept() -> Result<()> {
    let function = corpus()
        .into_iter()
        .find(|function| function.name == "unreachable_tail")
        .expect("corpus body");
    let body = strict(&function)?;
    assert!(!body.diagnostics.is_empty());
    assert_eq!(body.cfg.block_count(), 1);
    Ok(())
}

#[test]
fn test_batch_matches_single_builds() -> Result<()> {
    let functions = corpus();
    let batch = build_bodies(&functions, &BuildConfig::strict());
    assert_eq!(batch.len(), functions.len());
    for (function, result) in functions.iter().zip(batch) {
        let parallel = result?;
        let single = strict(function)?;
        assert_eq!(parallel.name, function.name);
        assert_eq!(parallel.cfg.block_count(), single.cfg.block_count());
        assert_eq!(parallel.cfg.traps().len(), single.cfg.traps().len());
        assert_eq!(parallel.ssa, single.ssa);
    }
    Ok(())
}
