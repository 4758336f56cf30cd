#![allow(unused)]
extern crate flowscope;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use flowscope::{
    build_bodies, build_body,
    syntax::{AssignOp, BinaryOp, CatchClause, Expr, FunctionBody, LogicalOp, Stmt, SwitchCase},
    BuildConfig,
};
use std::hint::black_box;

fn call(name: &str) -> Stmt {
    Stmt::expr(Expr::call(Expr::ident(name), vec![]))
}

/// A body exercising every normalizer: a counted loop holding a switch, a ternary and
/// a guarded call with a finally block.
fn mixed_body(name: &str) -> FunctionBody {
    let switch = Stmt::switch(
        Expr::ident("i"),
        vec![
            SwitchCase::case(Expr::num(0.0), vec![call("zero")]),
            SwitchCase::case(Expr::num(1.0), vec![call("one"), Stmt::break_(None)]),
            SwitchCase::default(vec![Stmt::continue_(None)]),
        ],
    );
    let ternary = Stmt::expr(Expr::compound(
        AssignOp::AddAssign,
        Expr::ident("sum"),
        Expr::conditional(
            Expr::logical(LogicalOp::And, Expr::ident("a"), Expr::ident("b")),
            Expr::ident("i"),
            Expr::num(0.0),
        ),
    ));
    let guarded = Stmt::try_(
        vec![call("risky")],
        Some(CatchClause::new(Some("e"), vec![call("recover")])),
        Some(vec![call("cleanup")]),
    );
    FunctionBody::new(
        name,
        vec!["n", "a", "b"],
        vec![
            Stmt::let_("sum", Some(Expr::num(0.0))),
            Stmt::for_(
                Some(Stmt::let_("i", Some(Expr::num(0.0)))),
                Some(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::ident("n"))),
                Some(Expr::post_increment(Expr::ident("i"))),
                vec![switch, ternary, guarded],
            ),
            Stmt::return_(Some(Expr::ident("sum"))),
        ],
    )
}

/// Benchmark a single body through the whole pipeline, with and without SSA
fn bench_build_body(c: &mut Criterion) {
    let function = mixed_body("mixed");

    let mut group = c.benchmark_group("build_body");
    group.bench_function("ssa", |b| {
        b.iter(|| {
            let body = build_body(black_box(&function)).unwrap();
            black_box(body)
        });
    });
    group.bench_function("cfg_only", |b| {
        let config = BuildConfig::cfg_only();
        b.iter(|| {
            let bodies = build_bodies(black_box(std::slice::from_ref(&function)), &config);
            black_box(bodies)
        });
    });
    group.finish();
}

/// Benchmark the parallel batch driver over many independent bodies
fn bench_build_bodies(c: &mut Criterion) {
    let functions: Vec<FunctionBody> = (0..256).map(|i| mixed_body(&format!("f{i}"))).collect();

    let mut group = c.benchmark_group("build_bodies");
    group.throughput(Throughput::Elements(functions.len() as u64));
    group.bench_function("default", |b| {
        let config = BuildConfig::default();
        b.iter(|| {
            let bodies = build_bodies(black_box(&functions), &config);
            black_box(bodies)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_build_body, bench_build_bodies);
criterion_main!(benches);
