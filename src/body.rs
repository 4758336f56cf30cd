//! Body driver: runs the whole pipeline over one function body.
//!
//! # Pipeline
//!
//! 1. [`StatementGraphBuilder`] wires statements into a statement graph
//! 2. [`partition`] splices structural nodes and cuts builder blocks
//! 3. lowering turns builder blocks into a draft of instruction blocks
//! 4. [`normalize`] runs the loop, switch, conditional-operator and try/finally rewrites
//! 5. finalization drops unreachable blocks (reported as [`Diagnostic`]s) and renumbers the rest
//! 6. [`SsaBuilder`] renames the finished graph in place (when [`BuildConfig::build_ssa`] is set)
//!
//! # Usage
//!
//! ```rust
//! use flowscope::{build_body, syntax::{Expr, FunctionBody, Stmt}};
//!
//! let function = FunctionBody::new("id", vec!["a"], vec![Stmt::return_(Some(Expr::ident("a")))]);
//! let body = build_body(&function)?;
//! assert_eq!(body.cfg.block_count(), 1);
//! # Ok::<(), flowscope::Error>(())
//! ```

use log::debug;
use rayon::prelude::*;

use crate::{
    analysis::{
        cfg::{Cfg, Diagnostic, Finalized},
        normalize::normalize,
        partition::{lower, partition},
        ssa::{SsaBuilder, SsaForm},
        stmtgraph::StatementGraphBuilder,
    },
    ir::{InstructionLowering, LocalTable, TsLowering},
    syntax::FunctionBody,
    BuildConfig, Result,
};

/// A function body after graph construction.
#[derive(Debug)]
pub struct Body {
    /// Function name
    pub name: String,
    /// The finished control flow graph; its traps describe exceptional control flow
    pub cfg: Cfg,
    /// Parameters, declared names, temporaries and SSA versions
    pub locals: LocalTable,
    /// SSA summary, present when SSA was built
    pub ssa: Option<SsaForm>,
    /// Non-fatal findings such as dropped unreachable code
    pub diagnostics: Vec<Diagnostic>,
}

impl Body {
    /// Generates a DOT rendering of the graph, titled with the function name.
    #[must_use]
    pub fn to_dot(&self) -> String {
        self.cfg.to_dot(&self.locals, Some(&self.name))
    }
}

/// Runs the pipeline with a given configuration and instruction lowering.
pub struct BodyBuilder<'l> {
    config: BuildConfig,
    lowering: &'l dyn InstructionLowering,
}

impl<'l> BodyBuilder<'l> {
    /// Creates a builder.
    pub fn new(config: BuildConfig, lowering: &'l dyn InstructionLowering) -> Self {
        BodyBuilder { config, lowering }
    }

    /// Builds the graph of `function`.
    ///
    /// # Errors
    ///
    /// Any stage error aborts the body: malformed statements, invariant violations, missing
    /// lowering results, and SSA verification failures with [`BuildConfig::verify_ssa`].
    pub fn build(&self, function: &FunctionBody) -> Result<Body> {
        let config = &self.config;
        let graph = StatementGraphBuilder::new(config.max_nesting_depth).build(function)?;
        graph.verify()?;
        debug!("{}: statement graph of {} nodes", function.name, graph.len());

        let blocks = partition(graph)?;
        let draft = lower(&blocks, function, self.lowering)?;
        let draft = normalize(draft, self.lowering, config)?;
        let Finalized {
            mut cfg,
            mut ctx,
            diagnostics,
        } = Cfg::from_draft(draft)?;

        let ssa = if config.build_ssa {
            let form = SsaBuilder::new(&mut cfg, &mut ctx).build(config.prune_trivial_phis)?;
            if config.verify_ssa {
                form.verify(&cfg, ctx.locals())?;
            }
            Some(form)
        } else {
            None
        };

        debug!(
            "{}: {} blocks, {} traps, {} diagnostics",
            function.name,
            cfg.block_count(),
            cfg.traps().len(),
            diagnostics.len()
        );
        Ok(Body {
            name: function.name.clone(),
            cfg,
            locals: ctx.into_locals(),
            ssa,
            diagnostics,
        })
    }
}

/// Builds `function` with the default configuration and [`TsLowering`].
///
/// # Errors
///
/// See [`BodyBuilder::build`].
pub fn build_body(function: &FunctionBody) -> Result<Body> {
    BodyBuilder::new(BuildConfig::default(), &TsLowering).build(function)
}

/// Builds many bodies in parallel, one result per body in input order.
///
/// A failing body does not affect the others.
pub fn build_bodies(functions: &[FunctionBody], config: &BuildConfig) -> Vec<Result<Body>> {
    let builder = BodyBuilder::new(*config, &TsLowering);
    functions
        .par_iter()
        .map(|function| builder.build(function))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        syntax::{BinaryOp, Expr, Stmt},
        Error,
    };

    fn abs() -> FunctionBody {
        FunctionBody::new(
            "abs",
            vec!["a"],
            vec![
                Stmt::if_(
                    Expr::binary(BinaryOp::Lt, Expr::ident("a"), Expr::num(0.0)),
                    vec![Stmt::return_(Some(Expr::binary(
                        BinaryOp::Sub,
                        Expr::num(0.0),
                        Expr::ident("a"),
                    )))],
                    None,
                ),
                Stmt::return_(Some(Expr::ident("a"))),
            ],
        )
    }

    #[test]
    fn test_build_default() {
        let body = build_body(&abs()).expect("body");
        assert_eq!(body.name, "abs");
        assert_eq!(body.cfg.block_count(), 3);
        assert!(body.ssa.is_some());
        assert!(body.diagnostics.is_empty());
        body.cfg.verify().expect("valid graph");
    }

    #[test]
    fn test_cfg_only_skips_ssa() {
        let body = BodyBuilder::new(BuildConfig::cfg_only(), &TsLowering)
            .build(&abs())
            .expect("body");
        assert!(body.ssa.is_none());
        assert!(body.locals.iter().all(|(_, local)| !local.is_version()));
    }

    #[test]
    fn test_strict_verifies_ssa() {
        let body = BodyBuilder::new(BuildConfig::strict(), &TsLowering)
            .build(&abs())
            .expect("body");
        let ssa = body.ssa.as_ref().expect("ssa");
        ssa.verify(&body.cfg, &body.locals).expect("valid ssa");
    }

    #[test]
    fn test_unreachable_code_is_reported() {
        let function = FunctionBody::new(
            "f",
            vec![],
            vec![
                Stmt::return_(None),
                Stmt::expr(Expr::call(Expr::ident("never"), vec![])),
            ],
        );
        let body = build_body(&function).expect("body");
        assert_eq!(body.diagnostics.len(), 1);
        assert_eq!(body.cfg.block_count(), 1);
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let broken = FunctionBody::new("broken", vec![], vec![Stmt::continue_(None)]);
        let functions = vec![abs(), broken, abs()];
        let results = build_bodies(&functions, &BuildConfig::default());
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::MalformedStatement { .. })));
        assert_eq!(results[2].as_ref().map(|b| b.name.as_str()).ok(), Some("abs"));
    }

    #[test]
    fn test_dot_has_title() {
        let body = build_body(&abs()).expect("body");
        let dot = body.to_dot();
        assert!(dot.starts_with("digraph CFG {"));
        assert!(dot.contains("CFG: abs"));
    }
}
