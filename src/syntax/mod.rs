//! Typed syntax model of a TypeScript-family function body.
//!
//! The front-end adapter produces these types; the rest of the crate only reads child statement
//! lists, expressions and [`SourcePosition`]s from them. `Display` renders a compact, source-like
//! form of a node that is used in error messages.
//!
//! The constructor helpers (`Stmt::if_`, `Expr::binary`, ...) keep hand-built trees readable in
//! tests and benchmarks:
//!
//! ```rust
//! use flowscope::syntax::{BinaryOp, Expr, FunctionBody, Stmt};
//!
//! let body = FunctionBody::new(
//!     "abs",
//!     vec!["a"],
//!     vec![
//!         Stmt::if_(
//!             Expr::binary(BinaryOp::Lt, Expr::ident("a"), Expr::num(0.0)),
//!             vec![Stmt::return_(Some(Expr::unary(flowscope::syntax::UnaryOp::Neg, Expr::ident("a"))))],
//!             None,
//!         ),
//!         Stmt::return_(Some(Expr::ident("a"))),
//!     ],
//! );
//! assert_eq!(body.body.len(), 2);
//! ```

mod expr;
mod position;
mod stmt;

pub use expr::{AssignOp, BinaryOp, Expr, LogicalOp, UnaryOp, UpdateOp};
pub use position::SourcePosition;
pub use stmt::{CatchClause, DeclKind, FunctionBody, Stmt, StmtKind, SwitchCase};
