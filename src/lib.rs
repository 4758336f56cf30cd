// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # flowscope
//!
//! Control flow graph construction, structural normalization and SSA formation for
//! TypeScript-family function bodies.
//!
//! `flowscope` is the middle-end between a parser front-end and an analysis back-end: it takes
//! the typed syntax of one function body and produces basic blocks of three-address
//! instructions, with loops, `switch` statements, conditional operators and `try`/`finally`
//! rewritten into plain two-way branches and explicit exceptional edges, and every variable
//! renamed into SSA form.
//!
//! ## Features
//!
//! - **Statement graph** - one node per statement, with structural joints that are spliced out
//! - **Greedy block partitioning** - maximal straight-line blocks, loop headers always on their own
//! - **Structural normalizers** - pre-headers and increment blocks for `for` loops, comparison
//!   chains for `switch`, diamonds for `?:`/`&&`/`||` with temporary elimination, and finally
//!   duplication for the exceptional path
//! - **Dominance** - Cooper-Harvey-Kennedy dominators and Cytron dominance frontiers over normal
//!   and exceptional edges
//! - **SSA** - semi-pruned phi placement, dominator-tree renaming, trivial phi pruning
//! - **Batch builds** - independent bodies are built in parallel with `rayon`
//!
//! ## Quick Start
//!
//! ```rust
//! use flowscope::prelude::*;
//! use flowscope::syntax::{BinaryOp, Expr, FunctionBody, Stmt};
//!
//! // if (a > 0) { x = 1; } else { x = 2; } return x;
//! let function = FunctionBody::new(
//!     "pick",
//!     vec!["a"],
//!     vec![
//!         Stmt::if_(
//!             Expr::binary(BinaryOp::Gt, Expr::ident("a"), Expr::num(0.0)),
//!             vec![Stmt::expr(Expr::assign(Expr::ident("x"), Expr::num(1.0)))],
//!             Some(vec![Stmt::expr(Expr::assign(Expr::ident("x"), Expr::num(2.0)))]),
//!         ),
//!         Stmt::return_(Some(Expr::ident("x"))),
//!     ],
//! );
//!
//! let body = build_body(&function)?;
//! assert_eq!(body.cfg.block_count(), 4);
//! assert_eq!(body.ssa.as_ref().map(SsaForm::phi_count), Some(1));
//! # Ok::<(), flowscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`syntax`] - The typed syntax model produced by a front-end adapter
//! - [`ir`] - Three-address instructions, locals, and the [`ir::InstructionLowering`] collaborator
//! - [`analysis`] - The pipeline stages: statement graph, partitioning, normalization, SSA
//! - [`utils`] - Generic graph algorithms and Graphviz output
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and installs no logger. `debug` marks pipeline
//! stages, `trace` individual graph rewrites, and `warn` dropped unreachable code.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Errors are scoped to one body; see [`Error`]
//! for the taxonomy. Unreachable code is not an error and is reported as a [`Diagnostic`].

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use flowscope::prelude::*;
///
/// let config = BuildConfig::cfg_only();
/// assert!(!config.build_ssa);
/// ```
pub mod prelude;

/// Typed syntax model of function bodies.
pub mod syntax;

/// Three-address instruction model and instruction lowering.
pub mod ir;

/// Graph construction stages, from statements to SSA.
pub mod analysis;

/// Shared utilities.
pub mod utils;

mod body;
mod config;

/// `flowscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `flowscope` Error type
///
/// Every error is scoped to the body being built. The variants are grouped into builder
/// invariant violations, collaborator errors and SSA errors.
pub use error::Error;

pub use analysis::cfg::Diagnostic;
pub use body::{build_bodies, build_body, Body, BodyBuilder};
pub use config::BuildConfig;
