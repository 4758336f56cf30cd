//! Static Single Assignment (SSA) form.
//!
//! SSA is built in place over a finished [`crate::analysis::Cfg`]: every definition receives a
//! fresh version of its variable and every use is rewritten to the version reaching it.
//! Versions are regular locals of the body's [`crate::ir::LocalTable`] that point back to their
//! original variable.
//!
//! # Architecture
//!
//! - `phi` - Phi node representation for control flow merges
//! - `builder` - Phi placement, renaming and pruning (Cytron et al.)
//! - `form` - The [`SsaForm`] summary and its verifier
//!
//! # Construction
//!
//! 1. **Phi placement**: variables read before being written in some block get phis on the
//!    iterated dominance frontier of their definitions (semi-pruned SSA)
//! 2. **Renaming**: a dominator-tree walk with per-variable version stacks
//! 3. **Pruning**: phis with a single distinct incoming value are removed
//!
//! Exceptional edges take part in dominance, so a handler entry can hold phis merging the
//! values live at the end of each protected block.
//!
//! # Usage
//!
//! ```rust,ignore
//! use flowscope::prelude::*;
//!
//! let body = build_body(&function)?;
//! if let Some(ssa) = &body.ssa {
//!     println!("{} phis, {} pruned", ssa.phi_count(), ssa.pruned());
//! }
//! ```

mod builder;
mod form;
mod phi;

pub use builder::SsaBuilder;
pub use form::SsaForm;
pub use phi::{PhiNode, PhiOperand};
