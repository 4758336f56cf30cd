//! Non-fatal findings reported alongside a finished body.

use std::fmt;

use crate::{analysis::cfg::BlockOrigin, syntax::SourcePosition};

/// A non-fatal finding about a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Code that cannot be reached from the start block. The block was dropped.
    UnreachableBlock {
        /// Where the dropped block came from
        origin: BlockOrigin,
        /// Position of its first instruction, if it had any
        position: Option<SourcePosition>,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnreachableBlock {
                position: Some(position),
                ..
            } => write!(f, "unreachable code at {position}"),
            Diagnostic::UnreachableBlock { origin, .. } => {
                write!(f, "unreachable block ({origin:?})")
            }
        }
    }
}
