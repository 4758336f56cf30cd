use thiserror::Error;

use crate::syntax::SourcePosition;

macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Invariant {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Invariant {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every error is scoped to a single function body. A failing body aborts its own pipeline run
/// and leaves the rest of a batch (see [`crate::build_bodies`]) untouched.
///
/// # Error Categories
///
/// ## Builder invariant violations
/// - [`Error::MalformedStatement`] - A statement could not be wired into the statement graph
/// - [`Error::Invariant`] - An internal graph invariant was broken by a pass
/// - [`Error::GraphError`] - A graph-level inconsistency found during verification
/// - [`Error::RecursionLimit`] - Syntax nesting exceeded the configured depth
///
/// ## Collaborator errors
/// - [`Error::MissingLowering`] - Instruction lowering returned nothing where a result was required
///
/// ## SSA errors
/// - [`Error::SsaError`] - SSA renaming or verification failed
///
/// Unreachable code is not an error; it is reported through [`crate::Diagnostic`].
///
/// # Examples
///
/// ```rust
/// use flowscope::{build_body, Error};
/// use flowscope::syntax::{Expr, FunctionBody, Stmt};
///
/// let body = FunctionBody::new("f", vec![], vec![Stmt::break_(Some("missing"))]);
/// match build_body(&body) {
///     Err(Error::MalformedStatement { text, .. }) => assert_eq!(text, "break missing;"),
///     other => panic!("unexpected result: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A statement could not be turned into a well-formed statement-graph node.
    ///
    /// Raised for conditionals or loops that never received both branch targets, for
    /// `break`/`continue` without a matching enclosing target, and for unknown labels.
    ///
    /// # Fields
    ///
    /// * `text` - Source-like rendering of the offending statement
    /// * `position` - Where the statement starts
    /// * `message` - What went wrong
    #[error("Malformed statement `{text}` at {position}: {message}")]
    MalformedStatement {
        /// Source-like rendering of the offending statement
        text: String,
        /// Position of the offending statement
        position: SourcePosition,
        /// Description of the violation
        message: String,
    },

    /// An internal invariant of the block graph was violated.
    ///
    /// This indicates a bug in a pass or in a custom [`crate::ir::InstructionLowering`]
    /// implementation, e.g. a control transfer that is not the last instruction of its block.
    /// The error includes the source location where the violation was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the violation
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Invariant violation - {file}:{line}: {message}")]
    Invariant {
        /// The message to be printed for the Invariant error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The instruction lowering returned nothing for a node that must produce a result.
    ///
    /// For example a `return` statement that lowered to no terminator.
    #[error("Lowering produced no {expected} for `{text}` at {position}")]
    MissingLowering {
        /// What the lowering was expected to produce
        expected: &'static str,
        /// Source-like rendering of the statement or expression
        text: String,
        /// Position of the statement or expression
        position: SourcePosition,
    },

    /// Reached the maximum nesting depth allowed while walking the syntax tree.
    ///
    /// The limit is configured by [`crate::BuildConfig::max_nesting_depth`].
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Graph verification failed.
    ///
    /// Raised when edge symmetry or reachability checks fail on a finished or
    /// intermediate graph.
    #[error("{0}")]
    GraphError(String),

    /// SSA construction or verification failed.
    #[error("{0}")]
    SsaError(String),
}
