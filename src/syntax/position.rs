use std::fmt;

/// Line/column of a syntax node in its source file (1-based, `0:0` when unknown).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourcePosition {
    /// Source line
    pub line: u32,
    /// Source column
    pub column: u32,
}

impl SourcePosition {
    /// Creates a new position.
    #[must_use]
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        SourcePosition { line, column }
    }

    /// Returns `true` if this position carries no information.
    #[must_use]
    #[inline]
    pub const fn is_unknown(&self) -> bool {
        self.line == 0 && self.column == 0
    }
}

impl fmt::Debug for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
