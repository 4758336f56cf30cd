//! Try regions and exception traps.
//!
//! Every statement inside a `try` statement carries a [`RegionTag`] naming the innermost region
//! and the part (try body, catch body, finally body) it belongs to. Regions form a tree through
//! their parent tag. After trap normalization the exceptional flow of a body is described by an
//! ordered list of [`Trap`]s, innermost region first.

use std::fmt;

use strum::{Display, EnumIter};

use crate::{analysis::cfg::BlockId, syntax::SourcePosition};

/// Identifier of a try region within one body.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub(crate) usize);

impl RegionId {
    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegionId({})", self.0)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Part of a try statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum RegionPart {
    /// The protected body
    #[strum(to_string = "try")]
    Try,
    /// The catch clause
    #[strum(to_string = "catch")]
    Catch,
    /// The finally clause
    #[strum(to_string = "finally")]
    Finally,
}

/// Region membership of a statement or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionTag {
    /// The innermost enclosing region
    pub region: RegionId,
    /// The part of that region
    pub part: RegionPart,
}

impl RegionTag {
    /// Creates a tag.
    #[must_use]
    pub const fn new(region: RegionId, part: RegionPart) -> Self {
        RegionTag { region, part }
    }
}

impl fmt::Display for RegionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.region, self.part)
    }
}

/// Region record kept alongside a block arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryRegion {
    /// Tag of the enclosing region part, if nested
    pub parent: Option<RegionTag>,
    /// First block of the catch clause
    pub catch_entry: Option<BlockId>,
    /// First block of the finally clause
    pub finally_entry: Option<BlockId>,
    /// `false` when the finally clause is absent or empty
    pub has_finally: bool,
    /// Position of the try statement
    pub position: SourcePosition,
}

impl TryRegion {
    /// Nesting depth; top-level regions have depth 0.
    #[must_use]
    pub fn depth(&self, regions: &[TryRegion]) -> usize {
        let mut depth = 0;
        let mut parent = self.parent;
        while let Some(tag) = parent {
            depth += 1;
            parent = regions.get(tag.region.0).and_then(|region| region.parent);
        }
        depth
    }
}

/// Returns `true` if `tag`, or any tag enclosing it, is `wanted`.
pub(crate) fn tag_chain_contains(
    regions: &[TryRegion],
    tag: Option<RegionTag>,
    wanted: RegionTag,
) -> bool {
    let mut current = tag;
    while let Some(tag) = current {
        if tag == wanted {
            return true;
        }
        current = regions.get(tag.region.0).and_then(|region| region.parent);
    }
    false
}

/// An exception-handling association between protected blocks and their handlers.
///
/// The first handler block is the handler entry: the block exceptional edges point to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trap {
    /// Region the trap was recorded for
    pub region: RegionId,
    /// Protected blocks
    pub try_blocks: Vec<BlockId>,
    /// Handler blocks, entry first
    pub handlers: Vec<BlockId>,
}

impl Trap {
    /// The block exceptions are delivered to.
    #[must_use]
    pub fn handler_entry(&self) -> Option<BlockId> {
        self.handlers.first().copied()
    }

    /// Returns `true` if `block` is protected by this trap.
    #[must_use]
    pub fn covers(&self, block: BlockId) -> bool {
        self.try_blocks.contains(&block)
    }
}
