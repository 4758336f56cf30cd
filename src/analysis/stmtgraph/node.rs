//! Statement-graph nodes.

use std::fmt;

use strum::{Display, EnumIter};

use crate::{
    analysis::cfg::{RegionId, RegionTag},
    syntax::{Expr, SourcePosition, Stmt},
};

/// Identifier of a node in a [`crate::analysis::stmtgraph::StatementGraph`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StmtId(pub(crate) usize);

impl StmtId {
    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StmtId({})", self.0)
    }
}

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Structural joints created while walking compound statements. All of them are spliced out
/// before partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum PlaceholderKind {
    /// Join after an `if` or a labeled block
    BlockExit,
    /// Start of a then/else branch
    BranchEntry,
    /// Start of a loop body
    LoopBody,
    /// Target of a loop's false edge and of `break`
    LoopExit,
    /// Start of a switch case
    CaseEntry,
    /// End of a switch case, falling through to the next case
    CaseExit,
    /// Join after a switch
    SwitchExit,
    /// Start of a try body
    TryEntry,
    /// End of a try body
    TryExit,
    /// End of a catch body
    CatchExit,
    /// Start of a finally body (synthetic when the clause is absent)
    FinallyEntry,
    /// End of a finally body
    FinallyExit,
}

/// Loop role of a conditional node.
#[derive(Debug, Clone, Copy)]
pub enum LoopRole<'a> {
    /// Test of a `while` or `for` loop. Always starts its own block.
    Header {
        /// `for` initializer
        init: Option<&'a Stmt>,
        /// `for` update expression
        update: Option<&'a Expr>,
    },
    /// Test at the bottom of a `do-while` loop
    DoWhileTest,
}

/// Test of a conditional node.
#[derive(Debug, Clone, Copy)]
pub enum BranchTest<'a> {
    /// Branch on a source expression
    Expr(&'a Expr),
    /// Always take the true edge (`for (;;)`)
    Always,
}

/// A straight-line statement.
#[derive(Debug, Clone, Copy)]
pub enum PlainStmt<'a> {
    /// A source statement lowered as-is
    Source(&'a Stmt),
    /// `param = caughtexception` at the head of a catch clause
    CatchBind(Option<&'a str>),
    /// A `return` synthesized for control falling off the end of the body
    ImplicitReturn,
    /// Evaluates the value of a `return` that still has finally bodies to run
    SaveReturn(&'a Expr),
    /// Returns the value saved by the given [`PlainStmt::SaveReturn`] node, after the finally
    /// bodies ran
    SavedReturn(Option<StmtId>),
}

/// One non-default case of a switch node.
#[derive(Debug, Clone, Copy)]
pub struct CaseTarget<'a> {
    /// Case value
    pub test: &'a Expr,
    /// First node of the case body
    pub target: Option<StmtId>,
    /// Position of the case clause
    pub position: SourcePosition,
}

/// Node kinds. Each kind has its own outgoing-edge representation.
#[derive(Debug, Clone)]
pub enum NodeKind<'a> {
    /// Function entry
    Entry {
        /// First statement
        next: Option<StmtId>,
    },
    /// Function exit
    Exit,
    /// A straight-line statement
    Plain {
        /// The statement
        stmt: PlainStmt<'a>,
        /// Next statement; `None` after `throw`
        next: Option<StmtId>,
    },
    /// Two-way branch
    Conditional {
        /// Branch test
        test: BranchTest<'a>,
        /// Loop role, if this tests a loop
        role: Option<LoopRole<'a>>,
        /// Target when the test holds
        next_true: Option<StmtId>,
        /// Target when the test fails
        next_false: Option<StmtId>,
    },
    /// Multi-way dispatch
    Switch {
        /// Value dispatched on
        discriminant: &'a Expr,
        /// Non-default cases in source order
        cases: Vec<CaseTarget<'a>>,
        /// Default target (the switch exit when there is no default case)
        default: Option<StmtId>,
    },
    /// Entry of a try statement
    Try {
        /// Region opened by the statement
        region: RegionId,
        /// First node of the try body
        body: Option<StmtId>,
    },
    /// Structural joint
    Placeholder {
        /// What the joint stands for
        kind: PlaceholderKind,
        /// Resolved successor
        next: Option<StmtId>,
    },
}

/// Outgoing edge slot of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// `next` of entry, plain and placeholder nodes
    Next,
    /// True edge of a conditional
    True,
    /// False edge of a conditional
    False,
    /// Case target of a switch
    Case(usize),
    /// Default target of a switch
    Default,
    /// Body of a try node
    Body,
}

/// A node of the statement graph.
#[derive(Debug, Clone)]
pub struct StatementNode<'a> {
    pub(crate) id: StmtId,
    pub(crate) kind: NodeKind<'a>,
    pub(crate) source: Option<&'a Stmt>,
    pub(crate) position: SourcePosition,
    pub(crate) scope: u32,
    pub(crate) region: Option<RegionTag>,
    pub(crate) predecessors: Vec<StmtId>,
    pub(crate) spliced: bool,
}

impl<'a> StatementNode<'a> {
    /// Node id.
    #[must_use]
    pub fn id(&self) -> StmtId {
        self.id
    }

    /// Node kind.
    #[must_use]
    pub fn kind(&self) -> &NodeKind<'a> {
        &self.kind
    }

    /// Position of the statement the node was built from.
    #[must_use]
    pub fn position(&self) -> SourcePosition {
        self.position
    }

    /// Lexical scope id.
    #[must_use]
    pub fn scope(&self) -> u32 {
        self.scope
    }

    /// Innermost enclosing region part.
    #[must_use]
    pub fn region(&self) -> Option<RegionTag> {
        self.region
    }

    /// Predecessors, one entry per incoming edge.
    #[must_use]
    pub fn predecessors(&self) -> &[StmtId] {
        &self.predecessors
    }

    /// Outgoing edges with their slots, in partitioning order of the slots.
    #[must_use]
    pub fn slots(&self) -> Vec<(Slot, StmtId)> {
        let mut out = Vec::new();
        match &self.kind {
            NodeKind::Entry { next }
            | NodeKind::Plain { next, .. }
            | NodeKind::Placeholder { next, .. } => {
                out.extend(next.map(|id| (Slot::Next, id)));
            }
            NodeKind::Exit => {}
            NodeKind::Conditional {
                next_true,
                next_false,
                ..
            } => {
                out.extend(next_true.map(|id| (Slot::True, id)));
                out.extend(next_false.map(|id| (Slot::False, id)));
            }
            NodeKind::Switch { cases, default, .. } => {
                for (index, case) in cases.iter().enumerate() {
                    out.extend(case.target.map(|id| (Slot::Case(index), id)));
                }
                out.extend(default.map(|id| (Slot::Default, id)));
            }
            NodeKind::Try { body, .. } => out.extend(body.map(|id| (Slot::Body, id))),
        }
        out
    }

    /// Returns the target stored in `slot`.
    #[must_use]
    pub fn target(&self, slot: Slot) -> Option<StmtId> {
        self.slots()
            .into_iter()
            .find(|(candidate, _)| *candidate == slot)
            .map(|(_, id)| id)
    }

    pub(crate) fn slot_mut(&mut self, slot: Slot) -> Option<&mut Option<StmtId>> {
        match (&mut self.kind, slot) {
            (NodeKind::Entry { next }, Slot::Next)
            | (NodeKind::Plain { next, .. }, Slot::Next)
            | (NodeKind::Placeholder { next, .. }, Slot::Next)
            | (NodeKind::Conditional { next_true: next, .. }, Slot::True)
            | (NodeKind::Conditional { next_false: next, .. }, Slot::False)
            | (NodeKind::Switch { default: next, .. }, Slot::Default)
            | (NodeKind::Try { body: next, .. }, Slot::Body) => Some(next),
            (NodeKind::Switch { cases, .. }, Slot::Case(index)) => {
                cases.get_mut(index).map(|case| &mut case.target)
            }
            _ => None,
        }
    }

    /// Returns `true` for placeholders and try nodes, which splicing removes.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Placeholder { .. } | NodeKind::Try { .. }
        )
    }

    /// Returns `true` for the test of a `while`/`for` loop.
    #[must_use]
    pub fn is_loop_header(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Conditional {
                role: Some(LoopRole::Header { .. }),
                ..
            }
        )
    }

    /// Returns `true` if control never continues to `next` (`return`, `throw`, implicit return).
    /// A [`PlainStmt::SaveReturn`] continues into the finally bodies and is not an exit.
    #[must_use]
    pub fn is_exit_statement(&self) -> bool {
        match &self.kind {
            NodeKind::Plain {
                stmt: PlainStmt::Source(stmt),
                ..
            } => stmt.is_exit(),
            NodeKind::Plain {
                stmt: PlainStmt::ImplicitReturn | PlainStmt::SavedReturn(_),
                ..
            } => true,
            _ => false,
        }
    }

    /// Returns `true` for nodes that end a block: branches, switches and exit statements.
    #[must_use]
    pub fn is_transfer(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Conditional { .. } | NodeKind::Switch { .. }
        ) || self.is_exit_statement()
    }

    /// Source-like text for error messages.
    #[must_use]
    pub fn text(&self) -> String {
        match (&self.kind, self.source) {
            (_, Some(stmt)) => stmt.to_string(),
            (NodeKind::Plain {
                stmt: PlainStmt::CatchBind(Some(name)),
                ..
            }, None) => format!("catch ({name})"),
            (NodeKind::Plain {
                stmt: PlainStmt::CatchBind(None),
                ..
            }, None) => "catch".to_string(),
            (NodeKind::Placeholder { kind, .. }, None) => format!("<{kind}>"),
            (kind, None) => format!("{kind:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Stmt;

    fn node(kind: NodeKind<'_>) -> StatementNode<'_> {
        StatementNode {
            id: StmtId(0),
            kind,
            source: None,
            position: SourcePosition::default(),
            scope: 0,
            region: None,
            predecessors: Vec::new(),
            spliced: false,
        }
    }

    #[test]
    fn test_slots_of_conditional() {
        let mut cond = node(NodeKind::Conditional {
            test: BranchTest::Always,
            role: None,
            next_true: Some(StmtId(3)),
            next_false: None,
        });
        assert_eq!(cond.slots(), vec![(Slot::True, StmtId(3))]);
        *cond.slot_mut(Slot::False).expect("false slot") = Some(StmtId(4));
        assert_eq!(cond.target(Slot::False), Some(StmtId(4)));
        assert!(cond.slot_mut(Slot::Next).is_none());
        assert!(cond.is_transfer());
    }

    #[test]
    fn test_exit_statements() {
        let ret = Stmt::return_(None);
        let plain = node(NodeKind::Plain {
            stmt: PlainStmt::Source(&ret),
            next: None,
        });
        assert!(plain.is_exit_statement());
        let value = Expr::ident("x");
        let save = node(NodeKind::Plain {
            stmt: PlainStmt::SaveReturn(&value),
            next: None,
        });
        assert!(!save.is_exit_statement());
        let saved = node(NodeKind::Plain {
            stmt: PlainStmt::SavedReturn(Some(StmtId(0))),
            next: None,
        });
        assert!(saved.is_transfer());
        let placeholder = node(NodeKind::Placeholder {
            kind: PlaceholderKind::LoopExit,
            next: None,
        });
        assert!(placeholder.is_structural());
        assert_eq!(placeholder.text(), "<LoopExit>");
    }
}
