//! Phi node representation for SSA form.
//!
//! Phi nodes merge values at control-flow join points. When multiple control flow paths
//! converge, a phi selects the value of the path that was taken.
//!
//! # Semantics
//!
//! A phi node `x#3 = phi(x#1 from n1, x#2 from n2)` means:
//! - If control came from block n1, use x#1
//! - If control came from block n2, use x#2
//!
//! Phis are not real instructions. They are evaluated at the entry of their block, before any
//! other instruction executes, and always form a prefix of the block.
//!
//! # Placement
//!
//! Phis are placed on the iterated dominance frontier of the definitions of every variable that
//! is live across blocks. Each phi has one operand slot per distinct predecessor, normal and
//! exceptional.

use crate::{analysis::cfg::BlockId, ir::LocalId};

/// A value flowing into a phi from one predecessor block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiOperand {
    pub(crate) value: LocalId,
    pub(crate) predecessor: BlockId,
}

impl PhiOperand {
    /// Creates a new phi operand.
    #[must_use]
    pub const fn new(value: LocalId, predecessor: BlockId) -> Self {
        Self { value, predecessor }
    }

    /// Returns the SSA version providing the value.
    #[must_use]
    pub const fn value(&self) -> LocalId {
        self.value
    }

    /// Returns the predecessor block.
    #[must_use]
    pub const fn predecessor(&self) -> BlockId {
        self.predecessor
    }
}

/// A phi node that merges the versions of one variable at a join point.
///
/// # Invariants
///
/// - After renaming, a phi has exactly one operand per distinct predecessor of its block
/// - `origin` is the variable before renaming; `result` is a version of it
#[derive(Debug, Clone, PartialEq)]
pub struct PhiNode {
    pub(crate) result: LocalId,
    pub(crate) origin: LocalId,
    pub(crate) operands: Vec<PhiOperand>,
}

impl PhiNode {
    /// Creates a phi for `origin` with one operand slot per predecessor, each still holding
    /// `origin` until renaming fills it.
    #[must_use]
    pub fn with_predecessors(origin: LocalId, predecessors: &[BlockId]) -> Self {
        Self {
            result: origin,
            origin,
            operands: predecessors
                .iter()
                .map(|pred| PhiOperand::new(origin, *pred))
                .collect(),
        }
    }

    /// Returns the version defined by this phi.
    #[must_use]
    pub const fn result(&self) -> LocalId {
        self.result
    }

    /// Returns the variable this phi merges.
    #[must_use]
    pub const fn origin(&self) -> LocalId {
        self.origin
    }

    /// Returns the operands of this phi.
    #[must_use]
    pub fn operands(&self) -> &[PhiOperand] {
        &self.operands
    }

    /// Returns the number of operands.
    #[must_use]
    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    /// Finds the operand coming from `predecessor`.
    #[must_use]
    pub fn operand_from(&self, predecessor: BlockId) -> Option<&PhiOperand> {
        self.operands
            .iter()
            .find(|op| op.predecessor == predecessor)
    }

    /// Sets the value flowing in from `predecessor`. Returns `false` if there is no such slot.
    pub fn set_operand(&mut self, predecessor: BlockId, value: LocalId) -> bool {
        match self
            .operands
            .iter_mut()
            .find(|op| op.predecessor == predecessor)
        {
            Some(existing) => {
                existing.value = value;
                true
            }
            None => false,
        }
    }

    /// Returns the single value this phi merges besides its own result, if it is trivial.
    ///
    /// A phi is trivial when all of its operands are either the same value or the phi's own
    /// result. A phi whose operands are all its own result has no value and returns `None`.
    #[must_use]
    pub fn trivial_value(&self) -> Option<LocalId> {
        let mut value = None;
        for operand in &self.operands {
            if operand.value == self.result || Some(operand.value) == value {
                continue;
            }
            if value.is_some() {
                return None;
            }
            value = Some(operand.value);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ir::LocalTable, utils::graph::NodeId};

    #[test]
    fn test_phi_slots_per_predecessor() {
        let mut locals = LocalTable::new();
        let x = locals.declare("x");
        let phi = PhiNode::with_predecessors(x, &[NodeId::new(1), NodeId::new(4)]);
        assert_eq!(phi.operand_count(), 2);
        assert_eq!(phi.origin(), x);
        assert_eq!(phi.operand_from(NodeId::new(4)).map(PhiOperand::value), Some(x));
        assert!(phi.operand_from(NodeId::new(2)).is_none());
    }

    #[test]
    fn test_set_operand() {
        let mut locals = LocalTable::new();
        let x = locals.declare("x");
        let x1 = locals.version(x, 1);
        let mut phi = PhiNode::with_predecessors(x, &[NodeId::new(0)]);
        assert!(phi.set_operand(NodeId::new(0), x1));
        assert!(!phi.set_operand(NodeId::new(9), x1));
        assert_eq!(phi.operands()[0].value(), x1);
    }

    #[test]
    fn test_trivial_value() {
        let mut locals = LocalTable::new();
        let x = locals.declare("x");
        let (x1, x2, x3) = (locals.version(x, 1), locals.version(x, 2), locals.version(x, 3));

        let mut phi = PhiNode::with_predecessors(x, &[NodeId::new(0), NodeId::new(1)]);
        phi.result = x3;
        phi.set_operand(NodeId::new(0), x1);
        phi.set_operand(NodeId::new(1), x3);
        assert_eq!(phi.trivial_value(), Some(x1));

        phi.set_operand(NodeId::new(1), x2);
        assert_eq!(phi.trivial_value(), None);

        phi.set_operand(NodeId::new(0), x3);
        phi.set_operand(NodeId::new(1), x3);
        assert_eq!(phi.trivial_value(), None);
    }
}
