//! The instruction-lowering collaborator interface.
//!
//! Graph construction never looks inside source statements beyond their control structure;
//! turning a plain statement, a value or a branch test into three-address instructions is the job
//! of an [`InstructionLowering`] implementation. Every instruction is created through the
//! [`LoweringContext`] of the body, which hands out instruction ids, marker groups and
//! temporaries.

use crate::{
    ir::{Condition, InstId, InstKind, Instruction, LocalId, LocalTable, Operand},
    syntax::{Expr, SourcePosition, Stmt},
    Result,
};

/// Instructions computing a value, plus the operand holding it.
#[derive(Debug, Clone)]
pub struct Lowered {
    /// Instructions to execute first
    pub instructions: Vec<Instruction>,
    /// The computed value
    pub value: Operand,
}

/// Instructions computing a branch test, plus the resulting condition.
#[derive(Debug, Clone)]
pub struct LoweredCondition {
    /// Instructions to execute before branching
    pub instructions: Vec<Instruction>,
    /// The branch condition
    pub condition: Condition,
}

/// Per-body state shared by lowering and the normalizers.
#[derive(Debug, Default)]
pub struct LoweringContext {
    locals: LocalTable,
    next_instruction: usize,
    next_group: u32,
}

impl LoweringContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new instruction with a fresh id.
    pub fn instruction(&mut self, kind: InstKind, position: SourcePosition) -> Instruction {
        let id = InstId(self.next_instruction);
        self.next_instruction += 1;
        Instruction::new(id, kind, position)
    }

    /// Copies `instruction` under a fresh id.
    pub fn duplicate(&mut self, instruction: &Instruction) -> Instruction {
        self.instruction(instruction.kind().clone(), instruction.position())
    }

    /// Allocates a new conditional-operator marker group.
    pub fn next_group(&mut self) -> u32 {
        let group = self.next_group;
        self.next_group += 1;
        group
    }

    /// Creates a fresh synthetic temporary.
    pub fn temporary(&mut self) -> LocalId {
        self.locals.temporary()
    }

    /// The locals of the body.
    #[must_use]
    pub fn locals(&self) -> &LocalTable {
        &self.locals
    }

    /// The mutable locals of the body.
    pub fn locals_mut(&mut self) -> &mut LocalTable {
        &mut self.locals
    }

    /// Consumes the context, returning the locals.
    #[must_use]
    pub fn into_locals(self) -> LocalTable {
        self.locals
    }
}

/// Turns syntax nodes into three-address instructions.
///
/// Implementations must be pure functions of the syntax node and the context: the pipeline may
/// call them in any block order. `return` and `throw` statements must lower to a list ending in
/// the matching terminator, and no other statement may produce a terminator.
pub trait InstructionLowering: Sync {
    /// Lowers a plain (non-compound) statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement cannot be expressed as instructions.
    fn lower_statement(&self, ctx: &mut LoweringContext, stmt: &Stmt) -> Result<Vec<Instruction>>;

    /// Lowers an expression whose value is needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression cannot be expressed as instructions.
    fn lower_value(
        &self,
        ctx: &mut LoweringContext,
        expr: &Expr,
        position: SourcePosition,
    ) -> Result<Lowered>;

    /// Lowers a branch test.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression cannot be expressed as instructions.
    fn lower_condition(
        &self,
        ctx: &mut LoweringContext,
        expr: &Expr,
        position: SourcePosition,
    ) -> Result<LoweredCondition>;

    /// Builds `target = value`.
    fn generate_assign_for_value(
        &self,
        ctx: &mut LoweringContext,
        target: LocalId,
        value: Operand,
        position: SourcePosition,
    ) -> Instruction;

    /// Builds a two-way branch taken when `lhs` and `rhs` are strictly equal.
    fn generate_if_for_values(
        &self,
        ctx: &mut LoweringContext,
        lhs: Operand,
        rhs: Operand,
        position: SourcePosition,
    ) -> Instruction;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Constant, Rvalue};

    #[test]
    fn test_context_ids_are_unique() {
        let mut ctx = LoweringContext::new();
        let a = ctx.instruction(InstKind::Return(None), SourcePosition::default());
        let b = ctx.duplicate(&a);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.kind(), b.kind());
        assert_eq!(ctx.next_group(), 0);
        assert_eq!(ctx.next_group(), 1);
    }

    #[test]
    fn test_context_owns_locals() {
        let mut ctx = LoweringContext::new();
        let t = ctx.temporary();
        let inst = ctx.instruction(
            InstKind::Assign {
                def: t,
                value: Rvalue::Use(Operand::Const(Constant::Null)),
            },
            SourcePosition::new(1, 1),
        );
        assert_eq!(inst.def(), Some(t));
        assert!(ctx.into_locals().is_temporary(t));
    }
}
