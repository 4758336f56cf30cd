//! Human readable rendering of instructions.
//!
//! Locals are rendered through a [`LocalTable`] so names and SSA versions show up as `x` and
//! `x#2` instead of raw ids.

use std::fmt;

use crate::ir::{Callee, Constant, InstKind, Instruction, LocalTable, Marker, Operand, Rvalue};

/// Display adapter returned by [`Instruction::display`].
pub struct InstructionDisplay<'a> {
    instruction: &'a Instruction,
    locals: &'a LocalTable,
}

impl Instruction {
    /// Renders the instruction with local names taken from `locals`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flowscope::ir::{InstKind, LoweringContext, Operand, Rvalue, Constant};
    /// use flowscope::syntax::SourcePosition;
    ///
    /// let mut ctx = LoweringContext::new();
    /// let x = ctx.locals_mut().declare("x");
    /// let inst = ctx.instruction(
    ///     InstKind::Assign { def: x, value: Rvalue::Use(Operand::Const(Constant::Number(1.0))) },
    ///     SourcePosition::default(),
    /// );
    /// assert_eq!(inst.display(ctx.locals()).to_string(), "x = 1");
    /// ```
    #[must_use]
    pub fn display<'a>(&'a self, locals: &'a LocalTable) -> InstructionDisplay<'a> {
        InstructionDisplay {
            instruction: self,
            locals,
        }
    }
}

struct OperandDisplay<'a>(&'a Operand, &'a LocalTable);

impl fmt::Display for OperandDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Operand::Local(id) => write!(f, "{}", self.1.display(*id)),
            Operand::Const(Constant::Number(value)) => write!(f, "{value}"),
            Operand::Const(Constant::Str(value)) => write!(f, "{value:?}"),
            Operand::Const(Constant::Bool(value)) => write!(f, "{value}"),
            Operand::Const(Constant::Null) => write!(f, "null"),
            Operand::Const(Constant::Undefined) => write!(f, "undefined"),
        }
    }
}

struct RvalueDisplay<'a>(&'a Rvalue, &'a LocalTable);

impl fmt::Display for RvalueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locals = self.1;
        match self.0 {
            Rvalue::Use(operand) => write!(f, "{}", OperandDisplay(operand, locals)),
            Rvalue::Unary { op, arg } => write!(f, "{op}{}", OperandDisplay(arg, locals)),
            Rvalue::Binary { op, lhs, rhs } => write!(
                f,
                "{} {op} {}",
                OperandDisplay(lhs, locals),
                OperandDisplay(rhs, locals)
            ),
            Rvalue::Call { callee, args } => {
                match callee {
                    Callee::Value(value) => write!(f, "{}", OperandDisplay(value, locals))?,
                    Callee::Method { receiver, name } => {
                        write!(f, "{}.{name}", OperandDisplay(receiver, locals))?;
                    }
                }
                write!(f, "(")?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", OperandDisplay(arg, locals))?;
                }
                write!(f, ")")
            }
            Rvalue::Field { object, field } => {
                write!(f, "{}.{field}", OperandDisplay(object, locals))
            }
            Rvalue::Parameter(index) => write!(f, "@parameter({index})"),
            Rvalue::This => write!(f, "this"),
            Rvalue::CaughtException => write!(f, "caughtexception"),
        }
    }
}

impl fmt::Display for InstructionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locals = self.locals;
        let op = |operand: &Operand| OperandDisplay(operand, locals).to_string();
        match self.instruction.kind() {
            InstKind::Assign { def, value } => {
                write!(f, "{} = {}", locals.display(*def), RvalueDisplay(value, locals))
            }
            InstKind::FieldStore {
                object,
                field,
                value,
            } => write!(f, "{}.{field} = {}", op(object), op(value)),
            InstKind::Eval(value) => write!(f, "{}", RvalueDisplay(value, locals)),
            InstKind::If(condition) => write!(
                f,
                "if {} {} {}",
                op(&condition.lhs),
                condition.op,
                op(&condition.rhs)
            ),
            InstKind::Switch(value) => write!(f, "switch {}", op(value)),
            InstKind::Return(None) => write!(f, "return"),
            InstKind::Return(Some(value)) => write!(f, "return {}", op(value)),
            InstKind::Throw(value) => write!(f, "throw {}", op(value)),
            InstKind::Marker(Marker::ConditionStart(group)) => write!(f, "@start {group}"),
            InstKind::Marker(Marker::BranchTrue { group, condition }) => write!(
                f,
                "@true {group} {} {} {}",
                op(&condition.lhs),
                condition.op,
                op(&condition.rhs)
            ),
            InstKind::Marker(Marker::BranchFalse(group)) => write!(f, "@false {group}"),
            InstKind::Marker(Marker::ConditionEnd(group)) => write!(f, "@end {group}"),
            InstKind::Phi(phi) => {
                write!(f, "{} = phi(", locals.display(phi.result))?;
                for (index, operand) in phi.operands.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(
                        f,
                        "{} from {}",
                        locals.display(operand.value),
                        operand.predecessor
                    )?;
                }
                write!(f, ")")
            }
        }
    }
}
