//! Three-address instructions.

use std::fmt;

use crate::{
    analysis::ssa::PhiNode,
    ir::LocalId,
    syntax::{BinaryOp, SourcePosition, UnaryOp},
};

/// Identifier of an instruction, unique within one body.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstId(pub(crate) usize);

impl InstId {
    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstId({})", self.0)
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Compile-time constant operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Number
    Number(f64),
    /// String
    Str(String),
    /// Boolean
    Bool(bool),
    /// `null`
    Null,
    /// `undefined`
    Undefined,
}

/// Instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Value of a local
    Local(LocalId),
    /// Constant value
    Const(Constant),
}

impl Operand {
    /// The local read by this operand.
    #[must_use]
    pub fn as_local(&self) -> Option<LocalId> {
        match self {
            Operand::Local(id) => Some(*id),
            Operand::Const(_) => None,
        }
    }

    fn local_mut(&mut self) -> Option<&mut LocalId> {
        match self {
            Operand::Local(id) => Some(id),
            Operand::Const(_) => None,
        }
    }
}

/// Call target.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// A callable value
    Value(Operand),
    /// `receiver.name(...)`
    Method {
        /// Receiver object
        receiver: Operand,
        /// Method name
        name: String,
    },
}

/// Right-hand side of an assignment or an evaluated expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Rvalue {
    /// Plain copy
    Use(Operand),
    /// `op arg`
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        arg: Operand,
    },
    /// `lhs op rhs`
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Operand,
        /// Right operand
        rhs: Operand,
    },
    /// Call
    Call {
        /// Call target
        callee: Callee,
        /// Arguments
        args: Vec<Operand>,
    },
    /// `object.field`
    Field {
        /// Object
        object: Operand,
        /// Field name
        field: String,
    },
    /// Incoming parameter value
    Parameter(usize),
    /// `this`
    This,
    /// The exception delivered to a handler
    CaughtException,
}

impl Rvalue {
    /// Operands read by this value, in evaluation order.
    #[must_use]
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Rvalue::Use(operand) | Rvalue::Unary { arg: operand, .. } => vec![operand],
            Rvalue::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Rvalue::Call { callee, args } => {
                let mut operands: Vec<&Operand> = Vec::with_capacity(args.len() + 1);
                match callee {
                    Callee::Value(value) => operands.push(value),
                    Callee::Method { receiver, .. } => operands.push(receiver),
                }
                operands.extend(args.iter());
                operands
            }
            Rvalue::Field { object, .. } => vec![object],
            Rvalue::Parameter(_) | Rvalue::This | Rvalue::CaughtException => Vec::new(),
        }
    }

    fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Rvalue::Use(operand) | Rvalue::Unary { arg: operand, .. } => vec![operand],
            Rvalue::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Rvalue::Call { callee, args } => {
                let mut operands: Vec<&mut Operand> = Vec::with_capacity(args.len() + 1);
                match callee {
                    Callee::Value(value) => operands.push(value),
                    Callee::Method { receiver, .. } => operands.push(receiver),
                }
                operands.extend(args.iter_mut());
                operands
            }
            Rvalue::Field { object, .. } => vec![object],
            Rvalue::Parameter(_) | Rvalue::This | Rvalue::CaughtException => Vec::new(),
        }
    }
}

/// Two-operand comparison used as a branch condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Comparison operator
    pub op: BinaryOp,
    /// Left operand
    pub lhs: Operand,
    /// Right operand
    pub rhs: Operand,
}

/// Inline markers of a lowered ternary or short-circuit operator.
///
/// A group `n` always appears as `ConditionStart(n)`, test instructions, `BranchTrue`,
/// true-branch instructions, `BranchFalse(n)`, false-branch instructions, `ConditionEnd(n)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// Start of the test instructions of group `n`
    ConditionStart(u32),
    /// End of the test, start of the true branch
    BranchTrue {
        /// Marker group
        group: u32,
        /// Branch condition
        condition: Condition,
    },
    /// End of the true branch, start of the false branch
    BranchFalse(u32),
    /// End of the false branch
    ConditionEnd(u32),
}

impl Marker {
    /// The marker group.
    #[must_use]
    pub fn group(&self) -> u32 {
        match self {
            Marker::ConditionStart(group)
            | Marker::BranchTrue { group, .. }
            | Marker::BranchFalse(group)
            | Marker::ConditionEnd(group) => *group,
        }
    }
}

/// Instruction kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    /// `def = value`
    Assign {
        /// Defined local
        def: LocalId,
        /// Assigned value
        value: Rvalue,
    },
    /// `object.field = value`
    FieldStore {
        /// Object
        object: Operand,
        /// Field name
        field: String,
        /// Stored value
        value: Operand,
    },
    /// Value evaluated for its side effects
    Eval(Rvalue),
    /// Two-way branch on a condition
    If(Condition),
    /// Multi-way dispatch, only present before switch normalization
    Switch(Operand),
    /// `return value`
    Return(Option<Operand>),
    /// `throw value`
    Throw(Operand),
    /// Conditional-operator marker, only present before conditional normalization
    Marker(Marker),
    /// SSA phi
    Phi(PhiNode),
}

/// A three-address instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    id: InstId,
    kind: InstKind,
    position: SourcePosition,
}

impl Instruction {
    pub(crate) fn new(id: InstId, kind: InstKind, position: SourcePosition) -> Self {
        Instruction { id, kind, position }
    }

    /// Unique identifier.
    #[must_use]
    pub fn id(&self) -> InstId {
        self.id
    }

    /// Instruction kind.
    #[must_use]
    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    /// Mutable instruction kind.
    pub fn kind_mut(&mut self) -> &mut InstKind {
        &mut self.kind
    }

    /// Source position the instruction was lowered from.
    #[must_use]
    pub fn position(&self) -> SourcePosition {
        self.position
    }

    /// The local defined by this instruction.
    #[must_use]
    pub fn def(&self) -> Option<LocalId> {
        match &self.kind {
            InstKind::Assign { def, .. } => Some(*def),
            InstKind::Phi(phi) => Some(phi.result),
            _ => None,
        }
    }

    /// Replaces the defined local. Returns `false` if this is not a definition.
    pub fn set_def(&mut self, local: LocalId) -> bool {
        match &mut self.kind {
            InstKind::Assign { def, .. } => {
                *def = local;
                true
            }
            InstKind::Phi(phi) => {
                phi.result = local;
                true
            }
            _ => false,
        }
    }

    /// Locals read by this instruction, in operand order.
    #[must_use]
    pub fn uses(&self) -> Vec<LocalId> {
        let operand_locals = |operands: &[&Operand]| -> Vec<LocalId> {
            operands.iter().filter_map(|operand| operand.as_local()).collect()
        };
        match &self.kind {
            InstKind::Assign { value, .. } | InstKind::Eval(value) => {
                operand_locals(&value.operands())
            }
            InstKind::FieldStore { object, value, .. } => operand_locals(&[object, value]),
            InstKind::If(condition) | InstKind::Marker(Marker::BranchTrue { condition, .. }) => {
                operand_locals(&[&condition.lhs, &condition.rhs])
            }
            InstKind::Switch(operand) | InstKind::Throw(operand) | InstKind::Return(Some(operand)) => {
                operand_locals(&[operand])
            }
            InstKind::Return(None) | InstKind::Marker(_) => Vec::new(),
            InstKind::Phi(phi) => phi.operands.iter().map(|operand| operand.value).collect(),
        }
    }

    /// Visits every local read by this instruction mutably.
    pub fn for_each_use_mut(&mut self, mut f: impl FnMut(&mut LocalId)) {
        for_each_use(&mut self.kind, &mut f);
    }

    /// Returns `true` for control transfers; they must end their block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            InstKind::If(_) | InstKind::Switch(_) | InstKind::Return(_) | InstKind::Throw(_)
        )
    }

    /// Returns `true` if this instruction defines a local.
    #[must_use]
    pub fn is_definition(&self) -> bool {
        self.def().is_some()
    }

    /// Returns the marker carried by this instruction.
    #[must_use]
    pub fn marker(&self) -> Option<&Marker> {
        match &self.kind {
            InstKind::Marker(marker) => Some(marker),
            _ => None,
        }
    }

    /// Returns the phi carried by this instruction.
    #[must_use]
    pub fn phi(&self) -> Option<&PhiNode> {
        match &self.kind {
            InstKind::Phi(phi) => Some(phi),
            _ => None,
        }
    }

    /// Returns the mutable phi carried by this instruction.
    pub fn phi_mut(&mut self) -> Option<&mut PhiNode> {
        match &mut self.kind {
            InstKind::Phi(phi) => Some(phi),
            _ => None,
        }
    }
}

fn visit_operand(operand: &mut Operand, f: &mut dyn FnMut(&mut LocalId)) {
    if let Some(local) = operand.local_mut() {
        f(local);
    }
}

fn for_each_use(kind: &mut InstKind, f: &mut dyn FnMut(&mut LocalId)) {
    match kind {
        InstKind::Assign { value, .. } | InstKind::Eval(value) => {
            for operand in value.operands_mut() {
                visit_operand(operand, f);
            }
        }
        InstKind::FieldStore { object, value, .. } => {
            visit_operand(object, f);
            visit_operand(value, f);
        }
        InstKind::If(condition) | InstKind::Marker(Marker::BranchTrue { condition, .. }) => {
            visit_operand(&mut condition.lhs, f);
            visit_operand(&mut condition.rhs, f);
        }
        InstKind::Switch(operand) | InstKind::Throw(operand) => visit_operand(operand, f),
        InstKind::Return(operand) => {
            if let Some(operand) = operand {
                visit_operand(operand, f);
            }
        }
        InstKind::Marker(_) => {}
        InstKind::Phi(phi) => {
            for operand in &mut phi.operands {
                f(&mut operand.value);
            }
        }
    }
}
