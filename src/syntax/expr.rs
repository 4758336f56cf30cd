use std::fmt;

use strum::{Display, EnumCount, EnumIter};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
pub enum BinaryOp {
    /// `+`
    #[strum(to_string = "+")]
    Add,
    /// `-`
    #[strum(to_string = "-")]
    Sub,
    /// `*`
    #[strum(to_string = "*")]
    Mul,
    /// `/`
    #[strum(to_string = "/")]
    Div,
    /// `%`
    #[strum(to_string = "%")]
    Rem,
    /// `<`
    #[strum(to_string = "<")]
    Lt,
    /// `<=`
    #[strum(to_string = "<=")]
    Le,
    /// `>`
    #[strum(to_string = ">")]
    Gt,
    /// `>=`
    #[strum(to_string = ">=")]
    Ge,
    /// `==`
    #[strum(to_string = "==")]
    Eq,
    /// `!=`
    #[strum(to_string = "!=")]
    Ne,
    /// `===`
    #[strum(to_string = "===")]
    StrictEq,
    /// `!==`
    #[strum(to_string = "!==")]
    StrictNe,
    /// `&`
    #[strum(to_string = "&")]
    BitAnd,
    /// `|`
    #[strum(to_string = "|")]
    BitOr,
    /// `^`
    #[strum(to_string = "^")]
    BitXor,
    /// `<<`
    #[strum(to_string = "<<")]
    Shl,
    /// `>>`
    #[strum(to_string = ">>")]
    Shr,
    /// `instanceof`
    #[strum(to_string = "instanceof")]
    InstanceOf,
    /// `in`
    #[strum(to_string = "in")]
    In,
}

impl BinaryOp {
    /// Returns `true` for operators producing a boolean from a comparison.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::StrictEq
                | BinaryOp::StrictNe
                | BinaryOp::InstanceOf
                | BinaryOp::In
        )
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
pub enum UnaryOp {
    /// `-`
    #[strum(to_string = "-")]
    Neg,
    /// `+`
    #[strum(to_string = "+")]
    Plus,
    /// `!`
    #[strum(to_string = "!")]
    Not,
    /// `~`
    #[strum(to_string = "~")]
    BitNot,
    /// `typeof`
    #[strum(to_string = "typeof ")]
    TypeOf,
    /// `void`
    #[strum(to_string = "void ")]
    Void,
}

/// Short-circuiting operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
pub enum LogicalOp {
    /// `&&`
    #[strum(to_string = "&&")]
    And,
    /// `||`
    #[strum(to_string = "||")]
    Or,
    /// `??`
    #[strum(to_string = "??")]
    Coalesce,
}

/// Assignment operators. Compound forms carry the binary operator they apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
pub enum AssignOp {
    /// `=`
    #[strum(to_string = "=")]
    Assign,
    /// `+=`
    #[strum(to_string = "+=")]
    AddAssign,
    /// `-=`
    #[strum(to_string = "-=")]
    SubAssign,
    /// `*=`
    #[strum(to_string = "*=")]
    MulAssign,
    /// `/=`
    #[strum(to_string = "/=")]
    DivAssign,
    /// `%=`
    #[strum(to_string = "%=")]
    RemAssign,
    /// `|=`
    #[strum(to_string = "|=")]
    BitOrAssign,
    /// `&=`
    #[strum(to_string = "&=")]
    BitAndAssign,
}

impl AssignOp {
    /// The binary operator applied by a compound assignment, `None` for plain `=`.
    #[must_use]
    pub const fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some(BinaryOp::Add),
            AssignOp::SubAssign => Some(BinaryOp::Sub),
            AssignOp::MulAssign => Some(BinaryOp::Mul),
            AssignOp::DivAssign => Some(BinaryOp::Div),
            AssignOp::RemAssign => Some(BinaryOp::Rem),
            AssignOp::BitOrAssign => Some(BinaryOp::BitOr),
            AssignOp::BitAndAssign => Some(BinaryOp::BitAnd),
        }
    }
}

/// `++` / `--`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum UpdateOp {
    /// `++`
    #[strum(to_string = "++")]
    Increment,
    /// `--`
    #[strum(to_string = "--")]
    Decrement,
}

impl UpdateOp {
    /// The binary operator the update applies with a constant `1`.
    #[must_use]
    pub const fn binary(self) -> BinaryOp {
        match self {
            UpdateOp::Increment => BinaryOp::Add,
            UpdateOp::Decrement => BinaryOp::Sub,
        }
    }
}

/// An expression of the source language.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Number(f64),
    /// String literal
    Str(String),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// `this`
    This,
    /// Identifier reference
    Ident(String),
    /// `op arg`
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        arg: Box<Expr>,
    },
    /// `lhs op rhs`
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// `lhs && rhs`, `lhs || rhs`, `lhs ?? rhs`
    Logical {
        /// Operator
        op: LogicalOp,
        /// Left operand, always evaluated
        lhs: Box<Expr>,
        /// Right operand, conditionally evaluated
        rhs: Box<Expr>,
    },
    /// `test ? consequent : alternate`
    Conditional {
        /// Branch test
        test: Box<Expr>,
        /// Value when the test holds
        consequent: Box<Expr>,
        /// Value otherwise
        alternate: Box<Expr>,
    },
    /// `target op value`
    Assign {
        /// Operator
        op: AssignOp,
        /// Identifier or member expression
        target: Box<Expr>,
        /// Assigned value
        value: Box<Expr>,
    },
    /// `++target`, `target--`, ...
    Update {
        /// Operator
        op: UpdateOp,
        /// `true` for the prefix form
        prefix: bool,
        /// Identifier or member expression
        target: Box<Expr>,
    },
    /// `callee(args)`
    Call {
        /// Called expression
        callee: Box<Expr>,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `object.property`
    Member {
        /// Accessed object
        object: Box<Expr>,
        /// Property name
        property: String,
    },
}

impl Expr {
    /// `name`
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    /// Numeric literal.
    #[must_use]
    pub fn num(value: f64) -> Self {
        Expr::Number(value)
    }

    /// `lhs op rhs`
    #[must_use]
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// `op arg`
    #[must_use]
    pub fn unary(op: UnaryOp, arg: Expr) -> Self {
        Expr::Unary {
            op,
            arg: Box::new(arg),
        }
    }

    /// `lhs op rhs` for short-circuit operators.
    #[must_use]
    pub fn logical(op: LogicalOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Logical {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// `test ? consequent : alternate`
    #[must_use]
    pub fn conditional(test: Expr, consequent: Expr, alternate: Expr) -> Self {
        Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        }
    }

    /// `target = value`
    #[must_use]
    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign {
            op: AssignOp::Assign,
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    /// `target op= value`
    #[must_use]
    pub fn compound(op: AssignOp, target: Expr, value: Expr) -> Self {
        Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    /// `target++` (postfix)
    #[must_use]
    pub fn post_increment(target: Expr) -> Self {
        Expr::Update {
            op: UpdateOp::Increment,
            prefix: false,
            target: Box::new(target),
        }
    }

    /// `callee(args)`
    #[must_use]
    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
        }
    }

    /// `object.property`
    pub fn member(object: Expr, property: impl Into<String>) -> Self {
        Expr::Member {
            object: Box::new(object),
            property: property.into(),
        }
    }

    /// Returns `true` if the expression may be assigned to.
    #[must_use]
    pub fn is_assignable(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Member { .. })
    }

    /// Height of the expression tree; literals and identifiers have depth 1.
    ///
    /// Computed without recursion, so it is safe on trees too deep to lower or print.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((expr, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            match expr {
                Expr::Unary { arg: child, .. }
                | Expr::Update { target: child, .. }
                | Expr::Member { object: child, .. } => stack.push((&**child, depth + 1)),
                Expr::Binary { lhs, rhs, .. } | Expr::Logical { lhs, rhs, .. } => {
                    stack.push((&**lhs, depth + 1));
                    stack.push((&**rhs, depth + 1));
                }
                Expr::Assign { target, value, .. } => {
                    stack.push((&**target, depth + 1));
                    stack.push((&**value, depth + 1));
                }
                Expr::Conditional {
                    test,
                    consequent,
                    alternate,
                } => {
                    for child in [test, consequent, alternate] {
                        stack.push((&**child, depth + 1));
                    }
                }
                Expr::Call { callee, args } => {
                    stack.push((&**callee, depth + 1));
                    stack.extend(args.iter().map(|arg| (arg, depth + 1)));
                }
                Expr::Number(_)
                | Expr::Str(_)
                | Expr::Bool(_)
                | Expr::Null
                | Expr::Undefined
                | Expr::This
                | Expr::Ident(_) => {}
            }
        }
        deepest
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{value}"),
            Expr::Str(value) => write!(f, "{value:?}"),
            Expr::Bool(value) => write!(f, "{value}"),
            Expr::Null => f.write_str("null"),
            Expr::Undefined => f.write_str("undefined"),
            Expr::This => f.write_str("this"),
            Expr::Ident(name) => f.write_str(name),
            Expr::Unary { op, arg } => write!(f, "{op}{arg}"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Expr::Logical { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => write!(f, "({test} ? {consequent} : {alternate})"),
            Expr::Assign { op, target, value } => write!(f, "{target} {op} {value}"),
            Expr::Update { op, prefix, target } => {
                if *prefix {
                    write!(f, "{op}{target}")
                } else {
                    write!(f, "{target}{op}")
                }
            }
            Expr::Call { callee, args } => {
                write!(f, "{callee}(")?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Expr::Member { object, property } => write!(f, "{object}.{property}"),
        }
    }
}
