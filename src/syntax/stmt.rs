use std::fmt;

use strum::Display;

use crate::syntax::{Expr, SourcePosition};

/// Declaration keyword of a variable statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DeclKind {
    /// `let`
    #[strum(to_string = "let")]
    Let,
    /// `const`
    #[strum(to_string = "const")]
    Const,
    /// `var`
    #[strum(to_string = "var")]
    Var,
}

/// One `case`/`default` clause of a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// Case value, `None` for `default`
    pub test: Option<Expr>,
    /// Statements of the clause
    pub body: Vec<Stmt>,
    /// Position of the clause
    pub position: SourcePosition,
}

/// The `catch` clause of a try statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Bound exception name, if any
    pub param: Option<String>,
    /// Handler statements
    pub body: Vec<Stmt>,
    /// Position of the clause
    pub position: SourcePosition,
}

/// Statement kinds of the source language.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression evaluated for its side effects
    Expr(Expr),
    /// `let x = init;`
    VarDecl {
        /// Declaration keyword
        kind: DeclKind,
        /// Declared name
        name: String,
        /// Initializer
        init: Option<Expr>,
    },
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// `if (test) consequent else alternate`
    If {
        /// Branch test
        test: Expr,
        /// Then branch
        consequent: Box<Stmt>,
        /// Else branch
        alternate: Option<Box<Stmt>>,
    },
    /// `while (test) body`
    While {
        /// Loop test
        test: Expr,
        /// Loop body
        body: Box<Stmt>,
    },
    /// `do body while (test);`
    DoWhile {
        /// Loop body
        body: Box<Stmt>,
        /// Loop test, evaluated after the body
        test: Expr,
    },
    /// `for (init; test; update) body`
    For {
        /// Initializer statement
        init: Option<Box<Stmt>>,
        /// Loop test, `true` when absent
        test: Option<Expr>,
        /// Update expression
        update: Option<Expr>,
        /// Loop body
        body: Box<Stmt>,
    },
    /// `switch (discriminant) { cases }`
    Switch {
        /// Dispatched value
        discriminant: Expr,
        /// Clauses in source order
        cases: Vec<SwitchCase>,
    },
    /// `try { block } catch (param) { ... } finally { ... }`
    Try {
        /// Protected statements
        block: Vec<Stmt>,
        /// Catch clause
        handler: Option<CatchClause>,
        /// Finally statements
        finalizer: Option<Vec<Stmt>>,
    },
    /// `break label;`
    Break(Option<String>),
    /// `continue label;`
    Continue(Option<String>),
    /// `return value;`
    Return(Option<Expr>),
    /// `throw value;`
    Throw(Expr),
    /// `label: body`
    Labeled {
        /// Label name
        label: String,
        /// Labeled statement
        body: Box<Stmt>,
    },
    /// `;`
    Empty,
}

/// A statement with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// Statement kind
    pub kind: StmtKind,
    /// Start position
    pub position: SourcePosition,
}

impl Stmt {
    /// Creates a statement of the given kind at an unknown position.
    #[must_use]
    pub fn new(kind: StmtKind) -> Self {
        Stmt {
            kind,
            position: SourcePosition::default(),
        }
    }

    /// Sets the position of this statement.
    #[must_use]
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.position = SourcePosition::new(line, column);
        self
    }

    /// `expr;`
    #[must_use]
    pub fn expr(expr: Expr) -> Self {
        Stmt::new(StmtKind::Expr(expr))
    }

    /// `let name = init;`
    pub fn let_(name: impl Into<String>, init: Option<Expr>) -> Self {
        Stmt::new(StmtKind::VarDecl {
            kind: DeclKind::Let,
            name: name.into(),
            init,
        })
    }

    /// `{ stmts }`
    #[must_use]
    pub fn block(stmts: Vec<Stmt>) -> Self {
        Stmt::new(StmtKind::Block(stmts))
    }

    /// `if (test) { then } else { otherwise }`
    #[must_use]
    pub fn if_(test: Expr, then: Vec<Stmt>, otherwise: Option<Vec<Stmt>>) -> Self {
        Stmt::new(StmtKind::If {
            test,
            consequent: Box::new(Stmt::block(then)),
            alternate: otherwise.map(|stmts| Box::new(Stmt::block(stmts))),
        })
    }

    /// `while (test) { body }`
    #[must_use]
    pub fn while_(test: Expr, body: Vec<Stmt>) -> Self {
        Stmt::new(StmtKind::While {
            test,
            body: Box::new(Stmt::block(body)),
        })
    }

    /// `do { body } while (test);`
    #[must_use]
    pub fn do_while(body: Vec<Stmt>, test: Expr) -> Self {
        Stmt::new(StmtKind::DoWhile {
            body: Box::new(Stmt::block(body)),
            test,
        })
    }

    /// `for (init; test; update) { body }`
    #[must_use]
    pub fn for_(init: Option<Stmt>, test: Option<Expr>, update: Option<Expr>, body: Vec<Stmt>) -> Self {
        Stmt::new(StmtKind::For {
            init: init.map(Box::new),
            test,
            update,
            body: Box::new(Stmt::block(body)),
        })
    }

    /// `switch (discriminant) { cases }`
    #[must_use]
    pub fn switch(discriminant: Expr, cases: Vec<SwitchCase>) -> Self {
        Stmt::new(StmtKind::Switch {
            discriminant,
            cases,
        })
    }

    /// `try { block } catch (param) { ... } finally { ... }`
    #[must_use]
    pub fn try_(block: Vec<Stmt>, handler: Option<CatchClause>, finalizer: Option<Vec<Stmt>>) -> Self {
        Stmt::new(StmtKind::Try {
            block,
            handler,
            finalizer,
        })
    }

    /// `break label;`
    #[must_use]
    pub fn break_(label: Option<&str>) -> Self {
        Stmt::new(StmtKind::Break(label.map(str::to_string)))
    }

    /// `continue label;`
    #[must_use]
    pub fn continue_(label: Option<&str>) -> Self {
        Stmt::new(StmtKind::Continue(label.map(str::to_string)))
    }

    /// `return value;`
    #[must_use]
    pub fn return_(value: Option<Expr>) -> Self {
        Stmt::new(StmtKind::Return(value))
    }

    /// `throw value;`
    #[must_use]
    pub fn throw(value: Expr) -> Self {
        Stmt::new(StmtKind::Throw(value))
    }

    /// `label: body`
    pub fn labeled(label: impl Into<String>, body: Stmt) -> Self {
        Stmt::new(StmtKind::Labeled {
            label: label.into(),
            body: Box::new(body),
        })
    }

    /// Returns `true` for statements that end the function body (`return`, `throw`).
    #[must_use]
    pub fn is_exit(&self) -> bool {
        matches!(self.kind, StmtKind::Return(_) | StmtKind::Throw(_))
    }

    /// Expressions held by this statement itself, including case tests and the `for`
    /// initializer, but not those of nested body statements.
    #[must_use]
    pub fn expressions(&self) -> Vec<&Expr> {
        match &self.kind {
            StmtKind::Expr(expr)
            | StmtKind::If { test: expr, .. }
            | StmtKind::While { test: expr, .. }
            | StmtKind::DoWhile { test: expr, .. }
            | StmtKind::Throw(expr) => vec![expr],
            StmtKind::VarDecl { init, .. } => init.iter().collect(),
            StmtKind::Return(value) => value.iter().collect(),
            StmtKind::For {
                init, test, update, ..
            } => {
                let mut out: Vec<&Expr> = init
                    .as_deref()
                    .map(Stmt::expressions)
                    .unwrap_or_default();
                out.extend(test);
                out.extend(update);
                out
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => std::iter::once(discriminant)
                .chain(cases.iter().filter_map(|case| case.test.as_ref()))
                .collect(),
            StmtKind::Block(_)
            | StmtKind::Try { .. }
            | StmtKind::Break(_)
            | StmtKind::Continue(_)
            | StmtKind::Labeled { .. }
            | StmtKind::Empty => Vec::new(),
        }
    }
}

impl SwitchCase {
    /// `case test: body`
    #[must_use]
    pub fn case(test: Expr, body: Vec<Stmt>) -> Self {
        SwitchCase {
            test: Some(test),
            body,
            position: SourcePosition::default(),
        }
    }

    /// `default: body`
    #[must_use]
    pub fn default(body: Vec<Stmt>) -> Self {
        SwitchCase {
            test: None,
            body,
            position: SourcePosition::default(),
        }
    }
}

impl CatchClause {
    /// `catch (param) { body }`
    #[must_use]
    pub fn new(param: Option<&str>, body: Vec<Stmt>) -> Self {
        CatchClause {
            param: param.map(str::to_string),
            body,
            position: SourcePosition::default(),
        }
    }
}

/// Renders the head of a statement, without nested bodies.
impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Expr(expr) => write!(f, "{expr};"),
            StmtKind::VarDecl { kind, name, init } => match init {
                Some(init) => write!(f, "{kind} {name} = {init};"),
                None => write!(f, "{kind} {name};"),
            },
            StmtKind::Block(stmts) => write!(f, "{{ /* {} statements */ }}", stmts.len()),
            StmtKind::If { test, .. } => write!(f, "if ({test})"),
            StmtKind::While { test, .. } => write!(f, "while ({test})"),
            StmtKind::DoWhile { test, .. } => write!(f, "do ... while ({test});"),
            StmtKind::For {
                init, test, update, ..
            } => {
                f.write_str("for (")?;
                if let Some(init) = init {
                    write!(f, "{}", init.to_string().trim_end_matches(';'))?;
                }
                f.write_str("; ")?;
                if let Some(test) = test {
                    write!(f, "{test}")?;
                }
                f.write_str("; ")?;
                if let Some(update) = update {
                    write!(f, "{update}")?;
                }
                f.write_str(")")
            }
            StmtKind::Switch { discriminant, .. } => write!(f, "switch ({discriminant})"),
            StmtKind::Try { .. } => f.write_str("try"),
            StmtKind::Break(Some(label)) => write!(f, "break {label};"),
            StmtKind::Break(None) => f.write_str("break;"),
            StmtKind::Continue(Some(label)) => write!(f, "continue {label};"),
            StmtKind::Continue(None) => f.write_str("continue;"),
            StmtKind::Return(Some(value)) => write!(f, "return {value};"),
            StmtKind::Return(None) => f.write_str("return;"),
            StmtKind::Throw(value) => write!(f, "throw {value};"),
            StmtKind::Labeled { label, body } => write!(f, "{label}: {body}"),
            StmtKind::Empty => f.write_str(";"),
        }
    }
}

/// A function body handed over by the front-end.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    /// Function name, used in logs and diagnostics
    pub name: String,
    /// Parameter names in declaration order
    pub params: Vec<String>,
    /// Body statements
    pub body: Vec<Stmt>,
    /// Position of the function
    pub position: SourcePosition,
}

impl FunctionBody {
    /// Creates a function body at an unknown position.
    pub fn new(name: impl Into<String>, params: Vec<&str>, body: Vec<Stmt>) -> Self {
        FunctionBody {
            name: name.into(),
            params: params.into_iter().map(str::to_string).collect(),
            body,
            position: SourcePosition::default(),
        }
    }
}
