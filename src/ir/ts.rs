//! Default lowering of the TypeScript-family syntax model.
//!
//! Nested expressions are flattened into fresh temporaries. Ternaries and short-circuit operators
//! become marker groups that assign a single result temporary on both branches; the
//! conditional-operator normalizer later turns each group into a diamond of blocks.

use crate::{
    ir::{
        Callee, Condition, Constant, InstKind, Instruction, InstructionLowering, LocalId, Lowered,
        LoweredCondition, LoweringContext, Marker, Operand, Rvalue,
    },
    syntax::{BinaryOp, Expr, LogicalOp, SourcePosition, Stmt, StmtKind, UnaryOp, UpdateOp},
    Error, Result,
};

/// Lowering for [`crate::syntax`] trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsLowering;

fn constant(expr: &Expr) -> Option<Constant> {
    match expr {
        Expr::Number(value) => Some(Constant::Number(*value)),
        Expr::Str(value) => Some(Constant::Str(value.clone())),
        Expr::Bool(value) => Some(Constant::Bool(*value)),
        Expr::Null => Some(Constant::Null),
        Expr::Undefined => Some(Constant::Undefined),
        _ => None,
    }
}

fn truthy(value: Operand) -> Condition {
    Condition {
        op: BinaryOp::Ne,
        lhs: value,
        rhs: Operand::Const(Constant::Bool(false)),
    }
}

fn invalid_target(expr: &Expr, position: SourcePosition) -> Error {
    Error::MalformedStatement {
        text: expr.to_string(),
        position,
        message: "invalid assignment target".to_string(),
    }
}

impl TsLowering {
    fn emit(
        ctx: &mut LoweringContext,
        out: &mut Vec<Instruction>,
        kind: InstKind,
        position: SourcePosition,
    ) {
        out.push(ctx.instruction(kind, position));
    }

    /// Lowers `expr` into an operand, materializing compound values in a temporary.
    fn operand(
        &self,
        ctx: &mut LoweringContext,
        expr: &Expr,
        position: SourcePosition,
        out: &mut Vec<Instruction>,
    ) -> Result<Operand> {
        if let Some(value) = constant(expr) {
            return Ok(Operand::Const(value));
        }
        match expr {
            Expr::Ident(name) => Ok(Operand::Local(ctx.locals_mut().declare(name))),
            Expr::Logical { .. } | Expr::Conditional { .. } => {
                self.branching(ctx, expr, position, out)
            }
            Expr::Assign { .. } | Expr::Update { .. } => {
                self.assignment(ctx, expr, position, true, out)
            }
            _ => {
                let value = self.rvalue(ctx, expr, position, out)?;
                let temp = ctx.temporary();
                Self::emit(ctx, out, InstKind::Assign { def: temp, value }, position);
                Ok(Operand::Local(temp))
            }
        }
    }

    /// Lowers `expr` into a right-hand side without materializing the outermost value.
    fn rvalue(
        &self,
        ctx: &mut LoweringContext,
        expr: &Expr,
        position: SourcePosition,
        out: &mut Vec<Instruction>,
    ) -> Result<Rvalue> {
        Ok(match expr {
            Expr::Ident(name) => Rvalue::Use(Operand::Local(ctx.locals_mut().declare(name))),
            Expr::This => Rvalue::This,
            Expr::Unary { op, arg } => Rvalue::Unary {
                op: *op,
                arg: self.operand(ctx, arg, position, out)?,
            },
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.operand(ctx, lhs, position, out)?;
                let rhs = self.operand(ctx, rhs, position, out)?;
                Rvalue::Binary { op: *op, lhs, rhs }
            }
            Expr::Call { callee, args } => {
                let callee = match callee.as_ref() {
                    Expr::Member { object, property } => Callee::Method {
                        receiver: self.operand(ctx, object, position, out)?,
                        name: property.clone(),
                    },
                    other => Callee::Value(self.operand(ctx, other, position, out)?),
                };
                let mut operands = Vec::with_capacity(args.len());
                for arg in args {
                    operands.push(self.operand(ctx, arg, position, out)?);
                }
                Rvalue::Call {
                    callee,
                    args: operands,
                }
            }
            Expr::Member { object, property } => Rvalue::Field {
                object: self.operand(ctx, object, position, out)?,
                field: property.clone(),
            },
            Expr::Logical { .. } | Expr::Conditional { .. } => {
                Rvalue::Use(self.branching(ctx, expr, position, out)?)
            }
            Expr::Assign { .. } | Expr::Update { .. } => {
                Rvalue::Use(self.assignment(ctx, expr, position, true, out)?)
            }
            Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) | Expr::Null | Expr::Undefined => {
                Rvalue::Use(self.operand(ctx, expr, position, out)?)
            }
        })
    }

    /// Lowers an assignment or update, returning the value of the expression.
    fn assignment(
        &self,
        ctx: &mut LoweringContext,
        expr: &Expr,
        position: SourcePosition,
        want_value: bool,
        out: &mut Vec<Instruction>,
    ) -> Result<Operand> {
        match expr {
            Expr::Assign { op, target, value } => match target.as_ref() {
                Expr::Ident(name) => {
                    let local = ctx.locals_mut().declare(name);
                    let value = match op.binary() {
                        None => self.rvalue(ctx, value, position, out)?,
                        Some(binary) => Rvalue::Binary {
                            op: binary,
                            lhs: Operand::Local(local),
                            rhs: self.operand(ctx, value, position, out)?,
                        },
                    };
                    Self::emit(ctx, out, InstKind::Assign { def: local, value }, position);
                    Ok(Operand::Local(local))
                }
                Expr::Member { object, property } => {
                    let object = self.operand(ctx, object, position, out)?;
                    let stored = match op.binary() {
                        None => self.operand(ctx, value, position, out)?,
                        Some(binary) => {
                            let current = self.load_field(ctx, &object, property, position, out);
                            let rhs = self.operand(ctx, value, position, out)?;
                            let result = ctx.temporary();
                            Self::emit(
                                ctx,
                                out,
                                InstKind::Assign {
                                    def: result,
                                    value: Rvalue::Binary {
                                        op: binary,
                                        lhs: Operand::Local(current),
                                        rhs,
                                    },
                                },
                                position,
                            );
                            Operand::Local(result)
                        }
                    };
                    Self::emit(
                        ctx,
                        out,
                        InstKind::FieldStore {
                            object,
                            field: property.clone(),
                            value: stored.clone(),
                        },
                        position,
                    );
                    Ok(stored)
                }
                _ => Err(invalid_target(expr, position)),
            },
            Expr::Update { op, prefix, target } => match target.as_ref() {
                Expr::Ident(name) => {
                    let local = ctx.locals_mut().declare(name);
                    let mut result = Operand::Local(local);
                    if want_value && !*prefix {
                        let old = ctx.temporary();
                        Self::emit(
                            ctx,
                            out,
                            InstKind::Assign {
                                def: old,
                                value: Rvalue::Use(Operand::Local(local)),
                            },
                            position,
                        );
                        result = Operand::Local(old);
                    }
                    Self::emit(
                        ctx,
                        out,
                        InstKind::Assign {
                            def: local,
                            value: Self::step(*op, Operand::Local(local)),
                        },
                        position,
                    );
                    Ok(result)
                }
                Expr::Member { object, property } => {
                    let object = self.operand(ctx, object, position, out)?;
                    let current = self.load_field(ctx, &object, property, position, out);
                    let updated = ctx.temporary();
                    Self::emit(
                        ctx,
                        out,
                        InstKind::Assign {
                            def: updated,
                            value: Self::step(*op, Operand::Local(current)),
                        },
                        position,
                    );
                    Self::emit(
                        ctx,
                        out,
                        InstKind::FieldStore {
                            object,
                            field: property.clone(),
                            value: Operand::Local(updated),
                        },
                        position,
                    );
                    Ok(Operand::Local(if *prefix { updated } else { current }))
                }
                _ => Err(invalid_target(expr, position)),
            },
            _ => self.operand(ctx, expr, position, out),
        }
    }

    fn step(op: UpdateOp, value: Operand) -> Rvalue {
        Rvalue::Binary {
            op: op.binary(),
            lhs: value,
            rhs: Operand::Const(Constant::Number(1.0)),
        }
    }

    fn load_field(
        &self,
        ctx: &mut LoweringContext,
        object: &Operand,
        field: &str,
        position: SourcePosition,
        out: &mut Vec<Instruction>,
    ) -> LocalId {
        let temp = ctx.temporary();
        Self::emit(
            ctx,
            out,
            InstKind::Assign {
                def: temp,
                value: Rvalue::Field {
                    object: object.clone(),
                    field: field.to_string(),
                },
            },
            position,
        );
        temp
    }

    /// Lowers a ternary or short-circuit operator into a marker group.
    fn branching(
        &self,
        ctx: &mut LoweringContext,
        expr: &Expr,
        position: SourcePosition,
        out: &mut Vec<Instruction>,
    ) -> Result<Operand> {
        if !matches!(expr, Expr::Logical { .. } | Expr::Conditional { .. }) {
            return self.operand(ctx, expr, position, out);
        }
        let group = ctx.next_group();
        let result = ctx.temporary();
        Self::emit(ctx, out, InstKind::Marker(Marker::ConditionStart(group)), position);

        match expr {
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let lowered = self.lower_condition(ctx, test, position)?;
                out.extend(lowered.instructions);
                Self::emit(
                    ctx,
                    out,
                    InstKind::Marker(Marker::BranchTrue {
                        group,
                        condition: lowered.condition,
                    }),
                    position,
                );
                self.assign_to(ctx, result, consequent, position, out)?;
                Self::emit(ctx, out, InstKind::Marker(Marker::BranchFalse(group)), position);
                self.assign_to(ctx, result, alternate, position, out)?;
            }
            Expr::Logical { op, lhs, rhs } => {
                let left = self.operand(ctx, lhs, position, out)?;
                let condition = match op {
                    LogicalOp::And | LogicalOp::Or => truthy(left.clone()),
                    LogicalOp::Coalesce => Condition {
                        op: BinaryOp::Eq,
                        lhs: left.clone(),
                        rhs: Operand::Const(Constant::Null),
                    },
                };
                Self::emit(
                    ctx,
                    out,
                    InstKind::Marker(Marker::BranchTrue { group, condition }),
                    position,
                );
                // `a || b` keeps `a` on the true branch, the others evaluate `b` there.
                let rhs_on_true = !matches!(op, LogicalOp::Or);
                if rhs_on_true {
                    self.assign_to(ctx, result, rhs, position, out)?;
                } else {
                    out.push(self.generate_assign_for_value(ctx, result, left.clone(), position));
                }
                Self::emit(ctx, out, InstKind::Marker(Marker::BranchFalse(group)), position);
                if rhs_on_true {
                    out.push(self.generate_assign_for_value(ctx, result, left, position));
                } else {
                    self.assign_to(ctx, result, rhs, position, out)?;
                }
            }
            _ => {}
        }

        Self::emit(ctx, out, InstKind::Marker(Marker::ConditionEnd(group)), position);
        Ok(Operand::Local(result))
    }

    /// Lowers `expr` straight into `target`. Computed values are defined into `target` itself
    /// rather than into a temporary that is then copied.
    fn assign_to(
        &self,
        ctx: &mut LoweringContext,
        target: LocalId,
        expr: &Expr,
        position: SourcePosition,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        match expr {
            Expr::This
            | Expr::Unary { .. }
            | Expr::Binary { .. }
            | Expr::Call { .. }
            | Expr::Member { .. } => {
                let value = self.rvalue(ctx, expr, position, out)?;
                Self::emit(ctx, out, InstKind::Assign { def: target, value }, position);
            }
            _ => {
                let value = self.operand(ctx, expr, position, out)?;
                out.push(self.generate_assign_for_value(ctx, target, value, position));
            }
        }
        Ok(())
    }

    fn effect(
        &self,
        ctx: &mut LoweringContext,
        expr: &Expr,
        position: SourcePosition,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        match expr {
            Expr::Assign { .. } | Expr::Update { .. } => {
                self.assignment(ctx, expr, position, false, out)?;
            }
            _ => {
                let value = self.rvalue(ctx, expr, position, out)?;
                Self::emit(ctx, out, InstKind::Eval(value), position);
            }
        }
        Ok(())
    }
}

impl InstructionLowering for TsLowering {
    fn lower_statement(&self, ctx: &mut LoweringContext, stmt: &Stmt) -> Result<Vec<Instruction>> {
        let position = stmt.position;
        let mut out = Vec::new();
        match &stmt.kind {
            StmtKind::Expr(expr) => self.effect(ctx, expr, position, &mut out)?,
            StmtKind::VarDecl { name, init, .. } => {
                let local = ctx.locals_mut().declare(name);
                let value = match init {
                    Some(init) => self.rvalue(ctx, init, position, &mut out)?,
                    None => Rvalue::Use(Operand::Const(Constant::Undefined)),
                };
                Self::emit(ctx, &mut out, InstKind::Assign { def: local, value }, position);
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(value) => Some(self.operand(ctx, value, position, &mut out)?),
                    None => None,
                };
                Self::emit(ctx, &mut out, InstKind::Return(value), position);
            }
            StmtKind::Throw(value) => {
                let value = self.operand(ctx, value, position, &mut out)?;
                Self::emit(ctx, &mut out, InstKind::Throw(value), position);
            }
            StmtKind::Empty => {}
            _ => {
                return Err(Error::MalformedStatement {
                    text: stmt.to_string(),
                    position,
                    message: "compound statement reached instruction lowering".to_string(),
                })
            }
        }
        Ok(out)
    }

    fn lower_value(
        &self,
        ctx: &mut LoweringContext,
        expr: &Expr,
        position: SourcePosition,
    ) -> Result<Lowered> {
        let mut instructions = Vec::new();
        let value = self.operand(ctx, expr, position, &mut instructions)?;
        Ok(Lowered {
            instructions,
            value,
        })
    }

    fn lower_condition(
        &self,
        ctx: &mut LoweringContext,
        expr: &Expr,
        position: SourcePosition,
    ) -> Result<LoweredCondition> {
        let mut instructions = Vec::new();
        let condition = match expr {
            Expr::Binary { op, lhs, rhs } if op.is_comparison() => {
                let lhs = self.operand(ctx, lhs, position, &mut instructions)?;
                let rhs = self.operand(ctx, rhs, position, &mut instructions)?;
                Condition { op: *op, lhs, rhs }
            }
            Expr::Unary {
                op: UnaryOp::Not,
                arg,
            } => Condition {
                op: BinaryOp::Eq,
                lhs: self.operand(ctx, arg, position, &mut instructions)?,
                rhs: Operand::Const(Constant::Bool(false)),
            },
            _ => truthy(self.operand(ctx, expr, position, &mut instructions)?),
        };
        Ok(LoweredCondition {
            instructions,
            condition,
        })
    }

    fn generate_assign_for_value(
        &self,
        ctx: &mut LoweringContext,
        target: LocalId,
        value: Operand,
        position: SourcePosition,
    ) -> Instruction {
        ctx.instruction(
            InstKind::Assign {
                def: target,
                value: Rvalue::Use(value),
            },
            position,
        )
    }

    fn generate_if_for_values(
        &self,
        ctx: &mut LoweringContext,
        lhs: Operand,
        rhs: Operand,
        position: SourcePosition,
    ) -> Instruction {
        ctx.instruction(
            InstKind::If(Condition {
                op: BinaryOp::StrictEq,
                lhs,
                rhs,
            }),
            position,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::AssignOp;

    fn lower(stmt: &Stmt) -> (Vec<Instruction>, LoweringContext) {
        let mut ctx = LoweringContext::new();
        let instructions = TsLowering
            .lower_statement(&mut ctx, stmt)
            .expect("lowering failed");
        (instructions, ctx)
    }

    #[test]
    fn test_compound_assign_reads_target() {
        let stmt = Stmt::expr(Expr::compound(
            AssignOp::AddAssign,
            Expr::ident("sum"),
            Expr::ident("i"),
        ));
        let (instructions, ctx) = lower(&stmt);
        assert_eq!(instructions.len(), 1);
        let sum = ctx.locals().lookup("sum").expect("sum declared");
        let i = ctx.locals().lookup("i").expect("i declared");
        assert_eq!(instructions[0].def(), Some(sum));
        assert_eq!(instructions[0].uses(), vec![sum, i]);
    }

    #[test]
    fn test_postfix_update_as_statement_has_no_copy() {
        let (instructions, ctx) = lower(&Stmt::expr(Expr::post_increment(Expr::ident("i"))));
        assert_eq!(instructions.len(), 1);
        assert_eq!(ctx.locals().len(), 1);
    }

    #[test]
    fn test_postfix_update_as_value_copies_old_value() {
        let stmt = Stmt::let_("j", Some(Expr::post_increment(Expr::ident("i"))));
        let (instructions, ctx) = lower(&stmt);
        // %t0 = i; i = i + 1; j = %t0
        assert_eq!(instructions.len(), 3);
        let temp = instructions[0].def().expect("copy defines a temporary");
        assert!(ctx.locals().is_temporary(temp));
        assert_eq!(instructions[2].uses(), vec![temp]);
    }

    #[test]
    fn test_ternary_emits_marker_group() {
        let stmt = Stmt::let_(
            "y",
            Some(Expr::conditional(
                Expr::binary(BinaryOp::Gt, Expr::ident("a"), Expr::num(0.0)),
                Expr::num(1.0),
                Expr::num(2.0),
            )),
        );
        let (instructions, ctx) = lower(&stmt);
        let markers: Vec<&Marker> = instructions.iter().filter_map(Instruction::marker).collect();
        assert_eq!(markers.len(), 4);
        assert!(matches!(markers[0], Marker::ConditionStart(0)));
        assert!(matches!(markers[3], Marker::ConditionEnd(0)));

        let last = instructions.last().expect("alias assignment");
        assert_eq!(last.def(), ctx.locals().lookup("y"));
        let temp = last.uses()[0];
        assert!(ctx.locals().is_temporary(temp));
        let defs = instructions.iter().filter(|i| i.def() == Some(temp)).count();
        assert_eq!(defs, 2);
    }

    #[test]
    fn test_logical_or_keeps_left_on_true_branch() {
        let stmt = Stmt::let_(
            "v",
            Some(Expr::logical(LogicalOp::Or, Expr::ident("a"), Expr::ident("b"))),
        );
        let (instructions, ctx) = lower(&stmt);
        let a = ctx.locals().lookup("a").expect("a declared");
        let b = ctx.locals().lookup("b").expect("b declared");
        let true_at = instructions
            .iter()
            .position(|i| matches!(i.marker(), Some(Marker::BranchTrue { .. })))
            .expect("branch-true marker");
        assert_eq!(instructions[true_at + 1].uses(), vec![a]);
        let false_at = instructions
            .iter()
            .position(|i| matches!(i.marker(), Some(Marker::BranchFalse(_))))
            .expect("branch-false marker");
        assert_eq!(instructions[false_at + 1].uses(), vec![b]);
    }

    #[test]
    fn test_member_call_and_store() {
        let stmt = Stmt::expr(Expr::assign(
            Expr::member(Expr::ident("o"), "f"),
            Expr::call(Expr::member(Expr::ident("o"), "g"), vec![Expr::num(1.0)]),
        ));
        let (instructions, _) = lower(&stmt);
        assert!(matches!(
            instructions[0].kind(),
            InstKind::Assign {
                value: Rvalue::Call {
                    callee: Callee::Method { .. },
                    ..
                },
                ..
            }
        ));
        assert!(matches!(instructions[1].kind(), InstKind::FieldStore { .. }));
    }

    #[test]
    fn test_condition_shapes() {
        let mut ctx = LoweringContext::new();
        let cond = TsLowering
            .lower_condition(
                &mut ctx,
                &Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::ident("n")),
                SourcePosition::default(),
            )
            .expect("comparison lowers");
        assert!(cond.instructions.is_empty());
        assert_eq!(cond.condition.op, BinaryOp::Lt);

        let cond = TsLowering
            .lower_condition(&mut ctx, &Expr::ident("flag"), SourcePosition::default())
            .expect("truthiness lowers");
        assert_eq!(cond.condition.op, BinaryOp::Ne);
        assert_eq!(cond.condition.rhs, Operand::Const(Constant::Bool(false)));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let mut ctx = LoweringContext::new();
        let stmt = Stmt::expr(Expr::assign(Expr::num(1.0), Expr::num(2.0))).at(4, 2);
        let err = TsLowering.lower_statement(&mut ctx, &stmt);
        assert!(matches!(err, Err(Error::MalformedStatement { .. })));
    }

    #[test]
    fn test_return_and_throw_terminate() {
        let (instructions, _) = lower(&Stmt::return_(Some(Expr::binary(
            BinaryOp::Add,
            Expr::ident("a"),
            Expr::num(1.0),
        ))));
        assert!(instructions.last().is_some_and(Instruction::is_terminator));
        let (instructions, _) = lower(&Stmt::throw(Expr::ident("e")));
        assert!(matches!(instructions.last().map(Instruction::kind), Some(InstKind::Throw(_))));
    }

    #[test]
    fn test_logical_call_defines_group_result() {
        // let r = a && g();
        let stmt = Stmt::let_(
            "r",
            Some(Expr::logical(
                LogicalOp::And,
                Expr::ident("a"),
                Expr::call(Expr::ident("g"), vec![]),
            )),
        );
        let (instructions, ctx) = lower(&stmt);
        let true_at = instructions
            .iter()
            .position(|i| matches!(i.marker(), Some(Marker::BranchTrue { .. })))
            .expect("branch-true marker");
        let call = &instructions[true_at + 1];
        assert!(matches!(
            call.kind(),
            InstKind::Assign {
                value: Rvalue::Call { .. },
                ..
            }
        ));
        let result = call.def().expect("call defines the result");
        assert!(matches!(
            instructions[true_at + 2].marker(),
            Some(Marker::BranchFalse(_))
        ));

        // one temporary for the group, written once per branch and read by `r = %t0`
        let temporaries = ctx
            .locals()
            .iter()
            .filter(|(id, _)| ctx.locals().is_temporary(*id))
            .count();
        assert_eq!(temporaries, 1);
        let defs = instructions.iter().filter(|i| i.def() == Some(result)).count();
        assert_eq!(defs, 2);
        assert_eq!(instructions.last().map(Instruction::uses), Some(vec![result]));
    }
}
