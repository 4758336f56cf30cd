//! Walks a function body and wires its statements into a [`StatementGraph`].

use log::debug;

use crate::{
    analysis::{
        cfg::{RegionId, RegionPart, RegionTag},
        stmtgraph::{
            BranchTest, CaseTarget, LoopRole, NodeKind, PlaceholderKind, PlainStmt, Slot,
            StatementGraph, StmtId, StmtRegion,
        },
    },
    syntax::{CatchClause, Expr, FunctionBody, SourcePosition, Stmt, StmtKind, SwitchCase},
    Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpKind {
    Loop { continue_to: StmtId },
    Switch,
    Labeled,
}

#[derive(Debug, Clone, Copy)]
struct JumpTarget<'a> {
    label: Option<&'a str>,
    kind: JumpKind,
    break_to: StmtId,
    region: Option<RegionTag>,
}

/// Finally body of a region, with the jump stack depth at its try statement.
#[derive(Debug, Clone, Copy)]
struct Finalizer<'a> {
    stmts: &'a [Stmt],
    jumps: usize,
}

/// Builds the statement graph of one function body.
///
/// Every walk step takes the cursor (the node whose `next` is still open, `None` when control
/// cannot fall through) and returns the new cursor.
///
/// A `break`, `continue` or `return` that leaves a try or catch body walks the finally bodies it
/// leaves once more, innermost first, before reaching its target.
pub struct StatementGraphBuilder<'a> {
    graph: StatementGraph<'a>,
    jumps: Vec<JumpTarget<'a>>,
    finalizers: Vec<Finalizer<'a>>,
    scope: u32,
    scope_counter: u32,
    region: Option<RegionTag>,
    pending_label: Option<&'a str>,
    depth: usize,
    max_depth: usize,
}

impl<'a> StatementGraphBuilder<'a> {
    /// Creates a builder that rejects syntax nested deeper than `max_depth`, counting statement
    /// and expression levels together.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        StatementGraphBuilder {
            graph: StatementGraph::new(SourcePosition::default()),
            jumps: Vec::new(),
            finalizers: Vec::new(),
            scope: 0,
            scope_counter: 0,
            region: None,
            pending_label: None,
            depth: 0,
            max_depth,
        }
    }

    /// Builds the graph of `body`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::MalformedStatement`] for jumps without a target, unknown labels, and
    ///   branches left without a target
    /// - [`crate::Error::RecursionLimit`] when nesting exceeds the configured depth
    pub fn build(mut self, body: &'a FunctionBody) -> Result<StatementGraph<'a>> {
        self.graph = StatementGraph::new(body.position);
        let entry = self.graph.entry();
        let end = self.walk_list(&body.body, Some(entry))?;
        let exit = self.graph.exit();
        self.link_next(end, exit)?;
        self.graph.verify()?;
        debug!(
            "Statement graph of `{}`: {} nodes, {} regions",
            body.name,
            self.graph.len(),
            self.graph.regions.len()
        );
        Ok(self.graph)
    }

    fn add(&mut self, kind: NodeKind<'a>, source: Option<&'a Stmt>, position: SourcePosition) -> StmtId {
        self.graph
            .add(kind, source, position, self.scope, self.region)
    }

    fn placeholder(&mut self, kind: PlaceholderKind, position: SourcePosition) -> StmtId {
        self.add(NodeKind::Placeholder { kind, next: None }, None, position)
    }

    fn link_next(&mut self, cursor: Option<StmtId>, to: StmtId) -> Result<()> {
        match cursor {
            Some(from) => self.graph.link(from, Slot::Next, to),
            None => Ok(()),
        }
    }

    fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.scope;
        self.scope_counter += 1;
        self.scope = self.scope_counter;
        let result = f(self);
        self.scope = saved;
        result
    }

    fn walk_list(&mut self, stmts: &'a [Stmt], mut cursor: Option<StmtId>) -> Result<Option<StmtId>> {
        for stmt in stmts {
            cursor = self.walk(stmt, cursor)?;
        }
        Ok(cursor)
    }

    fn walk(&mut self, stmt: &'a Stmt, cursor: Option<StmtId>) -> Result<Option<StmtId>> {
        if self.depth >= self.max_depth {
            return Err(Error::RecursionLimit(self.max_depth));
        }
        self.depth += 1;
        let result = self
            .check_expressions(stmt)
            .and_then(|()| self.walk_statement(stmt, cursor));
        self.depth -= 1;
        result
    }

    /// Rejects expressions that would nest deeper than the limit below the current statement.
    fn check_expressions(&self, stmt: &Stmt) -> Result<()> {
        let limit = self.max_depth.saturating_sub(self.depth);
        if stmt.expressions().into_iter().any(|expr| expr.depth() > limit) {
            return Err(Error::RecursionLimit(self.max_depth));
        }
        Ok(())
    }

    fn walk_statement(&mut self, stmt: &'a Stmt, cursor: Option<StmtId>) -> Result<Option<StmtId>> {
        let label = self.pending_label.take();
        match &stmt.kind {
            StmtKind::Expr(_) | StmtKind::VarDecl { .. } | StmtKind::Empty => {
                let node = self.plain(stmt);
                self.link_next(cursor, node)?;
                Ok(Some(node))
            }
            StmtKind::Return(value) => {
                let region = self.region;
                let result = self.walk_return(stmt, value.as_ref(), cursor);
                self.region = region;
                result
            }
            StmtKind::Throw(_) => {
                let node = self.plain(stmt);
                self.link_next(cursor, node)?;
                Ok(None)
            }
            StmtKind::Block(stmts) => self.walk_list(stmts, cursor),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => self.walk_if(stmt, test, consequent, alternate.as_deref(), cursor),
            StmtKind::While { test, body } => {
                self.walk_loop(stmt, BranchTest::Expr(test), None, None, body, label, cursor)
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let test = test.as_ref().map_or(BranchTest::Always, BranchTest::Expr);
                self.walk_loop(
                    stmt,
                    test,
                    init.as_deref(),
                    update.as_ref(),
                    body,
                    label,
                    cursor,
                )
            }
            StmtKind::DoWhile { body, test } => self.walk_do_while(stmt, body, test, label, cursor),
            StmtKind::Switch {
                discriminant,
                cases,
            } => self.walk_switch(stmt, discriminant, cases, label, cursor),
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => self.walk_try(stmt, block, handler.as_ref(), finalizer.as_deref(), cursor),
            StmtKind::Break(target) => {
                let target = self.break_target(stmt, target.as_deref())?;
                self.jump(cursor, target.break_to, target.region)
            }
            StmtKind::Continue(target) => {
                let (to, region) = self.continue_target(stmt, target.as_deref())?;
                self.jump(cursor, to, region)
            }
            StmtKind::Labeled { label, body } => self.walk_labeled(label, body, cursor),
        }
    }

    fn plain(&mut self, stmt: &'a Stmt) -> StmtId {
        self.add(
            NodeKind::Plain {
                stmt: PlainStmt::Source(stmt),
                next: None,
            },
            Some(stmt),
            stmt.position,
        )
    }

    fn walk_return(
        &mut self,
        stmt: &'a Stmt,
        value: Option<&'a Expr>,
        cursor: Option<StmtId>,
    ) -> Result<Option<StmtId>> {
        let exit = self.graph.exit();
        if self.pending_finalizers(None).is_empty() {
            let node = self.plain(stmt);
            self.link_next(cursor, node)?;
            self.graph.link(node, Slot::Next, exit)?;
            return Ok(None);
        }

        let mut cursor = cursor;
        let mut saved = None;
        if let Some(value) = value {
            let node = self.add(
                NodeKind::Plain {
                    stmt: PlainStmt::SaveReturn(value),
                    next: None,
                },
                Some(stmt),
                stmt.position,
            );
            self.link_next(cursor, node)?;
            cursor = Some(node);
            saved = Some(node);
        }
        if let Some(end) = self.leave_regions(cursor, None)? {
            let node = self.add(
                NodeKind::Plain {
                    stmt: PlainStmt::SavedReturn(saved),
                    next: None,
                },
                Some(stmt),
                stmt.position,
            );
            self.graph.link(end, Slot::Next, node)?;
            self.graph.link(node, Slot::Next, exit)?;
        }
        Ok(None)
    }

    fn jump(
        &mut self,
        cursor: Option<StmtId>,
        to: StmtId,
        region: Option<RegionTag>,
    ) -> Result<Option<StmtId>> {
        let saved = self.region;
        let end = self.leave_regions(cursor, region);
        self.region = saved;
        self.link_next(end?, to)?;
        Ok(None)
    }

    /// Regions whose finally body runs when control leaves the current region for `until`.
    fn pending_finalizers(&self, until: Option<RegionTag>) -> Vec<RegionId> {
        let mut pending = Vec::new();
        let mut current = self.region;
        while let Some(tag) = current {
            if Some(tag) == until {
                break;
            }
            let region = &self.graph.regions[tag.region.0];
            if tag.part != RegionPart::Finally && region.has_finally {
                pending.push(tag.region);
            }
            current = region.parent;
        }
        pending
    }

    /// Walks the pending finally bodies up to `until`. Leaves `self.region` at the region
    /// control ends up in; callers restore it.
    fn leave_regions(
        &mut self,
        mut cursor: Option<StmtId>,
        until: Option<RegionTag>,
    ) -> Result<Option<StmtId>> {
        for region in self.pending_finalizers(until) {
            if cursor.is_none() {
                break;
            }
            let Finalizer { stmts, jumps } = self.finalizers[region.0];
            self.region = self.graph.regions[region.0].parent;
            let outer = self.jumps.split_off(jumps);
            let end = self.with_scope(|b| b.walk_list(stmts, cursor));
            self.jumps.extend(outer);
            cursor = end?;
        }
        Ok(cursor)
    }

    fn walk_if(
        &mut self,
        stmt: &'a Stmt,
        test: &'a Expr,
        consequent: &'a Stmt,
        alternate: Option<&'a Stmt>,
        cursor: Option<StmtId>,
    ) -> Result<Option<StmtId>> {
        let cond = self.add(
            NodeKind::Conditional {
                test: BranchTest::Expr(test),
                role: None,
                next_true: None,
                next_false: None,
            },
            Some(stmt),
            stmt.position,
        );
        self.link_next(cursor, cond)?;
        let exit = self.placeholder(PlaceholderKind::BlockExit, stmt.position);

        let then_entry = self.placeholder(PlaceholderKind::BranchEntry, consequent.position);
        self.graph.link(cond, Slot::True, then_entry)?;
        let end = self.with_scope(|b| b.walk(consequent, Some(then_entry)))?;
        self.link_next(end, exit)?;

        match alternate {
            Some(alternate) => {
                let else_entry = self.placeholder(PlaceholderKind::BranchEntry, alternate.position);
                self.graph.link(cond, Slot::False, else_entry)?;
                let end = self.with_scope(|b| b.walk(alternate, Some(else_entry)))?;
                self.link_next(end, exit)?;
            }
            None => self.graph.link(cond, Slot::False, exit)?,
        }
        Ok(Some(exit))
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_loop(
        &mut self,
        stmt: &'a Stmt,
        test: BranchTest<'a>,
        init: Option<&'a Stmt>,
        update: Option<&'a Expr>,
        body: &'a Stmt,
        label: Option<&'a str>,
        cursor: Option<StmtId>,
    ) -> Result<Option<StmtId>> {
        let header = self.add(
            NodeKind::Conditional {
                test,
                role: Some(LoopRole::Header { init, update }),
                next_true: None,
                next_false: None,
            },
            Some(stmt),
            stmt.position,
        );
        self.link_next(cursor, header)?;

        let exit = self.placeholder(PlaceholderKind::LoopExit, stmt.position);
        let body_entry = self.placeholder(PlaceholderKind::LoopBody, body.position);
        self.graph.link(header, Slot::True, body_entry)?;
        self.graph.link(header, Slot::False, exit)?;

        self.jumps.push(JumpTarget {
            label,
            kind: JumpKind::Loop {
                continue_to: header,
            },
            break_to: exit,
            region: self.region,
        });
        let end = self.with_scope(|b| b.walk(body, Some(body_entry)));
        self.jumps.pop();
        self.link_next(end?, header)?;
        Ok(Some(exit))
    }

    fn walk_do_while(
        &mut self,
        stmt: &'a Stmt,
        body: &'a Stmt,
        test: &'a Expr,
        label: Option<&'a str>,
        cursor: Option<StmtId>,
    ) -> Result<Option<StmtId>> {
        let body_entry = self.placeholder(PlaceholderKind::LoopBody, body.position);
        self.link_next(cursor, body_entry)?;

        let cond = self.add(
            NodeKind::Conditional {
                test: BranchTest::Expr(test),
                role: Some(LoopRole::DoWhileTest),
                next_true: None,
                next_false: None,
            },
            Some(stmt),
            stmt.position,
        );
        let exit = self.placeholder(PlaceholderKind::LoopExit, stmt.position);

        self.jumps.push(JumpTarget {
            label,
            kind: JumpKind::Loop { continue_to: cond },
            break_to: exit,
            region: self.region,
        });
        let end = self.with_scope(|b| b.walk(body, Some(body_entry)));
        self.jumps.pop();
        self.link_next(end?, cond)?;

        self.graph.link(cond, Slot::True, body_entry)?;
        self.graph.link(cond, Slot::False, exit)?;
        Ok(Some(exit))
    }

    fn walk_switch(
        &mut self,
        stmt: &'a Stmt,
        discriminant: &'a Expr,
        cases: &'a [SwitchCase],
        label: Option<&'a str>,
        cursor: Option<StmtId>,
    ) -> Result<Option<StmtId>> {
        let switch = self.add(
            NodeKind::Switch {
                discriminant,
                cases: Vec::new(),
                default: None,
            },
            Some(stmt),
            stmt.position,
        );
        self.link_next(cursor, switch)?;
        let exit = self.placeholder(PlaceholderKind::SwitchExit, stmt.position);

        self.jumps.push(JumpTarget {
            label,
            kind: JumpKind::Switch,
            break_to: exit,
            region: self.region,
        });
        let result = self.walk_cases(switch, cases, exit);
        self.jumps.pop();
        result?;
        Ok(Some(exit))
    }

    fn walk_cases(&mut self, switch: StmtId, cases: &'a [SwitchCase], exit: StmtId) -> Result<()> {
        let mut fallthrough: Option<StmtId> = None;
        let mut has_default = false;

        for case in cases {
            let entry = self.placeholder(PlaceholderKind::CaseEntry, case.position);
            match &case.test {
                Some(test) => {
                    let index = match &mut self.graph.node_mut(switch).kind {
                        NodeKind::Switch { cases: targets, .. } => {
                            targets.push(CaseTarget {
                                test,
                                target: None,
                                position: case.position,
                            });
                            targets.len() - 1
                        }
                        _ => return Err(invariant_error!("Node {} is not a switch", switch)),
                    };
                    self.graph.link(switch, Slot::Case(index), entry)?;
                }
                None => {
                    has_default = true;
                    self.graph.link(switch, Slot::Default, entry)?;
                }
            }
            self.link_next(fallthrough, entry)?;

            let end = self.with_scope(|b| b.walk_list(&case.body, Some(entry)))?;
            let case_exit = self.placeholder(PlaceholderKind::CaseExit, case.position);
            self.link_next(end, case_exit)?;
            fallthrough = Some(case_exit);
        }

        self.link_next(fallthrough, exit)?;
        if !has_default {
            self.graph.link(switch, Slot::Default, exit)?;
        }
        Ok(())
    }

    fn walk_try(
        &mut self,
        stmt: &'a Stmt,
        block: &'a [Stmt],
        handler: Option<&'a CatchClause>,
        finalizer: Option<&'a [Stmt]>,
        cursor: Option<StmtId>,
    ) -> Result<Option<StmtId>> {
        let region = RegionId(self.graph.regions.len());
        self.graph.regions.push(StmtRegion {
            parent: self.region,
            catch_entry: None,
            finally_entry: None,
            has_finally: finalizer.is_some_and(|stmts| !stmts.is_empty()),
            position: stmt.position,
        });
        self.finalizers.push(Finalizer {
            stmts: finalizer.unwrap_or_default(),
            jumps: self.jumps.len(),
        });

        let try_node = self.add(NodeKind::Try { region, body: None }, Some(stmt), stmt.position);
        self.link_next(cursor, try_node)?;
        let saved = self.region;

        let result = self.walk_try_parts(stmt, region, try_node, block, handler, finalizer);
        self.region = saved;
        result
    }

    fn walk_try_parts(
        &mut self,
        stmt: &'a Stmt,
        region: RegionId,
        try_node: StmtId,
        block: &'a [Stmt],
        handler: Option<&'a CatchClause>,
        finalizer: Option<&'a [Stmt]>,
    ) -> Result<Option<StmtId>> {
        self.region = Some(RegionTag::new(region, RegionPart::Try));
        let body_entry = self.placeholder(PlaceholderKind::TryEntry, stmt.position);
        self.graph.link(try_node, Slot::Body, body_entry)?;
        let end = self.with_scope(|b| b.walk_list(block, Some(body_entry)))?;
        let try_exit = self.placeholder(PlaceholderKind::TryExit, stmt.position);
        self.link_next(end, try_exit)?;

        self.region = Some(RegionTag::new(region, RegionPart::Finally));
        let finally_entry = self.placeholder(PlaceholderKind::FinallyEntry, stmt.position);
        self.graph.link(try_exit, Slot::Next, finally_entry)?;

        if let Some(handler) = handler {
            self.region = Some(RegionTag::new(region, RegionPart::Catch));
            let catch_entry = self.with_scope(|b| {
                let bind = b.add(
                    NodeKind::Plain {
                        stmt: PlainStmt::CatchBind(handler.param.as_deref()),
                        next: None,
                    },
                    None,
                    handler.position,
                );
                let end = b.walk_list(&handler.body, Some(bind))?;
                let catch_exit = b.placeholder(PlaceholderKind::CatchExit, handler.position);
                b.link_next(end, catch_exit)?;
                b.graph.link(catch_exit, Slot::Next, finally_entry)?;
                Ok(bind)
            })?;
            self.graph.regions[region.0].catch_entry = Some(catch_entry);
        }

        self.region = Some(RegionTag::new(region, RegionPart::Finally));
        let end = self.with_scope(|b| b.walk_list(finalizer.unwrap_or_default(), Some(finally_entry)))?;
        self.region = self.graph.regions[region.0].parent;
        let finally_exit = self.placeholder(PlaceholderKind::FinallyExit, stmt.position);
        self.link_next(end, finally_exit)?;
        self.graph.regions[region.0].finally_entry = Some(finally_entry);
        Ok(Some(finally_exit))
    }

    fn walk_labeled(&mut self, label: &'a str, body: &'a Stmt, cursor: Option<StmtId>) -> Result<Option<StmtId>> {
        match body.kind {
            StmtKind::While { .. }
            | StmtKind::DoWhile { .. }
            | StmtKind::For { .. }
            | StmtKind::Switch { .. } => {
                self.pending_label = Some(label);
                self.walk(body, cursor)
            }
            _ => {
                let exit = self.placeholder(PlaceholderKind::BlockExit, body.position);
                self.jumps.push(JumpTarget {
                    label: Some(label),
                    kind: JumpKind::Labeled,
                    break_to: exit,
                    region: self.region,
                });
                let end = self.walk(body, cursor);
                self.jumps.pop();
                self.link_next(end?, exit)?;
                Ok(Some(exit))
            }
        }
    }

    fn break_target(&self, stmt: &Stmt, label: Option<&str>) -> Result<JumpTarget<'a>> {
        let found = self.jumps.iter().rev().find(|target| match label {
            Some(label) => target.label == Some(label),
            None => target.kind != JumpKind::Labeled,
        });
        found.copied().ok_or_else(|| Error::MalformedStatement {
            text: stmt.to_string(),
            position: stmt.position,
            message: match label {
                Some(label) => format!("unknown label `{label}`"),
                None => "break outside of a loop or switch".to_string(),
            },
        })
    }

    fn continue_target(
        &self,
        stmt: &Stmt,
        label: Option<&str>,
    ) -> Result<(StmtId, Option<RegionTag>)> {
        let found = self.jumps.iter().rev().find(|target| {
            matches!(target.kind, JumpKind::Loop { .. })
                && (label.is_none() || target.label == label)
        });
        match found {
            Some(JumpTarget {
                kind: JumpKind::Loop { continue_to },
                region,
                ..
            }) => Ok((*continue_to, *region)),
            _ => Err(Error::MalformedStatement {
                text: stmt.to_string(),
                position: stmt.position,
                message: match label {
                    Some(label) => format!("no enclosing loop labeled `{label}`"),
                    None => "continue outside of a loop".to_string(),
                },
            }),
        }
    }
}
