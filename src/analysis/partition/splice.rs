//! Removal of placeholder and try nodes.
//!
//! Each predecessor kind stores its outgoing edges differently, so there is one relinking routine
//! per kind. A spliced node keeps its own `next`, which lets region pointers into it be resolved
//! afterwards through [`StatementGraph::resolve`].

use log::trace;

use crate::{
    analysis::stmtgraph::{remove_one, NodeKind, StatementGraph, StmtId},
    Result,
};

impl StatementGraph<'_> {
    /// Splices every placeholder and try node out of the graph and resolves region entries.
    ///
    /// Returns the number of nodes spliced.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if a reachable placeholder has no successor.
    pub fn splice_structural(&mut self) -> Result<usize> {
        let structural: Vec<StmtId> = self
            .nodes()
            .filter(|node| node.is_structural())
            .map(|node| node.id)
            .collect();
        for id in &structural {
            self.splice(*id)?;
        }

        for index in 0..self.regions.len() {
            let catch_entry = self.regions[index]
                .catch_entry
                .and_then(|id| self.resolve(id));
            let finally_entry = self.regions[index]
                .finally_entry
                .and_then(|id| self.resolve(id));
            self.regions[index].catch_entry = catch_entry;
            self.regions[index].finally_entry = finally_entry;
        }
        Ok(structural.len())
    }

    fn splice(&mut self, id: StmtId) -> Result<()> {
        let next = match self.node(id).kind {
            NodeKind::Placeholder { next, .. } => next,
            NodeKind::Try { body, .. } => body,
            _ => return Err(invariant_error!("Node {} is not structural", id)),
        };
        let preds = std::mem::take(&mut self.node_mut(id).predecessors);
        if next.is_none() && !preds.is_empty() {
            return Err(invariant_error!(
                "Structural node {} has predecessors but no successor",
                id
            ));
        }

        let mut seen: Vec<StmtId> = Vec::with_capacity(preds.len());
        for pred in preds {
            if seen.contains(&pred) {
                continue;
            }
            seen.push(pred);
            let Some(next) = next else { continue };
            let moved = match self.node(pred).kind {
                NodeKind::Entry { .. } | NodeKind::Plain { .. } | NodeKind::Placeholder { .. } => {
                    self.splice_into_sequential(pred, id, next)
                }
                NodeKind::Conditional { .. } => self.splice_into_conditional(pred, id, next),
                NodeKind::Switch { .. } => self.splice_into_switch(pred, id, next),
                NodeKind::Try { .. } => self.splice_into_try(pred, id, next),
                NodeKind::Exit => {
                    return Err(invariant_error!("Exit node {} has successors", pred))
                }
            };
            for _ in 0..moved {
                self.node_mut(next).predecessors.push(pred);
            }
        }

        if let Some(next) = next {
            remove_one(&mut self.node_mut(next).predecessors, id);
        }
        self.node_mut(id).spliced = true;
        trace!("spliced {id} into {next:?}");
        Ok(())
    }

    fn splice_into_sequential(&mut self, pred: StmtId, old: StmtId, new: StmtId) -> usize {
        match &mut self.node_mut(pred).kind {
            NodeKind::Entry { next }
            | NodeKind::Plain { next, .. }
            | NodeKind::Placeholder { next, .. } => replace(next, old, new),
            _ => 0,
        }
    }

    fn splice_into_conditional(&mut self, pred: StmtId, old: StmtId, new: StmtId) -> usize {
        match &mut self.node_mut(pred).kind {
            NodeKind::Conditional {
                next_true,
                next_false,
                ..
            } => replace(next_true, old, new) + replace(next_false, old, new),
            _ => 0,
        }
    }

    fn splice_into_switch(&mut self, pred: StmtId, old: StmtId, new: StmtId) -> usize {
        match &mut self.node_mut(pred).kind {
            NodeKind::Switch { cases, default, .. } => {
                let mut moved = replace(default, old, new);
                for case in cases.iter_mut() {
                    moved += replace(&mut case.target, old, new);
                }
                moved
            }
            _ => 0,
        }
    }

    fn splice_into_try(&mut self, pred: StmtId, old: StmtId, new: StmtId) -> usize {
        match &mut self.node_mut(pred).kind {
            NodeKind::Try { body, .. } => replace(body, old, new),
            _ => 0,
        }
    }
}

fn replace(slot: &mut Option<StmtId>, old: StmtId, new: StmtId) -> usize {
    if *slot == Some(old) {
        *slot = Some(new);
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::stmtgraph::{NodeKind, Slot, StatementGraphBuilder},
        syntax::{BinaryOp, Expr, FunctionBody, Stmt, SwitchCase},
    };

    #[test]
    fn test_splice_removes_structural_nodes() {
        let body = FunctionBody::new(
            "f",
            vec!["a"],
            vec![
                Stmt::if_(
                    Expr::binary(BinaryOp::Gt, Expr::ident("a"), Expr::num(0.0)),
                    vec![Stmt::expr(Expr::assign(Expr::ident("x"), Expr::num(1.0)))],
                    None,
                ),
                Stmt::return_(Some(Expr::ident("x"))),
            ],
        );
        let mut graph = StatementGraphBuilder::new(64).build(&body).expect("graph");
        assert!(graph.splice_structural().expect("splice") > 0);
        assert!(graph.nodes().all(|node| !node.is_structural()));

        let cond = graph
            .nodes()
            .find(|node| matches!(node.kind, NodeKind::Conditional { .. }))
            .expect("conditional");
        let ret = cond.target(Slot::False).expect("false edge");
        // the return is reached from the conditional and from the then branch
        assert_eq!(graph.node(ret).predecessors().len(), 2);
    }

    #[test]
    fn test_empty_cases_collapse() {
        let body = FunctionBody::new(
            "f",
            vec!["k"],
            vec![Stmt::switch(
                Expr::ident("k"),
                vec![
                    SwitchCase::case(Expr::num(1.0), vec![]),
                    SwitchCase::case(
                        Expr::num(2.0),
                        vec![Stmt::expr(Expr::call(Expr::ident("two"), vec![]))],
                    ),
                ],
            )],
        );
        let mut graph = StatementGraphBuilder::new(64).build(&body).expect("graph");
        graph.splice_structural().expect("splice");
        let switch = graph
            .nodes()
            .find(|node| matches!(node.kind, NodeKind::Switch { .. }))
            .expect("switch");
        assert_eq!(switch.target(Slot::Case(0)), switch.target(Slot::Case(1)));
        assert_eq!(switch.target(Slot::Default), Some(graph.exit()));
    }
}
