//! The statement-graph arena.

use crate::{
    analysis::{
        cfg::{RegionTag, TryRegion},
        stmtgraph::{NodeKind, Slot, StatementNode, StmtId},
    },
    syntax::{SourcePosition, Stmt},
    Error, Result,
};

/// Region record of the statement graph. Entries point at statement nodes and are resolved
/// through placeholder chains after splicing.
#[derive(Debug, Clone)]
pub struct StmtRegion {
    /// Enclosing region part
    pub parent: Option<RegionTag>,
    /// Catch-binding node of the catch clause
    pub catch_entry: Option<StmtId>,
    /// Finally-entry placeholder (or its resolution after splicing)
    pub finally_entry: Option<StmtId>,
    /// `true` if the source has a non-empty finally clause
    pub has_finally: bool,
    /// Position of the try statement
    pub position: SourcePosition,
}

impl StmtRegion {
    pub(crate) fn to_try_region(&self) -> TryRegion {
        TryRegion {
            parent: self.parent,
            catch_entry: None,
            finally_entry: None,
            has_finally: self.has_finally,
            position: self.position,
        }
    }
}

/// Arena of statement nodes with a distinguished entry and exit.
///
/// Node 0 is the entry and node 1 the exit. Edges live in the nodes' slots; every slot target
/// lists the node once per edge in its predecessors.
#[derive(Debug, Clone)]
pub struct StatementGraph<'a> {
    pub(crate) nodes: Vec<StatementNode<'a>>,
    pub(crate) regions: Vec<StmtRegion>,
}

impl<'a> StatementGraph<'a> {
    pub(crate) fn new(position: SourcePosition) -> Self {
        let mut graph = StatementGraph {
            nodes: Vec::new(),
            regions: Vec::new(),
        };
        graph.add(NodeKind::Entry { next: None }, None, position, 0, None);
        graph.add(NodeKind::Exit, None, position, 0, None);
        graph
    }

    pub(crate) fn add(
        &mut self,
        kind: NodeKind<'a>,
        source: Option<&'a Stmt>,
        position: SourcePosition,
        scope: u32,
        region: Option<RegionTag>,
    ) -> StmtId {
        let id = StmtId(self.nodes.len());
        self.nodes.push(StatementNode {
            id,
            kind,
            source,
            position,
            scope,
            region,
            predecessors: Vec::new(),
            spliced: false,
        });
        id
    }

    /// The entry node.
    #[must_use]
    pub fn entry(&self) -> StmtId {
        StmtId(0)
    }

    /// The exit node.
    #[must_use]
    pub fn exit(&self) -> StmtId {
        StmtId(1)
    }

    /// Returns the node with the given id.
    #[must_use]
    pub fn node(&self, id: StmtId) -> &StatementNode<'a> {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: StmtId) -> &mut StatementNode<'a> {
        &mut self.nodes[id.0]
    }

    /// Number of nodes, spliced ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: the entry and exit nodes exist from the start.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over live (not spliced) nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &StatementNode<'a>> {
        self.nodes.iter().filter(|node| !node.spliced)
    }

    /// Region records.
    #[must_use]
    pub fn regions(&self) -> &[StmtRegion] {
        &self.regions
    }

    /// Sets `slot` of `from` to `to`, keeping predecessor lists in step.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if `from` has no such slot.
    pub(crate) fn link(&mut self, from: StmtId, slot: Slot, to: StmtId) -> Result<()> {
        let old = {
            let target = self.nodes[from.0]
                .slot_mut(slot)
                .ok_or_else(|| invariant_error!("Node {} has no {:?} slot", from, slot))?;
            target.replace(to)
        };
        if let Some(old) = old {
            remove_one(&mut self.nodes[old.0].predecessors, from);
        }
        self.nodes[to.0].predecessors.push(from);
        Ok(())
    }

    /// Follows spliced placeholders from `id` to the first live node.
    #[must_use]
    pub fn resolve(&self, id: StmtId) -> Option<StmtId> {
        let mut current = id;
        let mut steps = 0;
        while self.nodes[current.0].spliced {
            current = match self.nodes[current.0].kind {
                NodeKind::Placeholder { next, .. } => next?,
                NodeKind::Try { body, .. } => body?,
                _ => return None,
            };
            steps += 1;
            if steps > self.nodes.len() {
                return None;
            }
        }
        Some(current)
    }

    /// Checks that every branch and dispatch node received all of its targets.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedStatement`] naming the first incomplete node.
    pub fn verify(&self) -> Result<()> {
        for node in self.nodes() {
            let missing = match &node.kind {
                NodeKind::Conditional {
                    next_true,
                    next_false,
                    ..
                } => next_true.is_none() || next_false.is_none(),
                NodeKind::Switch { cases, default, .. } => {
                    default.is_none() || cases.iter().any(|case| case.target.is_none())
                }
                _ => false,
            };
            if missing {
                return Err(Error::MalformedStatement {
                    text: node.text(),
                    position: node.position,
                    message: "branch target missing".to_string(),
                });
            }
        }
        Ok(())
    }
}

pub(crate) fn remove_one(list: &mut Vec<StmtId>, value: StmtId) {
    if let Some(index) = list.iter().position(|item| *item == value) {
        list.remove(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::stmtgraph::{BranchTest, PlaceholderKind};

    #[test]
    fn test_link_moves_predecessor() {
        let mut graph = StatementGraph::new(SourcePosition::default());
        let a = graph.add(
            NodeKind::Placeholder {
                kind: PlaceholderKind::BlockExit,
                next: None,
            },
            None,
            SourcePosition::default(),
            0,
            None,
        );
        graph.link(graph.entry(), Slot::Next, a).expect("link entry");
        assert_eq!(graph.node(a).predecessors(), &[graph.entry()]);

        graph.link(graph.entry(), Slot::Next, graph.exit()).expect("relink entry");
        assert!(graph.node(a).predecessors().is_empty());
        assert_eq!(graph.node(graph.exit()).predecessors(), &[graph.entry()]);

        assert!(graph.link(graph.entry(), Slot::True, a).is_err());
    }

    #[test]
    fn test_verify_reports_missing_branch() {
        let mut graph = StatementGraph::new(SourcePosition::default());
        let cond = graph.add(
            NodeKind::Conditional {
                test: BranchTest::Always,
                role: None,
                next_true: None,
                next_false: None,
            },
            None,
            SourcePosition::new(4, 2),
            0,
            None,
        );
        graph.link(cond, Slot::True, graph.exit()).expect("true edge");
        match graph.verify() {
            Err(Error::MalformedStatement { position, .. }) => {
                assert_eq!(position, SourcePosition::new(4, 2));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
