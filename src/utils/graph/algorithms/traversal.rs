//! Graph traversal algorithms.
//!
//! # Algorithms
//!
//! - [`dfs`] - Iterative depth-first search (pre-order), used for canonical block numbering
//! - [`postorder`] - Depth-first search with post-order visitation
//! - [`reverse_postorder`] - Reverse post-order, the iteration order of the dominator fixpoint
//! - [`reachable`] - Reachability bitmap from a start node
//!
//! [`dfs`] returns an iterator for lazy evaluation. [`postorder`] and [`reverse_postorder`]
//! return collected vectors since the order requires full traversal anyway.

use crate::utils::graph::{NodeId, Successors};

/// Iterator performing a depth-first pre-order traversal.
///
/// Successors are visited in the order the graph reports them.
pub struct DfsIterator<'g, G: Successors> {
    graph: &'g G,
    stack: Vec<NodeId>,
    visited: Vec<bool>,
}

impl<'g, G: Successors> DfsIterator<'g, G> {
    fn new(graph: &'g G, start: NodeId) -> Self {
        let node_count = graph.node_count();
        if start.index() >= node_count {
            return DfsIterator {
                graph,
                stack: Vec::new(),
                visited: Vec::new(),
            };
        }

        DfsIterator {
            graph,
            stack: vec![start],
            visited: vec![false; node_count],
        }
    }
}

impl<G: Successors> Iterator for DfsIterator<'_, G> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = self.stack.pop()?;
            if self.visited[node.index()] {
                continue;
            }
            self.visited[node.index()] = true;

            // Reverse push keeps the first successor on top of the stack
            let successors: Vec<NodeId> = self.graph.successors(node).collect();
            for &succ in successors.iter().rev() {
                if !self.visited[succ.index()] {
                    self.stack.push(succ);
                }
            }

            return Some(node);
        }
    }
}

/// Performs a depth-first traversal starting from `start`, yielding nodes in pre-order.
///
/// Returns an empty iterator if `start` is out of bounds.
///
/// # Examples
///
/// ```rust,ignore
/// let order: Vec<NodeId> = dfs(&cfg, cfg.entry()).collect();
/// assert_eq!(order[0], cfg.entry());
/// ```
pub fn dfs<G: Successors>(graph: &G, start: NodeId) -> DfsIterator<'_, G> {
    DfsIterator::new(graph, start)
}

/// Computes the post-order of all nodes reachable from `start`.
///
/// A node appears after all of its depth-first descendants.
#[allow(clippy::items_after_statements)]
pub fn postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let node_count = graph.node_count();

    if start.index() >= node_count {
        return Vec::new();
    }

    let mut visited = vec![false; node_count];
    let mut result = Vec::with_capacity(node_count);

    #[derive(Clone, Copy)]
    enum State {
        Enter,
        Exit,
    }

    let mut stack = vec![(start, State::Enter)];

    while let Some((node, state)) = stack.pop() {
        match state {
            State::Enter => {
                if visited[node.index()] {
                    continue;
                }
                visited[node.index()] = true;

                // Exit is processed after all children
                stack.push((node, State::Exit));

                let successors: Vec<NodeId> = graph.successors(node).collect();
                for &succ in successors.iter().rev() {
                    if !visited[succ.index()] {
                        stack.push((succ, State::Enter));
                    }
                }
            }
            State::Exit => {
                result.push(node);
            }
        }
    }

    result
}

/// Computes the reverse post-order of all nodes reachable from `start`.
///
/// Every node appears before its successors, back edges excepted. Forward data-flow problems
/// such as the dominator fixpoint converge fastest in this order.
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut result = postorder(graph, start);
    result.reverse();
    result
}

/// Returns `reachable[i] == true` for every node reachable from `start`.
pub fn reachable<G: Successors>(graph: &G, start: NodeId) -> Vec<bool> {
    let mut result = vec![false; graph.node_count()];
    for node in dfs(graph, start) {
        result[node.index()] = true;
    }
    result
}
