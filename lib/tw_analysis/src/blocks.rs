//! Basic block graph representation.

use crate::errors::{AnalysisError, AnalysisResult};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;
use tw_model::{Body, Method, MethodUid, Stmt};

/// A basic block: a contiguous range of statement indices.
#[derive(Debug, Clone)]
pub struct Block {
    stmts: Range<usize>,
}

impl Block {
    #[inline]
    pub fn statements(&self) -> Range<usize> {
        self.stmts.clone()
    }

    #[must_use]
    pub fn start(&self) -> usize {
        self.stmts.start
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}..{}]", self.stmts.start, self.stmts.end)
    }
}

/// The block structure of one method body.
#[derive(Debug)]
pub struct BlockGraph {
    inner: DiGraph<Block, ()>,
    entry: NodeIndex,
    leaders: BTreeMap<usize, NodeIndex>,
}

impl BlockGraph {
    /// Splits the body into blocks and wires the branch edges.
    #[must_use]
    pub fn build(body: &Body) -> Self {
        let stmts = body.statements();
        let leaders = compute_block_leaders(stmts);

        let mut graph = DiGraph::new();
        let mut leader_ids = BTreeMap::new();
        let bounds: Vec<usize> = leaders.iter().copied().collect();
        for (i, &start) in bounds.iter().enumerate() {
            let end = bounds.get(i + 1).copied().unwrap_or(stmts.len());
            let id = graph.add_node(Block { stmts: start..end });
            leader_ids.insert(start, id);
        }

        for (&start, &id) in &leader_ids {
            let end = graph[id].stmts.end;
            if end == start {
                // empty body: single block, no edges
                continue;
            }
            match &stmts[end - 1] {
                Stmt::Goto(target) => {
                    if let Some(&dst) = leader_ids.get(target) {
                        graph.add_edge(id, dst, ());
                    } else {
                        log::warn!("branch target {target} out of range, dropping the edge");
                    }
                }
                Stmt::If(_, target) => {
                    if let Some(&dst) = leader_ids.get(target) {
                        graph.add_edge(id, dst, ());
                    } else {
                        log::warn!("branch target {target} out of range, dropping the edge");
                    }
                    if end < stmts.len() {
                        graph.add_edge(id, leader_ids[&end], ());
                    }
                }
                Stmt::Return(_) | Stmt::Throw(_) => {}
                _ => {
                    if end < stmts.len() {
                        graph.add_edge(id, leader_ids[&end], ());
                    }
                }
            }
        }

        let entry = leader_ids[&0];
        Self {
            inner: graph,
            entry,
            leaders: leader_ids,
        }
    }

    #[inline]
    #[must_use]
    pub fn entry(&self) -> NodeIndex {
        self.entry
    }

    #[must_use]
    pub fn block(&self, id: NodeIndex) -> &Block {
        &self.inner[id]
    }

    pub fn successors(&self, id: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.inner.neighbors(id)
    }

    /// The block containing the given statement index.
    #[must_use]
    pub fn block_of(&self, stmt: usize) -> Option<NodeIndex> {
        self.leaders
            .range(..=stmt)
            .next_back()
            .map(|(_, id)| *id)
            .filter(|id| self.inner[*id].stmts.contains(&stmt))
    }

    /// Returns `true` if control can flow from the block back to itself.
    #[must_use]
    pub fn in_cycle(&self, id: NodeIndex) -> bool {
        self.inner
            .neighbors(id)
            .any(|succ| petgraph::algo::has_path_connecting(&self.inner, succ, id, None))
    }

    #[must_use]
    pub fn nb_blocks(&self) -> usize {
        self.inner.node_count()
    }
}

/// Caches one block graph per analyzed method.
#[derive(Debug, Default)]
pub struct BlockManager {
    cache: BTreeMap<MethodUid, BlockGraph>,
}

impl BlockManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: BTreeMap::new(),
        }
    }

    /// The block graph of the given method, built on first request.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::NoBody`] for body-less (native, abstract)
    /// methods.
    pub fn graph_of(&mut self, method: &Method) -> AnalysisResult<&BlockGraph> {
        let body = method.body().ok_or(AnalysisError::NoBody)?;
        Ok(self
            .cache
            .entry(method.uid())
            .or_insert_with(|| BlockGraph::build(body)))
    }
}

// Block leaders are block first statement indices:
//   - index 0 is a leader
//   - a branch target is a leader
//   - the index following a branch, return or throw is a leader
fn compute_block_leaders(stmts: &[Stmt]) -> BTreeSet<usize> {
    let mut leaders = BTreeSet::new();
    leaders.insert(0);
    for (i, stmt) in stmts.iter().enumerate() {
        match stmt {
            Stmt::If(_, target) | Stmt::Goto(target) => {
                leaders.insert(*target);
                leaders.insert(i + 1);
            }
            Stmt::Return(_) | Stmt::Throw(_) => {
                leaders.insert(i + 1);
            }
            _ => (),
        }
    }
    leaders.retain(|&l| l <= stmts.len());
    leaders.remove(&stmts.len());
    leaders.insert(0);
    leaders
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_model::{Expr, LocalId, Type};

    fn int_local() -> Type {
        Type::try_from("I").unwrap()
    }

    #[test]
    fn straight_line_body_is_one_block() {
        let body = Body::new(
            vec![int_local()],
            vec![
                Stmt::Nop,
                Stmt::Assign {
                    lhs: Expr::Local(LocalId::new(0)),
                    rhs: Expr::Literal,
                },
                Stmt::Return(None),
            ],
        );
        let graph = BlockGraph::build(&body);
        assert_eq!(graph.nb_blocks(), 1);
        assert!(!graph.in_cycle(graph.entry()));
    }

    #[test]
    fn branches_split_blocks() {
        // 0: if v0 jmp 3 / 1: nop / 2: goto 4 / 3: nop / 4: return
        let body = Body::new(
            vec![int_local()],
            vec![
                Stmt::If(LocalId::new(0), 3),
                Stmt::Nop,
                Stmt::Goto(4),
                Stmt::Nop,
                Stmt::Return(None),
            ],
        );
        let graph = BlockGraph::build(&body);
        assert_eq!(graph.nb_blocks(), 4);
        let entry = graph.entry();
        assert_eq!(graph.successors(entry).count(), 2);
        assert!(!graph.in_cycle(entry));
    }

    #[test]
    fn back_edge_makes_a_cycle() {
        // 0: nop / 1: if v0 jmp 0 / 2: return
        let body = Body::new(
            vec![int_local()],
            vec![Stmt::Nop, Stmt::If(LocalId::new(0), 0), Stmt::Return(None)],
        );
        let graph = BlockGraph::build(&body);
        let looping = graph.block_of(0).unwrap();
        assert!(graph.in_cycle(looping));
        let exit = graph.block_of(2).unwrap();
        assert!(!graph.in_cycle(exit));
    }

    #[test]
    fn empty_body_is_a_single_empty_block() {
        let body = Body::new(vec![], vec![]);
        let graph = BlockGraph::build(&body);
        assert_eq!(graph.nb_blocks(), 1);
        assert_eq!(graph.block(graph.entry()).statements().count(), 0);
    }
}
