//! Graph representation of the possible calls between the methods of a
//! program.

use crate::errors::AnalysisResult;
use fixedbitset::FixedBitSet;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef, NodeRef};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::Write;
use tw_model::{Expr, InvokeKind, MethodUid, Program, Stmt};

/// Call-site statement indices decorating a call edge.
#[derive(Debug, Clone, Default)]
pub struct CallSites {
    stmts: BTreeSet<usize>,
}

impl fmt::Display for CallSites {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, stmt) in self.stmts.iter().enumerate() {
            write!(f, "{stmt}")?;
            if i < self.stmts.len() - 1 {
                write!(f, ", ")?;
            }
        }
        Ok(())
    }
}

impl CallSites {
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.stmts.iter().copied()
    }
}

/// The call graph consumed by the interprocedural phases.
///
/// Nodes are methods and edges carry the statement indices of the call
/// sites in the caller. The graph is handed to the engine as
/// already-computed information; [`CallGraph::build`] offers a plain
/// signature-based construction over a closed-world [`Program`] for
/// callers that have nothing better.
#[derive(Debug, Default)]
pub struct CallGraph {
    inner: DiGraph<MethodUid, CallSites>,
    node_ids: BTreeMap<MethodUid, NodeIndex>,
}

impl CallGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: DiGraph::new(),
            node_ids: BTreeMap::new(),
        }
    }

    /// Builds a callgraph for all the methods contained in the given
    /// program. Virtual and interface calls fan out to every override of
    /// the statically resolved target; special and static calls bind to
    /// the single resolved method.
    pub fn build(program: &Program) -> AnalysisResult<Self> {
        let mut cg = Self::new();
        for method in program.iter_methods() {
            cg.add_method(method.uid());
        }

        for method in program.iter_methods() {
            let Some(body) = method.body() else {
                continue;
            };
            for (idx, stmt) in body.statements().iter().enumerate() {
                let call = match stmt {
                    Stmt::Invoke(call) => call,
                    Stmt::Assign {
                        rhs: Expr::Invoke(call),
                        ..
                    } => call,
                    _ => continue,
                };
                let callees = match call.kind {
                    InvokeKind::Virtual | InvokeKind::Interface => {
                        let mut callees = program.implementations_of(&call.target);
                        if callees.is_empty() {
                            callees.extend(program.find_method(&call.target));
                        }
                        callees
                    }
                    InvokeKind::Special | InvokeKind::Static => {
                        program.find_method(&call.target).into_iter().collect()
                    }
                };
                if callees.is_empty() {
                    log::trace!(
                        "cannot resolve call target {} from {}, leaving the site unbound",
                        call.target,
                        method,
                    );
                }
                for callee in callees {
                    cg.add_call(method.uid(), callee, idx);
                }
            }
        }

        Ok(cg)
    }

    pub fn add_method(&mut self, method: MethodUid) -> NodeIndex {
        if let Some(id) = self.node_ids.get(&method) {
            return *id;
        }
        let id = self.inner.add_node(method);
        self.node_ids.insert(method, id);
        id
    }

    pub fn add_call(&mut self, caller: MethodUid, callee: MethodUid, stmt: usize) {
        let src = self.add_method(caller);
        let dst = self.add_method(callee);
        if let Some(edge) = self.inner.find_edge(src, dst) {
            self.inner[edge].stmts.insert(stmt);
        } else {
            let mut sites = CallSites::default();
            sites.stmts.insert(stmt);
            self.inner.add_edge(src, dst, sites);
        }
    }

    #[must_use]
    pub fn contains(&self, method: MethodUid) -> bool {
        self.node_ids.contains_key(&method)
    }

    pub fn callees(&self, method: MethodUid) -> Vec<MethodUid> {
        self.neighbors(method, Direction::Outgoing)
    }

    pub fn callers(&self, method: MethodUid) -> Vec<MethodUid> {
        self.neighbors(method, Direction::Incoming)
    }

    fn neighbors(&self, method: MethodUid, dir: Direction) -> Vec<MethodUid> {
        let Some(&id) = self.node_ids.get(&method) else {
            return Vec::new();
        };
        self.inner
            .neighbors_directed(id, dir)
            .map(|n| self.inner[n])
            .collect()
    }

    /// The callees reachable through the call site at the given statement
    /// index of the caller.
    pub fn callees_at(&self, caller: MethodUid, stmt: usize) -> Vec<MethodUid> {
        let Some(&id) = self.node_ids.get(&caller) else {
            return Vec::new();
        };
        self.inner
            .edges_directed(id, Direction::Outgoing)
            .filter(|edge| edge.weight().stmts.contains(&stmt))
            .map(|edge| self.inner[edge.target()])
            .collect()
    }

    /// The strongly connected components of the graph.
    ///
    /// With `top_down` unset the components come callee-first (the order
    /// of the bottom-up phase); with it set, caller-first.
    pub fn sccs(&self, top_down: bool) -> Vec<Vec<MethodUid>> {
        let mut sccs: Vec<Vec<MethodUid>> = petgraph::algo::tarjan_scc(&self.inner)
            .into_iter()
            .map(|scc| scc.into_iter().map(|id| self.inner[id]).collect())
            .collect();
        if top_down {
            sccs.reverse();
        }
        sccs
    }

    /// The methods without any caller.
    pub fn roots(&self) -> Vec<MethodUid> {
        self.inner
            .node_indices()
            .filter(|id| {
                self.inner
                    .edges_directed(*id, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|id| self.inner[id])
            .collect()
    }

    /// Returns `true` if the method can call back into itself, directly
    /// or through a cycle.
    pub fn is_recursive(&self, method: MethodUid) -> bool {
        let Some(&id) = self.node_ids.get(&method) else {
            return false;
        };
        self.inner
            .neighbors_directed(id, Direction::Outgoing)
            .any(|callee| petgraph::algo::has_path_connecting(&self.inner, callee, id, None))
    }

    /// The set of methods reachable from the given one, itself included.
    pub fn reachable_from(&self, method: MethodUid) -> BTreeSet<MethodUid> {
        let mut reachable = BTreeSet::new();
        let Some(&id) = self.node_ids.get(&method) else {
            return reachable;
        };
        let mut dfs = Dfs::<NodeIndex, FixedBitSet>::new(&self.inner, id);
        while let Some(n) = dfs.next(&self.inner) {
            reachable.insert(self.inner[n]);
        }
        reachable
    }

    #[must_use]
    pub fn to_dot(&self, program: &Program) -> String {
        let mut res = String::new();
        res.push_str("digraph {\n");
        res.push_str("  rankdir=LR;\n");
        write!(
            res,
            "{}",
            Dot::with_attr_getters(
                &self.inner,
                &[Config::GraphContentOnly, Config::NodeNoLabel],
                &|_, _| String::new(),
                &|_, node| {
                    let label = program
                        .method(*node.weight())
                        .map_or_else(|_| format!("{}", node.weight()), |m| format!("{m}"));
                    format!("shape=box,label=\"{label}\"")
                }
            )
        )
        .unwrap();
        res.push('}');
        res
    }

    #[must_use]
    pub fn nb_methods(&self) -> usize {
        self.inner.node_count()
    }

    #[must_use]
    pub fn nb_call_edges(&self) -> usize {
        self.inner.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_model::{Body, MethodFlags, Type};

    fn sample_program() -> (Program, Vec<MethodUid>) {
        let mut program = Program::new();
        let cl = program.register_class("App", None, false).unwrap();
        let uids = ["a", "b", "c"]
            .iter()
            .map(|name| {
                program
                    .register_method(cl, *name, MethodFlags::STATIC, vec![], Type::Void)
                    .unwrap()
            })
            .collect();
        (program, uids)
    }

    #[test]
    fn sccs_come_callee_first_bottom_up() {
        let (_, uids) = sample_program();
        let mut cg = CallGraph::new();
        cg.add_call(uids[0], uids[1], 0);
        cg.add_call(uids[1], uids[2], 0);

        let sccs = cg.sccs(false);
        let order: Vec<MethodUid> = sccs.into_iter().flatten().collect();
        assert_eq!(order, vec![uids[2], uids[1], uids[0]]);

        let top_down: Vec<MethodUid> = cg.sccs(true).into_iter().flatten().collect();
        assert_eq!(top_down, vec![uids[0], uids[1], uids[2]]);
    }

    #[test]
    fn mutual_recursion_is_one_component() {
        let (_, uids) = sample_program();
        let mut cg = CallGraph::new();
        cg.add_call(uids[0], uids[1], 0);
        cg.add_call(uids[1], uids[0], 0);

        let sccs = cg.sccs(false);
        assert!(sccs.iter().any(|scc| scc.len() == 2));
        assert!(cg.is_recursive(uids[0]));
        assert!(cg.is_recursive(uids[1]));
        assert!(!cg.is_recursive(uids[2]));
    }

    #[test]
    fn roots_and_site_resolution() {
        let (_, uids) = sample_program();
        let mut cg = CallGraph::new();
        cg.add_call(uids[0], uids[1], 3);
        cg.add_call(uids[0], uids[2], 7);

        assert_eq!(cg.roots(), vec![uids[0]]);
        assert_eq!(cg.callees_at(uids[0], 3), vec![uids[1]]);
        assert_eq!(cg.callees_at(uids[0], 7), vec![uids[2]]);
        assert!(cg.callees_at(uids[0], 4).is_empty());
        assert_eq!(cg.reachable_from(uids[0]).len(), 3);
    }
}
