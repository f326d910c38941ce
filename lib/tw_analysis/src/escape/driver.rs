//! The escape analysis driver: intraprocedural unification, bottom-up and
//! top-down interprocedural phases, and allocation-site consolidation.

use crate::blocks::BlockManager;
use crate::callgraph::CallGraph;
use crate::errors::AnalysisResult;
use crate::escape::alias::{AliasArena, AliasIdx, EntityId, FieldKey};
use crate::escape::context::{ContextArena, CtxIdx};
use crate::stats::EscapeStats;
use crate::threadgraph::ThreadGraph;
use lazy_static::lazy_static;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;
use tw_model::{
    Body, CallExpr, Expr, Field, FieldUid, LocalId, Method, MethodRef, MethodUid, Program,
    SiteUid, Stmt, Type,
};
use tw_utils::canon::{Triple, TripleManager};
use tw_utils::workbag::{HistoryAwareWorkBag, WorkBag};

const JAVA_LANG_THREAD: &str = "java/lang/Thread";
const THREAD_START: &str = "start";

lazy_static! {
    static ref WAIT_METHODS: BTreeSet<&'static str> = BTreeSet::from(["wait"]);
    static ref NOTIFY_METHODS: BTreeSet<&'static str> = BTreeSet::from(["notify", "notifyAll"]);
}

/// Driver tuning knobs.
#[derive(Debug, Clone)]
pub struct EscapeConfig {
    /// External budget on the per-component fixpoint rounds; `None`
    /// lets the rounds run until the version counters stabilize.
    pub max_rounds: Option<usize>,
    /// Force the access flags of parameter/return/thrown classes of
    /// methods whose traversal observes no access at all (degenerate
    /// bodies), so that "never accessed" cannot be concluded for them.
    pub force_trivial_access: bool,
}

impl Default for EscapeConfig {
    fn default() -> Self {
        Self {
            max_rounds: None,
            force_trivial_access: true,
        }
    }
}

/// Execution multiplicity bucket of a thread allocation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    SingleExecution,
    MultiExecution,
}

type CallKey = Rc<Triple<MethodUid, usize, MethodUid>>;

/// The equivalence-class-based escape analysis.
///
/// One value covers one analysis run: [`EscapeAnalysis::execute`] runs
/// the two-phase fixpoint over the given program and call graph,
/// [`EscapeAnalysis::consolidate`] buckets the thread allocation sites,
/// and the query methods answer from the resulting equivalence classes.
#[derive(Debug, Default)]
pub struct EscapeAnalysis {
    config: EscapeConfig,
    arena: AliasArena,
    ctxs: ContextArena,
    method_ctx: BTreeMap<MethodUid, CtxIdx>,
    static_nodes: BTreeMap<FieldUid, AliasIdx>,
    locals: BTreeMap<(MethodUid, LocalId), AliasIdx>,
    site_nodes: BTreeMap<SiteUid, AliasIdx>,
    call_site_ctx: BTreeMap<(MethodUid, usize), CtxIdx>,
    call_ctx: HashMap<CallKey, CtxIdx>,
    call_sites_of: BTreeMap<MethodUid, BTreeSet<(usize, MethodUid)>>,
    triples: TripleManager<MethodUid, usize, MethodUid>,
    alloc_sites: BTreeMap<SiteUid, (MethodUid, usize)>,
    thread_sites: BTreeSet<SiteUid>,
    multiplicity: BTreeMap<SiteUid, Multiplicity>,
    blocks: BlockManager,
    accessed_in_pass: bool,
}

impl EscapeAnalysis {
    #[must_use]
    pub fn new(config: EscapeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Runs initialization, the bottom-up unification phase over the call
    /// graph condensation and the top-down propagation phase.
    ///
    /// Re-running after growing the call graph continues the fixpoint:
    /// everything already unified stays unified.
    pub fn execute(&mut self, program: &Program, callgraph: &CallGraph) -> AnalysisResult<()> {
        self.init(program);

        log::debug!("bottom-up phase");
        let sccs = callgraph.sccs(false);
        let mut scheduled = HistoryAwareWorkBag::fifo();
        scheduled.add_all_work(0..sccs.len());
        while scheduled.has_work() {
            let scc = &sccs[scheduled.get_work()?];
            let members: BTreeSet<MethodUid> = scc.iter().copied().collect();
            let recursive = members.len() > 1 || callgraph.is_recursive(scc[0]);
            let mut rounds = 0;
            loop {
                let before = (self.arena.version(), self.ctxs.version());
                for &method in scc {
                    self.analyze_method(program, callgraph, method, &members)?;
                }
                rounds += 1;
                let stable = (self.arena.version(), self.ctxs.version()) == before;
                if stable || !recursive {
                    break;
                }
                if let Some(max) = self.config.max_rounds {
                    if rounds >= max {
                        log::warn!(
                            "fixpoint round budget ({max}) exhausted on a {}-method component",
                            scc.len(),
                        );
                        break;
                    }
                }
            }
        }

        log::debug!("top-down phase");
        let mut bag = HistoryAwareWorkBag::fifo();
        bag.add_all_work(callgraph.roots());
        while bag.has_work() {
            let caller = bag.get_work()?;
            let Some(sites) = self.call_sites_of.get(&caller).cloned() else {
                continue;
            };
            for (stmt, callee) in sites {
                let key = self.triples.triple(caller, stmt, callee);
                let (Some(&site_ctx), Some(&callee_ctx)) =
                    (self.call_ctx.get(&key), self.method_ctx.get(&callee))
                else {
                    continue;
                };
                self.ctxs
                    .propagate_context(callee_ctx, site_ctx, &mut self.arena);
                bag.add_work(callee);
            }
        }

        Ok(())
    }

    fn init(&mut self, program: &Program) {
        for field in program.iter_fields() {
            self.process_field(field);
        }
        for method in program.iter_methods() {
            self.process_method(method);
        }
        log::debug!(
            "initialized {} static field classes and {} method contexts",
            self.static_nodes.len(),
            self.method_ctx.len(),
        );
    }

    /// Upfront callback for one field: a static field receives its
    /// global alias class. Instance fields need no upfront class (their
    /// classes grow lazily in the field maps). Idempotent.
    pub fn process_field(&mut self, field: &Field) {
        if !field.is_static() || self.static_nodes.contains_key(&field.uid()) {
            return;
        }
        let node = self.arena.new_node(field.type_().is_reference());
        self.arena.set_global(node);
        self.static_nodes.insert(field.uid(), node);
    }

    /// Upfront callback for one method: shapes its context from the
    /// signature. Idempotent.
    pub fn process_method(&mut self, method: &Method) {
        if self.method_ctx.contains_key(&method.uid()) {
            return;
        }
        let ctx = self.shape_context(method);
        self.method_ctx.insert(method.uid(), ctx);
    }

    /// Callback for one allocation site: records the allocation's class,
    /// its position for consolidation, and whether it allocates a thread.
    /// Idempotent on the class, refreshing the position.
    pub fn process_allocation_site(
        &mut self,
        program: &Program,
        site: SiteUid,
        typ: &Type,
        method: MethodUid,
        stmt: usize,
    ) -> AliasIdx {
        let node = match self.site_nodes.get(&site) {
            Some(&node) => node,
            None => {
                let node = self.arena.new_node(true);
                self.site_nodes.insert(site, node);
                node
            }
        };
        self.alloc_sites.insert(site, (method, stmt));
        if typ
            .class_name()
            .and_then(|name| program.get_class_by_name(name))
            .is_some_and(|class| class.is_thread())
        {
            self.thread_sites.insert(site);
        }
        node
    }

    fn shape_context(&mut self, method: &Method) -> CtxIdx {
        let receiver = (!method.is_static()).then(|| self.arena.new_node(true));
        let params = method
            .parameters_types()
            .iter()
            .map(|typ| typ.is_reference().then(|| self.arena.new_node(true)))
            .collect();
        let ret = (!method.return_type().is_void())
            .then(|| self.arena.new_node(method.return_type().is_reference()));
        let thrown = self.arena.new_node(true);
        self.ctxs.new_context(receiver, params, ret, thrown)
    }

    fn analyze_method(
        &mut self,
        program: &Program,
        callgraph: &CallGraph,
        method_uid: MethodUid,
        scc: &BTreeSet<MethodUid>,
    ) -> AnalysisResult<()> {
        let Some(&ctx) = self.method_ctx.get(&method_uid) else {
            log::warn!("no context recorded for {method_uid}, skipping the method");
            return Ok(());
        };
        let Ok(method) = program.method(method_uid) else {
            log::warn!("{method_uid} is not part of the analyzed program, skipping the method");
            return Ok(());
        };
        log::debug!("  processing {method}");

        self.accessed_in_pass = false;
        if let Some(body) = method.body() {
            let order: Vec<usize> = {
                let graph = self.blocks.graph_of(method)?;
                let mut bag = HistoryAwareWorkBag::lifo();
                bag.add_work(graph.entry());
                let mut order = Vec::new();
                while bag.has_work() {
                    let block = bag.get_work()?;
                    order.extend(graph.block(block).statements());
                    let successors: Vec<_> = graph.successors(block).collect();
                    bag.add_all_work(successors);
                }
                order
            };
            for idx in order {
                let stmt = &body.statements()[idx];
                log::trace!("    [{idx}] {stmt}");
                self.process_stmt(program, callgraph, method_uid, body, ctx, idx, stmt, scc)?;
            }
        }

        // a traversal that observed no access at all (degenerate body)
        // still models an invocation: the context slots count as accessed
        if self.config.force_trivial_access && !self.accessed_in_pass {
            log::trace!("    forcing access flags of {method}");
            let slots = self.ctxs.slots(ctx);
            for node in slots
                .params
                .iter()
                .copied()
                .flatten()
                .chain(slots.ret)
                .chain([slots.thrown])
            {
                self.arena.mark_accessed_tree(node);
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_stmt(
        &mut self,
        program: &Program,
        callgraph: &CallGraph,
        method_uid: MethodUid,
        body: &Body,
        ctx: CtxIdx,
        idx: usize,
        stmt: &Stmt,
        scc: &BTreeSet<MethodUid>,
    ) -> AnalysisResult<()> {
        match stmt {
            Stmt::Assign { lhs, rhs } => {
                let l = self.eval_expr(program, callgraph, method_uid, body, ctx, idx, lhs, scc)?;
                let r = self.eval_expr(program, callgraph, method_uid, body, ctx, idx, rhs, scc)?;
                if let (Some(l), Some(r)) = (l, r) {
                    self.arena.unify(l, r, false);
                }
            }
            Stmt::Invoke(call) => {
                self.process_call(program, callgraph, method_uid, body, idx, call, scc)?;
            }
            Stmt::Return(returned) => {
                let slots = self.ctxs.slots(ctx);
                if let Some(ret) = slots.ret {
                    self.touch(ret);
                    if let Some(local) = *returned {
                        if let Some(node) = self.local_node(body, method_uid, local) {
                            self.arena.unify(node, ret, false);
                        }
                    }
                }
            }
            Stmt::Throw(local) => {
                let slots = self.ctxs.slots(ctx);
                self.touch(slots.thrown);
                if let Some(node) = self.local_node(body, method_uid, *local) {
                    self.arena.unify(node, slots.thrown, false);
                }
            }
            Stmt::MonitorEnter(local) | Stmt::MonitorExit(local) => {
                if let Some(node) = self.local_node(body, method_uid, *local) {
                    self.touch(node);
                }
            }
            Stmt::If(_, _) | Stmt::Goto(_) | Stmt::Nop => (),
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_expr(
        &mut self,
        program: &Program,
        callgraph: &CallGraph,
        method_uid: MethodUid,
        body: &Body,
        ctx: CtxIdx,
        idx: usize,
        expr: &Expr,
        scc: &BTreeSet<MethodUid>,
    ) -> AnalysisResult<Option<AliasIdx>> {
        match expr {
            Expr::Local(local) => Ok(self.local_node(body, method_uid, *local)),
            Expr::ThisRef => {
                let receiver = self.ctxs.slots(ctx).receiver;
                if let Some(node) = receiver {
                    self.touch(node);
                }
                Ok(receiver)
            }
            Expr::ParamRef(index) => {
                let slot = self
                    .ctxs
                    .slots(ctx)
                    .params
                    .get(*index)
                    .copied()
                    .flatten();
                if let Some(node) = slot {
                    self.touch(node);
                }
                Ok(slot)
            }
            Expr::Null | Expr::Literal => Ok(None),
            Expr::StaticFieldRef(field) => {
                let Some(&node) = self.static_nodes.get(field) else {
                    log::warn!("static field {field} has no recorded class, skipping the access");
                    return Ok(None);
                };
                self.touch(node);
                Ok(Some(node))
            }
            Expr::InstanceFieldRef(base, field) => {
                let Some(base_node) = self.local_node(body, method_uid, *base) else {
                    log::warn!("field access through non-reference local {base}, skipping");
                    return Ok(None);
                };
                self.touch(base_node);
                let reference = program.field(*field)?.type_().is_reference();
                let child = self
                    .arena
                    .field_child(base_node, FieldKey::Field(*field), reference);
                if let Some(child) = child {
                    self.touch(child);
                }
                Ok(child)
            }
            Expr::ArrayRef(base) => {
                let Some(base_node) = self.local_node(body, method_uid, *base) else {
                    log::warn!("array access through non-reference local {base}, skipping");
                    return Ok(None);
                };
                self.touch(base_node);
                let reference = body
                    .local_type(*base)?
                    .elem_type()
                    .is_some_and(Type::is_reference);
                let child = self
                    .arena
                    .field_child(base_node, FieldKey::ArrayElem, reference);
                if let Some(child) = child {
                    self.touch(child);
                }
                Ok(child)
            }
            Expr::New(site, typ) | Expr::NewArray(site, typ) => Ok(Some(
                self.process_allocation_site(program, *site, typ, method_uid, idx),
            )),
            Expr::Invoke(call) => {
                self.process_call(program, callgraph, method_uid, body, idx, call, scc)
            }
        }
    }

    /// Builds (or retrieves) the call-site context of the call statement,
    /// unifies it with each resolved callee's context — a clone when the
    /// callee is outside the current component, the live context inside
    /// it — and returns the site's return-value class.
    #[allow(clippy::too_many_arguments)]
    fn process_call(
        &mut self,
        program: &Program,
        callgraph: &CallGraph,
        caller: MethodUid,
        body: &Body,
        idx: usize,
        call: &CallExpr,
        scc: &BTreeSet<MethodUid>,
    ) -> AnalysisResult<Option<AliasIdx>> {
        let receiver = call
            .receiver
            .and_then(|local| self.local_node(body, caller, local));

        if let Some(node) = receiver {
            if WAIT_METHODS.contains(call.target.name()) {
                self.arena.set_waits(node);
                self.touch(node);
            } else if NOTIFY_METHODS.contains(call.target.name()) {
                self.arena.set_notifies(node);
                self.touch(node);
            }
        }

        let site_ctx = match self.call_site_ctx.get(&(caller, idx)) {
            Some(&ctx) => ctx,
            None => {
                let params: Vec<Option<AliasIdx>> = call
                    .args
                    .iter()
                    .map(|&local| self.local_node(body, caller, local))
                    .collect();
                let ret_type = call.target.return_type();
                let ret = (!ret_type.is_void())
                    .then(|| self.arena.new_node(ret_type.is_reference()));
                let thrown = self.arena.new_node(true);
                let ctx = self.ctxs.new_context(receiver, params, ret, thrown);
                self.call_site_ctx.insert((caller, idx), ctx);
                ctx
            }
        };

        let callees = callgraph.callees_at(caller, idx);
        if callees.is_empty() {
            log::trace!("no callee resolved for {} at [{idx}]", call.target);
        }
        for callee in callees {
            let key = self.triples.triple(caller, idx, callee);
            if self.call_ctx.contains_key(&key) {
                continue;
            }
            let Some(&callee_ctx) = self.method_ctx.get(&callee) else {
                log::warn!(
                    "callee {callee} of {} has no recorded context, skipping the call edge",
                    call.target,
                );
                continue;
            };
            let unify_all = is_thread_start(program, &call.target);
            let target = if scc.contains(&callee) {
                // recursion: unify against the live context so that all
                // same-component call sites converge on one structure
                callee_ctx
            } else {
                self.ctxs.clone_context(callee_ctx, &mut self.arena)
            };
            self.ctxs
                .unify_contexts(site_ctx, target, unify_all, &mut self.arena)?;
            key.optimize();
            self.call_ctx.insert(key, site_ctx);
            self.call_sites_of
                .entry(caller)
                .or_default()
                .insert((idx, callee));
        }

        Ok(self.ctxs.slots(site_ctx).ret)
    }

    fn local_node(&mut self, body: &Body, method_uid: MethodUid, local: LocalId) -> Option<AliasIdx> {
        let typ = body.local_type(local).ok()?;
        if !typ.is_reference() {
            return None;
        }
        if let Some(&node) = self.locals.get(&(method_uid, local)) {
            return Some(node);
        }
        let node = self.arena.new_node(true);
        self.locals.insert((method_uid, local), node);
        Some(node)
    }

    fn touch(&mut self, node: AliasIdx) {
        self.arena.mark_accessed(node);
        self.accessed_in_pass = true;
    }

    /// Buckets thread allocation sites by execution multiplicity: a site
    /// is multiply-executed when its enclosing method can run more than
    /// once (the method reaches itself through the call graph, or the
    /// allocation sits in a body loop), or when it is reachable from the
    /// run-method of an already multiply-executed site.
    ///
    /// Recomputed from scratch on every call, so the bucketing follows
    /// call graph growth.
    pub fn consolidate(
        &mut self,
        program: &Program,
        callgraph: &CallGraph,
        threads: &ThreadGraph,
    ) -> AnalysisResult<()> {
        log::debug!("consolidating {} thread allocation sites", self.thread_sites.len());
        self.multiplicity.clear();
        for &site in &self.thread_sites {
            self.multiplicity.insert(site, Multiplicity::SingleExecution);
        }

        let sites: Vec<(SiteUid, MethodUid, usize)> = self
            .thread_sites
            .iter()
            .filter_map(|site| {
                self.alloc_sites
                    .get(site)
                    .map(|&(method, stmt)| (*site, method, stmt))
            })
            .collect();

        let mut bag = HistoryAwareWorkBag::fifo();
        for &(site, method, stmt) in &sites {
            let looping = match program.method(method) {
                Ok(m) if m.body().is_some() => {
                    let graph = self.blocks.graph_of(m)?;
                    graph
                        .block_of(stmt)
                        .is_some_and(|block| graph.in_cycle(block))
                }
                _ => false,
            };
            if looping || callgraph.is_recursive(method) {
                log::trace!("{site} allocated under iteration, marking multi-executed");
                self.multiplicity.insert(site, Multiplicity::MultiExecution);
                bag.add_work(site);
            }
        }

        while bag.has_work() {
            let site = bag.get_work()?;
            for run_method in threads.executed_methods(site) {
                let reachable = callgraph.reachable_from(run_method);
                for &(other, method, _) in &sites {
                    if reachable.contains(&method)
                        && self.multiplicity.get(&other) == Some(&Multiplicity::SingleExecution)
                    {
                        log::trace!(
                            "{other} reachable from multi-executed thread body {run_method}",
                        );
                        self.multiplicity.insert(other, Multiplicity::MultiExecution);
                        bag.add_work(other);
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether the location denoted by the expression, evaluated in the
    /// given method, can be observed by more than one thread.
    #[must_use]
    pub fn is_shared(&self, expr: &Expr, method: MethodUid) -> bool {
        self.resolve_expr(method, expr)
            .map_or(false, |node| self.arena.is_shared(node))
    }

    /// Whether the two expressions, evaluated in their respective
    /// methods, are known to denote the same equivalence class.
    #[must_use]
    pub fn is_same_equivalence_class(
        &self,
        expr1: &Expr,
        method1: MethodUid,
        expr2: &Expr,
        method2: MethodUid,
    ) -> bool {
        match (
            self.resolve_expr(method1, expr1),
            self.resolve_expr(method2, expr2),
        ) {
            (Some(a), Some(b)) => self.arena.canonical(a) == self.arena.canonical(b),
            _ => false,
        }
    }

    /// Whether the static field's class has shared accesses. Globals are
    /// conservatively shared from creation.
    #[must_use]
    pub fn has_shared_access(&self, field: FieldUid) -> bool {
        self.static_nodes
            .get(&field)
            .map_or(false, |&node| self.arena.is_shared(node))
    }

    /// The synchronization entity of the expression's class, if any.
    #[must_use]
    pub fn entity_of(&self, expr: &Expr, method: MethodUid) -> Option<EntityId> {
        self.resolve_expr(method, expr)
            .and_then(|node| self.arena.entity(node))
    }

    /// The consolidation bucket of a thread allocation site; `None` for
    /// sites the analysis never saw (or non-thread sites).
    #[must_use]
    pub fn multiplicity(&self, site: SiteUid) -> Option<Multiplicity> {
        self.multiplicity.get(&site).copied()
    }

    /// Summary counters of the finished run.
    #[must_use]
    pub fn stats(&self) -> EscapeStats {
        EscapeStats {
            nb_alias_classes: self.arena.nb_nodes(),
            nb_shared_classes: self.arena.nb_shared(),
            nb_global_classes: self.arena.nb_global(),
            nb_contexts: self.ctxs.nb_contexts(),
            nb_call_sites: self.call_site_ctx.len(),
            nb_thread_sites: self.thread_sites.len(),
            nb_multi_executed_sites: self
                .multiplicity
                .values()
                .filter(|&&m| m == Multiplicity::MultiExecution)
                .count(),
        }
    }

    fn resolve_expr(&self, method: MethodUid, expr: &Expr) -> Option<AliasIdx> {
        match expr {
            Expr::Local(local) => self.locals.get(&(method, *local)).copied(),
            Expr::ThisRef => self
                .method_ctx
                .get(&method)
                .and_then(|&ctx| self.ctxs.slots_readonly(ctx).receiver),
            Expr::ParamRef(index) => self
                .method_ctx
                .get(&method)
                .and_then(|&ctx| self.ctxs.slots_readonly(ctx).params.get(*index).copied())
                .flatten(),
            Expr::StaticFieldRef(field) => self.static_nodes.get(field).copied(),
            Expr::InstanceFieldRef(base, field) => {
                let base_node = self.locals.get(&(method, *base)).copied()?;
                self.arena.field_of(base_node, FieldKey::Field(*field))
            }
            Expr::ArrayRef(base) => {
                let base_node = self.locals.get(&(method, *base)).copied()?;
                self.arena.field_of(base_node, FieldKey::ArrayElem)
            }
            Expr::New(site, _) | Expr::NewArray(site, _) => self.site_nodes.get(site).copied(),
            Expr::Null | Expr::Literal | Expr::Invoke(_) => None,
        }
    }
}

fn is_thread_start(program: &Program, target: &MethodRef) -> bool {
    target.name() == THREAD_START
        && program
            .get_class_by_name(target.class_name())
            .map_or(target.class_name() == JAVA_LANG_THREAD, |class| {
                class.is_thread()
            })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_model::{InvokeKind, MethodFlags};

    fn object() -> Type {
        Type::try_from("Ljava/lang/Object;").unwrap()
    }

    fn class_type(name: &str) -> Type {
        Type::Class(name.to_string())
    }

    fn static_call(class: &str, name: &str, params: Vec<Type>, args: Vec<u16>) -> Stmt {
        Stmt::Invoke(CallExpr {
            kind: InvokeKind::Static,
            target: MethodRef::new(class, name, params, Type::Void),
            receiver: None,
            args: args.into_iter().map(LocalId::new).collect(),
        })
    }

    fn virtual_call(class: &str, name: &str, receiver: u16) -> Stmt {
        Stmt::Invoke(CallExpr {
            kind: InvokeKind::Virtual,
            target: MethodRef::new(class, name, vec![], Type::Void),
            receiver: Some(LocalId::new(receiver)),
            args: vec![],
        })
    }

    #[test]
    fn mutually_recursive_methods_join_parameters_with_the_global() {
        let mut program = Program::new();
        let app = program.register_class("App", None, false).unwrap();
        let field = program
            .register_field(app, "SINK", object(), true)
            .unwrap();
        let a = program
            .register_method(app, "a", MethodFlags::STATIC, vec![object()], Type::Void)
            .unwrap();
        let b = program
            .register_method(app, "b", MethodFlags::STATIC, vec![object()], Type::Void)
            .unwrap();

        // x(p) { v0 = p; App.SINK = v0; y(v0); return }
        let body = |other: &str| {
            Body::new(
                vec![object()],
                vec![
                    Stmt::Assign {
                        lhs: Expr::Local(LocalId::new(0)),
                        rhs: Expr::ParamRef(0),
                    },
                    Stmt::Assign {
                        lhs: Expr::StaticFieldRef(field),
                        rhs: Expr::Local(LocalId::new(0)),
                    },
                    static_call("App", other, vec![object()], vec![0]),
                    Stmt::Return(None),
                ],
            )
        };
        program.set_body(a, body("b")).unwrap();
        program.set_body(b, body("a")).unwrap();

        let callgraph = CallGraph::build(&program).unwrap();
        let mut analysis = EscapeAnalysis::new(EscapeConfig::default());
        analysis.execute(&program, &callgraph).unwrap();

        assert!(analysis.is_same_equivalence_class(&Expr::ParamRef(0), a, &Expr::ParamRef(0), b));
        assert!(analysis.is_same_equivalence_class(
            &Expr::ParamRef(0),
            a,
            &Expr::StaticFieldRef(field),
            a
        ));
        assert!(analysis.is_shared(&Expr::ParamRef(0), b));
        assert!(analysis.has_shared_access(field));
        assert!(analysis.entity_of(&Expr::ParamRef(0), a).is_some());
    }

    #[test]
    fn argument_escaping_through_a_callee_into_a_global_is_shared() {
        let mut program = Program::new();
        let app = program.register_class("App", None, false).unwrap();
        let field = program
            .register_field(app, "SINK", object(), true)
            .unwrap();
        let helper = program
            .register_method(
                app,
                "helper",
                MethodFlags::STATIC,
                vec![object()],
                Type::Void,
            )
            .unwrap();
        let main = program
            .register_method(app, "main", MethodFlags::STATIC, vec![], Type::Void)
            .unwrap();

        // helper(p) { v0 = p; App.SINK = v0; return }
        program
            .set_body(
                helper,
                Body::new(
                    vec![object()],
                    vec![
                        Stmt::Assign {
                            lhs: Expr::Local(LocalId::new(0)),
                            rhs: Expr::ParamRef(0),
                        },
                        Stmt::Assign {
                            lhs: Expr::StaticFieldRef(field),
                            rhs: Expr::Local(LocalId::new(0)),
                        },
                        Stmt::Return(None),
                    ],
                ),
            )
            .unwrap();

        let site = program.new_site();
        // main() { v0 = new Object; helper(v0); return }
        program
            .set_body(
                main,
                Body::new(
                    vec![object()],
                    vec![
                        Stmt::Assign {
                            lhs: Expr::Local(LocalId::new(0)),
                            rhs: Expr::New(site, object()),
                        },
                        static_call("App", "helper", vec![object()], vec![0]),
                        Stmt::Return(None),
                    ],
                ),
            )
            .unwrap();

        let callgraph = CallGraph::build(&program).unwrap();
        let mut analysis = EscapeAnalysis::new(EscapeConfig::default());
        analysis.execute(&program, &callgraph).unwrap();

        assert!(analysis.is_shared(&Expr::Local(LocalId::new(0)), main));
        assert!(analysis.is_shared(&Expr::New(site, object()), main));
    }

    #[test]
    fn thread_start_shares_dually_accessed_fields() {
        let mut program = Program::new();
        program.register_class("Data", None, false).unwrap();
        let job = program.register_class("Job", None, true).unwrap();
        let data_field = program
            .register_field(job, "data", class_type("Data"), false)
            .unwrap();
        let run = program
            .register_method(job, "run", MethodFlags::PUBLIC, vec![], Type::Void)
            .unwrap();
        let start = program
            .register_method(job, "start", MethodFlags::PUBLIC, vec![], Type::Void)
            .unwrap();
        let app = program.register_class("App", None, false).unwrap();
        let main = program
            .register_method(app, "main", MethodFlags::STATIC, vec![], Type::Void)
            .unwrap();

        // run() { v0 = this; v1 = v0.data; return }
        program
            .set_body(
                run,
                Body::new(
                    vec![class_type("Job"), class_type("Data")],
                    vec![
                        Stmt::Assign {
                            lhs: Expr::Local(LocalId::new(0)),
                            rhs: Expr::ThisRef,
                        },
                        Stmt::Assign {
                            lhs: Expr::Local(LocalId::new(1)),
                            rhs: Expr::InstanceFieldRef(LocalId::new(0), data_field),
                        },
                        Stmt::Return(None),
                    ],
                ),
            )
            .unwrap();

        // start() { v0 = this; v0.run(); return }
        program
            .set_body(
                start,
                Body::new(
                    vec![class_type("Job")],
                    vec![
                        Stmt::Assign {
                            lhs: Expr::Local(LocalId::new(0)),
                            rhs: Expr::ThisRef,
                        },
                        virtual_call("Job", "run", 0),
                        Stmt::Return(None),
                    ],
                ),
            )
            .unwrap();

        let job_site = program.new_site();
        let data_site = program.new_site();
        // main() { v0 = new Job; v1 = new Data; v0.data = v1; v0.start(); return }
        program
            .set_body(
                main,
                Body::new(
                    vec![class_type("Job"), class_type("Data")],
                    vec![
                        Stmt::Assign {
                            lhs: Expr::Local(LocalId::new(0)),
                            rhs: Expr::New(job_site, class_type("Job")),
                        },
                        Stmt::Assign {
                            lhs: Expr::Local(LocalId::new(1)),
                            rhs: Expr::New(data_site, class_type("Data")),
                        },
                        Stmt::Assign {
                            lhs: Expr::InstanceFieldRef(LocalId::new(0), data_field),
                            rhs: Expr::Local(LocalId::new(1)),
                        },
                        virtual_call("Job", "start", 0),
                        Stmt::Return(None),
                    ],
                ),
            )
            .unwrap();

        let callgraph = CallGraph::build(&program).unwrap();
        let mut analysis = EscapeAnalysis::new(EscapeConfig::default());
        analysis.execute(&program, &callgraph).unwrap();

        assert!(analysis.is_shared(&Expr::InstanceFieldRef(LocalId::new(0), data_field), main));
        assert!(analysis.is_shared(&Expr::Local(LocalId::new(1)), main));
        assert!(analysis.is_same_equivalence_class(
            &Expr::Local(LocalId::new(1)),
            main,
            &Expr::InstanceFieldRef(LocalId::new(0), data_field),
            main
        ));

        let stats = analysis.stats();
        assert_eq!(stats.nb_thread_sites, 1);
        assert!(stats.nb_shared_classes > 0);
    }

    #[test]
    fn consolidation_reclassifies_on_new_call_edge() {
        let mut program = Program::new();
        let worker = program.register_class("Worker", None, true).unwrap();
        let run = program
            .register_method(worker, "run", MethodFlags::PUBLIC, vec![], Type::Void)
            .unwrap();
        program
            .set_body(run, Body::new(vec![], vec![Stmt::Return(None)]))
            .unwrap();

        let app = program.register_class("App", None, false).unwrap();
        let spawner = program
            .register_method(app, "spawner", MethodFlags::STATIC, vec![], Type::Void)
            .unwrap();
        let maker = program
            .register_method(app, "maker", MethodFlags::STATIC, vec![], Type::Void)
            .unwrap();

        let loop_site = program.new_site();
        // spawner() { 0: v0 = new Worker; 1: if v1 jmp 0; 2: return }
        program
            .set_body(
                spawner,
                Body::new(
                    vec![class_type("Worker"), Type::try_from("I").unwrap()],
                    vec![
                        Stmt::Assign {
                            lhs: Expr::Local(LocalId::new(0)),
                            rhs: Expr::New(loop_site, class_type("Worker")),
                        },
                        Stmt::If(LocalId::new(1), 0),
                        Stmt::Return(None),
                    ],
                ),
            )
            .unwrap();

        let single_site = program.new_site();
        // maker() { v0 = new Worker; return }
        program
            .set_body(
                maker,
                Body::new(
                    vec![class_type("Worker")],
                    vec![
                        Stmt::Assign {
                            lhs: Expr::Local(LocalId::new(0)),
                            rhs: Expr::New(single_site, class_type("Worker")),
                        },
                        Stmt::Return(None),
                    ],
                ),
            )
            .unwrap();

        let mut callgraph = CallGraph::build(&program).unwrap();
        let mut threads = ThreadGraph::new();
        threads.record_executed(loop_site, run);
        threads.record_executed(single_site, run);

        let mut analysis = EscapeAnalysis::new(EscapeConfig::default());
        analysis.execute(&program, &callgraph).unwrap();
        analysis.consolidate(&program, &callgraph, &threads).unwrap();

        assert_eq!(
            analysis.multiplicity(loop_site),
            Some(Multiplicity::MultiExecution)
        );
        assert_eq!(
            analysis.multiplicity(single_site),
            Some(Multiplicity::SingleExecution)
        );

        // a new edge makes maker reachable from the multi-executed thread body
        callgraph.add_call(run, maker, 0);
        analysis.consolidate(&program, &callgraph, &threads).unwrap();
        assert_eq!(
            analysis.multiplicity(single_site),
            Some(Multiplicity::MultiExecution)
        );
    }
}
