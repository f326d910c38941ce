//! Method contexts: the fixed-shape bundles of alias nodes describing
//! what a method can observe of its caller (receiver, parameters, return
//! value, thrown exceptions).
//!
//! Contexts are themselves union-find elements so that a call-site
//! context can be merged into a callee's context; slot state is
//! authoritative on context representatives only.

use crate::errors::{AnalysisError, AnalysisResult};
use crate::escape::alias::{AliasArena, AliasIdx};
use crate::unionfind::UnionFind;
use std::collections::BTreeMap;
use std::fmt;

/// Index of a method context in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CtxIdx(u32);

impl CtxIdx {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CtxIdx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

/// Canonical snapshot of a context's slots.
#[derive(Debug, Clone)]
pub struct CtxSlots {
    pub receiver: Option<AliasIdx>,
    pub params: Vec<Option<AliasIdx>>,
    pub ret: Option<AliasIdx>,
    pub thrown: AliasIdx,
}

#[derive(Debug, Clone)]
struct CtxData {
    parent: CtxIdx,
    size: u32,
    slots: CtxSlots,
}

/// The arena owning every method and call-site context of one analysis
/// run.
#[derive(Debug, Default)]
pub struct ContextArena {
    ctxs: Vec<CtxData>,
    version: u64,
}

impl ContextArena {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ctxs: Vec::new(),
            version: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn nb_contexts(&self) -> usize {
        self.ctxs.len()
    }

    /// Creates a context from already-built slot nodes. `receiver` is
    /// present iff the method is an instance method, `ret` iff its return
    /// type is not void; `thrown` is always present.
    pub fn new_context(
        &mut self,
        receiver: Option<AliasIdx>,
        params: Vec<Option<AliasIdx>>,
        ret: Option<AliasIdx>,
        thrown: AliasIdx,
    ) -> CtxIdx {
        let idx = CtxIdx(u32::try_from(self.ctxs.len()).expect("context arena overflow"));
        self.ctxs.push(CtxData {
            parent: idx,
            size: 1,
            slots: CtxSlots {
                receiver,
                params,
                ret,
                thrown,
            },
        });
        idx
    }

    pub fn find(&mut self, ctx: CtxIdx) -> CtxIdx {
        let mut root = ctx;
        while self.ctxs[root.idx()].parent != root {
            root = self.ctxs[root.idx()].parent;
        }
        let mut current = ctx;
        while current != root {
            let next = self.ctxs[current.idx()].parent;
            self.ctxs[current.idx()].parent = root;
            current = next;
        }
        root
    }

    #[must_use]
    pub fn canonical(&self, ctx: CtxIdx) -> CtxIdx {
        let mut root = ctx;
        while self.ctxs[root.idx()].parent != root {
            root = self.ctxs[root.idx()].parent;
        }
        root
    }

    /// Canonical slot snapshot.
    pub fn slots(&mut self, ctx: CtxIdx) -> CtxSlots {
        let root = self.find(ctx);
        self.ctxs[root.idx()].slots.clone()
    }

    /// Read-only canonical slot snapshot, for the query surface.
    #[must_use]
    pub fn slots_readonly(&self, ctx: CtxIdx) -> CtxSlots {
        self.ctxs[self.canonical(ctx).idx()].slots.clone()
    }

    /// Unifies every structurally present slot of the two contexts
    /// pairwise, then unions the contexts themselves.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::IncompatibleContextShapes`] when one side
    /// declares a receiver or return slot the other lacks, or when the
    /// parameter arities differ: the call graph or program model handed
    /// the engine inconsistent signatures.
    pub fn unify_contexts(
        &mut self,
        a: CtxIdx,
        b: CtxIdx,
        unify_all: bool,
        arena: &mut AliasArena,
    ) -> AnalysisResult<()> {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return Ok(());
        }
        let sa = self.ctxs[ra.idx()].slots.clone();
        let sb = self.ctxs[rb.idx()].slots.clone();

        if sa.receiver.is_some() != sb.receiver.is_some() {
            return Err(AnalysisError::IncompatibleContextShapes(
                "receiver slot present on one side only".to_string(),
            ));
        }
        if sa.ret.is_some() != sb.ret.is_some() {
            return Err(AnalysisError::IncompatibleContextShapes(
                "return slot present on one side only".to_string(),
            ));
        }
        if sa.params.len() != sb.params.len() {
            return Err(AnalysisError::IncompatibleContextShapes(format!(
                "parameter arity mismatch: {} vs {}",
                sa.params.len(),
                sb.params.len()
            )));
        }

        if let (Some(x), Some(y)) = (sa.receiver, sb.receiver) {
            arena.unify(x, y, unify_all);
        }
        for (x, y) in sa.params.iter().zip(sb.params.iter()) {
            if let (Some(x), Some(y)) = (x, y) {
                arena.unify(*x, *y, unify_all);
            }
        }
        if let (Some(x), Some(y)) = (sa.ret, sb.ret) {
            arena.unify(x, y, unify_all);
        }
        arena.unify(sa.thrown, sb.thrown, unify_all);

        self.union(ra, rb);
        Ok(())
    }

    fn union(&mut self, a: CtxIdx, b: CtxIdx) -> CtxIdx {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }
        let (winner, loser) = if self.ctxs[ra.idx()].size >= self.ctxs[rb.idx()].size {
            (ra, rb)
        } else {
            (rb, ra)
        };
        let loser_size = self.ctxs[loser.idx()].size;
        self.ctxs[loser.idx()].parent = winner;
        self.ctxs[winner.idx()].size += loser_size;
        self.version += 1;
        winner
    }

    /// Deep-clones a context: all slots are copied through one shared
    /// clonee→clone map, so aliasing across slots (a parameter aliasing
    /// the receiver, a field reaching the return value) survives the
    /// copy, and the clone shares no class with the original.
    pub fn clone_context(&mut self, ctx: CtxIdx, arena: &mut AliasArena) -> CtxIdx {
        let slots = self.slots(ctx);
        let mut clone_map = BTreeMap::new();
        let receiver = slots
            .receiver
            .map(|n| arena.clone_tree(n, &mut clone_map));
        let params = slots
            .params
            .iter()
            .map(|slot| slot.map(|n| arena.clone_tree(n, &mut clone_map)))
            .collect();
        let ret = slots.ret.map(|n| arena.clone_tree(n, &mut clone_map));
        let thrown = arena.clone_tree(slots.thrown, &mut clone_map);
        arena.reconcile_clones(&clone_map);
        self.new_context(receiver, params, ret, thrown)
    }

    /// Per-slot one-way propagation of sharing information from `src`
    /// into `dst`, without merging identities.
    pub fn propagate_context(&mut self, src: CtxIdx, dst: CtxIdx, arena: &mut AliasArena) {
        let rs = self.find(src);
        let rd = self.find(dst);
        if rs == rd {
            return;
        }
        let ss = self.ctxs[rs.idx()].slots.clone();
        let sd = self.ctxs[rd.idx()].slots.clone();
        if let (Some(x), Some(y)) = (ss.receiver, sd.receiver) {
            arena.propagate_info_from_to(x, y);
        }
        for (x, y) in ss.params.iter().zip(sd.params.iter()) {
            if let (Some(x), Some(y)) = (x, y) {
                arena.propagate_info_from_to(*x, *y);
            }
        }
        if let (Some(x), Some(y)) = (ss.ret, sd.ret) {
            arena.propagate_info_from_to(x, y);
        }
        arena.propagate_info_from_to(ss.thrown, sd.thrown);
    }
}

impl UnionFind for ContextArena {
    type Idx = CtxIdx;

    fn find(&mut self, idx: CtxIdx) -> CtxIdx {
        ContextArena::find(self, idx)
    }

    fn union(&mut self, a: CtxIdx, b: CtxIdx) -> CtxIdx {
        ContextArena::union(self, a, b)
    }
}
