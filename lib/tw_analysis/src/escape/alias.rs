//! Union-find alias nodes.
//!
//! An alias node stands for an equivalence class of expressions that may
//! denote the same runtime location. Nodes live in an [`AliasArena`] and
//! are addressed by [`AliasIdx`]; the parent slot of each node implements
//! union-find with path compression. Reference-typed nodes carry a field
//! map whose children are themselves alias nodes, so each node roots a
//! possibly cyclic tree of equivalence classes; primitive-typed nodes
//! carry no field map, permanently.
//!
//! All flag state is authoritative on representatives only: every read
//! and write goes through `find`.

use crate::unionfind::UnionFind;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use tw_model::FieldUid;

/// Index of an alias node in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AliasIdx(u32);

impl AliasIdx {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AliasIdx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identifier grouping alias classes that stand for one synchronization
/// entity (a global root, or a completed wait/notify pairing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntityId(u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A field-map key: a declared field, or the synthetic array element slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldKey {
    Field(FieldUid),
    ArrayElem,
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Field(uid) => uid.fmt(f),
            Self::ArrayElem => write!(f, "[*]"),
        }
    }
}

#[derive(Debug, Clone)]
struct AliasSetData {
    parent: AliasIdx,
    size: u32,
    fields: Option<BTreeMap<FieldKey, AliasIdx>>,
    accessed: bool,
    shared: bool,
    global: bool,
    waits: bool,
    notifies: bool,
    entity: Option<EntityId>,
}

/// The arena owning every alias node of one analysis run.
///
/// The `version` counter advances on every union, flag transition and
/// field-map growth; since all of these are monotone, an unchanged
/// version across a round means the fixpoint is reached.
#[derive(Debug, Default)]
pub struct AliasArena {
    nodes: Vec<AliasSetData>,
    version: u64,
    next_entity: u32,
}

impl AliasArena {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            version: 0,
            next_entity: 0,
        }
    }

    /// Creates a fresh singleton node; `reference` decides whether the
    /// node carries a field map (this never changes afterwards).
    pub fn new_node(&mut self, reference: bool) -> AliasIdx {
        let idx = AliasIdx(u32::try_from(self.nodes.len()).expect("alias arena overflow"));
        self.nodes.push(AliasSetData {
            parent: idx,
            size: 1,
            fields: reference.then(BTreeMap::new),
            accessed: false,
            shared: false,
            global: false,
            waits: false,
            notifies: false,
            entity: None,
        });
        idx
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn nb_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn fresh_entity(&mut self) -> EntityId {
        let entity = EntityId(self.next_entity);
        self.next_entity += 1;
        entity
    }

    /// The canonical representative, with path compression.
    pub fn find(&mut self, node: AliasIdx) -> AliasIdx {
        let mut root = node;
        while self.nodes[root.idx()].parent != root {
            root = self.nodes[root.idx()].parent;
        }
        let mut current = node;
        while current != root {
            let next = self.nodes[current.idx()].parent;
            self.nodes[current.idx()].parent = root;
            current = next;
        }
        root
    }

    /// The canonical representative, without mutating the arena. Used by
    /// the read-only query surface.
    #[must_use]
    pub fn canonical(&self, node: AliasIdx) -> AliasIdx {
        let mut root = node;
        while self.nodes[root.idx()].parent != root {
            root = self.nodes[root.idx()].parent;
        }
        root
    }

    /// Links the two equivalence classes, by size. Field maps are not
    /// merged here (that is [`AliasArena::unify`]'s job), but scalar
    /// flags are, since the loser's data is unreachable afterwards.
    pub fn union(&mut self, a: AliasIdx, b: AliasIdx) -> AliasIdx {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }
        let (winner, loser) = if self.nodes[ra.idx()].size >= self.nodes[rb.idx()].size {
            (ra, rb)
        } else {
            (rb, ra)
        };
        let loser_data = self.nodes[loser.idx()].clone();
        self.nodes[loser.idx()].parent = winner;
        let data = &mut self.nodes[winner.idx()];
        data.size += loser_data.size;
        data.accessed |= loser_data.accessed;
        data.shared |= loser_data.shared;
        data.global |= loser_data.global;
        data.waits |= loser_data.waits;
        data.notifies |= loser_data.notifies;
        if data.entity.is_none() {
            data.entity = loser_data.entity;
        }
        self.version += 1;
        winner
    }

    /// Unifies two equivalence classes and, recursively, the children of
    /// every field present on both sides. Fields present on one side only
    /// are adopted as-is (and globalized if the merged class is global).
    ///
    /// With `unify_all` set the unification crosses a thread boundary:
    /// classes accessed on both sides become shared, and a newly
    /// completed wait/notify pairing receives a fresh entity.
    pub fn unify(&mut self, a: AliasIdx, b: AliasIdx, unify_all: bool) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }

        let a_data = &self.nodes[ra.idx()];
        let b_data = &self.nodes[rb.idx()];
        let both_accessed = a_data.accessed && b_data.accessed;
        let pairing = (a_data.waits && b_data.notifies) || (a_data.notifies && b_data.waits);

        // take both maps before linking so no entry is stranded on the
        // loser side
        let a_fields = self.nodes[ra.idx()].fields.take();
        let b_fields = self.nodes[rb.idx()].fields.take();

        let root = self.union(ra, rb);

        if unify_all {
            if both_accessed {
                self.set_shared(root);
            }
            if pairing && self.nodes[root.idx()].entity.is_none() {
                let entity = self.fresh_entity();
                self.nodes[root.idx()].entity = Some(entity);
                self.version += 1;
            }
        }

        let mut pairs = Vec::new();
        let merged = match (a_fields, b_fields) {
            (None, None) => None,
            (Some(fields), None) | (None, Some(fields)) => Some(fields),
            (Some(mut merged), Some(other)) => {
                for (key, child) in other {
                    match merged.entry(key) {
                        std::collections::btree_map::Entry::Occupied(e) => {
                            pairs.push((*e.get(), child));
                        }
                        std::collections::btree_map::Entry::Vacant(e) => {
                            e.insert(child);
                        }
                    }
                }
                Some(merged)
            }
        };
        self.nodes[root.idx()].fields = merged;

        // linking before recursing is what terminates unification of
        // cyclic field structures
        for (x, y) in pairs {
            self.unify(x, y, unify_all);
        }

        let root = self.find(root);
        if self.nodes[root.idx()].global {
            self.set_global(root);
        }
    }

    /// Marks the class and, recursively, every field-map descendant as
    /// global and shared, assigning entities where absent. Idempotent.
    pub fn set_global(&mut self, node: AliasIdx) {
        let mut stack = vec![node];
        let mut visited = BTreeSet::new();
        while let Some(n) = stack.pop() {
            let root = self.find(n);
            if !visited.insert(root) {
                continue;
            }
            let data = &mut self.nodes[root.idx()];
            if !data.global || !data.shared {
                data.global = true;
                data.shared = true;
                self.version += 1;
            }
            if self.nodes[root.idx()].entity.is_none() {
                let entity = self.fresh_entity();
                self.nodes[root.idx()].entity = Some(entity);
                self.version += 1;
            }
            if let Some(fields) = &self.nodes[root.idx()].fields {
                stack.extend(fields.values().copied());
            }
        }
    }

    /// One-way copy of the shared flag and entity from `src` to `dst`,
    /// recursing into fields present on both sides. Used for top-down
    /// flow where structural unification would wrongly merge identities.
    pub fn propagate_info_from_to(&mut self, src: AliasIdx, dst: AliasIdx) {
        let mut visited = BTreeSet::new();
        self.propagate_rec(src, dst, &mut visited);
    }

    fn propagate_rec(
        &mut self,
        src: AliasIdx,
        dst: AliasIdx,
        visited: &mut BTreeSet<(AliasIdx, AliasIdx)>,
    ) {
        let rs = self.find(src);
        let rd = self.find(dst);
        if rs == rd || !visited.insert((rs, rd)) {
            return;
        }
        let src_shared = self.nodes[rs.idx()].shared;
        let src_entity = self.nodes[rs.idx()].entity;
        let data = &mut self.nodes[rd.idx()];
        if src_shared && !data.shared {
            data.shared = true;
            self.version += 1;
        }
        if data.entity.is_none() && src_entity.is_some() {
            data.entity = src_entity;
            self.version += 1;
        }
        let pairs: Vec<(AliasIdx, AliasIdx)> = match (
            &self.nodes[rs.idx()].fields,
            &self.nodes[rd.idx()].fields,
        ) {
            (Some(src_fields), Some(dst_fields)) => src_fields
                .iter()
                .filter_map(|(key, s)| dst_fields.get(key).map(|d| (*s, *d)))
                .collect(),
            _ => Vec::new(),
        };
        for (s, d) in pairs {
            self.propagate_rec(s, d, visited);
        }
    }

    /// Deep-copies the reachable field-map tree into fresh nodes,
    /// recording every copied class in `clone_map` (canonical clonee →
    /// clone). Callers cloning several roots that must keep their mutual
    /// aliasing pass the same map to every call, then finish with
    /// [`AliasArena::reconcile_clones`].
    pub fn clone_tree(
        &mut self,
        node: AliasIdx,
        clone_map: &mut BTreeMap<AliasIdx, AliasIdx>,
    ) -> AliasIdx {
        let root = self.find(node);
        if let Some(&clone) = clone_map.get(&root) {
            return clone;
        }
        let data = self.nodes[root.idx()].clone();
        let clone = self.new_node(data.fields.is_some());
        {
            let clone_data = &mut self.nodes[clone.idx()];
            clone_data.accessed = data.accessed;
            clone_data.shared = data.shared;
            clone_data.global = data.global;
            clone_data.waits = data.waits;
            clone_data.notifies = data.notifies;
            clone_data.entity = data.entity;
        }
        // record before descending so cyclic field structures close on
        // the clone instead of recursing forever
        clone_map.insert(root, clone);
        if let Some(fields) = data.fields {
            for (key, child) in fields {
                let child_clone = self.clone_tree(child, clone_map);
                self.nodes[clone.idx()]
                    .fields
                    .as_mut()
                    .expect("clone of a mapped node keeps its map")
                    .insert(key, child_clone);
            }
        }
        clone
    }

    /// Post-pass of cloning: unions any two clones whose clonees meanwhile
    /// resolve to the same class, so that aliasing discovered through a
    /// second traversal path is not silently dropped.
    pub fn reconcile_clones(&mut self, clone_map: &BTreeMap<AliasIdx, AliasIdx>) {
        let entries: Vec<(AliasIdx, AliasIdx)> =
            clone_map.iter().map(|(k, v)| (*k, *v)).collect();
        let mut canonical: BTreeMap<AliasIdx, AliasIdx> = BTreeMap::new();
        for (clonee, clone) in entries {
            let root = self.find(clonee);
            if let Some(&first) = canonical.get(&root) {
                self.unify(first, clone, false);
            } else {
                canonical.insert(root, clone);
            }
        }
    }

    /// The child class under the given field of a reference class,
    /// created on first access.
    pub fn field_child(
        &mut self,
        base: AliasIdx,
        key: FieldKey,
        child_is_reference: bool,
    ) -> Option<AliasIdx> {
        let root = self.find(base);
        if self.nodes[root.idx()].fields.is_none() {
            return None;
        }
        if let Some(&child) = self.nodes[root.idx()]
            .fields
            .as_ref()
            .and_then(|fields| fields.get(&key))
        {
            return Some(child);
        }
        let child = self.new_node(child_is_reference);
        let root = self.find(root);
        self.nodes[root.idx()]
            .fields
            .as_mut()
            .expect("checked above")
            .insert(key, child);
        self.version += 1;
        if self.nodes[root.idx()].global {
            self.set_global(child);
        }
        Some(child)
    }

    pub fn mark_accessed(&mut self, node: AliasIdx) {
        let root = self.find(node);
        let data = &mut self.nodes[root.idx()];
        if !data.accessed {
            data.accessed = true;
            self.version += 1;
        }
    }

    /// Marks the class and every reachable field-map descendant accessed.
    pub fn mark_accessed_tree(&mut self, node: AliasIdx) {
        let mut stack = vec![node];
        let mut visited = BTreeSet::new();
        while let Some(n) = stack.pop() {
            let root = self.find(n);
            if !visited.insert(root) {
                continue;
            }
            self.mark_accessed(root);
            if let Some(fields) = &self.nodes[root.idx()].fields {
                stack.extend(fields.values().copied());
            }
        }
    }

    pub fn set_shared(&mut self, node: AliasIdx) {
        let root = self.find(node);
        let data = &mut self.nodes[root.idx()];
        if !data.shared {
            data.shared = true;
            self.version += 1;
        }
    }

    pub fn set_waits(&mut self, node: AliasIdx) {
        let root = self.find(node);
        let data = &mut self.nodes[root.idx()];
        if !data.waits {
            data.waits = true;
            self.version += 1;
        }
    }

    pub fn set_notifies(&mut self, node: AliasIdx) {
        let root = self.find(node);
        let data = &mut self.nodes[root.idx()];
        if !data.notifies {
            data.notifies = true;
            self.version += 1;
        }
    }

    #[must_use]
    pub fn is_accessed(&self, node: AliasIdx) -> bool {
        self.nodes[self.canonical(node).idx()].accessed
    }

    #[must_use]
    pub fn is_shared(&self, node: AliasIdx) -> bool {
        self.nodes[self.canonical(node).idx()].shared
    }

    #[must_use]
    pub fn is_global(&self, node: AliasIdx) -> bool {
        self.nodes[self.canonical(node).idx()].global
    }

    #[must_use]
    pub fn entity(&self, node: AliasIdx) -> Option<EntityId> {
        self.nodes[self.canonical(node).idx()].entity
    }

    /// Read-only field-map lookup on the canonical representative.
    #[must_use]
    pub fn field_of(&self, base: AliasIdx, key: FieldKey) -> Option<AliasIdx> {
        self.nodes[self.canonical(base).idx()]
            .fields
            .as_ref()
            .and_then(|fields| fields.get(&key))
            .copied()
    }

    /// Returns `true` if the node carries a field map (reference class).
    #[must_use]
    pub fn has_field_map(&self, node: AliasIdx) -> bool {
        self.nodes[self.canonical(node).idx()].fields.is_some()
    }

    #[must_use]
    pub fn nb_shared(&self) -> usize {
        self.count_canonical(|data| data.shared)
    }

    #[must_use]
    pub fn nb_global(&self) -> usize {
        self.count_canonical(|data| data.global)
    }

    fn count_canonical(&self, predicate: impl Fn(&AliasSetData) -> bool) -> usize {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(i, data)| data.parent.idx() == *i && predicate(data))
            .count()
    }
}

impl UnionFind for AliasArena {
    type Idx = AliasIdx;

    fn find(&mut self, idx: AliasIdx) -> AliasIdx {
        AliasArena::find(self, idx)
    }

    fn union(&mut self, a: AliasIdx, b: AliasIdx) -> AliasIdx {
        AliasArena::union(self, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_model::{Program, Type};

    const ELEM: FieldKey = FieldKey::ArrayElem;

    fn two_field_keys() -> (FieldKey, FieldKey) {
        let mut program = Program::new();
        let cl = program.register_class("Box", None, false).unwrap();
        let object = Type::try_from("Ljava/lang/Object;").unwrap();
        let f1 = program
            .register_field(cl, "left", object.clone(), false)
            .unwrap();
        let f2 = program.register_field(cl, "right", object, false).unwrap();
        (FieldKey::Field(f1), FieldKey::Field(f2))
    }

    #[test]
    fn find_is_idempotent() {
        let mut arena = AliasArena::new();
        let a = arena.new_node(true);
        let b = arena.new_node(true);
        let c = arena.new_node(true);
        arena.union(a, b);
        arena.union(b, c);
        for n in [a, b, c] {
            let root = arena.find(n);
            assert_eq!(arena.find(root), root);
        }
    }

    #[test]
    fn union_is_symmetric() {
        let mut arena = AliasArena::new();
        let a = arena.new_node(true);
        let b = arena.new_node(true);
        arena.union(a, b);
        assert_eq!(arena.find(a), arena.find(b));
    }

    #[test]
    fn union_merges_scalar_flags() {
        let mut arena = AliasArena::new();
        let a = arena.new_node(true);
        let b = arena.new_node(true);
        arena.mark_accessed(a);
        arena.set_shared(b);
        arena.union(a, b);
        assert!(arena.is_accessed(a));
        assert!(arena.is_shared(a));
    }

    #[test]
    fn unify_merges_matching_fields_recursively() {
        let mut arena = AliasArena::new();
        let a = arena.new_node(true);
        let b = arena.new_node(true);
        let ca = arena.field_child(a, ELEM, true).unwrap();
        let cb = arena.field_child(b, ELEM, true).unwrap();
        arena.unify(a, b, false);
        assert_eq!(arena.find(ca), arena.find(cb));
    }

    #[test]
    fn unify_adopts_one_sided_fields() {
        let mut arena = AliasArena::new();
        let a = arena.new_node(true);
        let b = arena.new_node(true);
        let child = arena.field_child(b, ELEM, true).unwrap();
        arena.unify(a, b, false);
        assert_eq!(
            arena.field_of(a, ELEM).map(|n| arena.canonical(n)),
            Some(arena.canonical(child))
        );
    }

    #[test]
    fn unify_terminates_on_cyclic_field_maps() {
        let mut arena = AliasArena::new();
        let a = arena.new_node(true);
        let b = arena.new_node(true);
        // each node's element field points back to the node itself
        let ca = arena.field_child(a, ELEM, true).unwrap();
        arena.unify(ca, a, false);
        let cb = arena.field_child(b, ELEM, true).unwrap();
        arena.unify(cb, b, false);
        arena.unify(a, b, false);
        assert_eq!(arena.find(a), arena.find(b));
    }

    #[test]
    fn unify_all_infers_sharing_from_dual_access() {
        let mut arena = AliasArena::new();
        let a = arena.new_node(true);
        let b = arena.new_node(true);
        arena.mark_accessed(a);
        arena.mark_accessed(b);
        arena.unify(a, b, true);
        assert!(arena.is_shared(a));

        let c = arena.new_node(true);
        let d = arena.new_node(true);
        arena.mark_accessed(c);
        arena.unify(c, d, true);
        assert!(!arena.is_shared(c));
    }

    #[test]
    fn unify_all_completes_wait_notify_pairing() {
        let mut arena = AliasArena::new();
        let a = arena.new_node(true);
        let b = arena.new_node(true);
        arena.set_waits(a);
        arena.set_notifies(b);
        assert!(arena.entity(a).is_none());
        arena.unify(a, b, true);
        assert!(arena.entity(a).is_some());
    }

    #[test]
    fn set_global_reaches_all_descendants() {
        let mut arena = AliasArena::new();
        let root = arena.new_node(true);
        let child = arena.field_child(root, ELEM, true).unwrap();
        let grandchild = arena.field_child(child, ELEM, true).unwrap();
        arena.set_global(root);
        for n in [root, child, grandchild] {
            assert!(arena.is_global(n));
            assert!(arena.is_shared(n));
            assert!(arena.entity(n).is_some());
        }
    }

    #[test]
    fn global_extends_to_later_unified_fields() {
        let mut arena = AliasArena::new();
        let g = arena.new_node(true);
        arena.set_global(g);
        let other = arena.new_node(true);
        let child = arena.field_child(other, ELEM, true).unwrap();
        arena.unify(g, other, false);
        assert!(arena.is_global(child));
        assert!(arena.is_shared(child));
    }

    #[test]
    fn clone_preserves_internal_aliasing_disjointly() {
        let mut arena = AliasArena::new();
        let a = arena.new_node(true);
        let b = arena.new_node(true);
        let ca = arena.field_child(a, ELEM, true).unwrap();
        let cb = arena.field_child(b, ELEM, true).unwrap();
        // both element fields collapse onto one class x
        arena.unify(ca, cb, false);
        let x = arena.find(ca);

        let mut clone_map = BTreeMap::new();
        let a2 = arena.clone_tree(a, &mut clone_map);
        let b2 = arena.clone_tree(b, &mut clone_map);
        arena.reconcile_clones(&clone_map);

        let ca2 = arena.field_of(a2, ELEM).unwrap();
        let cb2 = arena.field_of(b2, ELEM).unwrap();
        assert_eq!(arena.find(ca2), arena.find(cb2));
        assert_ne!(arena.find(ca2), x);
        assert_ne!(arena.find(a2), arena.find(a));
    }

    #[test]
    fn propagate_copies_sharing_one_way() {
        let mut arena = AliasArena::new();
        let src = arena.new_node(true);
        let dst = arena.new_node(true);
        let src_child = arena.field_child(src, ELEM, true).unwrap();
        let dst_child = arena.field_child(dst, ELEM, true).unwrap();
        arena.set_shared(src);
        arena.set_shared(src_child);
        arena.propagate_info_from_to(src, dst);
        assert!(arena.is_shared(dst));
        assert!(arena.is_shared(dst_child));
        // identities stay distinct
        assert_ne!(arena.find(src), arena.find(dst));
        assert_ne!(arena.find(src_child), arena.find(dst_child));
    }
}
