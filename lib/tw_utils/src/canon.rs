//! Tuple canonicalizers: caches that hand out a single shared instance
//! per value-distinct pair or triple.
//!
//! Canonical tuples make value-equality keys cheap to share between maps,
//! and their hash/string form can be frozen (`optimize`) so that a tuple
//! wrapping interior-mutable data keeps honouring the hash invariant of
//! the maps it already keys.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Debug, Clone)]
struct Frozen {
    hash: u64,
    repr: String,
}

/// A value-equality pair with a freezable hash and string form.
#[derive(Debug)]
pub struct Pair<A, B> {
    first: A,
    second: B,
    frozen: RefCell<Option<Frozen>>,
}

impl<A, B> Pair<A, B> {
    #[must_use]
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            frozen: RefCell::new(None),
        }
    }

    #[inline]
    pub fn first(&self) -> &A {
        &self.first
    }

    #[inline]
    pub fn second(&self) -> &B {
        &self.second
    }

    /// Reverts to live hash and string computation.
    pub fn unoptimize(&self) {
        self.frozen.replace(None);
    }
}

impl<A: Hash + fmt::Display, B: Hash + fmt::Display> Pair<A, B> {
    /// Computes the hash code and string form once and freezes them, so
    /// that later interior mutation of the elements does not change how
    /// the pair hashes or prints.
    pub fn optimize(&self) {
        let mut hasher = DefaultHasher::new();
        self.first.hash(&mut hasher);
        self.second.hash(&mut hasher);
        self.frozen.replace(Some(Frozen {
            hash: hasher.finish(),
            repr: format!("({}, {})", self.first, self.second),
        }));
    }
}

impl<A: PartialEq, B: PartialEq> PartialEq for Pair<A, B> {
    fn eq(&self, other: &Self) -> bool {
        self.first == other.first && self.second == other.second
    }
}

impl<A: Eq, B: Eq> Eq for Pair<A, B> {}

impl<A: Hash, B: Hash> Hash for Pair<A, B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(frozen) = self.frozen.borrow().as_ref() {
            frozen.hash.hash(state);
        } else {
            self.first.hash(state);
            self.second.hash(state);
        }
    }
}

impl<A: fmt::Display, B: fmt::Display> fmt::Display for Pair<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(frozen) = self.frozen.borrow().as_ref() {
            write!(f, "{}", frozen.repr)
        } else {
            write!(f, "({}, {})", self.first, self.second)
        }
    }
}

/// A value-equality triple with a freezable hash and string form.
#[derive(Debug)]
pub struct Triple<A, B, C> {
    first: A,
    second: B,
    third: C,
    frozen: RefCell<Option<Frozen>>,
}

impl<A, B, C> Triple<A, B, C> {
    #[must_use]
    pub fn new(first: A, second: B, third: C) -> Self {
        Self {
            first,
            second,
            third,
            frozen: RefCell::new(None),
        }
    }

    #[inline]
    pub fn first(&self) -> &A {
        &self.first
    }

    #[inline]
    pub fn second(&self) -> &B {
        &self.second
    }

    #[inline]
    pub fn third(&self) -> &C {
        &self.third
    }

    pub fn unoptimize(&self) {
        self.frozen.replace(None);
    }
}

impl<A, B, C> Triple<A, B, C>
where
    A: Hash + fmt::Display,
    B: Hash + fmt::Display,
    C: Hash + fmt::Display,
{
    /// See [`Pair::optimize`].
    pub fn optimize(&self) {
        let mut hasher = DefaultHasher::new();
        self.first.hash(&mut hasher);
        self.second.hash(&mut hasher);
        self.third.hash(&mut hasher);
        self.frozen.replace(Some(Frozen {
            hash: hasher.finish(),
            repr: format!("({}, {}, {})", self.first, self.second, self.third),
        }));
    }
}

impl<A: PartialEq, B: PartialEq, C: PartialEq> PartialEq for Triple<A, B, C> {
    fn eq(&self, other: &Self) -> bool {
        self.first == other.first && self.second == other.second && self.third == other.third
    }
}

impl<A: Eq, B: Eq, C: Eq> Eq for Triple<A, B, C> {}

impl<A: Hash, B: Hash, C: Hash> Hash for Triple<A, B, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(frozen) = self.frozen.borrow().as_ref() {
            frozen.hash.hash(state);
        } else {
            self.first.hash(state);
            self.second.hash(state);
            self.third.hash(state);
        }
    }
}

impl<A: fmt::Display, B: fmt::Display, C: fmt::Display> fmt::Display for Triple<A, B, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(frozen) = self.frozen.borrow().as_ref() {
            write!(f, "{}", frozen.repr)
        } else {
            write!(f, "({}, {}, {})", self.first, self.second, self.third)
        }
    }
}

/// Identity-caching factory of canonical [`Pair`] instances.
#[derive(Debug)]
pub struct PairManager<A, B> {
    cache: HashMap<(A, B), Rc<Pair<A, B>>>,
}

impl<A, B> Default for PairManager<A, B> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }
}

impl<A, B> PairManager<A, B>
where
    A: Clone + Eq + Hash,
    B: Clone + Eq + Hash,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Returns the canonical instance for the given values; repeated calls
    /// with equal values return the identical `Rc`.
    pub fn pair(&mut self, first: A, second: B) -> Rc<Pair<A, B>> {
        self.cache
            .entry((first.clone(), second.clone()))
            .or_insert_with(|| Rc::new(Pair::new(first, second)))
            .clone()
    }

    /// Invalidates all previously issued instances; later `pair` calls
    /// start from a fresh cache.
    pub fn reset(&mut self) {
        self.cache.clear();
    }
}

/// Identity-caching factory of canonical [`Triple`] instances.
#[derive(Debug)]
pub struct TripleManager<A, B, C> {
    cache: HashMap<(A, B, C), Rc<Triple<A, B, C>>>,
}

impl<A, B, C> Default for TripleManager<A, B, C> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }
}

impl<A, B, C> TripleManager<A, B, C>
where
    A: Clone + Eq + Hash,
    B: Clone + Eq + Hash,
    C: Clone + Eq + Hash,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    pub fn triple(&mut self, first: A, second: B, third: C) -> Rc<Triple<A, B, C>> {
        self.cache
            .entry((first.clone(), second.clone(), third.clone()))
            .or_insert_with(|| Rc::new(Triple::new(first, second, third)))
            .clone()
    }

    pub fn reset(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn pair_manager_returns_identical_instance() {
        let mut manager = PairManager::new();
        let p1 = manager.pair("a", "b");
        let p2 = manager.pair("a", "b");
        assert!(Rc::ptr_eq(&p1, &p2));
        assert!(!Rc::ptr_eq(&p1, &manager.pair("a", "c")));
    }

    #[test]
    fn reset_invalidates_issued_instances() {
        let mut manager = PairManager::new();
        let p1 = manager.pair("a", "b");
        manager.reset();
        let p2 = manager.pair("a", "b");
        assert!(!Rc::ptr_eq(&p1, &p2));
        assert_eq!(p1, p2);
    }

    #[test]
    fn triple_manager_returns_identical_instance() {
        let mut manager = TripleManager::new();
        let t1 = manager.triple(1, 2, 3);
        let t2 = manager.triple(1, 2, 3);
        assert!(Rc::ptr_eq(&t1, &t2));
    }

    // Hash/Display that read through a mutable cell, to observe freezing.
    #[derive(PartialEq, Eq)]
    struct Mutable(Cell<u32>);

    impl Hash for Mutable {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.0.get().hash(state);
        }
    }

    impl fmt::Display for Mutable {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "{}", self.0.get())
        }
    }

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn optimize_freezes_hash_and_string_form() {
        let pair = Pair::new(Mutable(Cell::new(1)), Mutable(Cell::new(2)));
        pair.optimize();
        let frozen_hash = hash_of(&pair);
        let frozen_repr = format!("{pair}");
        pair.first().0.set(99);
        assert_eq!(hash_of(&pair), frozen_hash);
        assert_eq!(format!("{pair}"), frozen_repr);
        pair.unoptimize();
        assert_ne!(format!("{pair}"), frozen_repr);
    }
}
