//! The minimal union-find contract shared by the arena-backed
//! equivalence structures of this crate.
//!
//! Alias nodes and method contexts are deliberately two distinct
//! concrete types: they only share this small seam, not a common base.

/// Arena-style union-find: elements are indices, state lives in the
/// arena implementing the trait.
pub trait UnionFind {
    type Idx: Copy + Eq;

    /// The canonical representative of the element's class, with path
    /// compression.
    fn find(&mut self, idx: Self::Idx) -> Self::Idx;

    /// Links the two classes and returns the surviving representative.
    fn union(&mut self, a: Self::Idx, b: Self::Idx) -> Self::Idx;
}
