//! Work bag (worklist) containers driving the analysis fixpoints.

use crate::errors::{UtilsError, UtilsResult};
use std::collections::{BTreeSet, VecDeque};

/// The common work bag contract.
///
/// A work bag is a container of pending work items. The order in which
/// `get_work` hands items back is the variant's choice (stack order for
/// [`LifoWorkBag`], queue order for [`FifoWorkBag`]); the contract itself
/// does not promise any order.
pub trait WorkBag<T> {
    /// Adds an item, unconditionally.
    fn add_work(&mut self, item: T);

    /// Adds all given items, unconditionally.
    fn add_all_work(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.add_work(item);
        }
    }

    /// Adds an item unless the bag considers it a duplicate.
    /// Returns `true` if the item was accepted.
    fn add_work_no_duplicates(&mut self, item: T) -> bool;

    /// Adds all given items, skipping duplicates.
    /// Returns the rejected items.
    fn add_all_work_no_duplicates(&mut self, items: impl IntoIterator<Item = T>) -> Vec<T>
    where
        T: Clone,
    {
        let mut rejected = Vec::new();
        for item in items {
            if !self.add_work_no_duplicates(item.clone()) {
                rejected.push(item);
            }
        }
        rejected
    }

    /// Returns `true` if at least one item is pending.
    fn has_work(&self) -> bool;

    /// Removes and returns the next item.
    ///
    /// # Errors
    ///
    /// Returns [`UtilsError::EmptyWorkBag`] when the bag is empty; callers
    /// are expected to guard with [`WorkBag::has_work`].
    fn get_work(&mut self) -> UtilsResult<T>;

    /// Removes all pending items (and any recorded history).
    fn clear(&mut self);
}

/// Stack-ordered work bag: `get_work` returns the most recently added item.
#[derive(Debug, Default)]
pub struct LifoWorkBag<T> {
    items: Vec<T>,
}

impl<T> LifoWorkBag<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Eq> WorkBag<T> for LifoWorkBag<T> {
    fn add_work(&mut self, item: T) {
        self.items.push(item);
    }

    fn add_work_no_duplicates(&mut self, item: T) -> bool {
        if self.items.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    fn has_work(&self) -> bool {
        !self.items.is_empty()
    }

    fn get_work(&mut self) -> UtilsResult<T> {
        self.items.pop().ok_or(UtilsError::EmptyWorkBag)
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

/// Queue-ordered work bag: `get_work` returns the least recently added item.
#[derive(Debug, Default)]
pub struct FifoWorkBag<T> {
    items: VecDeque<T>,
}

impl<T> FifoWorkBag<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<T: Eq> WorkBag<T> for FifoWorkBag<T> {
    fn add_work(&mut self, item: T) {
        self.items.push_back(item);
    }

    fn add_work_no_duplicates(&mut self, item: T) -> bool {
        if self.items.contains(&item) {
            return false;
        }
        self.items.push_back(item);
        true
    }

    fn has_work(&self) -> bool {
        !self.items.is_empty()
    }

    fn get_work(&mut self) -> UtilsResult<T> {
        self.items.pop_front().ok_or(UtilsError::EmptyWorkBag)
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

/// History-aware decorator over another work bag.
///
/// Every item ever accepted is remembered for the lifetime of the bag, and
/// re-adding it later (even after it has been processed) is a no-op. This
/// is what guarantees termination of worklist traversals on cyclic graphs.
#[derive(Debug, Default)]
pub struct HistoryAwareWorkBag<T, B> {
    inner: B,
    seen: BTreeSet<T>,
}

impl<T: Ord> HistoryAwareWorkBag<T, LifoWorkBag<T>> {
    #[must_use]
    pub fn lifo() -> Self {
        Self {
            inner: LifoWorkBag::new(),
            seen: BTreeSet::new(),
        }
    }
}

impl<T: Ord> HistoryAwareWorkBag<T, FifoWorkBag<T>> {
    #[must_use]
    pub fn fifo() -> Self {
        Self {
            inner: FifoWorkBag::new(),
            seen: BTreeSet::new(),
        }
    }
}

impl<T, B> WorkBag<T> for HistoryAwareWorkBag<T, B>
where
    T: Clone + Ord,
    B: WorkBag<T>,
{
    fn add_work(&mut self, item: T) {
        // a history-aware bag never accepts an item twice, whichever add
        // entry point is used
        if self.seen.insert(item.clone()) {
            self.inner.add_work(item);
        }
    }

    fn add_work_no_duplicates(&mut self, item: T) -> bool {
        if self.seen.insert(item.clone()) {
            self.inner.add_work(item);
            true
        } else {
            false
        }
    }

    fn has_work(&self) -> bool {
        self.inner.has_work()
    }

    fn get_work(&mut self) -> UtilsResult<T> {
        self.inner.get_work()
    }

    fn clear(&mut self) {
        self.inner.clear();
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_is_queue_ordered() {
        let mut bag = FifoWorkBag::new();
        bag.add_all_work([1, 2, 3]);
        assert_eq!(bag.get_work(), Ok(1));
        assert_eq!(bag.get_work(), Ok(2));
        assert_eq!(bag.get_work(), Ok(3));
        assert!(!bag.has_work());
    }

    #[test]
    fn lifo_is_stack_ordered() {
        let mut bag = LifoWorkBag::new();
        bag.add_all_work([1, 2, 3]);
        assert_eq!(bag.get_work(), Ok(3));
        assert_eq!(bag.get_work(), Ok(2));
        assert_eq!(bag.get_work(), Ok(1));
    }

    #[test]
    fn get_work_on_empty_bag_fails() {
        let mut bag: LifoWorkBag<u32> = LifoWorkBag::new();
        assert_eq!(bag.get_work(), Err(UtilsError::EmptyWorkBag));
    }

    #[test]
    fn no_duplicates_reports_rejected_subset() {
        let mut bag = FifoWorkBag::new();
        bag.add_work(1);
        let rejected = bag.add_all_work_no_duplicates([1, 2, 2]);
        assert_eq!(rejected, vec![1, 2]);
        assert_eq!(bag.get_work(), Ok(1));
        assert_eq!(bag.get_work(), Ok(2));
        assert!(!bag.has_work());
    }

    #[test]
    fn history_rejects_processed_items() {
        let mut bag = HistoryAwareWorkBag::fifo();
        bag.add_all_work([1, 2]);
        assert_eq!(bag.get_work(), Ok(1));
        assert!(!bag.add_work_no_duplicates(1));
        bag.add_work(1);
        assert_eq!(bag.get_work(), Ok(2));
        assert!(!bag.has_work());
    }

    #[test]
    fn clear_resets_history() {
        let mut bag = HistoryAwareWorkBag::lifo();
        bag.add_work(1);
        let _ = bag.get_work();
        bag.clear();
        assert!(bag.add_work_no_duplicates(1));
        assert_eq!(bag.get_work(), Ok(1));
    }
}
