//! Bounded top-K selection with a deterministic id tie-break.
//!
//! Keeps the best `capacity` items seen so far in a min-heap keyed by
//! `(score, id)`, so selection is `O(n log k)` instead of a full sort. Among
//! equal scores the smaller document id ranks higher, which makes every
//! ordering built on top of this reproducible.

use ordered_float::OrderedFloat;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::record::DocId;

/// Largest heap reserved up front; bigger capacities grow on demand.
const MAX_PREALLOCATED: usize = 1024;

/// Min-heap of the `capacity` best items by score, ties broken by id.
#[derive(Debug)]
pub struct BoundedTopK<T> {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked<T>>>,
}

impl<T> BoundedTopK<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.min(MAX_PREALLOCATED)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Offer an item. Returns `false` if it was rejected (or evicted nothing
    /// better). NaN scores sort below every real score.
    pub fn push(&mut self, score: f64, id: DocId, item: T) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let score = if score.is_nan() { f64::NEG_INFINITY } else { score };
        let entry = Ranked {
            score: OrderedFloat(score),
            id,
            item,
        };

        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(entry));
            return true;
        }

        match self.heap.peek() {
            Some(Reverse(worst)) if entry > *worst => {
                self.heap.pop();
                self.heap.push(Reverse(entry));
                true
            }
            _ => false,
        }
    }

    /// Drain into a vector ordered best-first: score descending, id ascending.
    #[must_use]
    pub fn into_sorted_vec(self) -> Vec<(f64, DocId, T)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(r)| (r.score.into_inner(), r.id, r.item))
            .collect()
    }
}

#[derive(Debug)]
struct Ranked<T> {
    score: OrderedFloat<f64>,
    id: DocId,
    item: T,
}

impl<T> Ord for Ranked<T> {
    /// Greater means better: higher score, then smaller id.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Ranked<T> {}

/// Compare two `(score, id)` keys best-first; used to sort outside the heap.
#[must_use]
pub fn best_first(a: (f64, DocId), b: (f64, DocId)) -> Ordering {
    OrderedFloat(b.0)
        .cmp(&OrderedFloat(a.0))
        .then_with(|| a.1.cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<T>(topk: BoundedTopK<T>) -> Vec<DocId> {
        topk.into_sorted_vec().into_iter().map(|(_, id, _)| id).collect()
    }

    #[test]
    fn keeps_only_the_best_capacity_items() {
        let mut topk = BoundedTopK::new(3);
        for (id, score) in [(1, 0.1), (2, 0.9), (3, 0.5), (4, 0.7), (5, 0.3)] {
            topk.push(score, id, ());
        }
        assert_eq!(topk.len(), 3);
        assert_eq!(ids(topk), vec![2, 4, 3]);
    }

    #[test]
    fn ties_prefer_smaller_ids() {
        let mut topk = BoundedTopK::new(2);
        topk.push(0.5, 9, ());
        topk.push(0.5, 3, ());
        topk.push(0.5, 5, ());
        assert_eq!(ids(topk), vec![3, 5]);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let items = [(10, 0.2), (11, 0.2), (12, 0.8), (13, 0.4)];
        let mut forward = BoundedTopK::new(3);
        let mut backward = BoundedTopK::new(3);
        for &(id, s) in &items {
            forward.push(s, id, ());
        }
        for &(id, s) in items.iter().rev() {
            backward.push(s, id, ());
        }
        assert_eq!(ids(forward), ids(backward));
    }

    #[test]
    fn zero_capacity_accepts_nothing() {
        let mut topk = BoundedTopK::new(0);
        assert!(!topk.push(1.0, 1, "x"));
        assert!(topk.is_empty());
    }

    #[test]
    fn unbounded_capacity_allocates_lazily() {
        let mut topk = BoundedTopK::new(usize::MAX);
        topk.push(0.2, 2, ());
        topk.push(0.7, 1, ());
        assert_eq!(ids(topk), vec![1, 2]);
    }

    #[test]
    fn nan_sorts_last() {
        let mut topk = BoundedTopK::new(3);
        topk.push(f64::NAN, 1, ());
        topk.push(0.0, 2, ());
        topk.push(-1.0, 3, ());
        assert_eq!(ids(topk), vec![2, 3, 1]);
    }

    #[test]
    fn best_first_orders_by_score_then_id() {
        let mut keys = vec![(0.1, 4), (0.9, 7), (0.9, 2)];
        keys.sort_by(|a, b| best_first(*a, *b));
        assert_eq!(keys, vec![(0.9, 2), (0.9, 7), (0.1, 4)]);
    }
}
