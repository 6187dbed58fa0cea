//! Filepath: src/iter.rs
//!
//! Ascending iteration over the leaf chain.
//!
//! Leaves linked by their right siblings form a single ascending chain.
//! [`Iter`] holds one leaf latch (shared mode) at a time and advances along
//! the chain, coupling the next leaf's latch before releasing the current
//! one so a step can never land on a node unlinked mid-step.
//!
//! Iteration is **not** a snapshot: keys inserted or removed concurrently
//! may or may not be observed, but relative to each leaf's content at the
//! moment it is visited, no key is skipped or duplicated. An iterator is
//! restartable from any lower bound via [`BlinkTree::range_from`].
//!
//! Writers contending for a visited leaf block until the iterator moves on;
//! keep heavy per-item work outside the loop when writers are hot.

use std::fmt as StdFmt;

use crate::node::{Locate, ScanOutcome};
use crate::tree::{BlinkTree, ReadGuard};

// ============================================================================
//  Iter
// ============================================================================

/// Lazy ascending `(key, value)` sequence over a tree's leaf chain.
///
/// Created by [`BlinkTree::iter`] or [`BlinkTree::range_from`]. Holds one
/// leaf's shared latch between calls to `next`.
pub struct Iter<K, V> {
    /// Current leaf and the index of the next pair to yield; `None` once
    /// exhausted.
    cursor: Option<(ReadGuard<K, V>, usize)>,
}

impl<K, V> StdFmt::Debug for Iter<K, V> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("Iter")
            .field("exhausted", &self.cursor.is_none())
            .finish_non_exhaustive()
    }
}

impl<K: Ord + Clone, V: Clone> Iterator for Iter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        loop {
            let (guard, index) = self.cursor.as_mut()?;
            if *index < guard.len() {
                let key = guard.keys[*index].clone();
                let value = guard.value_at(*index)?.clone();
                *index += 1;
                return Some((key, value));
            }
            // Leaf exhausted (possibly empty): step right, latches coupled.
            match guard.right_node() {
                Some(next) => {
                    let next_guard = next.read_arc();
                    self.cursor = Some((next_guard, 0));
                }
                None => {
                    self.cursor = None;
                    return None;
                }
            }
        }
    }
}

// ============================================================================
//  Constructors
// ============================================================================

impl<K: Ord + Clone, V: Clone> BlinkTree<K, V> {
    /// Iterate every pair in ascending key order.
    ///
    /// Descends to the leftmost leaf with shared latches and walks the leaf
    /// chain from there. See the module docs for the consistency contract.
    #[must_use]
    pub fn iter(&self) -> Iter<K, V> {
        let Some(root) = self.load_root() else {
            return Iter { cursor: None };
        };
        let mut guard: ReadGuard<K, V> = root.read_arc();
        loop {
            let next = match guard.child_at(0) {
                Some(child) => child,
                None => break,
            };
            guard = next.read_arc();
        }
        Iter {
            cursor: Some((guard, 0)),
        }
    }

    /// Iterate pairs with keys `>= bound` in ascending order.
    ///
    /// This is the restart point for consumers that released an iterator and
    /// want to continue from where they stopped: re-supply the last seen key
    /// and skip the first pair, or supply its successor.
    #[must_use]
    pub fn range_from(&self, bound: &K) -> Iter<K, V> {
        let Some(root) = self.load_root() else {
            return Iter { cursor: None };
        };
        let mut guard: ReadGuard<K, V> = root.read_arc();
        loop {
            match guard.scan(bound) {
                ScanOutcome::Right(next) => guard = next.read_arc(),
                ScanOutcome::Child(child) => guard = child.read_arc(),
                ScanOutcome::Here => break,
            }
        }
        let index = match guard.locate(bound) {
            Locate::Found(index) | Locate::NotFound(index) => index,
        };
        Iter {
            cursor: Some((guard, index)),
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================
