//! Filepath: src/tree.rs
//!
//! The tree: descent protocols, structural-change propagation, root
//! management.
//!
//! [`BlinkTree`] composes the node-local operations into full insert,
//! search, and delete protocols. Traversal is hand-over-hand: a child's (or
//! right sibling's) latch is always acquired before the current node's latch
//! is released, so a reachable node is never observed unlatched.
//!
//! # Latch Order
//!
//! Latches are acquired in a single global order - downward by level, then
//! rightward along a level - which makes cycles, and therefore deadlock,
//! impossible by construction. The root handle's own latch is held only long
//! enough to clone or swap the handle, never while blocking on a node latch.
//!
//! # Write Protocol (insert)
//!
//! ```text
//! 1. load root handle                      // no node latch held
//! 2. descend, exclusive latch coupling
//!    - child at capacity  -> retain current latch on the ancestor chain
//!    - child has slack    -> release the entire retained chain
//! 3. leaf: insert locally                  // linearization point
//! 4. overfull? split under the leaf latch, then hand the promoted
//!    separator to the nearest retained ancestor, moving right at that
//!    level if its coverage has shifted; repeat upward
//! 5. topmost split at the root: build the new root, publish the handle
//! ```
//!
//! Deletes mirror the protocol with the symmetric retention rule (ancestor
//! retained while the child sits at the minimum) and merge/borrow instead of
//! split.

use std::fmt as StdFmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};

use crate::error::TreeError;
use crate::node::{CapacityState, Locate, Node, NodeRef, ScanOutcome};
use crate::tracing_helpers::{debug_log, trace_log};

/// Shared-mode latch guard that owns its node handle.
pub(crate) type ReadGuard<K, V> = ArcRwLockReadGuard<RawRwLock, Node<K, V>>;

/// Exclusive-mode latch guard that owns its node handle.
pub(crate) type WriteGuard<K, V> = ArcRwLockWriteGuard<RawRwLock, Node<K, V>>;

/// Retries for re-descending separator propagation before treating the
/// situation as an invariant violation. More than one or two rounds means
/// the parent level is being rewritten under us faster than the tree can
/// legally change, not normal contention.
const SEPARATOR_RETRY_LIMIT: usize = 16;

// ============================================================================
//  BlinkTree
// ============================================================================

/// A concurrent ordered index over unique keys.
///
/// Point insert, point search, and point delete run concurrently from many
/// threads; readers take shared latches, writers exclusive ones, and every
/// structural change (split, merge, root change) completes under the latches
/// of the nodes it rewires. Each operation is atomic from the caller's point
/// of view.
///
/// # Type Parameters
/// - `K` - key type; totally ordered, copied into separators (`Ord + Clone`)
/// - `V` - opaque value handle stored in leaves (`Clone`)
///
/// # Example
///
/// ```rust
/// use blinktree::BlinkTree;
///
/// let tree: BlinkTree<u64, String> = BlinkTree::new(2);
/// tree.insert(7, "seven".to_owned()).unwrap();
/// assert_eq!(tree.search(&7).unwrap(), "seven");
/// tree.delete(&7).unwrap();
/// assert!(tree.search(&7).is_err());
/// ```
pub struct BlinkTree<K, V> {
    /// Root handle; swapped atomically under its own latch on root split and
    /// root shrink, published only after the new root's children are fully
    /// linked.
    root: RwLock<Option<NodeRef<K, V>>>,

    /// Minimum order `B`: every non-root node holds between `B` and `2B`
    /// keys.
    min_order: usize,

    /// Number of key-value pairs.
    count: AtomicUsize,
}

impl<K, V> StdFmt::Debug for BlinkTree<K, V> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("BlinkTree")
            .field("len", &self.len())
            .field("min_order", &self.min_order)
            .finish_non_exhaustive()
    }
}

impl<K, V> BlinkTree<K, V> {
    /// Create an empty tree with minimum order `min_order`.
    ///
    /// Every non-root node will hold between `min_order` and
    /// `2 * min_order` keys.
    ///
    /// # Panics
    /// If `min_order` is zero.
    #[must_use]
    pub fn new(min_order: usize) -> Self {
        assert!(min_order >= 1, "min_order must be at least 1");
        Self {
            root: RwLock::new(None),
            min_order,
            count: AtomicUsize::new(0),
        }
    }

    /// The minimum order `B` this tree was built with.
    #[inline]
    #[must_use]
    pub fn min_order(&self) -> usize {
        self.min_order
    }

    /// Number of key-value pairs in the tree.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.count.load(AtomicOrdering::Relaxed)
    }

    /// Whether the tree holds no keys.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone the current root handle.
    ///
    /// The root latch is held only for the clone, never while a node latch
    /// is acquired; the handle may therefore point at a just-deposed root.
    /// Descents recover from that staleness by moving right.
    pub(crate) fn load_root(&self) -> Option<NodeRef<K, V>> {
        self.root.read().as_ref().map(Arc::clone)
    }
}

impl<K: Ord + Clone, V: Clone> BlinkTree<K, V> {
    // ========================================================================
    //  Search
    // ========================================================================

    /// Look up the value stored under `key`.
    ///
    /// Takes shared latches hand-over-hand down the tree, moving right
    /// whenever a concurrent split has shifted coverage past the visited
    /// node's high key.
    ///
    /// # Errors
    /// [`TreeError::KeyNotFound`] if the key is not present.
    pub fn search(&self, key: &K) -> Result<V, TreeError> {
        let Some(root) = self.load_root() else {
            return Err(TreeError::KeyNotFound);
        };
        let mut guard: ReadGuard<K, V> = root.read_arc();
        loop {
            match guard.scan(key) {
                ScanOutcome::Right(next) => {
                    trace_log!("search: moving right");
                    guard = next.read_arc();
                }
                ScanOutcome::Child(child) => {
                    guard = child.read_arc();
                }
                ScanOutcome::Here => {
                    return match guard.locate(key) {
                        Locate::Found(index) => match guard.value_at(index) {
                            Some(value) => Ok(value.clone()),
                            None => Err(TreeError::structural(
                                "scan resolved on an internal node",
                            )),
                        },
                        Locate::NotFound(_) => Err(TreeError::KeyNotFound),
                    };
                }
            }
        }
    }

    // ========================================================================
    //  Insert
    // ========================================================================

    /// Insert `key` mapped to `value`.
    ///
    /// # Errors
    /// [`TreeError::DuplicateKey`] if the key is already present; the tree
    /// is unchanged and every retained latch is released as held.
    pub fn insert(&self, key: K, value: V) -> Result<(), TreeError> {
        let entry = match self.load_root() {
            Some(root) => root,
            None => {
                // First insert: install the singleton root leaf, re-checked
                // under the root latch in case another thread won the race.
                let mut slot = self.root.write();
                match slot.as_ref() {
                    Some(root) => Arc::clone(root),
                    None => {
                        *slot = Some(Node::new_root_leaf(key, value));
                        drop(slot);
                        self.count.fetch_add(1, AtomicOrdering::Relaxed);
                        return Ok(());
                    }
                }
            }
        };
        self.insert_from(entry, key, value)
    }

    /// Exclusive descent to the covering leaf, then local insert and any
    /// split cascade.
    fn insert_from(&self, entry: NodeRef<K, V>, key: K, value: V) -> Result<(), TreeError> {
        let mut retained: Vec<WriteGuard<K, V>> = Vec::new();
        let mut guard: WriteGuard<K, V> = entry.write_arc();
        loop {
            match guard.scan(&key) {
                ScanOutcome::Right(next) => {
                    trace_log!("insert: moving right");
                    guard = next.write_arc();
                }
                ScanOutcome::Child(child) => {
                    guard.raise_last_separator(&key);
                    let child_guard = child.write_arc();
                    if child_guard.at_capacity(self.min_order) {
                        // The child may split; its separator will need this
                        // node. Keep the latch on the ancestor chain.
                        retained.push(guard);
                    } else {
                        // The child cannot overflow, so nothing above needs
                        // modification: release the whole chain.
                        retained.clear();
                    }
                    guard = child_guard;
                }
                ScanOutcome::Here => break,
            }
        }

        guard.insert_local(key, value)?;
        self.count.fetch_add(1, AtomicOrdering::Relaxed);
        if guard.capacity_state(self.min_order) != CapacityState::Overfull {
            return Ok(());
        }
        self.split_upward(guard, retained)
    }

    /// Split the overfull node under `guard` and push separators up the
    /// retained chain until every level fits.
    ///
    /// Latches release bottom-up as each level's change completes.
    fn split_upward(
        &self,
        mut guard: WriteGuard<K, V>,
        mut retained: Vec<WriteGuard<K, V>>,
    ) -> Result<(), TreeError> {
        loop {
            let left = Arc::clone(ArcRwLockWriteGuard::rwlock(&guard));
            let (separator, right) = guard.split();
            debug_log!(left_len = guard.len(), "split");

            if guard.is_root {
                return self.grow_root(guard, separator, &left, right);
            }
            // This level's relink is complete and visible; release before
            // touching the parent level.
            drop(guard);

            let Some(parent) = retained.pop() else {
                // Entered at a since-deposed root, so no ancestor latch is
                // held: find the parent level again from the current root.
                return self.install_from_root(separator, &left, right);
            };
            let mut parent = Self::move_right_for_separator(parent, &separator);
            parent.install_split(separator, &left, right)?;
            if parent.capacity_state(self.min_order) != CapacityState::Overfull {
                return Ok(());
            }
            guard = parent;
        }
    }

    /// Build and publish a new root above a just-split old root.
    ///
    /// The right half's last key bounds everything the old root bounded, so
    /// the pair of separators keeps the new root's keys exact subtree
    /// maxima.
    fn grow_root(
        &self,
        mut old_root: WriteGuard<K, V>,
        separator: K,
        left: &NodeRef<K, V>,
        right: NodeRef<K, V>,
    ) -> Result<(), TreeError> {
        let right_max = match right.read().keys.last().cloned() {
            Some(key) => key,
            None => {
                return Err(TreeError::structural("split produced an empty right half"));
            }
        };
        let new_root =
            Node::new_root_internal(vec![separator, right_max], vec![Arc::clone(left), right]);
        old_root.is_root = false;
        // Publish only after both children are fully linked. The deposed
        // root keeps its content, so traversals still holding its handle
        // route through it correctly.
        *self.root.write() = Some(new_root);
        debug_log!("root split");
        Ok(())
    }

    /// Walk right along one level until the node covering `separator` is
    /// latched.
    fn move_right_for_separator(mut guard: WriteGuard<K, V>, separator: &K) -> WriteGuard<K, V> {
        loop {
            let next = match &guard.right {
                Some(link) if *separator > link.high => Arc::clone(&link.node),
                _ => return guard,
            };
            trace_log!("separator install: moving right");
            guard = next.write_arc();
        }
    }

    /// Deliver a promoted separator when no ancestor latch was retained.
    ///
    /// Happens only when the split node was entered directly from a stale
    /// root handle. Re-descend from the current root to the level above
    /// `left` and install there; if `left` itself has been re-published as
    /// the root in the meantime, grow a level over the two halves instead.
    fn install_from_root(
        &self,
        separator: K,
        left: &NodeRef<K, V>,
        right: NodeRef<K, V>,
    ) -> Result<(), TreeError> {
        for _ in 0..SEPARATOR_RETRY_LIMIT {
            let Some(root) = self.load_root() else {
                return Err(TreeError::structural(
                    "separator propagation on an empty tree",
                ));
            };

            if Arc::ptr_eq(&root, left) {
                let guard = left.write_arc();
                if guard.is_root {
                    return self.grow_root(guard, separator, left, right);
                }
                // Deposed again before we latched it; try again from the
                // fresh root handle.
                drop(guard);
                continue;
            }

            let mut retained: Vec<WriteGuard<K, V>> = Vec::new();
            let mut guard: WriteGuard<K, V> = root.write_arc();
            loop {
                match guard.scan(&separator) {
                    ScanOutcome::Right(next) => {
                        guard = next.write_arc();
                    }
                    ScanOutcome::Here => {
                        return Err(TreeError::structural(
                            "separator descent reached the leaf level",
                        ));
                    }
                    ScanOutcome::Child(child) => {
                        if Arc::ptr_eq(&child, left) {
                            // This node is the parent: install here and let
                            // any overflow cascade with the chain retained
                            // during this descent.
                            guard.install_split(separator, left, right)?;
                            if guard.capacity_state(self.min_order) != CapacityState::Overfull {
                                return Ok(());
                            }
                            return self.split_upward(guard, retained);
                        }
                        let child_guard = child.write_arc();
                        if child_guard.at_capacity(self.min_order) {
                            retained.push(guard);
                        } else {
                            retained.clear();
                        }
                        guard = child_guard;
                    }
                }
            }
        }
        Err(TreeError::structural(
            "separator propagation could not find the parent level",
        ))
    }

    // ========================================================================
    //  Delete
    // ========================================================================

    /// Remove `key` and its value.
    ///
    /// # Errors
    /// [`TreeError::KeyNotFound`] if the key is not present; the tree is
    /// unchanged.
    pub fn delete(&self, key: &K) -> Result<(), TreeError> {
        let Some(root) = self.load_root() else {
            return Err(TreeError::KeyNotFound);
        };

        let mut retained: Vec<WriteGuard<K, V>> = Vec::new();
        let mut guard: WriteGuard<K, V> = root.write_arc();
        loop {
            match guard.scan(key) {
                ScanOutcome::Right(next) => {
                    trace_log!("delete: moving right");
                    guard = next.write_arc();
                }
                ScanOutcome::Child(child) => {
                    let child_guard = child.write_arc();
                    if child_guard.at_minimum(self.min_order) {
                        // One removal could underfill the child; its merge
                        // would need this node. Keep the latch.
                        retained.push(guard);
                    } else {
                        retained.clear();
                    }
                    guard = child_guard;
                }
                ScanOutcome::Here => break,
            }
        }

        guard.remove_local(key)?;
        self.count.fetch_sub(1, AtomicOrdering::Relaxed);
        // A root leaf legally holds any count down to zero.
        if guard.is_root || guard.len() >= self.min_order {
            return Ok(());
        }
        self.rebalance_upward(guard, retained)
    }

    /// Repair the underfull node under `guard`, propagating separator
    /// removal up the retained chain as merges consume them.
    fn rebalance_upward(
        &self,
        mut guard: WriteGuard<K, V>,
        mut retained: Vec<WriteGuard<K, V>>,
    ) -> Result<(), TreeError> {
        loop {
            let Some(mut parent) = retained.pop() else {
                // No ancestor latch retained (entered at a deposed root).
                // Leave the node transiently underfull: the link invariants
                // keep it fully searchable, and a later delete through it
                // repairs it.
                return Ok(());
            };
            let child_arc = Arc::clone(ArcRwLockWriteGuard::rwlock(&guard));
            let Some(at) = parent.position_of(&child_arc) else {
                // A move-right during descent landed us under a different
                // parent than the one retained; repairing through the wrong
                // parent would corrupt the level chain.
                return Ok(());
            };

            let merged = if at + 1 < parent.len() {
                self.repair_with_right(&mut parent, at, guard)?
            } else if at > 0 {
                self.repair_with_left(&mut parent, at, guard, &child_arc)?
            } else {
                // Lone child: no sibling under this parent to pair with. An
                // internal root with a single child gives up a level; the
                // order-1 non-root case leaves the child transiently empty
                // but fully searchable until an insert refills it.
                drop(guard);
                if parent.is_root {
                    return self.shrink_root(parent);
                }
                return Ok(());
            };
            if !merged {
                return Ok(());
            }

            // The merge consumed one parent separator.
            if parent.is_root {
                return self.shrink_root(parent);
            }
            if parent.len() >= self.min_order {
                return Ok(());
            }
            guard = parent;
        }
    }

    /// Absorb or borrow from the right sibling under the same parent.
    ///
    /// Returns whether a merge removed a parent separator.
    fn repair_with_right(
        &self,
        parent: &mut WriteGuard<K, V>,
        at: usize,
        mut guard: WriteGuard<K, V>,
    ) -> Result<bool, TreeError> {
        let Some(sibling) = parent.child_at(at + 1) else {
            return Err(TreeError::structural("missing right sibling entry"));
        };
        // The pair must match the physical chain. A mismatch means a
        // concurrent split's separator has not landed in this parent yet;
        // repairing across that window would orphan the unpublished node.
        let linked = match &guard.right {
            Some(link) => Arc::ptr_eq(&link.node, &sibling),
            None => false,
        };
        if !linked {
            return Ok(false);
        }
        let mut sibling_guard: WriteGuard<K, V> = sibling.write_arc();
        if !Self::bound_matches(parent, at + 1, &sibling_guard) {
            return Ok(false);
        }

        if guard.len() + sibling_guard.len() <= 2 * self.min_order {
            guard.absorb_right(&mut sibling_guard)?;
            parent.remove_merged(at)?;
            debug_log!(merged_len = guard.len(), "merge with right sibling");
            return Ok(true);
        }

        // Combined load cannot fit one node: rotate entries over instead.
        while guard.len() < self.min_order {
            let separator = guard.borrow_from_right(&mut sibling_guard)?;
            parent.set_separator(at, separator)?;
        }
        debug_log!("borrow from right sibling");
        Ok(false)
    }

    /// Absorb into or borrow from the left sibling under the same parent.
    ///
    /// The level's latch order is strictly rightward, so the underfull
    /// child's latch is released and retaken after the left sibling's; the
    /// pair is revalidated after the window.
    fn repair_with_left(
        &self,
        parent: &mut WriteGuard<K, V>,
        at: usize,
        guard: WriteGuard<K, V>,
        child_arc: &NodeRef<K, V>,
    ) -> Result<bool, TreeError> {
        if at == 0 {
            return Err(TreeError::structural("left repair on a lone child"));
        }
        let Some(prev) = parent.child_at(at - 1) else {
            return Err(TreeError::structural("missing left sibling entry"));
        };
        drop(guard);
        let mut prev_guard: WriteGuard<K, V> = prev.write_arc();
        let mut child_guard: WriteGuard<K, V> = child_arc.write_arc();

        // Revalidate: still physically adjacent, bounded as the parent
        // believes, and still deficient. The parent stayed latched, so no
        // structural change slid past it; an insert arriving over a right
        // link may have refilled the child, which makes the repair moot.
        let linked = match &prev_guard.right {
            Some(link) => Arc::ptr_eq(&link.node, child_arc),
            None => false,
        };
        if !linked
            || !Self::bound_matches(parent, at - 1, &prev_guard)
            || !Self::bound_matches(parent, at, &child_guard)
            || child_guard.len() >= self.min_order
        {
            return Ok(false);
        }

        if prev_guard.len() + child_guard.len() <= 2 * self.min_order {
            prev_guard.absorb_right(&mut child_guard)?;
            parent.remove_merged(at - 1)?;
            debug_log!(merged_len = prev_guard.len(), "merge into left sibling");
            return Ok(true);
        }

        while child_guard.len() < self.min_order {
            let separator = child_guard.borrow_from_left(&mut prev_guard)?;
            parent.set_separator(at - 1, separator)?;
        }
        debug_log!("borrow from left sibling");
        Ok(false)
    }

    /// Whether the parent's separator for `children[index]` equals the
    /// child's own high key. A mismatch flags an in-flight split whose
    /// separator has not landed yet.
    fn bound_matches(parent: &WriteGuard<K, V>, index: usize, child: &WriteGuard<K, V>) -> bool {
        let expected: Option<&K> = if index + 1 < parent.len() {
            parent.keys.get(index)
        } else {
            parent.high_key()
        };
        child.high_key() == expected
    }

    /// Replace an internal root left with a single child by that child.
    fn shrink_root(&self, mut root_guard: WriteGuard<K, V>) -> Result<(), TreeError> {
        // A root leaf legally shrinks to zero keys; only an internal root
        // with a single child gives up a level.
        if root_guard.is_leaf() || root_guard.len() > 1 {
            return Ok(());
        }
        let Some(child) = root_guard.child_at(0) else {
            return Err(TreeError::structural("internal root with no children"));
        };
        let mut child_guard: WriteGuard<K, V> = child.write_arc();
        child_guard.is_root = true;
        root_guard.is_root = false;
        // The deposed root keeps its routing entry so traversals still
        // holding its handle descend through it correctly.
        *self.root.write() = Some(Arc::clone(&child));
        debug_log!("root shrink");
        Ok(())
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "fail fast in tests")]
mod tests {
    use super::*;

    fn tree_with(order: usize, keys: &[u64]) -> BlinkTree<u64, u64> {
        let tree = BlinkTree::new(order);
        for &k in keys {
            tree.insert(k, k * 10).unwrap();
        }
        tree
    }

    #[test]
    fn empty_tree_finds_nothing() {
        let tree: BlinkTree<u64, u64> = BlinkTree::new(2);
        assert_eq!(tree.search(&1), Err(TreeError::KeyNotFound));
        assert_eq!(tree.delete(&1), Err(TreeError::KeyNotFound));
        assert!(tree.is_empty());
    }

    #[test]
    #[should_panic(expected = "min_order must be at least 1")]
    fn zero_order_is_rejected() {
        let _tree: BlinkTree<u64, u64> = BlinkTree::new(0);
    }

    #[test]
    fn insert_then_search_returns_the_value() {
        let tree = tree_with(2, &[10, 20, 30]);
        assert_eq!(tree.search(&10).unwrap(), 100);
        assert_eq!(tree.search(&20).unwrap(), 200);
        assert_eq!(tree.search(&30).unwrap(), 300);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn duplicate_insert_fails_and_keeps_the_original() {
        let tree = tree_with(2, &[10]);
        assert_eq!(tree.insert(10, 999), Err(TreeError::DuplicateKey));
        assert_eq!(tree.search(&10).unwrap(), 100);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn fifth_insert_splits_the_root_leaf() {
        // Order 2: a leaf holds at most four keys. The fifth forces a split
        // with three keys in the lower half, and the separator stays in the
        // left leaf as live data.
        let tree = tree_with(2, &[10, 20, 30, 40, 50]);

        let root = tree.load_root().unwrap();
        let root = root.read();
        assert!(!root.is_leaf());
        assert_eq!(root.keys, vec![30, 50]);

        let left = root.child_at(0).unwrap();
        let left = left.read();
        assert_eq!(left.keys, vec![10, 20, 30]);
        let right = root.child_at(1).unwrap();
        let right = right.read();
        assert_eq!(right.keys, vec![40, 50]);

        // The separator key is still a data key with its original value.
        assert_eq!(tree.search(&30).unwrap(), 300);
        assert_eq!(tree.search(&40).unwrap(), 400);
    }

    #[test]
    fn ascending_inserts_stay_searchable() {
        let tree = tree_with(2, &[]);
        for k in 0..200 {
            tree.insert(k, k).unwrap();
        }
        for k in 0..200 {
            assert_eq!(tree.search(&k).unwrap(), k, "key {k}");
        }
        assert_eq!(tree.len(), 200);
    }

    #[test]
    fn descending_inserts_stay_searchable() {
        let tree = tree_with(3, &[]);
        for k in (0..200).rev() {
            tree.insert(k, k).unwrap();
        }
        for k in 0..200 {
            assert_eq!(tree.search(&k).unwrap(), k, "key {k}");
        }
    }

    #[test]
    fn delete_removes_only_the_target() {
        let tree = tree_with(2, &[10, 20, 30, 40, 50, 60, 70]);
        tree.delete(&40).unwrap();
        assert_eq!(tree.search(&40), Err(TreeError::KeyNotFound));
        for k in [10, 20, 30, 50, 60, 70] {
            assert_eq!(tree.search(&k).unwrap(), k * 10, "key {k}");
        }
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn delete_merges_an_underfull_leaf() {
        // Order 2, seven keys: root [30, 70] over leaves [10,20,30] and
        // [40,50,60,70]. Hollow out the left leaf until it underflows; the
        // merge must remove exactly one parent separator.
        let tree = tree_with(2, &[10, 20, 30, 40, 50, 60, 70]);
        {
            let root = tree.load_root().unwrap();
            assert_eq!(root.read().keys.len(), 2);
        }

        tree.delete(&10).unwrap();
        tree.delete(&20).unwrap();

        for k in [30, 40, 50, 60, 70] {
            assert_eq!(tree.search(&k).unwrap(), k * 10, "key {k}");
        }
    }

    #[test]
    fn merge_removes_exactly_one_parent_separator() {
        // Order 2, nine keys by tens: root [30, 60, 90] over three leaves.
        // Hollowing the middle leaf to one key merges it with its right
        // sibling (combined four keys fit) and costs the root exactly one
        // separator.
        let tree = tree_with(2, &[10, 20, 30, 40, 50, 60, 70, 80, 90]);
        {
            let root = tree.load_root().unwrap();
            assert_eq!(root.read().keys, vec![30, 60, 90]);
        }

        tree.delete(&40).unwrap();
        tree.delete(&50).unwrap();

        {
            let root = tree.load_root().unwrap();
            let root = root.read();
            assert_eq!(root.keys, vec![30, 90]);
            let merged = root.child_at(1).unwrap();
            assert_eq!(merged.read().keys, vec![60, 70, 80, 90]);
        }
        for k in [10, 20, 30, 60, 70, 80, 90] {
            assert_eq!(tree.search(&k).unwrap(), k * 10, "key {k}");
        }
        tree.check_invariants().unwrap();
    }

    #[test]
    fn delete_to_empty_and_reinsert() {
        let keys: Vec<u64> = (1..=40).collect();
        let tree = tree_with(2, &keys);
        for k in &keys {
            tree.delete(k).unwrap();
        }
        assert!(tree.is_empty());
        for k in &keys {
            assert_eq!(tree.search(k), Err(TreeError::KeyNotFound));
        }

        tree.insert(5, 50).unwrap();
        assert_eq!(tree.search(&5).unwrap(), 50);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn interleaved_insert_delete_search() {
        let tree: BlinkTree<u64, u64> = BlinkTree::new(2);
        for k in 0..100 {
            tree.insert(k, k).unwrap();
        }
        for k in (0..100).step_by(2) {
            tree.delete(&k).unwrap();
        }
        for k in 0..100 {
            let got = tree.search(&k);
            if k % 2 == 0 {
                assert_eq!(got, Err(TreeError::KeyNotFound), "key {k}");
            } else {
                assert_eq!(got.unwrap(), k, "key {k}");
            }
        }
        assert_eq!(tree.len(), 50);
    }

    #[test]
    fn order_one_tree_works() {
        let tree: BlinkTree<u64, u64> = BlinkTree::new(1);
        for k in [5, 3, 8, 1, 9, 7, 2, 6, 4] {
            tree.insert(k, k * 2).unwrap();
        }
        for k in 1..=9 {
            assert_eq!(tree.search(&k).unwrap(), k * 2, "key {k}");
        }
        for k in 1..=9 {
            tree.delete(&k).unwrap();
        }
        assert!(tree.is_empty());
    }
}
