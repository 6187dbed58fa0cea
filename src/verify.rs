//! Filepath: src/verify.rs
//!
//! Structural invariant checking.
//!
//! [`BlinkTree::check_invariants`] walks the whole tree under shared latches
//! and verifies every structural invariant the protocols rely on: key-count
//! bands, strict key order, separator bounds, parity of keys and entries,
//! level-chain order against parent entry order, uniform leaf depth, and a
//! cycle-free right chain that covers exactly the tree's keys.
//!
//! The walk is meant for tests and diagnostics at quiescence. Each node read
//! is latch-consistent, but concurrent writers can legitimately skew the
//! cross-node accounting (the entry counter check in particular), so run it
//! while no other thread is mutating the tree.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::TreeError;
use crate::node::{CapacityState, Entries, NodeRef};
use crate::tree::{BlinkTree, ReadGuard};

// ============================================================================
//  TreeStats
// ============================================================================

/// Aggregate shape of a tree, produced by a successful invariant walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of levels, counting the leaf level; zero for an empty tree.
    pub depth: usize,

    /// Total nodes reachable from the root.
    pub node_count: usize,

    /// Leaf nodes among them.
    pub leaf_count: usize,

    /// Key-value pairs stored across all leaves.
    pub key_count: usize,
}

/// Mutable state threaded through the recursive walk.
#[derive(Default)]
struct WalkState {
    visited: HashSet<usize>,
    leaf_depth: Option<usize>,
    stats: TreeStats,
}

impl<K: Ord + Clone, V: Clone> BlinkTree<K, V> {
    /// Verify every structural invariant and report the tree's shape.
    ///
    /// # Errors
    /// [`TreeError::StructuralViolation`] naming the first broken invariant.
    pub fn check_invariants(&self) -> Result<TreeStats, TreeError> {
        let Some(root) = self.load_root() else {
            return Ok(TreeStats::default());
        };
        {
            let guard: ReadGuard<K, V> = root.read_arc();
            if !guard.is_root {
                return Err(TreeError::structural("root handle points at a deposed node"));
            }
        }

        let mut state = WalkState::default();
        self.check_subtree(&root, None, None, None, 0, &mut state)?;
        self.check_leaf_chain(&root, &state.stats)?;

        if state.stats.key_count != self.len() {
            return Err(TreeError::structural(
                "entry counter diverges from leaf contents",
            ));
        }
        let mut stats = state.stats;
        stats.depth = state.leaf_depth.map_or(0, |depth| depth + 1);
        Ok(stats)
    }

    /// Check one node and recurse through its children.
    ///
    /// `lower` is the exclusive lower bound inherited from the separator to
    /// the left; `upper` the inclusive bound this node must not exceed
    /// (`None` on the rightmost path). `expected_right` pins the level chain
    /// to the parent's entry order where a sibling is known.
    fn check_subtree(
        &self,
        node: &NodeRef<K, V>,
        lower: Option<&K>,
        upper: Option<&K>,
        expected_right: Option<&NodeRef<K, V>>,
        depth: usize,
        state: &mut WalkState,
    ) -> Result<(), TreeError> {
        if !state.visited.insert(Arc::as_ptr(node).addr()) {
            return Err(TreeError::structural("node reachable through two parents"));
        }
        state.stats.node_count += 1;

        let guard: ReadGuard<K, V> = node.read_arc();
        if depth > 0 && guard.is_root {
            return Err(TreeError::structural("root flag set below the root"));
        }

        match guard.capacity_state(self.min_order()) {
            CapacityState::Safe => {}
            CapacityState::Underfull => {
                return Err(TreeError::structural("node below the minimum key count"));
            }
            CapacityState::Overfull => {
                return Err(TreeError::structural("node above the maximum key count"));
            }
        }
        if !guard.is_leaf() && guard.len() == 0 {
            return Err(TreeError::structural("internal node with no children"));
        }

        for pair in guard.keys.windows(2) {
            if pair[0] >= pair[1] {
                return Err(TreeError::structural("keys not strictly ascending"));
            }
        }
        if let (Some(lower), Some(first)) = (lower, guard.keys.first()) {
            if first <= lower {
                return Err(TreeError::structural(
                    "key at or below the subtree's lower bound",
                ));
            }
        }
        if let (Some(upper), Some(last)) = (upper, guard.keys.last()) {
            if last > upper {
                return Err(TreeError::structural("key above the subtree's upper bound"));
            }
        }

        if guard.high_key() != upper {
            return Err(TreeError::structural(
                "high key does not match the parent separator",
            ));
        }
        // An internal node's last separator is exactly its bound; a leaf's
        // last key may sit below it after its maximum was deleted.
        if !guard.is_leaf() {
            if let (Some(upper), Some(last)) = (upper, guard.keys.last()) {
                if last != upper {
                    return Err(TreeError::structural(
                        "internal node's last separator is not its bound",
                    ));
                }
            }
        }

        if let Some(expected) = expected_right {
            match guard.right_node() {
                Some(actual) if Arc::ptr_eq(&actual, expected) => {}
                _ => {
                    return Err(TreeError::structural(
                        "right link does not match the parent's entry order",
                    ));
                }
            }
        }

        match &guard.entries {
            Entries::Leaf(values) => {
                if values.len() != guard.keys.len() {
                    return Err(TreeError::structural("leaf key/value parity broken"));
                }
                match state.leaf_depth {
                    None => state.leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Err(TreeError::structural("leaves at unequal depths"));
                    }
                    Some(_) => {}
                }
                state.stats.leaf_count += 1;
                state.stats.key_count += guard.keys.len();
            }
            Entries::Internal(children) => {
                if children.len() != guard.keys.len() {
                    return Err(TreeError::structural("internal key/child parity broken"));
                }
                for (index, child) in children.iter().enumerate() {
                    let child_lower = if index == 0 {
                        lower
                    } else {
                        Some(&guard.keys[index - 1])
                    };
                    let child_upper = if index + 1 < children.len() {
                        Some(&guard.keys[index])
                    } else {
                        upper
                    };
                    self.check_subtree(
                        child,
                        child_lower,
                        child_upper,
                        children.get(index + 1),
                        depth + 1,
                        state,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Walk the leaf chain left to right: ascending throughout, cycle-free,
    /// and covering exactly the keys the subtree walk counted.
    fn check_leaf_chain(&self, root: &NodeRef<K, V>, stats: &TreeStats) -> Result<(), TreeError> {
        let mut guard: ReadGuard<K, V> = root.read_arc();
        loop {
            let next = match guard.child_at(0) {
                Some(child) => child,
                None => break,
            };
            guard = next.read_arc();
        }

        let mut chained_keys = 0_usize;
        let mut last_key: Option<K> = None;
        let mut steps = 0_usize;
        loop {
            steps += 1;
            if steps > stats.node_count {
                return Err(TreeError::structural("right chain cycle"));
            }
            for key in &guard.keys {
                if let Some(prev) = &last_key {
                    if key <= prev {
                        return Err(TreeError::structural("leaf chain keys not ascending"));
                    }
                }
                last_key = Some(key.clone());
            }
            chained_keys += guard.len();
            match guard.right_node() {
                Some(next) => guard = next.read_arc(),
                None => break,
            }
        }

        if chained_keys != stats.key_count {
            return Err(TreeError::structural("leaf chain does not cover every leaf"));
        }
        Ok(())
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "fail fast in tests")]
mod tests {
    use crate::tree::BlinkTree;

    #[test]
    fn empty_tree_passes_with_zero_stats() {
        let tree: BlinkTree<u64, u64> = BlinkTree::new(2);
        let stats = tree.check_invariants().unwrap();
        assert_eq!(stats.depth, 0);
        assert_eq!(stats.key_count, 0);
    }

    #[test]
    fn single_leaf_tree_passes() {
        let tree: BlinkTree<u64, u64> = BlinkTree::new(2);
        for k in [3, 1, 4, 2] {
            tree.insert(k, k).unwrap();
        }
        let stats = tree.check_invariants().unwrap();
        assert_eq!(stats.depth, 1);
        assert_eq!(stats.node_count, 1);
        assert_eq!(stats.leaf_count, 1);
        assert_eq!(stats.key_count, 4);
    }

    #[test]
    fn invariants_hold_through_growth() {
        let tree: BlinkTree<u64, u64> = BlinkTree::new(2);
        for k in 0..512 {
            tree.insert((k * 131) % 512, k).unwrap();
            if k % 64 == 0 {
                tree.check_invariants().unwrap();
            }
        }
        let stats = tree.check_invariants().unwrap();
        assert_eq!(stats.key_count, 512);
        assert!(stats.depth >= 3, "512 keys at order 2 must stack levels");
    }

    #[test]
    fn invariants_hold_through_shrinkage() {
        let tree: BlinkTree<u64, u64> = BlinkTree::new(2);
        for k in 0..256 {
            tree.insert(k, k).unwrap();
        }
        for k in 0..256 {
            tree.delete(&k).unwrap();
            if k % 32 == 0 {
                tree.check_invariants().unwrap();
            }
        }
        let stats = tree.check_invariants().unwrap();
        assert_eq!(stats.key_count, 0);
    }

    #[test]
    fn invariants_hold_under_mixed_churn() {
        let tree: BlinkTree<u64, u64> = BlinkTree::new(3);
        for round in 0_u64..8 {
            for k in 0..128 {
                let key = (k * 89 + round * 7) % 192;
                let _ = tree.insert(key, key);
            }
            for k in 0..64 {
                let key = (k * 53 + round * 11) % 192;
                let _ = tree.delete(&key);
            }
            tree.check_invariants().unwrap();
        }
    }
}
