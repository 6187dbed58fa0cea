//! # `blinktree`
//!
//! A concurrent ordered index: a latch-coupled B-link tree.
//!
//! Every node carries a link to its right sibling alongside its high key, so
//! a traversal that lands on a node whose coverage was shifted by a
//! concurrent split recovers by moving right instead of restarting. Combined
//! with hand-over-hand latch coupling (shared for reads, exclusive for
//! writes) this lets readers and writers work the tree simultaneously with
//! no global lock.
//!
//! | Operation | Latching | Structural changes |
//! |-----------|----------|--------------------|
//! | `search`  | shared, hand-over-hand | none |
//! | `insert`  | exclusive, retains at-capacity ancestors | splits cascade up the retained chain |
//! | `delete`  | exclusive, retains at-minimum ancestors | merges/borrows cascade up the retained chain |
//! | `iter`    | one shared leaf latch at a time | none |
//!
//! ## Guarantees
//!
//! - Unique keys: inserting a present key fails with
//!   [`TreeError::DuplicateKey`] and changes nothing.
//! - Linearizable per key: two operations on the same key order at the
//!   latches they contend for; disjoint keys need no coordination.
//! - Every non-root node keeps between `B` and `2B` keys for the chosen
//!   minimum order `B`; the root is exempt downwards.
//! - A node unlinked by a merge or root shrink stays readable for every
//!   traversal still holding a handle to it; memory is reclaimed when the
//!   last handle drops.
//!
//! ## Example
//!
//! ```rust
//! use blinktree::BlinkTree;
//!
//! let tree: BlinkTree<u32, &str> = BlinkTree::new(2);
//! tree.insert(2, "two").unwrap();
//! tree.insert(1, "one").unwrap();
//! tree.insert(3, "three").unwrap();
//!
//! assert_eq!(tree.search(&2).unwrap(), "two");
//!
//! let keys: Vec<u32> = tree.iter().map(|(k, _)| k).collect();
//! assert_eq!(keys, vec![1, 2, 3]);
//!
//! tree.delete(&2).unwrap();
//! assert!(tree.search(&2).is_err());
//! ```
//!
//! ## Non-goals
//!
//! Range cursors beyond leaf-chain traversal, transactional or MVCC
//! semantics, crash recovery, and on-disk layouts are out of scope. Keys and
//! values are opaque to the tree; a hosting engine supplies encoding and any
//! page mapping.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod iter;
mod node;
mod tracing_helpers;
mod tree;
mod verify;

pub use error::TreeError;
pub use iter::Iter;
pub use tree::BlinkTree;
pub use verify::TreeStats;
