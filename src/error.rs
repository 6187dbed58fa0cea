//! Filepath: src/error.rs
//!
//! Error taxonomy for tree operations.
//!
//! All failure modes are returned to the caller as explicit outcomes; no
//! operation leaves the tree partially mutated. The move-right loop during
//! descent is a designed recovery path, not an error, and never surfaces
//! here.

use std::error::Error;
use std::fmt as StdFmt;

// ============================================================================
//  TreeError
// ============================================================================

/// Errors produced by tree operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Insert of a key that is already present. Non-fatal; the tree is
    /// unchanged.
    DuplicateKey,

    /// Search or delete of a key that is not present. Non-fatal; the tree is
    /// unchanged.
    KeyNotFound,

    /// An internal consistency check failed: a node observed outside its
    /// legal key-count band, a right-chain cycle, a separator that routes to
    /// the wrong child. Fatal; indicates a latching or propagation bug and
    /// must not be silently tolerated.
    StructuralViolation(String),
}

impl TreeError {
    /// Build a [`TreeError::StructuralViolation`] from a message.
    #[must_use]
    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        Self::StructuralViolation(msg.into())
    }
}

impl StdFmt::Display for TreeError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::DuplicateKey => write!(f, "key already exists in tree"),

            Self::KeyNotFound => write!(f, "key not found in tree"),

            Self::StructuralViolation(msg) => {
                write!(f, "structural invariant violation: {msg}")
            }
        }
    }
}

impl Error for TreeError {}

// ============================================================================
//  Tests
// ============================================================================
