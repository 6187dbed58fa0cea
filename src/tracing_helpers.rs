//! Filepath: src/tracing_helpers.rs
//!
//! Zero-cost tracing helpers.
//!
//! When the `tracing` feature is enabled, these macros forward to the
//! `tracing` crate. When disabled (default), they compile to no-ops with
//! zero runtime overhead.
//!
//! # Usage
//!
//! ```bash
//! # Normal build - no tracing overhead
//! cargo build --release
//!
//! # Run tests with structural-change logging
//! RUST_LOG=blinktree=debug cargo test --features tracing
//! ```

#![allow(unused_macros, unused_imports)]

/// Trace-level logging (most verbose). Compiles to no-op without the
/// `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        // Completely empty - zero cost
    };
}

/// Debug-level logging. Used at structural-change points: split, merge,
/// borrow, root publish. Compiles to no-op without the `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        // Completely empty - zero cost
    };
}

pub(crate) use {debug_log, trace_log};
