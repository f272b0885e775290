#![forbid(unsafe_code)]
//! Error types for Freemap.
//!
//! Defines [`FreemapError`] and a `Result<T>` alias used throughout the
//! workspace.

use thiserror::Error;

/// Status conditions returned by fallible bitmap and storage operations.
///
/// The taxonomy is deliberately closed: every failure is either a caller
/// mistake or resource exhaustion, and callers branch on nothing finer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FreemapError {
    /// A caller-side precondition was violated: an out-of-bounds bit index
    /// or a reversed range.
    #[error("invalid arguments")]
    InvalidArgs,

    /// The storage backend cannot provide the requested capacity, a run
    /// search located no qualifying run, or a resize was requested in the
    /// wrong direction.
    #[error("no resources")]
    NoResources,
}

/// Result alias using [`FreemapError`].
pub type Result<T> = std::result::Result<T, FreemapError>;
