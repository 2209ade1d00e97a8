//! Error types for base snapshot access.
//!
//! [`BaseError`] is the single error type returned by all
//! [`BaseProvider`](crate::BaseProvider) methods. Callers match on the variant
//! instead of parsing messages.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`BaseProvider`](crate::BaseProvider) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BaseError {
    /// The requested commit is unknown to the provider.
    #[error("commit not found: {oid}")]
    CommitNotFound {
        /// Hex form of the missing commit id.
        oid: String,
    },

    /// The commit exists but has no text file at the given path.
    #[error("no text file at {} in commit {oid}", path.display())]
    TextNotFound {
        /// Hex form of the commit id.
        oid: String,
        /// Path that was requested.
        path: PathBuf,
    },

    /// An OID string could not be parsed.
    #[error("invalid OID `{value}`: {reason}")]
    InvalidOid {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// The backing store returned an unclassified failure.
    ///
    /// Catch-all for providers backed by real repositories. The message
    /// should be enough to diagnose the failure.
    #[error("base provider error: {message}")]
    Backend {
        /// Freeform error description from the backend.
        message: String,
    },
}
