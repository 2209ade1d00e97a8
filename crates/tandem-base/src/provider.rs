//! The [`BaseProvider`] trait: the abstraction boundary between a work tree
//! and the repository that stores committed snapshots.
//!
//! | Method         | Purpose                                           |
//! |----------------|---------------------------------------------------|
//! | `base_entries` | Stream every entry of a commit in pre-order       |
//! | `base_text`    | Read the committed contents of one text file      |
//!
//! Both methods are asynchronous so implementations may fetch from disk or
//! over the network. Implementations must be deterministic: the same `oid`
//! always yields the same entries and text.

use std::future::Future;
use std::path::Path;

use crate::error::BaseError;
use crate::types::{BaseEntry, Oid};

/// Read-only access to committed base snapshots.
///
/// Implementations may be backed by a git repository, a remote service, or a
/// test double such as [`MemoryProvider`](crate::MemoryProvider).
pub trait BaseProvider {
    /// One-pass iterator over the entries of a snapshot.
    type Entries: Iterator<Item = Result<BaseEntry, BaseError>>;

    /// List every entry of the snapshot `oid` in depth-first pre-order.
    ///
    /// The iterator is consumed exactly once. Children of a directory follow
    /// it directly; siblings may appear in any order.
    ///
    /// # Errors
    /// Returns [`BaseError::CommitNotFound`] if `oid` is unknown. Individual
    /// items may fail if the backing store fails mid-stream.
    fn base_entries(&self, oid: Oid) -> impl Future<Output = Result<Self::Entries, BaseError>>;

    /// Read the committed text of the file at `path` in snapshot `oid`.
    ///
    /// # Errors
    /// Returns [`BaseError::CommitNotFound`] or [`BaseError::TextNotFound`]
    /// when the commit or file does not exist.
    fn base_text(&self, oid: Oid, path: &Path) -> impl Future<Output = Result<String, BaseError>>;
}
