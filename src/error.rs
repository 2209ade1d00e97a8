//! Error types for work tree operations.
//!
//! [`TreeError`] is returned by every fallible [`WorkTree`](crate::WorkTree)
//! method. Variants are specific enough that callers can distinguish a bad
//! request (unknown path, invalid range) from bad data (a malformed or
//! permanently unsatisfiable operation) and from provider failures.

use std::path::PathBuf;

use tandem_base::BaseError;
use thiserror::Error;

use crate::model::{FileId, Point};
use crate::text::BufferId;

/// Errors returned by work tree operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// No visible entry exists at the path.
    #[error("no such file or directory: {}", path.display())]
    UnknownPath {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// An operation references a file this replica can never know about.
    ///
    /// Raised only once every causal dependency of the operation has been
    /// observed, so the reference cannot be satisfied by waiting.
    #[error("operation references unknown file {file_id}")]
    UnknownFileId {
        /// The unresolvable id.
        file_id: FileId,
    },

    /// The buffer id was never issued by this work tree.
    #[error("unknown buffer {0}")]
    UnknownBuffer(BufferId),

    /// The buffer was disposed; its id can no longer be used.
    #[error("buffer {0} has been disposed")]
    BufferDisposed(BufferId),

    /// A visible entry already occupies the destination path.
    #[error("path already exists: {}", path.display())]
    PathExists {
        /// The occupied path.
        path: PathBuf,
    },

    /// A path component that must be a directory is not one.
    #[error("not a directory: {}", path.display())]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// A text operation targeted something other than a text file.
    #[error("not a text file: {}", path.display())]
    NotATextFile {
        /// The offending path.
        path: PathBuf,
    },

    /// The path is empty, absolute, or contains `.`/`..` components.
    #[error("invalid path `{}`: {reason}", path.display())]
    InvalidPath {
        /// The rejected path.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// Edit ranges are out of bounds, reversed, or overlapping.
    #[error("invalid range {start}..{end}: {reason}")]
    InvalidRange {
        /// Range start.
        start: Point,
        /// Range end.
        end: Point,
        /// Why it was rejected.
        reason: String,
    },

    /// The anchor refers to text that never existed in this buffer.
    #[error("anchor does not belong to buffer {0}")]
    UnknownAnchor(BufferId),

    /// A rename would move a directory inside itself.
    #[error("cannot move {} into {}", from.display(), to.display())]
    InvalidMove {
        /// Source path.
        from: PathBuf,
        /// Rejected destination.
        to: PathBuf,
    },

    /// A base snapshot listed entries out of pre-order.
    #[error("invalid base entry `{name}` at depth {depth}: {reason}")]
    InvalidBaseEntry {
        /// Entry name.
        name: String,
        /// Declared depth.
        depth: usize,
        /// Why it was rejected.
        reason: String,
    },

    /// An operation could not be decoded or is internally inconsistent.
    #[error("malformed operation: {reason}")]
    MalformedOperation {
        /// What was wrong with it.
        reason: String,
    },

    /// The work tree has not started an epoch yet.
    #[error("work tree has no epoch; apply a start operation or reset first")]
    NotInitialized,

    /// The base provider failed.
    #[error(transparent)]
    Provider(#[from] BaseError),
}

impl TreeError {
    /// Shorthand for [`TreeError::MalformedOperation`].
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedOperation {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`TreeError::UnknownPath`].
    pub(crate) fn unknown_path(path: impl Into<PathBuf>) -> Self {
        Self::UnknownPath { path: path.into() }
    }
}
