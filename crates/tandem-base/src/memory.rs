//! In-memory [`BaseProvider`] used by fixtures, the CLI, and tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::error::BaseError;
use crate::provider::BaseProvider;
use crate::types::{BaseEntry, FileType, Oid};

// ---------------------------------------------------------------------------
// CommitSnapshot
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
enum Node {
    Directory,
    Text(String),
}

/// The full contents of one commit, keyed by path.
///
/// Parent directories are created implicitly, so `text("a/b/c", ..)` also
/// adds `a` and `a/b`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitSnapshot {
    nodes: BTreeMap<PathBuf, Node>,
}

impl CommitSnapshot {
    /// An empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory (and its ancestors).
    #[must_use]
    pub fn dir(mut self, path: impl AsRef<Path>) -> Self {
        self.insert_dir(path.as_ref());
        self
    }

    /// Add a text file with the given contents (and its ancestors).
    #[must_use]
    pub fn text(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.insert_text(path.as_ref(), contents.into());
        self
    }

    /// Add a directory in place.
    pub fn insert_dir(&mut self, path: &Path) {
        self.insert_ancestors(path);
        self.nodes.insert(path.to_path_buf(), Node::Directory);
    }

    /// Add a text file in place.
    pub fn insert_text(&mut self, path: &Path, contents: String) {
        self.insert_ancestors(path);
        self.nodes.insert(path.to_path_buf(), Node::Text(contents));
    }

    fn insert_ancestors(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.nodes
                .entry(ancestor.to_path_buf())
                .or_insert(Node::Directory);
        }
    }

    /// Entries in depth-first pre-order.
    ///
    /// `PathBuf` ordering compares component-wise, so a directory sorts
    /// directly before its descendants.
    #[must_use]
    pub fn entries(&self) -> Vec<BaseEntry> {
        self.nodes
            .iter()
            .filter_map(|(path, node)| {
                let name = path.file_name()?.to_string_lossy().into_owned();
                let file_type = match node {
                    Node::Directory => FileType::Directory,
                    Node::Text(_) => FileType::Text,
                };
                Some(BaseEntry::new(path.components().count(), name, file_type))
            })
            .collect()
    }

    fn text_at(&self, path: &Path) -> Option<&str> {
        match self.nodes.get(path)? {
            Node::Text(text) => Some(text),
            Node::Directory => None,
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryProvider
// ---------------------------------------------------------------------------

/// A provider holding every commit in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryProvider {
    commits: BTreeMap<Oid, CommitSnapshot>,
}

impl MemoryProvider {
    /// An empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a commit.
    pub fn insert_commit(&mut self, oid: Oid, snapshot: CommitSnapshot) {
        self.commits.insert(oid, snapshot);
    }

    /// Builder form of [`insert_commit`](Self::insert_commit).
    #[must_use]
    pub fn with_commit(mut self, oid: Oid, snapshot: CommitSnapshot) -> Self {
        self.insert_commit(oid, snapshot);
        self
    }

    fn commit(&self, oid: Oid) -> Result<&CommitSnapshot, BaseError> {
        self.commits.get(&oid).ok_or_else(|| BaseError::CommitNotFound {
            oid: oid.to_string(),
        })
    }
}

impl BaseProvider for MemoryProvider {
    type Entries = std::vec::IntoIter<Result<BaseEntry, BaseError>>;

    async fn base_entries(&self, oid: Oid) -> Result<Self::Entries, BaseError> {
        let commit = self.commit(oid)?;
        trace!(oid = %oid.short(), "listing memory commit");
        let entries: Vec<_> = commit.entries().into_iter().map(Ok).collect();
        Ok(entries.into_iter())
    }

    async fn base_text(&self, oid: Oid, path: &Path) -> Result<String, BaseError> {
        let commit = self.commit(oid)?;
        commit
            .text_at(path)
            .map(str::to_owned)
            .ok_or_else(|| BaseError::TextNotFound {
                oid: oid.to_string(),
                path: path.to_path_buf(),
            })
    }
}

impl<P: BaseProvider> BaseProvider for Arc<P> {
    type Entries = P::Entries;

    async fn base_entries(&self, oid: Oid) -> Result<Self::Entries, BaseError> {
        P::base_entries(self, oid).await
    }

    async fn base_text(&self, oid: Oid, path: &Path) -> Result<String, BaseError> {
        P::base_text(self, oid, path).await
    }
}
