//! Base snapshots: the committed tree an epoch is layered on.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tandem_base::{BaseEntry, BaseError, FileType, Oid};

use crate::error::TreeError;
use crate::model::FileId;

/// One entry of a base snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseNode {
    /// Parent directory (`FileId::Root` at depth 1).
    pub parent: FileId,
    /// Entry name.
    pub name: String,
    /// Entry kind.
    pub file_type: FileType,
    /// Full path within the snapshot.
    pub path: PathBuf,
}

/// Whether `name` is usable as a single path component.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    !matches!(name, "" | "." | "..") && !name.contains('/')
}

/// The full entry listing of one commit, keyed by [`FileId`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BaseSnapshot {
    head: Option<Oid>,
    nodes: BTreeMap<FileId, BaseNode>,
}

impl BaseSnapshot {
    /// The snapshot of an empty tree.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from a pre-order entry stream.
    ///
    /// # Errors
    /// - [`TreeError::InvalidBaseEntry`] if an entry has depth 0, skips a
    ///   level, sits below a text file, or repeats a path.
    /// - [`TreeError::Provider`] if the stream itself fails.
    pub fn from_entries(
        head: Oid,
        entries: impl IntoIterator<Item = Result<BaseEntry, BaseError>>,
    ) -> Result<Self, TreeError> {
        // Directories on the path to the current entry, outermost first.
        let mut stack: Vec<(FileId, PathBuf)> = Vec::new();
        let mut nodes = BTreeMap::new();
        // Depth of the previous entry if it was a text file.
        let mut last_text_depth: Option<usize> = None;

        for entry in entries {
            let entry = entry?;
            let invalid = |reason: &str| TreeError::InvalidBaseEntry {
                name: entry.name.clone(),
                depth: entry.depth,
                reason: reason.to_owned(),
            };
            if entry.depth == 0 {
                return Err(invalid("depth must be at least 1"));
            }
            if !is_valid_name(&entry.name) {
                return Err(invalid("name must be a single path component"));
            }
            if entry.depth > stack.len() + 1 {
                let reason = if last_text_depth == Some(entry.depth - 1) {
                    "parent is not a directory"
                } else {
                    "depth skips a level"
                };
                return Err(invalid(reason));
            }
            stack.truncate(entry.depth - 1);
            let (parent, parent_path) = stack
                .last()
                .map_or((FileId::Root, Path::new("")), |(id, p)| (*id, p.as_path()));
            let path = parent_path.join(&entry.name);
            let id = FileId::base(entry.file_type, &path);
            let node = BaseNode {
                parent,
                name: entry.name.clone(),
                file_type: entry.file_type,
                path: path.clone(),
            };
            if nodes.insert(id, node).is_some() {
                return Err(invalid("duplicate entry"));
            }
            match entry.file_type {
                FileType::Directory => {
                    stack.push((id, path));
                    last_text_depth = None;
                }
                FileType::Text => last_text_depth = Some(entry.depth),
            }
        }
        Ok(Self {
            head: Some(head),
            nodes,
        })
    }

    /// The commit this snapshot was read from.
    #[must_use]
    pub const fn head(&self) -> Option<Oid> {
        self.head
    }

    /// Look up an entry.
    #[must_use]
    pub fn get(&self, id: FileId) -> Option<&BaseNode> {
        self.nodes.get(&id)
    }

    /// Whether the snapshot contains `id`.
    #[must_use]
    pub fn contains(&self, id: FileId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The entry of kind `file_type` named `name` under `parent`.
    #[must_use]
    pub fn child(&self, parent: FileId, name: &str, file_type: FileType) -> Option<FileId> {
        let path = if parent == FileId::Root {
            PathBuf::from(name)
        } else {
            self.get(parent)?.path.join(name)
        };
        let id = FileId::base(file_type, &path);
        self.nodes
            .get(&id)
            .is_some_and(|node| node.parent == parent && node.name == name)
            .then_some(id)
    }

    /// Iterate every entry.
    pub fn iter(&self) -> impl Iterator<Item = (FileId, &BaseNode)> {
        self.nodes.iter().map(|(&id, node)| (id, node))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the snapshot has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// BaseCache
// ---------------------------------------------------------------------------

/// Snapshots and base texts already fetched from the provider.
///
/// Contents are immutable per commit, so entries never need invalidation.
#[derive(Clone, Debug, Default)]
pub struct BaseCache {
    snapshots: BTreeMap<Oid, Arc<BaseSnapshot>>,
    texts: BTreeMap<(Oid, PathBuf), Arc<str>>,
}

impl BaseCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cached snapshot.
    #[must_use]
    pub fn snapshot(&self, oid: Oid) -> Option<Arc<BaseSnapshot>> {
        self.snapshots.get(&oid).cloned()
    }

    /// Whether the snapshot for `oid` is cached.
    #[must_use]
    pub fn has_snapshot(&self, oid: Oid) -> bool {
        self.snapshots.contains_key(&oid)
    }

    /// Store a snapshot.
    pub fn insert_snapshot(&mut self, snapshot: BaseSnapshot) {
        if let Some(head) = snapshot.head() {
            self.snapshots.insert(head, Arc::new(snapshot));
        }
    }

    /// A cached base text.
    #[must_use]
    pub fn text(&self, oid: Oid, path: &Path) -> Option<&str> {
        self.texts
            .get(&(oid, path.to_path_buf()))
            .map(AsRef::as_ref)
    }

    /// Whether the text of `path` in `oid` is cached.
    #[must_use]
    pub fn has_text(&self, oid: Oid, path: &Path) -> bool {
        self.texts.contains_key(&(oid, path.to_path_buf()))
    }

    /// Store a base text.
    pub fn insert_text(&mut self, oid: Oid, path: PathBuf, text: String) {
        self.texts.insert((oid, path), Arc::from(text));
    }
}
