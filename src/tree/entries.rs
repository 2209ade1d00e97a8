//! Entry listing: the projected tree rendered as a flat pre-order list with
//! per-entry status relative to the current base.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tandem_base::FileType;

use crate::model::FileId;
use crate::tree::TreeState;

/// How an entry differs from the current base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// No counterpart in the current base.
    New,
    /// At a different path than in the base.
    Renamed,
    /// Removed since the base.
    Removed,
    /// Text edited since the base.
    Modified,
    /// Moved and edited.
    RenamedAndModified,
    /// Same as the base.
    Unchanged,
}

impl EntryStatus {
    /// Short label used in text listings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Renamed => "renamed",
            Self::Removed => "removed",
            Self::Modified => "modified",
            Self::RenamedAndModified => "renamed+modified",
            Self::Unchanged => "unchanged",
        }
    }
}

/// One row of [`TreeState::entries`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Stable identity.
    pub file_id: FileId,
    /// 1 for top-level entries.
    pub depth: usize,
    /// Entry kind.
    pub file_type: FileType,
    /// Name under the parent.
    pub name: String,
    /// Full path.
    pub path: PathBuf,
    /// Status relative to the current base.
    pub status: EntryStatus,
    /// False for removed entries and everything below them.
    pub visible: bool,
}

/// Options for [`TreeState::entries`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntriesOptions {
    /// Directories to expand. `None` expands everything; an empty set lists
    /// the top level only.
    pub descend_into: Option<BTreeSet<PathBuf>>,
    /// Emit removed entries (with `visible: false`).
    pub show_deleted: bool,
}

impl EntriesOptions {
    /// Expand every directory, hide removed entries.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            descend_into: None,
            show_deleted: false,
        }
    }

    /// Expand only the listed directories.
    #[must_use]
    pub fn descend_into<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.descend_into = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Include removed entries.
    #[must_use]
    pub const fn show_deleted(mut self, show: bool) -> Self {
        self.show_deleted = show;
        self
    }

    fn expands(&self, path: &Path) -> bool {
        self.descend_into
            .as_ref()
            .is_none_or(|set| set.contains(path))
    }
}

impl TreeState {
    /// List the projected tree in pre-order.
    #[must_use]
    pub fn entries(&self, options: &EntriesOptions) -> Vec<Entry> {
        let mut out = Vec::new();
        self.walk(FileId::Root, Path::new(""), 1, true, options, &mut out);
        out
    }

    fn walk(
        &self,
        dir: FileId,
        dir_path: &Path,
        depth: usize,
        visible: bool,
        options: &EntriesOptions,
        out: &mut Vec<Entry>,
    ) {
        for &id in self.children(dir) {
            let Some(node) = self.node(id) else {
                continue;
            };
            let path = dir_path.join(&node.name);
            let Some(status) = self.status(id, &path) else {
                continue;
            };
            let visible = visible && !node.removed;
            if !visible && !options.show_deleted {
                continue;
            }
            out.push(Entry {
                file_id: id,
                depth,
                file_type: node.file_type,
                name: node.name.clone(),
                path: path.clone(),
                status,
                visible,
            });
            if node.file_type == FileType::Directory && options.expands(&path) {
                self.walk(id, &path, depth + 1, visible, options, out);
            }
        }
    }

    /// Status of a located file at `path`, or `None` if it should not be
    /// listed at all (a removed file the current base never had).
    fn status(&self, id: FileId, path: &Path) -> Option<EntryStatus> {
        let node = self.node(id)?;
        let base = self.base_node(id);
        if node.removed {
            return base.map(|_| EntryStatus::Removed);
        }
        let Some(base) = base else {
            return Some(EntryStatus::New);
        };
        let renamed = base.path != path;
        let modified = node.file_type == FileType::Text && self.is_modified(id);
        Some(match (renamed, modified) {
            (true, true) => EntryStatus::RenamedAndModified,
            (true, false) => EntryStatus::Renamed,
            (false, true) => EntryStatus::Modified,
            (false, false) => EntryStatus::Unchanged,
        })
    }
}
