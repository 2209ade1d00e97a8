//! Replicated file tree.
//!
//! [`TreeState`] holds everything every replica agrees on once it has
//! observed the same operations: the epochs, the base snapshot of each
//! epoch, every placement (create or move) of every file, the removal set,
//! and each text file's edit history.
//!
//! The visible tree is a pure projection of that state, recomputed by
//! [`TreeState::rebuild`] after every batch:
//!
//! 1. A file's location is its latest placement. Files never placed by an
//!    operation sit where the current base puts them.
//! 2. Base files absent from the current base are *retained* at their last
//!    known base location while they carry text edits or hold located files.
//! 3. Moves that close a cycle are ignored, latest first (see [`conflict`]).
//! 4. Work the current base already contains is absorbed into it. A file
//!    whose placement the epoch's author had observed, and which lands on a
//!    same-kind entry of the new base, *folds* into that entry. A removal
//!    stops hiding a file once some base on the active chain observed it
//!    and left the file out.
//!
//! Because the projection depends only on the set of applied operations,
//! application order never affects the result.

pub mod base;
pub mod conflict;
pub mod entries;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tandem_base::{BaseError, FileType, Oid};
use tracing::debug;

use crate::error::TreeError;
use crate::model::{FileId, Lamport, LocalTimestamp, ReplicaId, Version};
use crate::oplog::{EpochId, OpPayload, Operation};
use crate::rebase::{self, Layer};
use crate::text::{EditRecord, TextBuffer, TextFile, View};

pub use base::{BaseCache, BaseNode, BaseSnapshot};
pub use entries::{EntriesOptions, Entry, EntryStatus};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A started epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpochRecord {
    /// Id of the `StartEpoch` operation.
    pub op: LocalTimestamp,
    /// Base commit.
    pub head: Option<Oid>,
    /// Epoch it was started from.
    pub prev: Option<EpochId>,
    /// Operations its author had applied when starting it.
    pub observed: Version,
}

/// Where an operation put a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Parent directory.
    pub parent: FileId,
    /// Name under the parent.
    pub name: String,
    /// The placing operation.
    pub op: LocalTimestamp,
}

/// Order of entries sharing a name: base placements first, then by replica
/// and logical time of the placing operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PlacementKey {
    /// Placed by a base snapshot.
    Base,
    /// Placed by an operation.
    User {
        /// Replica of the placing operation.
        replica: ReplicaId,
        /// Lamport value of the placing operation.
        lamport: u64,
    },
}

/// A located file in the projected tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    /// Parent directory.
    pub parent: FileId,
    /// Name under the parent.
    pub name: String,
    /// Entry kind.
    pub file_type: FileType,
    /// Tie-break among same-named siblings.
    pub key: PlacementKey,
    /// Tombstoned.
    pub removed: bool,
}

/// Where the projection put a file after ignoring a move that closed a
/// cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revert {
    /// The moved file.
    pub file: FileId,
    /// Effective parent.
    pub parent: FileId,
    /// Effective name.
    pub name: String,
}

/// One epoch's layer for one file, before its text is looked up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerSpec {
    /// The epoch.
    pub epoch: EpochId,
    /// Active chain of the epoch it was started from.
    pub prev_chain: BTreeSet<EpochId>,
    /// Where the file's base text lives, or `None` if absent from the base.
    pub source: Option<(Oid, PathBuf)>,
}

// ---------------------------------------------------------------------------
// TreeState
// ---------------------------------------------------------------------------

/// Replicated tree state plus its projection.
#[derive(Clone, Debug, Default)]
pub struct TreeState {
    epochs: BTreeMap<EpochId, EpochRecord>,
    snapshots: BTreeMap<EpochId, Arc<BaseSnapshot>>,
    current: Option<EpochId>,
    chain: BTreeSet<EpochId>,
    types: BTreeMap<FileId, FileType>,
    placements: BTreeMap<FileId, BTreeMap<Lamport, Placement>>,
    removals: BTreeMap<FileId, BTreeSet<LocalTimestamp>>,
    texts: BTreeMap<FileId, TextFile>,

    // Projection, recomputed by `rebuild`.
    removed: BTreeSet<FileId>,
    nodes: BTreeMap<FileId, Node>,
    children: BTreeMap<FileId, Vec<FileId>>,
    reverted: Vec<Revert>,
}

impl TreeState {
    /// An empty state with no epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Epochs
    // -----------------------------------------------------------------------

    /// The greatest epoch observed.
    #[must_use]
    pub const fn current_epoch(&self) -> Option<EpochId> {
        self.current
    }

    /// Epochs whose base layers are currently active.
    #[must_use]
    pub const fn chain(&self) -> &BTreeSet<EpochId> {
        &self.chain
    }

    /// Look up an epoch.
    #[must_use]
    pub fn epoch(&self, id: EpochId) -> Option<&EpochRecord> {
        self.epochs.get(&id)
    }

    /// Base commit of the current epoch.
    #[must_use]
    pub fn head(&self) -> Option<Oid> {
        self.current
            .and_then(|e| self.epochs.get(&e))
            .and_then(|r| r.head)
    }

    /// `epoch` and every epoch it descends from.
    #[must_use]
    pub fn chain_of(&self, epoch: Option<EpochId>) -> BTreeSet<EpochId> {
        let mut chain = BTreeSet::new();
        let mut next = epoch;
        while let Some(e) = next {
            if !chain.insert(e) {
                break;
            }
            next = self.epochs.get(&e).and_then(|r| r.prev);
        }
        chain
    }

    /// Active chain as of `version`.
    #[must_use]
    pub fn chain_at(&self, version: &Version) -> BTreeSet<EpochId> {
        let current = self
            .epochs
            .iter()
            .rev()
            .find(|(_, r)| version.observed(r.op))
            .map(|(&e, _)| e);
        self.chain_of(current)
    }

    fn current_snapshot(&self) -> Option<&BaseSnapshot> {
        self.current
            .and_then(|e| self.snapshots.get(&e))
            .map(AsRef::as_ref)
    }

    /// The current base's record of `id`.
    #[must_use]
    pub fn base_node(&self, id: FileId) -> Option<&BaseNode> {
        self.current_snapshot()?.get(id)
    }

    /// Record from the most recent base containing `id`, active chain first.
    fn latest_base_node(&self, id: FileId) -> Option<&BaseNode> {
        let on_chain = self
            .chain
            .iter()
            .rev()
            .filter_map(|e| self.snapshots.get(e)?.get(id));
        let off_chain = self
            .snapshots
            .iter()
            .rev()
            .filter(|(e, _)| !self.chain.contains(e))
            .filter_map(|(_, s)| s.get(id));
        on_chain.chain(off_chain).next()
    }

    // -----------------------------------------------------------------------
    // Applying operations
    // -----------------------------------------------------------------------

    fn is_known(&self, id: FileId) -> bool {
        id == FileId::Root || self.types.contains_key(&id)
    }

    fn require_known(&self, id: FileId) -> Result<(), TreeError> {
        if self.is_known(id) {
            Ok(())
        } else {
            Err(TreeError::UnknownFileId { file_id: id })
        }
    }

    fn require_name(name: &str) -> Result<(), TreeError> {
        if base::is_valid_name(name) {
            Ok(())
        } else {
            Err(TreeError::malformed(format!("invalid entry name {name:?}")))
        }
    }

    fn require_directory(&self, id: FileId) -> Result<(), TreeError> {
        self.require_known(id)?;
        match self.types.get(&id) {
            Some(FileType::Text) => Err(TreeError::malformed(format!(
                "{id} is a text file, not a directory"
            ))),
            _ => Ok(()),
        }
    }

    /// Apply one causally ready operation.
    ///
    /// Does not update the projection; call [`rebuild`](Self::rebuild) once
    /// the batch is done.
    ///
    /// # Errors
    /// - [`TreeError::UnknownFileId`] if the operation references a file this
    ///   state has never seen.
    /// - [`TreeError::Provider`] if a base snapshot or text it needs is not
    ///   in `cache`.
    /// - [`TreeError::MalformedOperation`] for internally inconsistent
    ///   operations, including names that are not a single path component.
    pub fn apply(&mut self, op: &Operation, cache: &BaseCache) -> Result<(), TreeError> {
        match &op.payload {
            OpPayload::StartEpoch { head, prev } => self.start_epoch(op, *head, *prev, cache),
            OpPayload::CreateFile {
                parent,
                name,
                file_type,
            } => {
                Self::require_name(name)?;
                self.require_directory(*parent)?;
                let id = FileId::New(op.id);
                self.types.insert(id, *file_type);
                self.place(id, *parent, name, op);
                Ok(())
            }
            OpPayload::Move { file, parent, name } => {
                if *file == FileId::Root {
                    return Err(TreeError::malformed("the root cannot be moved"));
                }
                Self::require_name(name)?;
                self.require_known(*file)?;
                self.require_directory(*parent)?;
                self.place(*file, *parent, name, op);
                Ok(())
            }
            OpPayload::Remove { file } => {
                self.require_known(*file)?;
                self.removals.entry(*file).or_default().insert(op.id);
                Ok(())
            }
            OpPayload::Edit {
                file,
                deletions,
                insertions,
            } => {
                self.require_known(*file)?;
                if self.types.get(file) != Some(&FileType::Text) {
                    return Err(TreeError::malformed(format!("edit of non-text file {file}")));
                }
                let record = EditRecord {
                    id: op.id,
                    lamport: op.lamport,
                    deletions: deletions.clone(),
                    insertions: insertions.clone(),
                };
                let text = self.texts.entry(*file).or_default();
                if let Some(buffer) = &mut text.buffer {
                    buffer.apply_edit(&record)?;
                }
                text.edits.push(record);
                Ok(())
            }
        }
    }

    fn place(&mut self, id: FileId, parent: FileId, name: &str, op: &Operation) {
        self.placements.entry(id).or_default().insert(
            op.lamport,
            Placement {
                parent,
                name: name.to_owned(),
                op: op.id,
            },
        );
    }

    fn start_epoch(
        &mut self,
        op: &Operation,
        head: Option<Oid>,
        prev: Option<EpochId>,
        cache: &BaseCache,
    ) -> Result<(), TreeError> {
        let epoch = EpochId(op.lamport);
        if op.epoch != epoch {
            return Err(TreeError::malformed(format!(
                "start operation {} names {} instead of its own epoch",
                op.id, op.epoch
            )));
        }
        if let Some(p) = prev
            && !self.epochs.contains_key(&p)
        {
            return Err(TreeError::malformed(format!("unknown previous {p}")));
        }
        let snapshot = match head {
            None => Arc::new(BaseSnapshot::empty()),
            Some(oid) => cache
                .snapshot(oid)
                .ok_or_else(|| BaseError::CommitNotFound {
                    oid: oid.to_string(),
                })?,
        };
        for (id, node) in snapshot.iter() {
            self.types.entry(id).or_insert(node.file_type);
        }
        self.epochs.insert(
            epoch,
            EpochRecord {
                op: op.id,
                head,
                prev,
                observed: op.deps.clone(),
            },
        );
        self.snapshots.insert(epoch, snapshot);
        if self.current < Some(epoch) {
            self.current = Some(epoch);
            self.chain = self.chain_of(self.current);
        }
        debug!(%epoch, head = ?head, current = ?self.current, "epoch started");

        // Open buffers take the new layer right away; closed files pick it up
        // when they are next opened.
        let open: Vec<FileId> = self
            .texts
            .iter()
            .filter(|(_, t)| t.buffer.is_some())
            .map(|(&id, _)| id)
            .collect();
        for id in open {
            let spec = self.layer_spec(id, epoch);
            let layer = resolve_layer(&spec, cache)?;
            if let Some(buffer) = self.texts.get_mut(&id).and_then(|t| t.buffer.as_mut()) {
                rebase::apply_layer(buffer, &layer)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Text files
    // -----------------------------------------------------------------------

    /// The layer of `epoch` for file `id`.
    #[must_use]
    pub fn layer_spec(&self, id: FileId, epoch: EpochId) -> LayerSpec {
        let record = self.epochs.get(&epoch);
        let prev_chain = self.chain_of(record.and_then(|r| r.prev));
        let source = record.and_then(|r| r.head).and_then(|oid| {
            let node = self.snapshots.get(&epoch)?.get(id)?;
            (node.file_type == FileType::Text).then(|| (oid, node.path.clone()))
        });
        LayerSpec {
            epoch,
            prev_chain,
            source,
        }
    }

    /// Layers of every known epoch for file `id`, in epoch order.
    #[must_use]
    pub fn layer_specs(&self, id: FileId) -> Vec<LayerSpec> {
        if !id.is_base() {
            return Vec::new();
        }
        self.epochs
            .keys()
            .map(|&epoch| self.layer_spec(id, epoch))
            .collect()
    }

    /// Build the buffer of text file `id` from its layers and edits.
    ///
    /// # Errors
    /// - [`TreeError::Provider`] if a needed base text is not cached.
    /// - [`TreeError::MalformedOperation`] if a stored edit does not fit.
    pub fn materialize(&self, id: FileId, cache: &BaseCache) -> Result<TextBuffer, TreeError> {
        let specs = self.layer_specs(id);
        let layers = specs
            .iter()
            .map(|spec| resolve_layer(spec, cache))
            .collect::<Result<Vec<_>, _>>()?;
        let mut buffer = TextBuffer::new();
        rebase::apply_layers(&mut buffer, layers)?;
        if let Some(text) = self.texts.get(&id) {
            for edit in &text.edits {
                buffer.apply_edit(edit)?;
            }
        }
        Ok(buffer)
    }

    /// Install or drop the materialized buffer of `id`.
    pub fn set_buffer(&mut self, id: FileId, buffer: Option<TextBuffer>) {
        self.texts.entry(id).or_default().buffer = buffer;
    }

    /// The materialized buffer of `id`, if open.
    #[must_use]
    pub fn buffer(&self, id: FileId) -> Option<&TextBuffer> {
        self.texts.get(&id)?.buffer.as_ref()
    }

    /// A view at the current version.
    #[must_use]
    pub const fn view<'a>(&'a self, version: &'a Version) -> View<'a> {
        View {
            version,
            chain: &self.chain,
        }
    }

    /// Whether text file `id` carries user edits.
    #[must_use]
    pub fn is_modified(&self, id: FileId) -> bool {
        self.texts.get(&id).is_some_and(TextFile::is_modified)
    }

    // -----------------------------------------------------------------------
    // Projection
    // -----------------------------------------------------------------------

    /// Recompute removals, locations, sibling order, and cycle reverts.
    pub fn rebuild(&mut self) {
        self.removed = self.effective_removals();
        let mut skips: BTreeMap<FileId, usize> = BTreeMap::new();
        let nodes = loop {
            let nodes = self.locate(&skips);
            let Some(cycle) = conflict::find_cycle(&nodes) else {
                break nodes;
            };
            let Some(victim) = conflict::latest_move(&cycle, &self.placements, &skips) else {
                break nodes;
            };
            debug!(file = %victim, cycle = cycle.len(), "ignoring move that closes a cycle");
            *skips.entry(victim).or_insert(0) += 1;
        };

        let mut children: BTreeMap<FileId, Vec<FileId>> = BTreeMap::new();
        for (&id, node) in &nodes {
            children.entry(node.parent).or_default().push(id);
        }
        for siblings in children.values_mut() {
            siblings.sort_by(|a, b| {
                let (na, nb) = (&nodes[a], &nodes[b]);
                na.name
                    .cmp(&nb.name)
                    .then(na.removed.cmp(&nb.removed))
                    .then(na.key.cmp(&nb.key))
                    .then(a.cmp(b))
            });
        }

        self.reverted = skips
            .keys()
            .filter_map(|&file| {
                let node = nodes.get(&file)?;
                Some(Revert {
                    file,
                    parent: node.parent,
                    name: node.name.clone(),
                })
            })
            .collect();
        self.nodes = nodes;
        self.children = children;
    }

    /// Files with removals that still hide them.
    fn effective_removals(&self) -> BTreeSet<FileId> {
        let current = self.current_snapshot();
        self.removals
            .iter()
            .filter(|&(&id, ops)| {
                current.is_none_or(|s| !s.contains(id))
                    || ops.iter().any(|&op| !self.removal_committed(id, op))
            })
            .map(|(&id, _)| id)
            .collect()
    }

    /// Whether a base on the active chain observed removal `op` and left
    /// `id` out.
    fn removal_committed(&self, id: FileId, op: LocalTimestamp) -> bool {
        self.chain.iter().any(|e| {
            self.epochs.get(e).is_some_and(|r| r.observed.observed(op))
                && self.snapshots.get(e).is_some_and(|s| !s.contains(id))
        })
    }

    /// The placement in effect for `id` once `skips` are ignored.
    fn effective_placement(
        &self,
        id: FileId,
        skips: &BTreeMap<FileId, usize>,
    ) -> Option<(&Lamport, &Placement)> {
        let skip = skips.get(&id).copied().unwrap_or(0);
        self.placements.get(&id)?.iter().rev().nth(skip)
    }

    /// Placed files absorbed by an entry of the current base, mapped to it.
    ///
    /// Only placements and edits the current epoch's author had observed
    /// count as committed; anything newer keeps the file separate.
    fn folds(&self, skips: &BTreeMap<FileId, usize>) -> BTreeMap<FileId, FileId> {
        let mut folded = BTreeMap::new();
        let (Some(snapshot), Some(record)) = (
            self.current_snapshot(),
            self.current.and_then(|e| self.epochs.get(&e)),
        ) else {
            return folded;
        };
        let observed = &record.observed;
        let candidates: Vec<(FileId, &Placement, FileType)> = self
            .placements
            .keys()
            .filter(|&&id| !snapshot.contains(id))
            .filter_map(|&id| {
                let (_, placement) = self.effective_placement(id, skips)?;
                let file_type = *self.types.get(&id)?;
                let committed = observed.observed(placement.op)
                    && self
                        .texts
                        .get(&id)
                        .is_none_or(|t| t.edits.iter().all(|e| observed.observed(e.id)));
                committed.then_some((id, placement, file_type))
            })
            .collect();

        // A folded directory can let its children fold in turn.
        loop {
            let before = folded.len();
            for &(id, placement, file_type) in &candidates {
                if folded.contains_key(&id) {
                    continue;
                }
                let parent = folded
                    .get(&placement.parent)
                    .copied()
                    .unwrap_or(placement.parent);
                if let Some(target) = snapshot.child(parent, &placement.name, file_type) {
                    folded.insert(id, target);
                }
            }
            if folded.len() == before {
                return folded;
            }
        }
    }

    fn locate(&self, skips: &BTreeMap<FileId, usize>) -> BTreeMap<FileId, Node> {
        let folded = self.folds(skips);
        let canonical = |id: FileId| folded.get(&id).copied().unwrap_or(id);
        let mut nodes = BTreeMap::new();
        for &id in self.placements.keys() {
            if folded.contains_key(&id) {
                continue;
            }
            let (Some((lamport, placement)), Some(&file_type)) =
                (self.effective_placement(id, skips), self.types.get(&id))
            else {
                continue;
            };
            nodes.insert(
                id,
                Node {
                    parent: canonical(placement.parent),
                    name: placement.name.clone(),
                    file_type,
                    key: PlacementKey::User {
                        replica: placement.op.replica,
                        lamport: lamport.value,
                    },
                    removed: self.removed.contains(&id),
                },
            );
        }
        if let Some(snapshot) = self.current_snapshot() {
            for (id, base) in snapshot.iter() {
                nodes.entry(id).or_insert_with(|| self.base_located(id, base));
            }
        }

        // Retain vanished base entries that still matter locally.
        let mut pending: Vec<FileId> = self
            .texts
            .iter()
            .filter(|&(&id, text)| id.is_base() && text.is_modified() && !self.removed.contains(&id))
            .map(|(&id, _)| id)
            .collect();
        pending.extend(nodes.values().map(|n| n.parent));
        while let Some(id) = pending.pop() {
            if id == FileId::Root || nodes.contains_key(&id) || folded.contains_key(&id) {
                continue;
            }
            if let Some(base) = self.latest_base_node(id) {
                let mut node = self.base_located(id, base);
                node.parent = canonical(node.parent);
                pending.push(node.parent);
                nodes.insert(id, node);
            }
        }
        nodes
    }

    fn base_located(&self, id: FileId, base: &BaseNode) -> Node {
        Node {
            parent: base.parent,
            name: base.name.clone(),
            file_type: base.file_type,
            key: PlacementKey::Base,
            removed: self.removed.contains(&id),
        }
    }

    /// Cycle reverts found by the last [`rebuild`](Self::rebuild).
    #[must_use]
    pub fn reverted(&self) -> &[Revert] {
        &self.reverted
    }

    /// A located node.
    #[must_use]
    pub fn node(&self, id: FileId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Children of `id` in display order.
    #[must_use]
    pub fn children(&self, id: FileId) -> &[FileId] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Kind of a known file.
    #[must_use]
    pub fn file_type(&self, id: FileId) -> Option<FileType> {
        if id == FileId::Root {
            return Some(FileType::Directory);
        }
        self.types.get(&id).copied()
    }

    /// First visible child of `parent` named `name`.
    #[must_use]
    pub fn child_named(&self, parent: FileId, name: &str) -> Option<FileId> {
        self.children(parent).iter().copied().find(|id| {
            self.nodes
                .get(id)
                .is_some_and(|n| !n.removed && n.name == name)
        })
    }

    /// Resolve a relative path to the visible file it names.
    ///
    /// # Errors
    /// Returns [`TreeError::InvalidPath`] if the path is empty, absolute, or
    /// contains non-normal components.
    pub fn resolve(&self, path: &Path) -> Result<Option<FileId>, TreeError> {
        let names = path_components(path)?;
        let mut current = FileId::Root;
        for name in names {
            match self.child_named(current, name) {
                Some(id) => current = id,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Path of a visible file.
    #[must_use]
    pub fn path_of(&self, id: FileId) -> Option<PathBuf> {
        let mut names = Vec::new();
        let mut current = id;
        while current != FileId::Root {
            let node = self.nodes.get(&current)?;
            if node.removed || names.len() > self.nodes.len() {
                return None;
            }
            names.push(node.name.as_str());
            current = node.parent;
        }
        Some(names.iter().rev().collect())
    }

    /// Whether `ancestor` is `id` or one of its located ancestors.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: FileId, id: FileId) -> bool {
        let mut current = id;
        for _ in 0..=self.nodes.len() {
            if current == ancestor {
                return true;
            }
            match self.nodes.get(&current) {
                Some(node) => current = node.parent,
                None => return false,
            }
        }
        false
    }
}

/// Look up the text of a layer.
fn resolve_layer<'a>(spec: &LayerSpec, cache: &'a BaseCache) -> Result<Layer<'a>, TreeError> {
    let text = match &spec.source {
        None => "",
        Some((oid, path)) => cache.text(*oid, path).ok_or_else(|| BaseError::TextNotFound {
            oid: oid.to_string(),
            path: path.clone(),
        })?,
    };
    Ok(Layer {
        epoch: spec.epoch,
        prev_chain: spec.prev_chain.clone(),
        text,
    })
}

/// Split a relative path into its names.
///
/// # Errors
/// Returns [`TreeError::InvalidPath`] for empty, absolute, or non-UTF-8 paths
/// and for `.`/`..` components.
pub fn path_components(path: &Path) -> Result<Vec<&str>, TreeError> {
    let invalid = |reason: &str| TreeError::InvalidPath {
        path: path.to_path_buf(),
        reason: reason.to_owned(),
    };
    let mut names = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => {
                names.push(name.to_str().ok_or_else(|| invalid("not valid UTF-8"))?);
            }
            Component::CurDir | Component::ParentDir => {
                return Err(invalid("`.` and `..` are not allowed"));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("path must be relative"));
            }
        }
    }
    if names.is_empty() {
        return Err(invalid("path is empty"));
    }
    Ok(names)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
