//! [`WorkTree`]: one replica of a collaboratively edited file tree.
//!
//! A work tree owns the replicated state, the base snapshot cache, and the
//! open buffers. Local mutations apply immediately and return the operation
//! to broadcast; remote operations are merged with [`WorkTree::apply_ops`].
//!
//! # Atomicity
//!
//! Provider I/O happens before any state is touched. Remote batches are then
//! integrated into a clone of the replica and committed by swapping it in,
//! so a batch that fails part-way leaves the work tree as it was.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use tandem::{Oid, ReplicaId, WorkTree, WorkTreeConfig};
//! use tandem_base::{CommitSnapshot, FileType, MemoryProvider};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let head = Oid::from_bytes([1; 20]);
//! let provider = MemoryProvider::new()
//!     .with_commit(head, CommitSnapshot::new().text("README", "hello"));
//! let (mut tree, _ops) = WorkTree::create(
//!     ReplicaId::new(1),
//!     Some(head),
//!     Vec::new(),
//!     provider,
//!     WorkTreeConfig::default(),
//! )
//! .await?;
//!
//! let buffer = tree.open_text_file(Path::new("README")).await?;
//! assert_eq!(tree.text(buffer)?, "hello");
//! tree.create_file(Path::new("notes"), FileType::Directory)?;
//! assert!(tree.exists(Path::new("notes")));
//! # Ok::<(), tandem::TreeError>(())
//! # }).unwrap();
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tandem_base::{BaseProvider, FileType, Oid};
use tracing::{debug, instrument, warn};

use crate::config::WorkTreeConfig;
use crate::error::TreeError;
use crate::model::{Clock, FileId, LocalTimestamp, Point, ReplicaId, Version};
use crate::oplog::{DeferredQueue, EpochId, OpPayload, Operation, OperationEnvelope};
use crate::text::{Anchor, Bias, BufferId, Change, TextBuffer, View};
use crate::tree::{BaseCache, BaseSnapshot, EntriesOptions, Entry, TreeState, path_components};

// ---------------------------------------------------------------------------
// Replica
// ---------------------------------------------------------------------------

/// Everything that changes when an operation is applied.
#[derive(Clone, Debug)]
struct Replica {
    clock: Clock,
    version: Version,
    state: TreeState,
    deferred: DeferredQueue,
}

impl Replica {
    fn new(id: ReplicaId) -> Self {
        Self {
            clock: Clock::new(id),
            version: Version::new(),
            state: TreeState::new(),
            deferred: DeferredQueue::new(),
        }
    }

    /// Create, apply, and return a local operation.
    ///
    /// The clock only advances if the operation applies, so a rejected
    /// mutation never leaves a gap in this replica's sequence.
    fn commit(&mut self, cache: &BaseCache, payload: OpPayload) -> Result<Operation, TreeError> {
        let mut clock = self.clock.clone();
        let (id, lamport) = clock.tick();
        let epoch = if matches!(payload, OpPayload::StartEpoch { .. }) {
            EpochId(lamport)
        } else {
            self.state
                .current_epoch()
                .ok_or(TreeError::NotInitialized)?
        };
        let op = Operation {
            id,
            lamport,
            epoch,
            deps: self.version.clone(),
            payload,
        };
        self.state.apply(&op, cache)?;
        self.version.observe(id);
        self.clock = clock;
        self.state.rebuild();
        Ok(op)
    }

    /// The first operation `op` is waiting for, if any.
    fn missing(&self, op: &Operation) -> Option<LocalTimestamp> {
        let seen = self.version.get(op.id.replica);
        if op.id.seq > seen + 1 {
            return Some(LocalTimestamp::new(op.id.replica, seen + 1));
        }
        self.version.first_missing(&op.deps)
    }

    /// Apply every ready operation of `ops`, parking the rest. Returns the
    /// number applied, or the first operation that can never apply.
    fn integrate(&mut self, ops: Vec<Operation>, cache: &BaseCache) -> Result<usize, Rejected> {
        let mut ready: VecDeque<Operation> = ops.into();
        let mut applied = 0;
        while let Some(op) = ready.pop_front() {
            if self.version.observed(op.id) || self.deferred.contains(op.id) {
                continue;
            }
            if let Some(missing) = self.missing(&op) {
                debug!(op = %op.id, %missing, "deferring operation");
                self.deferred.defer(missing, op);
                continue;
            }
            self.state
                .apply(&op, cache)
                .map_err(|error| Rejected { op: op.id, error })?;
            self.version.observe(op.id);
            self.clock.observe(op.lamport);
            self.clock.observe_local(op.id);
            ready.extend(self.deferred.release(op.id));
            applied += 1;
        }
        Ok(applied)
    }
}

/// An operation that failed permanently while integrating a batch.
#[derive(Debug)]
struct Rejected {
    op: LocalTimestamp,
    error: TreeError,
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// Handle returned by [`WorkTree::on_change`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Observer {
    buffer: BufferId,
    callback: Box<dyn FnMut(&[Change])>,
}

// ---------------------------------------------------------------------------
// WorkTree
// ---------------------------------------------------------------------------

/// One replica's view of the shared tree.
pub struct WorkTree<P: BaseProvider> {
    replica: Replica,
    provider: P,
    cache: BaseCache,
    config: WorkTreeConfig,
    buffers: BTreeMap<BufferId, FileId>,
    open_files: BTreeMap<FileId, BufferId>,
    disposed: BTreeSet<BufferId>,
    observers: BTreeMap<SubscriptionId, Observer>,
    next_buffer: u64,
    next_subscription: u64,
}

impl<P: BaseProvider> fmt::Debug for WorkTree<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkTree")
            .field("replica", &self.replica.clock.replica())
            .field("version", &self.replica.version)
            .field("epoch", &self.replica.state.current_epoch())
            .field("buffers", &self.buffers.len())
            .field("deferred", &self.replica.deferred.len())
            .finish_non_exhaustive()
    }
}

// Observer callbacks are not `Send`; a work tree lives on one thread.
#[allow(clippy::future_not_send)]
impl<P: BaseProvider> WorkTree<P> {
    /// Create a work tree.
    ///
    /// With no `start_ops`, starts a fresh epoch on `base` and returns its
    /// `StartEpoch` operation for broadcast. Otherwise joins an existing
    /// session by applying `start_ops` (`base` is ignored) and returns any
    /// fixups.
    ///
    /// # Errors
    /// Propagates [`reset`](Self::reset) or [`apply_ops`](Self::apply_ops)
    /// failures.
    pub async fn create(
        replica_id: ReplicaId,
        base: Option<Oid>,
        start_ops: Vec<Operation>,
        provider: P,
        config: WorkTreeConfig,
    ) -> Result<(Self, Vec<OperationEnvelope>), TreeError> {
        let mut tree = Self {
            replica: Replica::new(replica_id),
            provider,
            cache: BaseCache::new(),
            config,
            buffers: BTreeMap::new(),
            open_files: BTreeMap::new(),
            disposed: BTreeSet::new(),
            observers: BTreeMap::new(),
            next_buffer: 0,
            next_subscription: 0,
        };
        let ops = if start_ops.is_empty() {
            tree.reset(base).await?
        } else {
            tree.apply_ops(start_ops).await?
        };
        Ok((tree, ops))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// This replica's id.
    #[must_use]
    pub const fn replica_id(&self) -> ReplicaId {
        self.replica.clock.replica()
    }

    /// Every operation observed so far.
    #[must_use]
    pub const fn version(&self) -> &Version {
        &self.replica.version
    }

    /// Whether everything in `version` has been observed.
    #[must_use]
    pub fn has_observed(&self, version: &Version) -> bool {
        self.replica.version.covers(version)
    }

    /// Base commit of the current epoch.
    #[must_use]
    pub fn head(&self) -> Option<Oid> {
        self.replica.state.head()
    }

    /// The current epoch.
    #[must_use]
    pub const fn current_epoch(&self) -> Option<EpochId> {
        self.replica.state.current_epoch()
    }

    /// Operations waiting on a causal dependency.
    #[must_use]
    pub const fn deferred_operation_count(&self) -> usize {
        self.replica.deferred.len()
    }

    /// Whether a visible entry exists at `path`.
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        matches!(self.replica.state.resolve(path), Ok(Some(_)))
    }

    /// The id of the visible entry at `path`.
    ///
    /// # Errors
    /// [`TreeError::UnknownPath`] if nothing is there, or
    /// [`TreeError::InvalidPath`] if `path` is malformed.
    pub fn file_id(&self, path: &Path) -> Result<FileId, TreeError> {
        self.replica
            .state
            .resolve(path)?
            .ok_or_else(|| TreeError::unknown_path(path))
    }

    /// The projected entry list.
    #[must_use]
    pub fn entries(&self, options: &EntriesOptions) -> Vec<Entry> {
        self.replica.state.entries(options)
    }

    // -----------------------------------------------------------------------
    // Tree mutations
    // -----------------------------------------------------------------------

    /// Resolve the parent directory of `path` and return it with the final
    /// name.
    fn parent_of<'a>(&self, path: &'a Path) -> Result<(FileId, &'a str), TreeError> {
        let names = path_components(path)?;
        let Some((name, dirs)) = names.split_last() else {
            return Err(TreeError::unknown_path(path));
        };
        let mut parent = FileId::Root;
        let mut walked = PathBuf::new();
        for dir in dirs {
            walked.push(dir);
            parent = self
                .replica
                .state
                .child_named(parent, dir)
                .ok_or_else(|| TreeError::unknown_path(&walked))?;
            if self.replica.state.file_type(parent) != Some(FileType::Directory) {
                return Err(TreeError::NotADirectory { path: walked });
            }
        }
        Ok((parent, *name))
    }

    fn commit(&mut self, payload: OpPayload) -> Result<OperationEnvelope, TreeError> {
        let op = self.replica.commit(&self.cache, payload)?;
        Ok(self.envelope(op))
    }

    fn envelope(&self, operation: Operation) -> OperationEnvelope {
        let epoch_head = self
            .replica
            .state
            .epoch(operation.epoch)
            .and_then(|r| r.head);
        OperationEnvelope {
            epoch_id: operation.epoch,
            epoch_head,
            operation,
        }
    }

    /// Create an empty file or directory.
    ///
    /// # Errors
    /// [`TreeError::PathExists`], [`TreeError::UnknownPath`] for a missing
    /// parent, [`TreeError::NotADirectory`], [`TreeError::InvalidPath`], or
    /// [`TreeError::NotInitialized`].
    pub fn create_file(
        &mut self,
        path: &Path,
        file_type: FileType,
    ) -> Result<OperationEnvelope, TreeError> {
        let (parent, name) = self.parent_of(path)?;
        if self.replica.state.child_named(parent, name).is_some() {
            return Err(TreeError::PathExists {
                path: path.to_path_buf(),
            });
        }
        let name = name.to_owned();
        self.commit(OpPayload::CreateFile {
            parent,
            name,
            file_type,
        })
    }

    /// Move or rename an entry.
    ///
    /// # Errors
    /// [`TreeError::UnknownPath`], [`TreeError::PathExists`],
    /// [`TreeError::InvalidMove`] when moving a directory into itself, or
    /// any path error.
    pub fn rename(&mut self, old_path: &Path, new_path: &Path) -> Result<OperationEnvelope, TreeError> {
        let file = self.file_id(old_path)?;
        let (parent, name) = self.parent_of(new_path)?;
        if let Some(existing) = self.replica.state.child_named(parent, name)
            && existing != file
        {
            return Err(TreeError::PathExists {
                path: new_path.to_path_buf(),
            });
        }
        if self.replica.state.is_ancestor(file, parent) {
            return Err(TreeError::InvalidMove {
                from: old_path.to_path_buf(),
                to: new_path.to_path_buf(),
            });
        }
        let name = name.to_owned();
        self.commit(OpPayload::Move { file, parent, name })
    }

    /// Remove an entry (and, implicitly, everything below it).
    ///
    /// # Errors
    /// [`TreeError::UnknownPath`] or any path error.
    pub fn remove(&mut self, path: &Path) -> Result<OperationEnvelope, TreeError> {
        let file = self.file_id(path)?;
        self.commit(OpPayload::Remove { file })
    }

    // -----------------------------------------------------------------------
    // Remote operations and epochs
    // -----------------------------------------------------------------------

    /// Merge operations from other replicas, in any order.
    ///
    /// Operations whose causal dependencies are missing are deferred and
    /// applied as soon as those dependencies arrive. Returns the fixup
    /// operations synthesized while merging; broadcast them like local ones.
    ///
    /// # Errors
    /// - [`TreeError::Provider`] if a new epoch's base cannot be fetched.
    /// - [`TreeError::UnknownFileId`] or [`TreeError::MalformedOperation`]
    ///   for operations of `ops` that can never apply. The whole batch is
    ///   rejected. A parked operation from an earlier batch that fails once
    ///   released is dropped with a warning instead.
    #[instrument(skip_all, fields(replica = %self.replica_id(), ops = ops.len()))]
    pub async fn apply_ops(
        &mut self,
        ops: Vec<Operation>,
    ) -> Result<Vec<OperationEnvelope>, TreeError> {
        let heads: BTreeSet<Oid> = ops
            .iter()
            .chain(self.replica.deferred.iter())
            .filter_map(|op| match op.payload {
                OpPayload::StartEpoch { head, .. } => head,
                _ => None,
            })
            .collect();
        for head in heads {
            self.prefetch_epoch(head).await?;
        }

        let incoming: BTreeSet<LocalTimestamp> = ops.iter().map(|op| op.id).collect();
        let mut dropped: Vec<LocalTimestamp> = Vec::new();
        let (mut next, applied) = loop {
            let mut next = self.replica.clone();
            for &id in &dropped {
                next.deferred.remove(id);
            }
            match next.integrate(ops.clone(), &self.cache) {
                Ok(applied) => break (next, applied),
                Err(rejected) if !incoming.contains(&rejected.op) => {
                    warn!(
                        op = %rejected.op,
                        error = %rejected.error,
                        "dropping parked operation that can never apply"
                    );
                    dropped.push(rejected.op);
                }
                Err(rejected) => return Err(rejected.error),
            }
        };
        next.state.rebuild();
        let mut fixups = Vec::new();
        if self.config.cycle_fixups {
            for revert in next.state.reverted().to_vec() {
                debug!(file = %revert.file, parent = %revert.parent, "emitting cycle fixup");
                fixups.push(next.commit(
                    &self.cache,
                    OpPayload::Move {
                        file: revert.file,
                        parent: revert.parent,
                        name: revert.name,
                    },
                )?);
            }
        }
        let old = std::mem::replace(&mut self.replica, next);
        self.notify(&old.version, old.state.chain());

        let backlog = self.replica.deferred.len();
        if backlog > self.config.deferred_warn_threshold {
            warn!(
                deferred = backlog,
                threshold = self.config.deferred_warn_threshold,
                "deferred operation backlog; a causal dependency may never arrive"
            );
        }
        debug!(applied, deferred = backlog, fixups = fixups.len(), "batch applied");
        Ok(fixups.into_iter().map(|op| self.envelope(op)).collect())
    }

    /// Start a new epoch on `head`, rebasing every file onto it.
    ///
    /// Uncommitted local work survives: text edits merge with the base
    /// change like a concurrent remote edit, and local creates, moves, and
    /// removals keep applying. Open buffers are notified with the delta.
    /// Returns the `StartEpoch` operation to broadcast.
    ///
    /// # Errors
    /// [`TreeError::Provider`] if the snapshot or a needed text cannot be
    /// fetched. Nothing changes in that case.
    #[instrument(skip_all, fields(replica = %self.replica_id(), head = ?head))]
    pub async fn reset(&mut self, head: Option<Oid>) -> Result<Vec<OperationEnvelope>, TreeError> {
        if let Some(oid) = head {
            self.prefetch_epoch(oid).await?;
        }
        let mut next = self.replica.clone();
        let prev = next.state.current_epoch();
        let op = next.commit(&self.cache, OpPayload::StartEpoch { head, prev })?;
        debug!(epoch = %op.epoch, "reset");
        let old = std::mem::replace(&mut self.replica, next);
        self.notify(&old.version, old.state.chain());
        Ok(vec![self.envelope(op)])
    }

    // -----------------------------------------------------------------------
    // Provider access
    // -----------------------------------------------------------------------

    async fn fetch_snapshot(&mut self, oid: Oid) -> Result<(), TreeError> {
        if self.cache.has_snapshot(oid) {
            return Ok(());
        }
        let entries = self.provider.base_entries(oid).await?;
        let snapshot = BaseSnapshot::from_entries(oid, entries)?;
        debug!(%oid, entries = snapshot.len(), "fetched base snapshot");
        self.cache.insert_snapshot(snapshot);
        Ok(())
    }

    async fn fetch_text(&mut self, oid: Oid, path: &Path) -> Result<(), TreeError> {
        if self.cache.has_text(oid, path) {
            return Ok(());
        }
        let text = self.provider.base_text(oid, path).await?;
        self.cache.insert_text(oid, path.to_path_buf(), text);
        Ok(())
    }

    /// Fetch the snapshot of `head` and the texts open buffers need from it.
    async fn prefetch_epoch(&mut self, head: Oid) -> Result<(), TreeError> {
        self.fetch_snapshot(head).await?;
        let Some(snapshot) = self.cache.snapshot(head) else {
            return Ok(());
        };
        let paths: Vec<PathBuf> = self
            .open_files
            .keys()
            .filter_map(|&id| snapshot.get(id))
            .filter(|node| node.file_type == FileType::Text)
            .map(|node| node.path.clone())
            .collect();
        for path in paths {
            self.fetch_text(head, &path).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Buffers
    // -----------------------------------------------------------------------

    /// Open the text file at `path`.
    ///
    /// Opening an already open file returns its existing buffer.
    ///
    /// # Errors
    /// [`TreeError::UnknownPath`], [`TreeError::NotATextFile`], or
    /// [`TreeError::Provider`] if base text cannot be fetched.
    #[instrument(skip_all, fields(replica = %self.replica_id(), path = %path.display()))]
    pub async fn open_text_file(&mut self, path: &Path) -> Result<BufferId, TreeError> {
        let file = self.file_id(path)?;
        if self.replica.state.file_type(file) != Some(FileType::Text) {
            return Err(TreeError::NotATextFile {
                path: path.to_path_buf(),
            });
        }
        if let Some(&buffer) = self.open_files.get(&file) {
            return Ok(buffer);
        }
        let sources: Vec<(Oid, PathBuf)> = self
            .replica
            .state
            .layer_specs(file)
            .into_iter()
            .filter_map(|spec| spec.source)
            .collect();
        for (oid, source) in sources {
            self.fetch_text(oid, &source).await?;
        }
        let contents = self.replica.state.materialize(file, &self.cache)?;
        self.replica.state.set_buffer(file, Some(contents));

        self.next_buffer += 1;
        let buffer = BufferId::new(self.next_buffer);
        self.buffers.insert(buffer, file);
        self.open_files.insert(file, buffer);
        debug!(%buffer, %file, "opened buffer");
        Ok(buffer)
    }

    fn file_of(&self, buffer: BufferId) -> Result<FileId, TreeError> {
        if self.disposed.contains(&buffer) {
            return Err(TreeError::BufferDisposed(buffer));
        }
        self.buffers
            .get(&buffer)
            .copied()
            .ok_or(TreeError::UnknownBuffer(buffer))
    }

    fn contents(&self, buffer: BufferId) -> Result<&TextBuffer, TreeError> {
        let file = self.file_of(buffer)?;
        self.replica
            .state
            .buffer(file)
            .ok_or(TreeError::UnknownBuffer(buffer))
    }

    fn view(&self) -> View<'_> {
        self.replica.state.view(&self.replica.version)
    }

    /// Replace each of `ranges` with `new_text` in one operation.
    ///
    /// Ranges are in current buffer coordinates and may be given in any
    /// order, but must not overlap.
    ///
    /// # Errors
    /// [`TreeError::InvalidRange`] for empty, out-of-bounds, reversed, or
    /// overlapping ranges; buffer lookup errors.
    pub fn edit(
        &mut self,
        buffer: BufferId,
        ranges: &[Range<Point>],
        new_text: &str,
    ) -> Result<OperationEnvelope, TreeError> {
        let file = self.file_of(buffer)?;
        let (deletions, insertions) = {
            let contents = self.contents(buffer)?;
            let view = self.view();
            let offsets = offset_ranges(contents, view, ranges)?;
            contents.plan_edit(view, &offsets, new_text)
        };
        let old_version = self.replica.version.clone();
        let old_chain = self.replica.state.chain().clone();
        let envelope = self.commit(OpPayload::Edit {
            file,
            deletions,
            insertions,
        })?;
        self.notify(&old_version, &old_chain);
        Ok(envelope)
    }

    /// The buffer's current text.
    ///
    /// # Errors
    /// [`TreeError::UnknownBuffer`] or [`TreeError::BufferDisposed`].
    pub fn text(&self, buffer: BufferId) -> Result<String, TreeError> {
        Ok(self.contents(buffer)?.text(self.view()))
    }

    /// Current path of the buffer's file, or `None` if it was removed.
    ///
    /// # Errors
    /// [`TreeError::UnknownBuffer`] or [`TreeError::BufferDisposed`].
    pub fn path(&self, buffer: BufferId) -> Result<Option<PathBuf>, TreeError> {
        let file = self.file_of(buffer)?;
        Ok(self.replica.state.path_of(file))
    }

    /// The composed changes that took the buffer from `version` to now.
    ///
    /// # Errors
    /// [`TreeError::UnknownBuffer`] or [`TreeError::BufferDisposed`].
    pub fn changes_since(
        &self,
        buffer: BufferId,
        version: &Version,
    ) -> Result<Vec<Change>, TreeError> {
        let contents = self.contents(buffer)?;
        let chain = self.replica.state.chain_at(version);
        let old = View { version, chain: &chain };
        Ok(contents.changes_between(old, self.view()))
    }

    fn anchor(&self, buffer: BufferId, point: Point, bias: Bias) -> Result<Anchor, TreeError> {
        let contents = self.contents(buffer)?;
        let view = self.view();
        let offset = contents
            .point_to_offset(view, point)
            .ok_or_else(|| TreeError::InvalidRange {
                start: point,
                end: point,
                reason: "point is outside the buffer".to_owned(),
            })?;
        Ok(contents.anchor_at(view, offset, bias))
    }

    /// An anchor that stays after the character before `point`.
    ///
    /// # Errors
    /// [`TreeError::InvalidRange`] if `point` is outside the buffer.
    pub fn anchor_before(&self, buffer: BufferId, point: Point) -> Result<Anchor, TreeError> {
        self.anchor(buffer, point, Bias::Left)
    }

    /// An anchor that stays before the character at `point`.
    ///
    /// # Errors
    /// [`TreeError::InvalidRange`] if `point` is outside the buffer.
    pub fn anchor_after(&self, buffer: BufferId, point: Point) -> Result<Anchor, TreeError> {
        self.anchor(buffer, point, Bias::Right)
    }

    /// Where `anchor` currently is.
    ///
    /// # Errors
    /// [`TreeError::UnknownAnchor`] if the anchor came from another buffer.
    pub fn resolve_anchor(&self, buffer: BufferId, anchor: &Anchor) -> Result<Point, TreeError> {
        let contents = self.contents(buffer)?;
        let view = self.view();
        let offset = contents
            .resolve_anchor(view, anchor)
            .ok_or(TreeError::UnknownAnchor(buffer))?;
        Ok(contents.offset_to_point(view, offset))
    }

    /// Call `callback` with each batch of changes to `buffer`.
    ///
    /// # Errors
    /// [`TreeError::UnknownBuffer`] or [`TreeError::BufferDisposed`].
    pub fn on_change(
        &mut self,
        buffer: BufferId,
        callback: impl FnMut(&[Change]) + 'static,
    ) -> Result<SubscriptionId, TreeError> {
        self.file_of(buffer)?;
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.observers.insert(
            id,
            Observer {
                buffer,
                callback: Box::new(callback),
            },
        );
        Ok(id)
    }

    /// Stop a subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        self.observers.remove(&subscription).is_some()
    }

    /// Close a buffer. Its id becomes unusable and its observers stop
    /// firing; reopening the file yields a new buffer.
    ///
    /// # Errors
    /// [`TreeError::UnknownBuffer`] or [`TreeError::BufferDisposed`].
    pub fn dispose_buffer(&mut self, buffer: BufferId) -> Result<(), TreeError> {
        let file = self.file_of(buffer)?;
        self.buffers.remove(&buffer);
        self.open_files.remove(&file);
        self.disposed.insert(buffer);
        self.observers.retain(|_, o| o.buffer != buffer);
        self.replica.state.set_buffer(file, None);
        debug!(%buffer, %file, "disposed buffer");
        Ok(())
    }

    /// Deliver the changes since `(old_version, old_chain)` to observers.
    fn notify(&mut self, old_version: &Version, old_chain: &BTreeSet<EpochId>) {
        if self.observers.is_empty() {
            return;
        }
        let watched: BTreeSet<BufferId> = self.observers.values().map(|o| o.buffer).collect();
        let old = View {
            version: old_version,
            chain: old_chain,
        };
        let new = self.view();
        let mut batches: BTreeMap<BufferId, Vec<Change>> = BTreeMap::new();
        for buffer in watched {
            let Some(contents) = self
                .buffers
                .get(&buffer)
                .and_then(|&file| self.replica.state.buffer(file))
            else {
                continue;
            };
            let changes = contents.changes_between(old, new);
            if !changes.is_empty() {
                batches.insert(buffer, changes);
            }
        }
        for observer in self.observers.values_mut() {
            if let Some(changes) = batches.get(&observer.buffer) {
                (observer.callback)(changes);
            }
        }
    }
}

/// Convert point ranges to sorted, validated character ranges.
fn offset_ranges(
    contents: &TextBuffer,
    view: View<'_>,
    ranges: &[Range<Point>],
) -> Result<Vec<Range<usize>>, TreeError> {
    let invalid = |start: Point, end: Point, reason: &str| TreeError::InvalidRange {
        start,
        end,
        reason: reason.to_owned(),
    };
    if ranges.is_empty() {
        return Err(invalid(Point::ZERO, Point::ZERO, "no ranges given"));
    }
    let mut offsets = Vec::with_capacity(ranges.len());
    for range in ranges {
        let (start, end) = (range.start, range.end);
        let lo = contents.point_to_offset(view, start);
        let hi = contents.point_to_offset(view, end);
        let (Some(lo), Some(hi)) = (lo, hi) else {
            return Err(invalid(start, end, "outside the buffer"));
        };
        if hi < lo {
            return Err(invalid(start, end, "end precedes start"));
        }
        offsets.push(lo..hi);
    }
    offsets.sort_by_key(|r| (r.start, r.end));
    for pair in offsets.windows(2) {
        if pair[0].end > pair[1].start || pair[0] == pair[1] {
            let start = contents.offset_to_point(view, pair[1].start);
            let end = contents.offset_to_point(view, pair[1].end);
            return Err(invalid(start, end, "overlaps another range"));
        }
    }
    Ok(offsets)
}
