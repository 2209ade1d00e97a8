//! Shared helpers for tandem integration tests.
//!
//! Every replica in a test shares one in-memory provider, so base commits
//! only need to be described once.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use tandem::{
    BufferId, Change, EntriesOptions, Entry, Oid, Operation, OperationEnvelope, Point, ReplicaId,
    WorkTree, WorkTreeConfig,
};
use tandem_base::{CommitSnapshot, MemoryProvider};

pub type Tree = WorkTree<Arc<MemoryProvider>>;

/// A deterministic commit id.
pub fn oid(n: u8) -> Oid {
    Oid::from_bytes([n; 20])
}

pub fn at(row: u32, column: u32) -> Point {
    Point::new(row, column)
}

/// Build a shared provider from `(oid, snapshot)` pairs.
pub fn provider(commits: impl IntoIterator<Item = (Oid, CommitSnapshot)>) -> Arc<MemoryProvider> {
    let mut provider = MemoryProvider::new();
    for (oid, snapshot) in commits {
        provider.insert_commit(oid, snapshot);
    }
    Arc::new(provider)
}

/// Start a session on `base` as replica `id`.
pub async fn start(id: u64, base: Oid, provider: &Arc<MemoryProvider>) -> (Tree, Vec<Operation>) {
    let (tree, ops) = WorkTree::create(
        ReplicaId::new(id),
        Some(base),
        Vec::new(),
        Arc::clone(provider),
        WorkTreeConfig::default(),
    )
    .await
    .expect("create failed");
    (tree, unwrap_ops(ops))
}

/// Join a session from its operations so far.
pub async fn join(id: u64, ops: &[Operation], provider: &Arc<MemoryProvider>) -> Tree {
    let (tree, _) = WorkTree::create(
        ReplicaId::new(id),
        None,
        ops.to_vec(),
        Arc::clone(provider),
        WorkTreeConfig::default(),
    )
    .await
    .expect("join failed");
    tree
}

pub fn unwrap_ops(envelopes: impl IntoIterator<Item = OperationEnvelope>) -> Vec<Operation> {
    envelopes.into_iter().map(Operation::from).collect()
}

/// Apply `ops` and return the fixups as plain operations.
pub async fn deliver(tree: &mut Tree, ops: &[Operation]) -> Vec<Operation> {
    unwrap_ops(tree.apply_ops(ops.to_vec()).await.expect("apply_ops failed"))
}

pub fn all_entries(tree: &Tree) -> Vec<Entry> {
    tree.entries(&EntriesOptions::all().show_deleted(true))
}

pub async fn text_of(tree: &mut Tree, path: &str) -> String {
    let buffer = tree
        .open_text_file(Path::new(path))
        .await
        .expect("open failed");
    tree.text(buffer).expect("text failed")
}

/// Records every batch delivered to an observer.
#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<Vec<Vec<Change>>>>);

impl Recorder {
    pub fn attach(tree: &mut Tree, buffer: BufferId) -> Self {
        let recorder = Self::default();
        let sink = Rc::clone(&recorder.0);
        tree.on_change(buffer, move |changes| sink.borrow_mut().push(changes.to_vec()))
            .expect("on_change failed");
        recorder
    }

    pub fn batches(&self) -> Vec<Vec<Change>> {
        self.0.borrow().clone()
    }
}

/// A `Change` from tuples.
pub fn change(start: (u32, u32), end: (u32, u32), text: &str) -> Change {
    Change {
        start: at(start.0, start.1),
        end: at(end.0, end.1),
        text: text.to_owned(),
    }
}
