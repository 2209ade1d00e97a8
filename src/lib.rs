//! tandem: a replicated file tree with collaborative text buffers, layered
//! over an immutable base snapshot.
//!
//! Each participant holds a [`WorkTree`]. Local mutations produce
//! [`Operation`]s that any number of replicas can exchange in any order;
//! every replica that has applied the same set of operations shows the same
//! tree and the same text. Moving the whole tree to a newer base commit
//! ([`WorkTree::reset`]) keeps every uncommitted edit.
//!
//! # Modules
//!
//! - [`model`]: clocks, versions, file identity, text positions.
//! - [`oplog`]: operation types, wire codec, deferred queue.
//! - [`tree`]: base snapshots, replicated tree state, entry listing.
//! - [`text`]: the per-file text CRDT, anchors, change sets.
//! - [`rebase`]: character diff and base layers.
//! - [`work_tree`]: the [`WorkTree`] facade.

pub mod config;
pub mod error;
pub mod model;
pub mod oplog;
pub mod rebase;
pub mod text;
pub mod tree;
pub mod work_tree;

pub use config::{ConfigError, WorkTreeConfig};
pub use error::TreeError;
pub use model::{FileId, Lamport, LocalTimestamp, Point, ReplicaId, Version};
pub use oplog::{EpochId, OpPayload, Operation, OperationEnvelope};
pub use tandem_base::{BaseEntry, BaseProvider, FileType, Oid};
pub use text::{Anchor, Bias, BufferId, Change};
pub use tree::{EntriesOptions, Entry, EntryStatus};
pub use work_tree::{SubscriptionId, WorkTree};
