//! Operation struct and OpPayload enum, plus their canonical JSON wire form.
//!
//! Operations are the unit of replication. Each one records a single
//! mutation (start an epoch, create, move, remove, edit) together with the
//! clock readings that let any replica apply it in causal order.
//!
//! Canonical JSON rules:
//! - Struct fields serialize in declaration order, maps with sorted keys
//! - No whitespace
//! - Deterministic: serialize twice → identical bytes

use std::fmt;

use serde::{Deserialize, Serialize};
use tandem_base::{FileType, Oid};

use crate::error::TreeError;
use crate::model::{FileId, Lamport, LocalTimestamp, ReplicaId, Version};

// ---------------------------------------------------------------------------
// EpochId
// ---------------------------------------------------------------------------

/// Identity of an epoch: the Lamport reading of its `StartEpoch` operation.
///
/// Epochs are totally ordered; the greatest observed epoch is current.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpochId(pub Lamport);

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Text references
// ---------------------------------------------------------------------------

/// Identity of one run of inserted text.
///
/// User insertions use the Lamport reading of their edit operation plus the
/// position of the insertion within it; base-layer insertions use the epoch's
/// Lamport reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InsertionId {
    /// Lamport reading of the inserting operation.
    pub lamport: Lamport,
    /// Index of the insertion within that operation.
    pub index: usize,
}

impl InsertionId {
    /// Integration precedence: later operations first, and within one
    /// operation earlier insertions first.
    #[must_use]
    pub fn precedence(self) -> (Lamport, std::cmp::Reverse<usize>) {
        (self.lamport, std::cmp::Reverse(self.index))
    }
}

/// A single character: offset `offset` within insertion `insertion`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharRef {
    /// Insertion containing the character.
    pub insertion: InsertionId,
    /// Character offset within the inserted text.
    pub offset: usize,
}

/// A run of new text placed directly after `after` (or at the very start of
/// the buffer when `after` is `None`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insertion {
    /// Index within the operation; part of the [`InsertionId`].
    pub index: usize,
    /// Character the run follows.
    pub after: Option<CharRef>,
    /// The inserted text.
    pub text: String,
}

/// Characters `start..end` of one insertion, marked deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSpan {
    /// Insertion the characters belong to.
    pub insertion: InsertionId,
    /// First deleted offset.
    pub start: usize,
    /// One past the last deleted offset.
    pub end: usize,
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// A single replicated operation.
///
/// `deps` is the author's version immediately before it produced the
/// operation; the operation is applicable once every entry of `deps` has been
/// observed and it is the next operation of its author.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique identity.
    pub id: LocalTimestamp,
    /// Total-order reading.
    pub lamport: Lamport,
    /// The epoch the author was in. A `StartEpoch` names its own epoch.
    pub epoch: EpochId,
    /// What the author had observed.
    pub deps: Version,
    /// The mutation.
    pub payload: OpPayload,
}

// ---------------------------------------------------------------------------
// OpPayload
// ---------------------------------------------------------------------------

/// The kind of mutation recorded by an [`Operation`].
///
/// Serialized with a `"type"` tag: `{"type":"move","file":"…",…}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpPayload {
    /// Begin a new epoch layered on base snapshot `head`.
    StartEpoch {
        /// Base commit, or `None` for an empty tree.
        head: Option<Oid>,
        /// The epoch current at the author when it reset.
        prev: Option<EpochId>,
    },

    /// Create a file or directory. Its id is `FileId::New(operation.id)`.
    CreateFile {
        /// Parent directory.
        parent: FileId,
        /// Entry name.
        name: String,
        /// Entry kind.
        file_type: FileType,
    },

    /// Place an existing entry under `parent` as `name` (rename, move, or a
    /// synthesized fixup).
    Move {
        /// Entry being moved.
        file: FileId,
        /// New parent directory.
        parent: FileId,
        /// New name.
        name: String,
    },

    /// Tombstone an entry. Removal is permanent for that id.
    Remove {
        /// Entry being removed.
        file: FileId,
    },

    /// Edit the contents of a text file.
    Edit {
        /// Target text file.
        file: FileId,
        /// Characters to delete.
        deletions: Vec<DeleteSpan>,
        /// Text to insert.
        insertions: Vec<Insertion>,
    },
}

impl OpPayload {
    /// Short tag for log lines.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StartEpoch { .. } => "start_epoch",
            Self::CreateFile { .. } => "create_file",
            Self::Move { .. } => "move",
            Self::Remove { .. } => "remove",
            Self::Edit { .. } => "edit",
        }
    }
}

impl Operation {
    /// Serialize this operation to canonical JSON.
    ///
    /// # Errors
    /// Returns [`TreeError::MalformedOperation`] if serialization fails
    /// (not expected for well-formed values).
    pub fn to_wire(&self) -> Result<String, TreeError> {
        serde_json::to_string(self).map_err(|e| TreeError::malformed(e.to_string()))
    }

    /// Decode an operation from its wire form.
    ///
    /// # Errors
    /// Returns [`TreeError::MalformedOperation`] if the text is not valid JSON
    /// or does not match the schema.
    pub fn from_wire(text: &str) -> Result<Self, TreeError> {
        serde_json::from_str(text).map_err(|e| TreeError::malformed(e.to_string()))
    }

    /// The file this operation targets, if any.
    #[must_use]
    pub const fn target(&self) -> Option<FileId> {
        match &self.payload {
            OpPayload::StartEpoch { .. } => None,
            OpPayload::CreateFile { .. } => Some(FileId::New(self.id)),
            OpPayload::Move { file, .. }
            | OpPayload::Remove { file }
            | OpPayload::Edit { file, .. } => Some(*file),
        }
    }
}

// ---------------------------------------------------------------------------
// OperationEnvelope
// ---------------------------------------------------------------------------

/// An operation plus the epoch context a caller needs to route it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationEnvelope {
    /// The epoch the operation belongs to.
    pub epoch_id: EpochId,
    /// Base commit of that epoch.
    pub epoch_head: Option<Oid>,
    /// The operation itself.
    pub operation: Operation,
}

impl OperationEnvelope {
    /// Lamport value of the epoch.
    #[must_use]
    pub const fn epoch_timestamp(&self) -> u64 {
        self.epoch_id.0.value
    }

    /// Replica that started the epoch.
    #[must_use]
    pub const fn epoch_replica_id(&self) -> ReplicaId {
        self.epoch_id.0.replica
    }

    /// Whether this envelope starts a new epoch.
    #[must_use]
    pub const fn is_epoch_start(&self) -> bool {
        matches!(self.operation.payload, OpPayload::StartEpoch { .. })
    }
}

impl From<OperationEnvelope> for Operation {
    fn from(envelope: OperationEnvelope) -> Self {
        envelope.operation
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
