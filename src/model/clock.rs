//! Logical clocks and version vectors.
//!
//! Every operation carries three clock readings:
//!
//! | Reading            | Meaning                                             |
//! |--------------------|-----------------------------------------------------|
//! | [`LocalTimestamp`] | `(replica, seq)`: the operation's unique identity   |
//! | [`Lamport`]        | `(value, replica)`: total order consistent with causality |
//! | [`Version`]        | everything the author had observed (its dependencies) |
//!
//! Within a replica `seq` is strictly increasing and starts at 1. A replica
//! observing a remote Lamport value jumps its own clock past it, so an
//! operation's Lamport value always exceeds those of its causal predecessors.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ReplicaId
// ---------------------------------------------------------------------------

/// Identity of one participant.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ReplicaId(u64);

impl ReplicaId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Generate a random identifier (rand 0.9 thread-local PRNG).
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random::<u64>())
    }

    /// The raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// LocalTimestamp
// ---------------------------------------------------------------------------

/// Identity of an operation: its author and per-author sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalTimestamp {
    /// Authoring replica.
    pub replica: ReplicaId,
    /// 1-based sequence number within that replica.
    pub seq: u64,
}

impl LocalTimestamp {
    /// Create a timestamp.
    #[must_use]
    pub const fn new(replica: ReplicaId, seq: u64) -> Self {
        Self { replica, seq }
    }
}

impl fmt::Display for LocalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.replica, self.seq)
    }
}

// ---------------------------------------------------------------------------
// Lamport
// ---------------------------------------------------------------------------

/// Lamport timestamp with replica tie-break.
///
/// Ordered by `value`, then by `replica`, which makes it a total order across
/// all operations of all replicas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lamport {
    /// Logical time.
    pub value: u64,
    /// Replica that produced the reading.
    pub replica: ReplicaId,
}

impl Lamport {
    /// Create a reading.
    #[must_use]
    pub const fn new(value: u64, replica: ReplicaId) -> Self {
        Self { value, replica }
    }
}

impl PartialOrd for Lamport {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lamport {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.replica.cmp(&other.replica))
    }
}

impl fmt::Display for Lamport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.value, self.replica)
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Version vector: the highest sequence number observed from each replica.
///
/// Absent replicas read as 0. Two versions are ordered only when one covers
/// the other entry-wise; concurrent versions compare as `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(BTreeMap<ReplicaId, u64>);

impl Version {
    /// The empty version.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Highest sequence observed from `replica`.
    #[must_use]
    pub fn get(&self, replica: ReplicaId) -> u64 {
        self.0.get(&replica).copied().unwrap_or(0)
    }

    /// Record `ts` as observed.
    pub fn observe(&mut self, ts: LocalTimestamp) {
        let entry = self.0.entry(ts.replica).or_insert(0);
        *entry = (*entry).max(ts.seq);
    }

    /// Whether the operation `ts` is covered by this version.
    #[must_use]
    pub fn observed(&self, ts: LocalTimestamp) -> bool {
        self.get(ts.replica) >= ts.seq
    }

    /// Entry-wise maximum.
    pub fn join(&mut self, other: &Self) {
        for (&replica, &seq) in &other.0 {
            self.observe(LocalTimestamp::new(replica, seq));
        }
    }

    /// Whether this version contains anything `other` has not observed.
    #[must_use]
    pub fn changed_since(&self, other: &Self) -> bool {
        self.0.iter().any(|(&replica, &seq)| seq > other.get(replica))
    }

    /// Whether every entry of `other` is covered here.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        !other.changed_since(self)
    }

    /// The first operation of `other` this version is missing, if any.
    #[must_use]
    pub fn first_missing(&self, other: &Self) -> Option<LocalTimestamp> {
        other
            .0
            .iter()
            .find(|&(&replica, &seq)| seq > self.get(replica))
            .map(|(&replica, _)| LocalTimestamp::new(replica, self.get(replica) + 1))
    }

    /// Iterate `(replica, seq)` entries in replica order.
    pub fn iter(&self) -> impl Iterator<Item = (ReplicaId, u64)> + '_ {
        self.0.iter().map(|(&replica, &seq)| (replica, seq))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.changed_since(other), other.changed_since(self)) {
            (false, false) => Some(Ordering::Equal),
            (false, true) => Some(Ordering::Less),
            (true, false) => Some(Ordering::Greater),
            (true, true) => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (replica, seq)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{replica}:{seq}")?;
        }
        f.write_str("}")
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// A replica's pair of clocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clock {
    replica: ReplicaId,
    last_seq: u64,
    lamport: u64,
}

impl Clock {
    /// A fresh clock (next sequence is 1).
    #[must_use]
    pub const fn new(replica: ReplicaId) -> Self {
        Self {
            replica,
            last_seq: 0,
            lamport: 0,
        }
    }

    /// The owning replica.
    #[must_use]
    pub const fn replica(&self) -> ReplicaId {
        self.replica
    }

    /// Allocate the identity and Lamport reading of the next local operation.
    pub const fn tick(&mut self) -> (LocalTimestamp, Lamport) {
        self.last_seq += 1;
        self.lamport += 1;
        (
            LocalTimestamp::new(self.replica, self.last_seq),
            Lamport::new(self.lamport, self.replica),
        )
    }

    /// Advance past a remote reading.
    pub fn observe(&mut self, lamport: Lamport) {
        self.lamport = self.lamport.max(lamport.value);
    }

    /// Advance past a local timestamp of our own replica (used when replaying
    /// our own operations from a log).
    pub fn observe_local(&mut self, ts: LocalTimestamp) {
        if ts.replica == self.replica {
            self.last_seq = self.last_seq.max(ts.seq);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
