//! Deferred operations waiting on a causal dependency.
//!
//! Each parked operation is keyed by the first operation it is missing. When
//! that operation is applied, everything keyed on it is handed back for
//! another readiness check; nothing is ever polled.

use std::collections::BTreeMap;

use crate::model::LocalTimestamp;
use crate::oplog::types::Operation;

/// Operations parked until a named dependency is applied.
#[derive(Clone, Debug, Default)]
pub struct DeferredQueue {
    by_dependency: BTreeMap<LocalTimestamp, Vec<Operation>>,
    len: usize,
}

impl DeferredQueue {
    /// An empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            by_dependency: BTreeMap::new(),
            len: 0,
        }
    }

    /// Park `op` until `missing` is applied.
    pub fn defer(&mut self, missing: LocalTimestamp, op: Operation) {
        self.by_dependency.entry(missing).or_default().push(op);
        self.len += 1;
    }

    /// Take every operation that was waiting for `applied`.
    pub fn release(&mut self, applied: LocalTimestamp) -> Vec<Operation> {
        let released = self.by_dependency.remove(&applied).unwrap_or_default();
        self.len -= released.len();
        released
    }

    /// Drop a parked operation. Returns whether it was parked.
    pub fn remove(&mut self, id: LocalTimestamp) -> bool {
        let mut found = false;
        self.by_dependency.retain(|_, ops| {
            let before = ops.len();
            ops.retain(|op| op.id != id);
            found |= ops.len() != before;
            !ops.is_empty()
        });
        if found {
            self.len -= 1;
        }
        found
    }

    /// Number of parked operations.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is parked.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether an operation with this id is already parked.
    #[must_use]
    pub fn contains(&self, id: LocalTimestamp) -> bool {
        self.by_dependency
            .values()
            .any(|ops| ops.iter().any(|op| op.id == id))
    }

    /// Iterate parked operations in dependency order.
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.by_dependency.values().flatten()
    }
}

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;
    use crate::model::{FileId, Lamport, ReplicaId, Version};
    use crate::oplog::types::{EpochId, OpPayload};

    fn ts(replica: u64, seq: u64) -> LocalTimestamp {
        LocalTimestamp::new(ReplicaId::new(replica), seq)
    }

    fn remove(id: LocalTimestamp) -> Operation {
        Operation {
            id,
            lamport: Lamport::new(id.seq, id.replica),
            epoch: EpochId(Lamport::new(1, ReplicaId::new(0))),
            deps: Version::new(),
            payload: OpPayload::Remove { file: FileId::Root },
        }
    }

    #[test]
    fn release_returns_only_matching_ops() {
        let mut q = DeferredQueue::new();
        q.defer(ts(1, 1), remove(ts(1, 2)));
        q.defer(ts(1, 1), remove(ts(2, 1)));
        q.defer(ts(3, 1), remove(ts(3, 2)));
        assert_eq!(q.len(), 3);
        assert!(q.contains(ts(2, 1)));

        let released = q.release(ts(1, 1));
        assert_eq!(released.len(), 2);
        assert_eq!(q.len(), 1);
        assert!(q.release(ts(9, 9)).is_empty());
        assert_eq!(q.release(ts(3, 1)).len(), 1);
        assert!(q.is_empty());
    }

    #[test]
    fn remove_drops_one_parked_op() {
        let mut q = DeferredQueue::new();
        q.defer(ts(1, 1), remove(ts(1, 2)));
        q.defer(ts(1, 1), remove(ts(2, 1)));
        assert!(q.remove(ts(1, 2)));
        assert!(!q.remove(ts(1, 2)));
        assert_eq!(q.len(), 1);
        assert!(!q.contains(ts(1, 2)));
        assert_eq!(q.release(ts(1, 1)).len(), 1);
    }
}
