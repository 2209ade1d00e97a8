//! Operation log: replicated operation types and the deferred queue.

pub mod queue;
pub mod types;

pub use queue::DeferredQueue;
pub use types::{
    CharRef, DeleteSpan, EpochId, InsertionId, Insertion, OpPayload, Operation,
    OperationEnvelope,
};
