//! Core value types: clocks, file identity, and text positions.

pub mod clock;
pub mod file_id;
pub mod point;

pub use clock::{Clock, Lamport, LocalTimestamp, ReplicaId, Version};
pub use file_id::FileId;
pub use point::Point;
