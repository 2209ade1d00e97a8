//! Base snapshot boundary for tandem.
//!
//! This crate defines the [`BaseProvider`] trait, the single interface
//! through which a work tree reads the committed, content-addressed state it
//! is layered on. The work tree never talks to a repository directly; it is
//! generic over a provider and programs against the trait.
//!
//! # Crate layout
//!
//! - [`provider`]: the [`BaseProvider`] trait definition.
//! - [`types`]: value types used in trait signatures ([`Oid`], [`BaseEntry`],
//!   [`FileType`]).
//! - [`error`]: the [`BaseError`] enum returned by all trait methods.
//! - [`memory`]: [`MemoryProvider`], an in-memory provider for fixtures and
//!   tests.

pub mod error;
pub mod memory;
pub mod provider;
pub mod types;

// Re-export the trait and commonly used types at the crate root:
// `use tandem_base::{BaseProvider, Oid, BaseError};`
pub use error::BaseError;
pub use memory::{CommitSnapshot, MemoryProvider};
pub use provider::BaseProvider;
pub use types::{BaseEntry, FileType, Oid};
