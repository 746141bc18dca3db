//! Actor state persistence: durable storage for virtual actor state.
//!
//! Given an actor identity, a [`StateStore`] reads and writes the actor's
//! serialized state snapshot. The store never sees typed state;
//! serialization is handled by [`PersistentState<T>`](super::PersistentState).
//!
//! # Design
//!
//! - `StateStore` is a trait object injected at host configuration time, so
//!   implementations range from an in-memory map to a durable backend.
//! - Records are keyed by [`ActorId::storage_key`] (`"<type>/<key>"`).
//! - `save` replaces the whole record atomically. A concurrent `load` sees
//!   either the old or the new snapshot, never a mix. Several hosts can race
//!   to save the same key during a handover, so per-key atomicity is
//!   required of every implementation.

use std::fmt;

use async_trait::async_trait;

use super::types::ActorId;
use crate::error::StateStoreError;

mod file;
mod memory;

pub use file::FileStateStore;
pub use memory::InMemoryStateStore;

/// Durable storage for serialized actor state.
#[async_trait]
pub trait StateStore: fmt::Debug + Send + Sync {
    /// Read the snapshot for `id`.
    ///
    /// Returns `Ok(None)` if nothing has been saved for this actor yet.
    async fn load(&self, id: &ActorId) -> Result<Option<Vec<u8>>, StateStoreError>;

    /// Replace the snapshot for `id`.
    async fn save(&self, id: &ActorId, data: Vec<u8>) -> Result<(), StateStoreError>;
}
