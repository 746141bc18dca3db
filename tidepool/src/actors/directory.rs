//! Placement directory: maps actor identities to their owning host lifetime.
//!
//! The directory is the cluster's single source of truth for ownership. The
//! router writes to it when it places an actor, and every host checks it
//! before executing a call so that a host which lost ownership stops
//! serving the identity.
//!
//! # Register Semantics
//!
//! Records are never deleted, only superseded:
//!
//! - `register(record)` with no existing entry stores `record`.
//! - `register(record)` racing an existing entry keeps whichever owner wins
//!   [`HostId::supersedes`](super::types::HostId::supersedes) (higher
//!   generation, then higher address).
//! - `replace(stale, record)` is a compare-and-swap used when the current
//!   owner is dead or unreachable; it only succeeds if the entry still equals
//!   `stale`.
//!
//! Every write returns the record that is current afterwards, so the caller
//! learns the winner without a second lookup.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::types::{ActorId, PlacementRecord};
use crate::error::DirectoryError;

/// Shared ownership map for virtual actors.
#[async_trait]
pub trait PlacementDirectory: fmt::Debug + Send + Sync {
    /// Look up the current owner of `id`.
    async fn lookup(&self, id: &ActorId) -> Result<Option<PlacementRecord>, DirectoryError>;

    /// Register `record`, resolving conflicts last-writer-wins by host
    /// generation. Returns the winning record.
    async fn register(&self, record: PlacementRecord) -> Result<PlacementRecord, DirectoryError>;

    /// Replace `stale` with `record` if `stale` is still current.
    ///
    /// Returns `record` on success, otherwise the entry that replaced
    /// `stale` in the meantime.
    async fn replace(
        &self,
        stale: &PlacementRecord,
        record: PlacementRecord,
    ) -> Result<PlacementRecord, DirectoryError>;
}

/// In-memory directory shared by every host of an in-process cluster.
#[derive(Debug, Default)]
pub struct InMemoryPlacementDirectory {
    entries: RwLock<HashMap<ActorId, PlacementRecord>>,
}

impl InMemoryPlacementDirectory {
    /// Create a new empty directory.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlacementDirectory for InMemoryPlacementDirectory {
    async fn lookup(&self, id: &ActorId) -> Result<Option<PlacementRecord>, DirectoryError> {
        Ok(self.entries.read().get(id).cloned())
    }

    async fn register(&self, record: PlacementRecord) -> Result<PlacementRecord, DirectoryError> {
        let mut entries = self.entries.write();
        match entries.get(&record.actor_id) {
            Some(existing) if !record.host.supersedes(&existing.host) => Ok(existing.clone()),
            _ => {
                entries.insert(record.actor_id.clone(), record.clone());
                Ok(record)
            }
        }
    }

    async fn replace(
        &self,
        stale: &PlacementRecord,
        record: PlacementRecord,
    ) -> Result<PlacementRecord, DirectoryError> {
        let mut entries = self.entries.write();
        match entries.get(&record.actor_id) {
            Some(current) if current != stale => Ok(current.clone()),
            _ => {
                entries.insert(record.actor_id.clone(), record.clone());
                Ok(record)
            }
        }
    }
}
