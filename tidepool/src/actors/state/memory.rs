use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::StateStore;
use crate::actors::types::ActorId;
use crate::error::StateStoreError;

/// In-memory state store for tests, demos and single-process clusters.
///
/// Saves and loads can be made to fail on demand to exercise the
/// persistence-failure paths of the activation manager.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
    saves: AtomicU64,
}

impl InMemoryStateStore {
    /// Create a new empty in-memory state store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `load` fail (or succeed again).
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves since creation.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Raw snapshot stored for `id`, bypassing fault injection.
    pub fn get(&self, id: &ActorId) -> Option<Vec<u8>> {
        self.entries.read().get(&id.storage_key()).cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been saved yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, id: &ActorId) -> Result<Option<Vec<u8>>, StateStoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StateStoreError::Unavailable(format!(
                "injected load failure for {id}"
            )));
        }
        Ok(self.entries.read().get(&id.storage_key()).cloned())
    }

    async fn save(&self, id: &ActorId, data: Vec<u8>) -> Result<(), StateStoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StateStoreError::Unavailable(format!(
                "injected save failure for {id}"
            )));
        }
        self.entries.write().insert(id.storage_key(), data);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
