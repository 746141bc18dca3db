//! Typed persistent state wrapper for virtual actors.
//!
//! `PersistentState<T>` provides a typed, cached interface over the raw
//! [`StateStore`]. It handles serialization and dirty tracking and provides
//! `state()` / `state_mut()` accessors. The activation manager owns one per
//! live activation; handlers only ever see `&mut T`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::state::StateStore;
use super::types::ActorId;
use crate::error::StateStoreError;

/// Typed persistent state for a virtual actor.
pub struct PersistentState<T> {
    value: T,
    record_exists: bool,
    dirty: bool,
    store: Arc<dyn StateStore>,
    id: ActorId,
}

impl<T: Serialize + DeserializeOwned + Default> PersistentState<T> {
    /// Load persistent state from the store.
    ///
    /// A missing record yields `T::default()`, not an error.
    pub async fn load(store: Arc<dyn StateStore>, id: ActorId) -> Result<Self, StateStoreError> {
        let (value, record_exists) = match store.load(&id).await? {
            Some(data) => (serde_json::from_slice(&data)?, true),
            None => (T::default(), false),
        };
        Ok(Self {
            value,
            record_exists,
            dirty: false,
            store,
            id,
        })
    }

    /// Get a reference to the current state.
    pub fn state(&self) -> &T {
        &self.value
    }

    /// Get a mutable reference to the current state.
    ///
    /// Changes are only persisted when [`write_state`](Self::write_state) is
    /// called; use [`mark_dirty`](Self::mark_dirty) to schedule a flush.
    pub fn state_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Flag the in-memory value as not yet persisted.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether the in-memory value differs from the last successful save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether a record for this actor exists in the store.
    pub fn record_exists(&self) -> bool {
        self.record_exists
    }

    /// Serialize the current value and save it, clearing the dirty flag on
    /// success. The in-memory value is kept either way.
    pub async fn write_state(&mut self) -> Result<(), StateStoreError> {
        let data = serde_json::to_vec(&self.value)?;
        self.store.save(&self.id, data).await?;
        self.dirty = false;
        self.record_exists = true;
        Ok(())
    }

    /// Save only if dirty. Returns whether a save happened.
    pub async fn flush(&mut self) -> Result<bool, StateStoreError> {
        if !self.dirty {
            return Ok(false);
        }
        self.write_state().await?;
        Ok(true)
    }
}
