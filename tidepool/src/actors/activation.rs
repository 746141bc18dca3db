//! Activation manager: one sequential task per live actor identity.
//!
//! The manager owns every activation of one actor type on one host. The
//! first call for an identity spawns its task, which loads state and then
//! drains a FIFO inbox, so calls for one identity never run concurrently
//! while different identities proceed in parallel.
//!
//! # Lifecycle
//!
//! ```text
//!   call ──► catalog miss ──► spawn task ──► Activating (load)
//!                                               │ ok          │ err
//!                                               ▼             ▼
//!                                            Active      reply executed=false
//!                                               │             to queued calls
//!   idle / deactivate / shutdown / lost ──►     ▼             │
//!                                         Deactivating        │
//!                        drain inbox, flush dirty state       │
//!                                               ▼             ▼
//!                                            Unloaded ◄───────┘
//! ```
//!
//! A call that finds its activation `Deactivating` waits for `Unloaded` and
//! then activates a fresh instance, which loads what the old one flushed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::directory::PlacementDirectory;
use super::handler::{ActorContext, ActorHandler};
use super::host_config::ActivationConfig;
use super::lifecycle::{ActivationState, DeactivationReason};
use super::persistent_state::PersistentState;
use super::state::StateStore;
use super::types::{ActivationId, ActorId, HostId, PlacementRecord, RemoteError};
use crate::error::StateStoreError;

/// Per-host activation bookkeeping.
#[derive(Debug, Default)]
pub struct HostStats {
    activations: AtomicU64,
    deactivations: AtomicU64,
    last_activation_id: AtomicU64,
}

impl HostStats {
    /// Activations started on this host (including ones whose load failed).
    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::SeqCst)
    }

    /// Activations that went through `Deactivating`.
    pub fn deactivations(&self) -> u64 {
        self.deactivations.load(Ordering::SeqCst)
    }

    fn next_activation_id(&self) -> ActivationId {
        ActivationId::new(self.last_activation_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

struct Call<H: ActorHandler> {
    request: H::Request,
    reply: oneshot::Sender<Result<H::Response, RemoteError>>,
}

enum LifecycleCommand {
    Deactivate(DeactivationReason),
}

struct ActivationHandle<H: ActorHandler> {
    activation_id: ActivationId,
    calls: mpsc::Sender<Call<H>>,
    control: mpsc::Sender<LifecycleCommand>,
    state: watch::Receiver<ActivationState>,
    task: AbortHandle,
}

impl<H: ActorHandler> Clone for ActivationHandle<H> {
    fn clone(&self) -> Self {
        Self {
            activation_id: self.activation_id,
            calls: self.calls.clone(),
            control: self.control.clone(),
            state: self.state.clone(),
            task: self.task.clone(),
        }
    }
}

impl<H: ActorHandler> ActivationHandle<H> {
    /// Resolves once the activation reached `Unloaded` or its task is gone.
    async fn wait_unloaded(&self) {
        let mut state = self.state.clone();
        let _ = state
            .wait_for(|s| *s == ActivationState::Unloaded)
            .await
            .map(|_| ());
    }
}

struct Shared<H: ActorHandler> {
    host: HostId,
    config: ActivationConfig,
    store: Arc<dyn StateStore>,
    directory: Arc<dyn PlacementDirectory>,
    stats: Arc<HostStats>,
    catalog: Mutex<HashMap<ActorId, ActivationHandle<H>>>,
    closed: AtomicBool,
}

impl<H: ActorHandler> Shared<H> {
    /// Remove the catalog entry (if still ours) and publish `Unloaded`.
    fn retire(
        &self,
        id: &ActorId,
        activation_id: ActivationId,
        state: &watch::Sender<ActivationState>,
    ) {
        {
            let mut catalog = self.catalog.lock();
            if catalog
                .get(id)
                .is_some_and(|h| h.activation_id == activation_id)
            {
                catalog.remove(id);
            }
        }
        transition(state, ActivationState::Unloaded);
    }

    /// Owner named by the directory, registering this host if there is none.
    async fn owner_of(&self, id: &ActorId) -> Result<HostId, RemoteError> {
        let record = match self.directory.lookup(id).await {
            Ok(Some(record)) => record,
            Ok(None) => self
                .directory
                .register(PlacementRecord::new(id.clone(), self.host.clone()))
                .await
                .map_err(|e| RemoteError::Directory(e.to_string()))?,
            Err(e) => return Err(RemoteError::Directory(e.to_string())),
        };
        Ok(record.host)
    }
}

/// Owns the activations of actor type `H` on one host.
pub(crate) struct ActivationManager<H: ActorHandler> {
    shared: Arc<Shared<H>>,
}

impl<H: ActorHandler> ActivationManager<H> {
    pub(crate) fn new(
        host: HostId,
        config: ActivationConfig,
        store: Arc<dyn StateStore>,
        directory: Arc<dyn PlacementDirectory>,
        stats: Arc<HostStats>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                host,
                config,
                store,
                directory,
                stats,
                catalog: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Execute `request` on the activation of `id`, activating it if needed.
    pub(crate) async fn call(
        &self,
        id: &ActorId,
        request: H::Request,
    ) -> Result<H::Response, RemoteError> {
        let shared = &self.shared;
        if shared.closed.load(Ordering::SeqCst) {
            return Err(RemoteError::HostShuttingDown {
                host: shared.host.clone(),
            });
        }

        let owner = shared.owner_of(id).await?;
        if owner != shared.host {
            debug!(actor = %id, host = %shared.host, owner = %owner, "rejecting call for actor owned elsewhere");
            self.notify(id, DeactivationReason::PlacementLost);
            return Err(RemoteError::PlacementStale { owner });
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let mut call = Call {
            request,
            reply: reply_tx,
        };
        loop {
            let handle = self.get_or_activate(id)?;
            match handle.calls.send(call).await {
                Ok(()) => break,
                Err(mpsc::error::SendError(returned)) => {
                    debug!(actor = %id, activation = %handle.activation_id, "activation is deactivating, waiting to re-activate");
                    call = returned;
                    handle.wait_unloaded().await;
                }
            }
        }

        let outcome = match shared.config.call_timeout {
            Some(after) => match tokio::time::timeout(after, reply_rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(RemoteError::ActivationTimeout {
                        after_ms: saturating_millis(after),
                    })
                }
            },
            None => reply_rx.await,
        };
        match outcome {
            Ok(result) => result,
            Err(_) => Err(RemoteError::ActivationLost),
        }
    }

    /// Double-checked catalog lookup: reuse the live activation or spawn one.
    fn get_or_activate(&self, id: &ActorId) -> Result<ActivationHandle<H>, RemoteError> {
        let shared = &self.shared;
        let mut catalog = shared.catalog.lock();
        if shared.closed.load(Ordering::SeqCst) {
            return Err(RemoteError::HostShuttingDown {
                host: shared.host.clone(),
            });
        }
        if let Some(handle) = catalog.get(id) {
            if !handle.task.is_finished() {
                return Ok(handle.clone());
            }
        }

        let activation_id = shared.stats.next_activation_id();
        let (calls_tx, calls_rx) = mpsc::channel(shared.config.inbox_capacity.max(1));
        let (control_tx, control_rx) = mpsc::channel(4);
        let (state_tx, state_rx) = watch::channel(ActivationState::Unloaded);
        let task = tokio::spawn(run_activation::<H>(
            shared.clone(),
            id.clone(),
            activation_id,
            calls_rx,
            control_rx,
            state_tx,
        ));

        let handle = ActivationHandle {
            activation_id,
            calls: calls_tx,
            control: control_tx,
            state: state_rx,
            task: task.abort_handle(),
        };
        catalog.insert(id.clone(), handle.clone());
        Ok(handle)
    }

    /// Ask a live activation to deactivate without waiting for it.
    fn notify(&self, id: &ActorId, reason: DeactivationReason) {
        if let Some(handle) = self.shared.catalog.lock().get(id) {
            let _ = handle.control.try_send(LifecycleCommand::Deactivate(reason));
        }
    }

    /// Deactivate `id` and wait until it is unloaded. Returns `false` if it
    /// was not live.
    pub(crate) async fn deactivate(&self, id: &ActorId, reason: DeactivationReason) -> bool {
        let handle = self.shared.catalog.lock().get(id).cloned();
        let Some(handle) = handle else {
            return false;
        };
        let _ = handle
            .control
            .send(LifecycleCommand::Deactivate(reason))
            .await;
        handle.wait_unloaded().await;
        true
    }

    /// Stop accepting calls, then deactivate every live activation.
    pub(crate) async fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        let handles: Vec<ActivationHandle<H>> =
            self.shared.catalog.lock().values().cloned().collect();
        for handle in &handles {
            let _ = handle
                .control
                .send(LifecycleCommand::Deactivate(
                    DeactivationReason::HostShutdown,
                ))
                .await;
        }
        for handle in &handles {
            handle.wait_unloaded().await;
        }
    }

    /// Kill every activation without flushing.
    pub(crate) fn abort(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        let handles: Vec<ActivationHandle<H>> =
            self.shared.catalog.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.task.abort();
        }
    }

    /// Number of live activations.
    pub(crate) fn live_count(&self) -> usize {
        self.shared.catalog.lock().len()
    }

    /// Current state of `id` on this host.
    pub(crate) fn state_of(&self, id: &ActorId) -> ActivationState {
        self.shared
            .catalog
            .lock()
            .get(id)
            .map(|h| *h.state.borrow())
            .unwrap_or(ActivationState::Unloaded)
    }
}

fn saturating_millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn transition(state: &watch::Sender<ActivationState>, next: ActivationState) {
    let previous = state.send_replace(next);
    debug_assert!(
        previous.can_transition_to(next),
        "invalid activation transition {previous} -> {next}"
    );
}

async fn run_activation<H: ActorHandler>(
    shared: Arc<Shared<H>>,
    id: ActorId,
    activation_id: ActivationId,
    mut calls: mpsc::Receiver<Call<H>>,
    mut control: mpsc::Receiver<LifecycleCommand>,
    state_tx: watch::Sender<ActivationState>,
) {
    transition(&state_tx, ActivationState::Activating);
    shared.stats.activations.fetch_add(1, Ordering::SeqCst);

    let mut state =
        match PersistentState::<H::State>::load(shared.store.clone(), id.clone()).await {
            Ok(state) => state,
            Err(e) => {
                warn!(actor = %id, activation = %activation_id, reason = %DeactivationReason::LoadFailed, error = %e, "state load failed, rejecting queued calls");
                calls.close();
                while let Some(call) = calls.recv().await {
                    let _ = call.reply.send(Err(RemoteError::PersistenceUnavailable {
                        executed: false,
                        reason: e.to_string(),
                    }));
                }
                shared.retire(&id, activation_id, &state_tx);
                return;
            }
        };

    transition(&state_tx, ActivationState::Active);
    info!(
        actor = %id,
        host = %shared.host,
        activation = %activation_id,
        record_exists = state.record_exists(),
        "activated"
    );

    let ctx = ActorContext {
        id: id.clone(),
        host: shared.host.clone(),
        activation_id,
    };
    let mut reason = serve(&shared, &ctx, &mut state, &mut calls, &mut control).await;

    transition(&state_tx, ActivationState::Deactivating);
    calls.close();
    while let Some(call) = calls.recv().await {
        if let Some(lost) = handle_call(&shared, &ctx, &mut state, call).await {
            reason = lost;
        }
    }

    if reason.flushes_state() {
        match state.flush().await {
            Ok(true) => debug!(actor = %id, activation = %activation_id, "flushed state before deactivation"),
            Ok(false) => {}
            Err(e) => {
                warn!(actor = %id, activation = %activation_id, error = %e, "final flush failed, deactivating anyway")
            }
        }
    } else if state.is_dirty() {
        warn!(actor = %id, activation = %activation_id, "dropping unsaved state of an activation that lost placement");
    }

    shared.stats.deactivations.fetch_add(1, Ordering::SeqCst);
    shared.retire(&id, activation_id, &state_tx);
    if reason.is_failure() {
        warn!(actor = %id, host = %shared.host, activation = %activation_id, reason = %reason, "deactivated");
    } else {
        info!(actor = %id, host = %shared.host, activation = %activation_id, reason = %reason, "deactivated");
    }
}

/// Serve calls until something asks the activation to go away.
async fn serve<H: ActorHandler>(
    shared: &Shared<H>,
    ctx: &ActorContext,
    state: &mut PersistentState<H::State>,
    calls: &mut mpsc::Receiver<Call<H>>,
    control: &mut mpsc::Receiver<LifecycleCommand>,
) -> DeactivationReason {
    let config = &shared.config;
    let mut last_call = Instant::now();

    loop {
        let idle_deadline = last_call + config.idle_timeout;
        let wake = if state.is_dirty() {
            (Instant::now() + config.flush_retry_interval).min(idle_deadline)
        } else {
            idle_deadline
        };

        tokio::select! {
            biased;

            Some(command) = control.recv() => match command {
                LifecycleCommand::Deactivate(reason) => return reason,
            },

            call = calls.recv() => {
                let Some(call) = call else {
                    return DeactivationReason::HostShutdown;
                };
                last_call = Instant::now();
                if let Some(reason) = handle_call(shared, ctx, state, call).await {
                    return reason;
                }
            }

            _ = tokio::time::sleep_until(wake) => {
                if Instant::now() >= idle_deadline {
                    return DeactivationReason::IdleTimeout;
                }
                if state.is_dirty() {
                    match shared.owner_of(&ctx.id).await {
                        Ok(owner) if owner != ctx.host => return DeactivationReason::PlacementLost,
                        Ok(_) => match state.flush().await {
                            Ok(_) => info!(actor = %ctx.id, activation = %ctx.activation_id, "deferred flush succeeded"),
                            Err(e) => warn!(actor = %ctx.id, activation = %ctx.activation_id, error = %e, "deferred flush failed"),
                        },
                        Err(e) => warn!(actor = %ctx.id, error = ?e, "ownership check failed, postponing flush"),
                    }
                }
            }
        }
    }
}

/// Run one call. Returns a deactivation reason if the activation must stop.
async fn handle_call<H: ActorHandler>(
    shared: &Shared<H>,
    ctx: &ActorContext,
    state: &mut PersistentState<H::State>,
    call: Call<H>,
) -> Option<DeactivationReason> {
    match shared.owner_of(&ctx.id).await {
        Ok(owner) if owner != ctx.host => {
            debug!(actor = %ctx.id, owner = %owner, "placement lost, rejecting call");
            let _ = call.reply.send(Err(RemoteError::PlacementStale { owner }));
            return Some(DeactivationReason::PlacementLost);
        }
        Ok(_) => {}
        Err(e) => {
            let _ = call.reply.send(Err(e));
            return None;
        }
    }

    let result = execute::<H>(&shared.config, ctx, state, call.request).await;
    // A caller that gave up dropped its receiver; the result is discarded.
    let _ = call.reply.send(result);
    None
}

async fn execute<H: ActorHandler>(
    config: &ActivationConfig,
    ctx: &ActorContext,
    state: &mut PersistentState<H::State>,
    request: H::Request,
) -> Result<H::Response, RemoteError> {
    let mutating = H::is_mutating(&request);
    let response = H::handle(state.state_mut(), request, ctx);
    if !mutating {
        return Ok(response);
    }

    state.mark_dirty();
    match write_through(config, &ctx.id, state).await {
        Ok(()) => Ok(response),
        Err(e) => Err(RemoteError::PersistenceUnavailable {
            executed: true,
            reason: e.to_string(),
        }),
    }
}

async fn write_through<T>(
    config: &ActivationConfig,
    id: &ActorId,
    state: &mut PersistentState<T>,
) -> Result<(), StateStoreError>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Default,
{
    let attempts = config.save_attempts.max(1);
    let mut attempt = 1;
    loop {
        match state.write_state().await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= attempts => {
                warn!(actor = %id, attempts, error = %e, "state save failed, keeping value dirty");
                return Err(e);
            }
            Err(e) => {
                debug!(actor = %id, attempt, error = %e, "state save failed, retrying");
                tokio::time::sleep(config.save_backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::actors::{ActorType, InMemoryPlacementDirectory, InMemoryStateStore};
    use crate::counter::{Counter, CounterRequest, CounterResponse};

    struct Fixture {
        manager: ActivationManager<Counter>,
        store: Arc<InMemoryStateStore>,
        directory: Arc<InMemoryPlacementDirectory>,
        stats: Arc<HostStats>,
        host: HostId,
    }

    fn fixture(config: ActivationConfig) -> Fixture {
        let store = Arc::new(InMemoryStateStore::new());
        let directory = Arc::new(InMemoryPlacementDirectory::new());
        let stats = Arc::new(HostStats::default());
        let host = HostId::new("127.0.0.1:11111", 1);
        let manager = ActivationManager::new(
            host.clone(),
            config,
            store.clone(),
            directory.clone(),
            stats.clone(),
        );
        Fixture {
            manager,
            store,
            directory,
            stats,
            host,
        }
    }

    fn key(key: &str) -> ActorId {
        ActorId::new(ActorType::new("Counter"), key)
    }

    async fn increment(f: &Fixture, id: &ActorId, delta: i64) -> Result<i64, RemoteError> {
        match f.manager.call(id, CounterRequest::Increment(delta)).await? {
            CounterResponse::Count(value) => Ok(value),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    async fn get(f: &Fixture, id: &ActorId) -> Result<i64, RemoteError> {
        match f.manager.call(id, CounterRequest::GetCount).await? {
            CounterResponse::Count(value) => Ok(value),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_saturating_millis() {
        assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_calls_activate_once_and_persist() {
        let f = fixture(ActivationConfig::default());
        let id = key("counter");

        assert_eq!(increment(&f, &id, 5).await.unwrap(), 5);
        assert_eq!(increment(&f, &id, -2).await.unwrap(), 3);
        assert_eq!(get(&f, &id).await.unwrap(), 3);

        assert_eq!(f.stats.activations(), 1);
        assert_eq!(f.manager.live_count(), 1);
        assert_eq!(f.manager.state_of(&id), ActivationState::Active);
        // Reads never touch the store.
        assert_eq!(f.store.save_count(), 2);

        // The host registered itself as owner.
        let record = f.directory.lookup(&id).await.unwrap().unwrap();
        assert_eq!(record.host, f.host);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_serialized() {
        let f = Arc::new(fixture(ActivationConfig::default()));
        let id = key("hot");

        let mut tasks = Vec::new();
        for delta in 1..=50i64 {
            let f = f.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move { increment(&f, &id, delta).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(get(&f, &id).await.unwrap(), (1..=50).sum::<i64>());
        assert_eq!(f.stats.activations(), 1);
    }

    #[tokio::test]
    async fn test_deactivate_then_reactivate_loads_saved_value() {
        let f = fixture(ActivationConfig::default());
        let id = key("counter");
        increment(&f, &id, 7).await.unwrap();

        assert!(f.manager.deactivate(&id, DeactivationReason::ExplicitRequest).await);
        assert_eq!(f.manager.live_count(), 0);
        assert_eq!(f.stats.deactivations(), 1);
        assert!(!f.manager.deactivate(&id, DeactivationReason::ExplicitRequest).await);

        assert_eq!(get(&f, &id).await.unwrap(), 7);
        assert_eq!(f.stats.activations(), 2);
    }

    #[tokio::test]
    async fn test_load_failure_rejects_then_recovers() {
        let f = fixture(ActivationConfig::default());
        let id = key("counter");
        f.store.save(&id, br#"{"value":11}"#.to_vec()).await.unwrap();

        f.store.fail_loads(true);
        let err = get(&f, &id).await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::PersistenceUnavailable { executed: false, .. }
        ));
        // Give the failed activation time to retire.
        tokio::task::yield_now().await;

        f.store.fail_loads(false);
        assert_eq!(get(&f, &id).await.unwrap(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_failure_keeps_value_and_flushes_later() {
        let f = fixture(ActivationConfig::default());
        let id = key("counter");
        increment(&f, &id, 1).await.unwrap();

        f.store.fail_saves(true);
        let err = increment(&f, &id, 4).await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::PersistenceUnavailable { executed: true, .. }
        ));
        // The in-memory value is not rolled back.
        assert_eq!(get(&f, &id).await.unwrap(), 5);

        f.store.fail_saves(false);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.store.get(&id), Some(br#"{"value":5}"#.to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_eviction() {
        let config = ActivationConfig::default().with_idle_timeout(Duration::from_secs(30));
        let f = fixture(config);
        let id = key("counter");
        increment(&f, &id, 3).await.unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(f.manager.live_count(), 0);
        assert_eq!(f.stats.deactivations(), 1);

        assert_eq!(get(&f, &id).await.unwrap(), 3);
        assert_eq!(f.stats.activations(), 2);
    }

    #[tokio::test]
    async fn test_lost_placement_rejects_and_deactivates() {
        let f = fixture(ActivationConfig::default());
        let id = key("counter");
        increment(&f, &id, 1).await.unwrap();

        let current = f.directory.lookup(&id).await.unwrap().unwrap();
        let other = HostId::new("127.0.0.1:11112", 2);
        f.directory
            .replace(&current, PlacementRecord::new(id.clone(), other.clone()))
            .await
            .unwrap();

        let err = get(&f, &id).await.unwrap_err();
        assert_eq!(err, RemoteError::PlacementStale { owner: other });

        // The notified activation goes away on its own.
        for _ in 0..10 {
            if f.manager.live_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(f.manager.live_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_and_refuses_calls() {
        let f = fixture(ActivationConfig::default());
        let id = key("counter");
        increment(&f, &id, 2).await.unwrap();

        f.manager.shutdown().await;
        assert_eq!(f.manager.live_count(), 0);
        assert!(matches!(
            get(&f, &id).await,
            Err(RemoteError::HostShuttingDown { .. })
        ));
        assert_eq!(f.store.get(&id), Some(br#"{"value":2}"#.to_vec()));
    }

    #[tokio::test]
    async fn test_abort_drops_activations() {
        let f = fixture(ActivationConfig::default());
        increment(&f, &key("a"), 1).await.unwrap();
        increment(&f, &key("b"), 1).await.unwrap();
        assert_eq!(f.manager.live_count(), 2);

        f.manager.abort();
        assert_eq!(f.manager.live_count(), 0);
        assert!(get(&f, &key("a")).await.is_err());
    }
}
