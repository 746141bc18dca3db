//! Shared fixtures for cluster integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tidepool::actors::{
    ActivationConfig, ActorHandler, ActorHost, ActorId, ClusterConfig, HostConfig, HostInfo,
    InMemoryStateStore, SharedMembership, StateStore,
};
use tidepool::counter::{Counter, CounterState};

pub const BASE_PORT: u16 = 11111;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn address(offset: u16) -> String {
    format!("127.0.0.1:{}", BASE_PORT + offset)
}

/// In-memory cluster whose state store the test keeps a handle on.
pub fn cluster_with_store() -> (ClusterConfig, Arc<InMemoryStateStore>) {
    let store = Arc::new(InMemoryStateStore::new());
    let cluster = ClusterConfig::builder()
        .name("test")
        .membership(Arc::new(SharedMembership::new()))
        .state_store(store.clone())
        .build()
        .expect("cluster config");
    (cluster, store)
}

pub async fn start_host(
    cluster: &ClusterConfig,
    offset: u16,
    activation: ActivationConfig,
) -> ActorHost {
    let config = HostConfig::builder(address(offset))
        .activation(activation)
        .build();
    ActorHost::new(cluster.clone(), config)
        .register::<Counter>()
        .start()
        .await
        .expect("host start")
}

pub async fn start_hosts(cluster: &ClusterConfig, count: u16) -> Vec<ActorHost> {
    let mut hosts = Vec::new();
    for offset in 0..count {
        hosts.push(start_host(cluster, offset, ActivationConfig::default()).await);
    }
    hosts
}

/// Index of the host that produced `info`.
pub fn owner_index(hosts: &[ActorHost], info: &HostInfo) -> usize {
    hosts
        .iter()
        .position(|h| {
            h.id().address == info.host_address && h.id().generation == info.host_generation
        })
        .expect("owner is one of the running hosts")
}

pub fn counter_id(key: &str) -> ActorId {
    ActorId::new(Counter::actor_type(), key)
}

/// Value persisted for `key`, if any.
pub async fn stored_value(store: &dyn StateStore, key: &str) -> Option<i64> {
    let bytes = store.load(&counter_id(key)).await.expect("load")?;
    let state: CounterState = serde_json::from_slice(&bytes).expect("decode");
    Some(state.value)
}
