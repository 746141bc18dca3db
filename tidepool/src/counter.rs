//! The counter actor.
//!
//! A durable signed 64-bit counter addressed by key. `Increment` and `Reset`
//! are persisted before they are acknowledged; `GetCount` and `GetHostInfo`
//! never touch the store.
//!
//! ```rust,ignore
//! let counter: CounterRef = host.actor_ref("counter");
//! assert_eq!(counter.increment(5).await?, 5);
//! assert_eq!(counter.increment(-2).await?, 3);
//! counter.reset().await?;
//! println!("{}", counter.get_host_info().await?);
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actors::{ActorContext, ActorHandler, ActorProxy, ActorRef, ActorType, HostInfo};
use crate::error::ActorError;

/// Registered type name of the counter actor.
pub const COUNTER_ACTOR_TYPE: &str = "Counter";

/// Durable counter state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    /// Current value.
    pub value: i64,
}

/// Requests understood by the counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterRequest {
    /// Add a (possibly negative) delta.
    Increment(i64),
    /// Read the current value.
    GetCount,
    /// Set the value to zero.
    Reset,
    /// Report where the activation lives.
    GetHostInfo,
}

/// Counter replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterResponse {
    /// Value after the call.
    Count(i64),
    /// Acknowledgement without a value.
    Done,
    /// Location of the activation.
    HostInfo(HostInfo),
}

/// The counter actor type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counter;

impl ActorHandler for Counter {
    type State = CounterState;
    type Request = CounterRequest;
    type Response = CounterResponse;

    fn actor_type() -> ActorType {
        ActorType::new(COUNTER_ACTOR_TYPE)
    }

    fn is_mutating(request: &CounterRequest) -> bool {
        matches!(request, CounterRequest::Increment(_) | CounterRequest::Reset)
    }

    fn handle(state: &mut CounterState, request: CounterRequest, ctx: &ActorContext) -> CounterResponse {
        match request {
            CounterRequest::Increment(delta) => {
                // Wraps on overflow.
                state.value = state.value.wrapping_add(delta);
                debug!(actor = %ctx.id, delta, value = state.value, "increment");
                CounterResponse::Count(state.value)
            }
            CounterRequest::GetCount => CounterResponse::Count(state.value),
            CounterRequest::Reset => {
                state.value = 0;
                debug!(actor = %ctx.id, "reset");
                CounterResponse::Done
            }
            CounterRequest::GetHostInfo => CounterResponse::HostInfo(ctx.host_info()),
        }
    }
}

/// Typed reference to a counter.
#[derive(Debug, Clone)]
pub struct CounterRef {
    proxy: ActorProxy<Counter>,
}

impl ActorRef for CounterRef {
    type Handler = Counter;

    fn from_proxy(proxy: ActorProxy<Counter>) -> Self {
        Self { proxy }
    }
}

impl CounterRef {
    /// The underlying proxy.
    pub fn proxy(&self) -> &ActorProxy<Counter> {
        &self.proxy
    }

    /// Add `delta` and return the new value.
    pub async fn increment(&self, delta: i64) -> Result<i64, ActorError> {
        match self.proxy.call(CounterRequest::Increment(delta)).await? {
            CounterResponse::Count(value) => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    /// Current value.
    pub async fn get_count(&self) -> Result<i64, ActorError> {
        match self.proxy.call(CounterRequest::GetCount).await? {
            CounterResponse::Count(value) => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    /// Set the value to zero.
    pub async fn reset(&self) -> Result<(), ActorError> {
        match self.proxy.call(CounterRequest::Reset).await? {
            CounterResponse::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Where the counter is currently active.
    pub async fn get_host_info(&self) -> Result<HostInfo, ActorError> {
        match self.proxy.call(CounterRequest::GetHostInfo).await? {
            CounterResponse::HostInfo(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: CounterResponse) -> ActorError {
    ActorError::Codec(format!("unexpected counter response: {response:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::{ActivationId, ActorId, HostId};

    fn ctx() -> ActorContext {
        ActorContext {
            id: ActorId::new(Counter::actor_type(), "counter"),
            host: HostId::new("127.0.0.1:11111", 3),
            activation_id: ActivationId::new(7),
        }
    }

    fn run(state: &mut CounterState, requests: Vec<CounterRequest>) -> Vec<CounterResponse> {
        let ctx = ctx();
        requests
            .into_iter()
            .map(|r| Counter::handle(state, r, &ctx))
            .collect()
    }

    #[test]
    fn test_scenario_sequence() {
        let mut state = CounterState::default();
        let responses = run(
            &mut state,
            vec![
                CounterRequest::Increment(5),
                CounterRequest::Increment(-2),
                CounterRequest::GetCount,
                CounterRequest::Reset,
                CounterRequest::GetCount,
            ],
        );
        assert_eq!(
            responses,
            vec![
                CounterResponse::Count(5),
                CounterResponse::Count(3),
                CounterResponse::Count(3),
                CounterResponse::Done,
                CounterResponse::Count(0),
            ]
        );
    }

    #[test]
    fn test_increment_wraps() {
        let mut state = CounterState { value: i64::MAX };
        assert_eq!(
            run(&mut state, vec![CounterRequest::Increment(1)]),
            vec![CounterResponse::Count(i64::MIN)]
        );
    }

    #[test]
    fn test_mutating_requests() {
        assert!(Counter::is_mutating(&CounterRequest::Increment(0)));
        assert!(Counter::is_mutating(&CounterRequest::Reset));
        assert!(!Counter::is_mutating(&CounterRequest::GetCount));
        assert!(!Counter::is_mutating(&CounterRequest::GetHostInfo));
    }

    #[test]
    fn test_host_info_reports_context() {
        let mut state = CounterState { value: 9 };
        let responses = run(&mut state, vec![CounterRequest::GetHostInfo]);
        let CounterResponse::HostInfo(info) = &responses[0] else {
            panic!("expected host info, got {responses:?}");
        };
        assert_eq!(info.host_generation, 3);
        assert_eq!(
            info.to_string(),
            "Actor: Counter/counter, Address: 127.0.0.1:11111, HostGeneration: 3"
        );
        assert_eq!(state.value, 9);
    }

    #[test]
    fn test_state_wire_format() {
        let json = serde_json::to_string(&CounterState { value: 3 }).unwrap();
        assert_eq!(json, r#"{"value":3}"#);
        let request: CounterRequest = serde_json::from_str(r#"{"Increment":-4}"#).unwrap();
        assert_eq!(request, CounterRequest::Increment(-4));
    }
}
