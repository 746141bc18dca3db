//! Actor behavior and typed references.
//!
//! An [`ActorHandler`] describes one actor type: its durable state, the
//! requests it accepts, and how a request transforms the state. Handlers are
//! plain functions over `&mut State`; the activation manager owns the state,
//! serializes calls, and persists after every mutating request.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::proxy::ActorProxy;
use super::types::{ActivationId, ActorId, ActorType, HostId, HostInfo};

/// Context provided to a handler for each call.
#[derive(Debug, Clone)]
pub struct ActorContext {
    /// The identity of the actor currently being invoked.
    pub id: ActorId,
    /// The host lifetime running the activation.
    pub host: HostId,
    /// The activation serving the call.
    pub activation_id: ActivationId,
}

impl ActorContext {
    /// Location report for this activation.
    pub fn host_info(&self) -> HostInfo {
        HostInfo {
            actor_id: self.id.clone(),
            host_address: self.host.address.clone(),
            host_generation: self.host.generation,
            activation_id: self.activation_id,
        }
    }
}

/// Trait implemented by each actor type.
///
/// # Example
///
/// ```rust,ignore
/// struct Greeter;
///
/// impl ActorHandler for Greeter {
///     type State = GreeterState;
///     type Request = GreeterRequest;
///     type Response = GreeterResponse;
///
///     fn actor_type() -> ActorType { ActorType::new("Greeter") }
///
///     fn is_mutating(request: &GreeterRequest) -> bool {
///         matches!(request, GreeterRequest::SetName(_))
///     }
///
///     fn handle(state: &mut GreeterState, request: GreeterRequest, ctx: &ActorContext) -> GreeterResponse {
///         /* ... */
///     }
/// }
/// ```
pub trait ActorHandler: Send + Sync + 'static {
    /// Durable state. `Default` is the value of an actor that was never saved.
    type State: Serialize + DeserializeOwned + Default + Send + 'static;
    /// Request type, serialized into `ActorMessage::body`.
    type Request: Serialize + DeserializeOwned + Send + 'static;
    /// Response type, serialized into `ActorResponse::body`.
    type Response: Serialize + DeserializeOwned + Send + 'static;

    /// The registered actor type name.
    fn actor_type() -> ActorType;

    /// Whether `request` changes the state and must be persisted before
    /// the reply is sent.
    fn is_mutating(request: &Self::Request) -> bool;

    /// Execute one request against the state.
    fn handle(state: &mut Self::State, request: Self::Request, ctx: &ActorContext)
        -> Self::Response;
}

/// Typed reference constructed from a proxy.
///
/// Enables the `host.actor_ref::<CounterRef>("counter")` pattern.
pub trait ActorRef: Sized {
    /// The actor type this reference talks to.
    type Handler: ActorHandler;

    /// Wrap a proxy to one actor instance.
    fn from_proxy(proxy: ActorProxy<Self::Handler>) -> Self;
}
