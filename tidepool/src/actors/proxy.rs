//! Client proxy: location-transparent calls to one actor instance.
//!
//! A proxy resolves its identity through a [`KeyRouter`], sends the
//! serialized request to the owner over the [`HostTransport`], and decodes
//! the reply. When the contacted host turns out not to own the actor (or
//! cannot be reached) the proxy drops its cached placement, resolves again
//! and retries exactly once; a second failure is returned to the caller.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::handler::ActorHandler;
use super::router::KeyRouter;
use super::types::{ActorId, ActorMessage};
use crate::error::ActorError;

/// Typed handle to one virtual actor.
pub struct ActorProxy<H: ActorHandler> {
    id: ActorId,
    router: Arc<KeyRouter>,
    call_timeout: Option<Duration>,
    _handler: PhantomData<fn() -> H>,
}

impl<H: ActorHandler> Clone for ActorProxy<H> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            router: self.router.clone(),
            call_timeout: self.call_timeout,
            _handler: PhantomData,
        }
    }
}

impl<H: ActorHandler> std::fmt::Debug for ActorProxy<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorProxy")
            .field("id", &self.id)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl<H: ActorHandler> ActorProxy<H> {
    /// Proxy for the actor of type `H` with the given key.
    pub fn new(key: impl Into<String>, router: Arc<KeyRouter>) -> Self {
        Self {
            id: ActorId::new(H::actor_type(), key),
            router,
            call_timeout: None,
            _handler: PhantomData,
        }
    }

    /// Stop waiting for a reply after `timeout`.
    ///
    /// The call itself is not cancelled on the host: once queued it runs to
    /// completion and its result is discarded.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// The target identity.
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// Send `request` and wait for the response.
    pub async fn call(&self, request: H::Request) -> Result<H::Response, ActorError> {
        let body = serde_json::to_vec(&request)?;
        let reply = match self.attempt(&body).await {
            Err(err) if err.requires_reresolve() => {
                debug!(actor = %self.id, error = %err, "re-resolving and retrying once");
                self.router.invalidate(&self.id);
                self.attempt(&body).await?
            }
            other => other?,
        };
        Ok(serde_json::from_slice(&reply)?)
    }

    async fn attempt(&self, body: &[u8]) -> Result<Vec<u8>, ActorError> {
        let resolution = self.router.resolve(&self.id).await?;
        let message = ActorMessage {
            target: self.id.clone(),
            body: body.to_vec(),
        };

        let transport = self.router.transport();
        let sent = transport.send(&resolution.host, message);
        let sent = match self.call_timeout {
            Some(after) => tokio::time::timeout(after, sent).await.map_err(|_| {
                ActorError::ActivationTimeout {
                    id: self.id.clone(),
                    after,
                }
            })?,
            None => sent.await,
        };
        let response = sent.map_err(|e| {
            debug!(actor = %self.id, error = %e, "send failed");
            ActorError::HostUnreachable {
                host: resolution.host.clone(),
            }
        })?;

        response
            .body
            .map_err(|remote| ActorError::from_remote(&self.id, remote))
    }
}
