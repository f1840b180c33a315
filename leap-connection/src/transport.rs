//! The transport seam.
//!
//! The LEAP wire protocol (TLS identity, framing, request correlation) lives
//! outside this crate. A [`Connector`] opens a [`Transport`] for a credential
//! bundle; the transport answers requests, registers push handlers and
//! reports lifecycle events through the channel handed back with it.
//!
//! `GatewayConnection` is the only component that ever holds a transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::credentials::CredentialBundle;
use crate::error::TransportError;
use crate::message::{RequestKind, Response, ResponseHandler};

/// Lifecycle and out-of-band messages emitted by an open transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A message that did not answer any request or subscription
    Unsolicited(Response),
    /// The connection dropped; no further events follow
    Disconnected,
}

/// An open transport plus the receiving end of its event channel.
pub struct TransportSession {
    pub transport: Arc<dyn Transport>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { transport, events }
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession").finish_non_exhaustive()
    }
}

/// Opens transports to a gateway.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `credentials.address()` and complete the handshake.
    async fn connect(&self, credentials: &CredentialBundle)
        -> Result<TransportSession, TransportError>;
}

/// An established, authenticated gateway connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and wait for its response.
    async fn request(
        &self,
        kind: RequestKind,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response, TransportError>;

    /// Register `handler` for pushes on `path`.
    async fn subscribe(&self, path: &str, handler: ResponseHandler) -> Result<(), TransportError>;
}
