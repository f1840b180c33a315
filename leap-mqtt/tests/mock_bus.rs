//! Test doubles for the bridge: a recording bus publisher and a minimal
//! gateway connector that records every request.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use leap_connection::{
    Connector, CredentialBundle, RequestKind, Response, ResponseHandler, Transport,
    TransportError, TransportSession,
};
use leap_mqtt::{BridgeError, BusPublisher, StateMessage};
use serde_json::Value;
use tokio::sync::mpsc;

/// Publisher that keeps every message and subscription.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<StateMessage>>,
    subscriptions: Mutex<Vec<String>>,
    should_fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<StateMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn payload_of(&self, topic: &str) -> Option<String> {
        self.published()
            .into_iter()
            .rev()
            .find(|m| m.topic == topic)
            .map(|m| m.payload)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }
}

#[async_trait]
impl BusPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<(), BridgeError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(BridgeError::Mqtt("mock broker unavailable".to_string()));
        }
        self.published.lock().unwrap().push(StateMessage {
            topic: topic.to_string(),
            payload,
            retain,
        });
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<(), BridgeError> {
        self.subscriptions.lock().unwrap().push(filter.to_string());
        Ok(())
    }
}

/// Requests seen by `RecordingTransport`.
pub type RequestLog = Arc<Mutex<Vec<(RequestKind, String, Option<Value>)>>>;

pub struct RecordingTransport {
    log: RequestLog,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn request(
        &self,
        kind: RequestKind,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response, TransportError> {
        self.log.lock().unwrap().push((kind, path.to_string(), body));
        Ok(Response::default().with_status("200 OK"))
    }

    async fn subscribe(&self, _path: &str, _handler: ResponseHandler) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Connector whose transports answer every request with `200 OK`.
#[derive(Default)]
pub struct RecordingConnector {
    pub log: RequestLog,
    events: Mutex<Vec<mpsc::UnboundedSender<leap_connection::TransportEvent>>>,
}

impl RecordingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Requests of `kind` on `path`.
    pub fn requests_to(&self, kind: RequestKind, path: &str) -> Vec<Option<Value>> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, p, _)| *k == kind && p == path)
            .map(|(_, _, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(
        &self,
        _credentials: &CredentialBundle,
    ) -> Result<TransportSession, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Keep the sender so the session is not reported as closed
        self.events.lock().unwrap().push(tx);
        let transport = Arc::new(RecordingTransport {
            log: Arc::clone(&self.log),
        });
        Ok(TransportSession::new(transport, rx))
    }
}
