//! The persistent gateway connection
//!
//! [`GatewayConnection`] owns the transport for the lifetime of the process.
//! Each successful `connect()` opens a new transport session, replays the
//! subscription registry against it, starts relaying transport events onto
//! the [`EventBus`] and, when enabled, discovers and subscribes keypad LEDs.
//!
//! The connection never reconnects by itself. A dropped transport or a failed
//! ping moves it to [`ConnectionState::Disconnected`] and publishes
//! [`GatewayEvent::Disconnected`]; the `ReconnectSupervisor` decides when to
//! try again.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use leap_normalizer::led_state;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ConnectionConfig;
use crate::credentials::CredentialBundle;
use crate::error::{GatewayError, Result, TransportError};
use crate::event::{EventBus, GatewayEvent};
use crate::message::{RequestKind, Response, ResponseHandler};
use crate::registry::{EventHandler, NormalizationRule, SubscriptionRegistry, SubscriptionTarget};
use crate::topology::{self, LedRegistry, ResourceReader, Topology};
use crate::transport::{Connector, Transport, TransportEvent, TransportSession};

/// Lifecycle of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// One open transport and everything tied to its lifetime.
struct Session {
    generation: u64,
    transport: Arc<dyn Transport>,
    /// Paths registered on this transport
    subscribed: Arc<DashSet<String>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    fn handle(&self) -> SessionHandle {
        SessionHandle {
            generation: self.generation,
            transport: Arc::clone(&self.transport),
            subscribed: Arc::clone(&self.subscribed),
        }
    }

    fn abort(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Borrowed view of the current session, usable without holding the lock.
#[derive(Clone)]
struct SessionHandle {
    generation: u64,
    transport: Arc<dyn Transport>,
    subscribed: Arc<DashSet<String>>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    credentials: CredentialBundle,
    config: ConnectionConfig,
    state: AtomicU8,
    session: RwLock<Option<Session>>,
    generation: AtomicU64,
    /// Completed connect attempts
    attempts: AtomicU64,
    /// Serializes connect attempts and keeps the outcome of the latest one
    connect_lock: Mutex<Option<Result<()>>>,
    registry: RwLock<SubscriptionRegistry>,
    leds: LedRegistry,
    topology: RwLock<Topology>,
    bus: EventBus,
}

impl Inner {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }
}

/// The single logical connection to a LEAP gateway.
///
/// Cloning is cheap; every clone refers to the same connection.
#[derive(Clone)]
pub struct GatewayConnection {
    inner: Arc<Inner>,
}

impl GatewayConnection {
    /// Create a disconnected connection.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` when `config` fails validation.
    pub fn new(
        connector: Arc<dyn Connector>,
        credentials: CredentialBundle,
        config: ConnectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let bus = EventBus::new(config.event_buffer_size);

        Ok(Self {
            inner: Arc::new(Inner {
                connector,
                credentials,
                config,
                state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
                session: RwLock::new(None),
                generation: AtomicU64::new(0),
                attempts: AtomicU64::new(0),
                connect_lock: Mutex::new(None),
                registry: RwLock::new(SubscriptionRegistry::new()),
                leds: LedRegistry::new(),
                topology: RwLock::new(Topology::default()),
                bus,
            }),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn credentials(&self) -> &CredentialBundle {
        &self.inner.credentials
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Cached connection flag; never blocks.
    pub fn is_connected(&self) -> bool {
        self.inner.state() == ConnectionState::Connected
    }

    /// Receive every event published from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// LEDs subscribed in the current session.
    pub fn leds(&self) -> &LedRegistry {
        &self.inner.leds
    }

    /// Result of the latest topology discovery.
    pub fn topology(&self) -> Topology {
        self.inner.topology.read().clone()
    }

    /// Add a path to the subscription registry.
    ///
    /// The entry takes effect on the next successful `connect()`.
    pub fn register(
        &self,
        path: impl Into<String>,
        rule: NormalizationRule,
        handler: EventHandler,
    ) -> Result<()> {
        self.inner.registry.write().register(path, rule, handler)
    }

    /// Register a status path whose events go to the event bus.
    pub fn register_status(&self, path: impl Into<String>, rule: NormalizationRule) -> Result<()> {
        let bus = self.inner.bus.clone();
        self.register(path, rule, Arc::new(move |event| bus.publish(event)))
    }

    /// Register `/area/status` and `/zone/status`.
    pub fn register_default_subscriptions(&self) -> Result<()> {
        self.register_status("/area/status", NormalizationRule::area_status())?;
        self.register_status("/zone/status", NormalizationRule::zone_status())
    }

    pub fn registered_paths(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .entries()
            .iter()
            .map(|entry| entry.path.clone())
            .collect()
    }

    /// Open a transport session unless one is already up.
    ///
    /// Callers arriving while an attempt is in progress wait for it and share
    /// its outcome instead of starting their own.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConnectFailed` when the transport could not be
    /// opened. The connection is left disconnected.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let observed = self.inner.attempts.load(Ordering::SeqCst);
        let mut last_outcome = self.inner.connect_lock.lock().await;

        if self.inner.attempts.load(Ordering::SeqCst) != observed {
            // An attempt finished while this caller was waiting
            return last_outcome.clone().unwrap_or(Ok(()));
        }
        if self.is_connected() {
            return Ok(());
        }

        let outcome = self.open_session().await;
        *last_outcome = Some(outcome.clone());
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn open_session(&self) -> Result<()> {
        let inner = &self.inner;
        inner.set_state(ConnectionState::Connecting);
        info!(
            address = %inner.credentials.address(),
            port = inner.credentials.port(),
            "Connecting to gateway"
        );

        let TransportSession { transport, events } =
            match inner.connector.connect(&inner.credentials).await {
                Ok(session) => session,
                Err(e) => {
                    inner.set_state(ConnectionState::Disconnected);
                    error!(error = %e, "Gateway connection failed");
                    return Err(GatewayError::ConnectFailed(e.to_string()));
                }
            };

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = inner.session.write().replace(Session {
            generation,
            transport,
            subscribed: Arc::new(DashSet::new()),
            tasks: Vec::new(),
        });
        if let Some(previous) = previous {
            previous.abort();
        }
        inner.leds.clear();

        let registry = inner.registry.read().clone();
        registry.replay(self).await;

        {
            // Ordered against drop_session by the session lock
            let session = inner.session.read();
            if !matches!(session.as_ref(), Some(current) if current.generation == generation) {
                drop(session);
                inner.set_state(ConnectionState::Disconnected);
                error!(generation, "Transport closed during subscription replay");
                return Err(GatewayError::ConnectFailed(
                    "transport closed during subscription replay".to_string(),
                ));
            }
            inner.set_state(ConnectionState::Connected);
            inner.bus.publish(GatewayEvent::Connected);
        }
        info!(generation, "Gateway connected");

        let relay = tokio::spawn(self.clone().relay_events(generation, events));
        self.track_task(generation, relay);

        if inner.config.discover_leds {
            let leds = tokio::spawn(self.clone().subscribe_leds(generation));
            self.track_task(generation, leds);
        }

        Ok(())
    }

    /// Attach a task to the session it serves, or stop it if that session is
    /// already gone.
    fn track_task(&self, generation: u64, task: JoinHandle<()>) {
        let mut session = self.inner.session.write();
        match session.as_mut() {
            Some(current) if current.generation == generation => current.tasks.push(task),
            _ => task.abort(),
        }
    }

    async fn relay_events(
        self,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Unsolicited(response) => {
                    debug!(?response, "Unsolicited gateway message");
                    match serde_json::to_value(&response) {
                        Ok(raw) => self.inner.bus.publish(GatewayEvent::Unsolicited(raw)),
                        Err(e) => warn!(error = %e, "Could not encode unsolicited message"),
                    }
                }
                TransportEvent::Disconnected => break,
            }
        }

        self.drop_session(generation);
    }

    /// Tear down session `generation` if it is still the current one.
    ///
    /// `Disconnected` is published only when the session had reached
    /// `Connected`; a session lost during `connect()` fails that call instead.
    fn drop_session(&self, generation: u64) {
        let previous = {
            let mut session = self.inner.session.write();
            match session.as_ref() {
                Some(current) if current.generation == generation => {
                    let was = self
                        .inner
                        .state
                        .swap(ConnectionState::Disconnected.as_u8(), Ordering::SeqCst);
                    if ConnectionState::from_u8(was) == ConnectionState::Connected {
                        error!(generation, "Gateway disconnected");
                        self.inner.bus.publish(GatewayEvent::Disconnected);
                    } else {
                        warn!(generation, "Gateway session lost while connecting");
                    }
                    session.take()
                }
                _ => None,
            }
        };

        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn current_session(&self) -> Result<SessionHandle> {
        self.inner
            .session
            .read()
            .as_ref()
            .map(Session::handle)
            .ok_or(GatewayError::NotConnected)
    }

    async fn send(
        &self,
        session: &SessionHandle,
        kind: RequestKind,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response> {
        debug!(%kind, path, "Gateway request");

        match session.transport.request(kind, path, body).await {
            Ok(response) if response.is_success() => {
                debug!(path, body = %response.body, "Gateway response");
                Ok(response)
            }
            Ok(response) => {
                let status = response.header.status_code.unwrap_or_default();
                warn!(%kind, path, status = %status, "Gateway rejected request");
                Err(GatewayError::request_failed(path, status))
            }
            Err(e) => {
                warn!(%kind, path, error = %e, "Gateway request failed");
                if e == TransportError::Closed {
                    self.drop_session(session.generation);
                }
                Err(GatewayError::request_failed(path, e))
            }
        }
    }

    /// Send one request. Failures are returned, never retried.
    pub async fn request(
        &self,
        kind: RequestKind,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response> {
        let session = self.current_session()?;
        self.send(&session, kind, path, body).await
    }

    /// Read a resource once.
    pub async fn read(&self, path: &str) -> Result<Response> {
        self.request(RequestKind::Read, path, None).await
    }

    /// Read `path`, hand the result to `handler`, then register `handler`
    /// for pushes on `path`.
    ///
    /// A path already registered on the current transport session is not
    /// registered again; the read and the handler call still happen.
    pub async fn read_and_subscribe(
        &self,
        path: &str,
        handler: ResponseHandler,
    ) -> Result<Response> {
        let session = self.current_session()?;
        let response = self.send(&session, RequestKind::Read, path, None).await?;
        handler(&response);

        if !session.subscribed.insert(path.to_string()) {
            debug!(path, "Already subscribed in this session");
            return Ok(response);
        }

        if let Err(e) = session.transport.subscribe(path, handler).await {
            session.subscribed.remove(path);
            warn!(path, error = %e, "Subscribe failed");
            return Err(GatewayError::request_failed(path, e));
        }

        debug!(path, "Subscribed");
        Ok(response)
    }

    /// Probe the gateway with a status read.
    ///
    /// Returns `false` when the read fails or does not answer within the ping
    /// timeout. A failure on a live session marks the connection disconnected
    /// and publishes `Disconnected`.
    pub async fn ping(&self) -> bool {
        let session = match self.current_session() {
            Ok(session) => session,
            Err(_) => {
                debug!("Ping skipped, no open session");
                return false;
            }
        };

        let probe = self.send(&session, RequestKind::Read, &self.inner.config.ping_path, None);
        match tokio::time::timeout(self.inner.config.ping_timeout, probe).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                error!(error = %e, "Ping failed");
                self.drop_session(session.generation);
                false
            }
            Err(_) => {
                error!(timeout = ?self.inner.config.ping_timeout, "Ping timed out");
                self.drop_session(session.generation);
                false
            }
        }
    }

    /// Drop the current session without publishing `Disconnected`.
    pub fn close(&self) {
        let previous = self.inner.session.write().take();
        if let Some(previous) = previous {
            self.inner.set_state(ConnectionState::Disconnected);
            info!(generation = previous.generation, "Gateway connection closed");
            previous.abort();
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation && self.is_connected()
    }

    async fn subscribe_leds(self, generation: u64) {
        let (topology, _) = tokio::join!(
            topology::discover(&self),
            tokio::time::sleep(self.inner.config.led_subscribe_delay)
        );

        if !self.is_current(generation) {
            debug!(generation, "Session changed before LED subscription");
            return;
        }

        self.inner.leds.replace(topology.leds.iter().cloned());
        let leds = topology.leds.clone();
        *self.inner.topology.write() = topology;
        info!(count = leds.len(), "Subscribing to LEDs");

        for led in leds {
            let path = format!("/led/{led}/status");
            let handler = led_handler(led, self.inner.bus.clone());
            if let Err(e) = self.read_and_subscribe(&path, handler).await {
                warn!(path = %path, error = %e, "LED subscription failed");
            }
        }
    }
}

fn led_handler(led_id: String, bus: EventBus) -> ResponseHandler {
    Arc::new(move |response: &Response| match led_state(&response.body) {
        Some(state) => bus.publish(GatewayEvent::LedStatus {
            led_id: led_id.clone(),
            state,
        }),
        None => warn!(led = %led_id, "LED status without a State"),
    })
}

impl std::fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("address", &self.inner.credentials.address())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SubscriptionTarget for GatewayConnection {
    async fn read_and_subscribe(&self, path: &str, handler: ResponseHandler) -> Result<Response> {
        GatewayConnection::read_and_subscribe(self, path, handler).await
    }
}

#[async_trait]
impl ResourceReader for GatewayConnection {
    async fn read(&self, path: &str) -> Result<Response> {
        GatewayConnection::read(self, path).await
    }
}
