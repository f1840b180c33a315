//! # leap-connection
//!
//! One persistent, authenticated connection to a Lutron LEAP gateway, with
//! path subscriptions that survive reconnects, normalized status events and a
//! small command surface.
//!
//! The LEAP wire protocol itself is not implemented here. A [`Connector`]
//! supplies transports; everything above that seam lives in this crate:
//!
//! - [`GatewayConnection`]: connect, request, read-and-subscribe, ping
//! - [`SubscriptionRegistry`]: ordered status paths replayed on every connect
//! - [`CommandDispatcher`]: zone levels, zone on/off, button presses
//! - [`EventBus`]: fan-out of [`GatewayEvent`]s
//! - [`ReconnectSupervisor`]: periodic probe and reconnect
//! - [`topology`]: best-effort enumeration of keypads and their LEDs
//!
//! ```no_run
//! use std::sync::Arc;
//! use leap_connection::{
//!     CommandDispatcher, ConnectionConfig, Connector, CredentialBundle, GatewayConnection,
//!     ReconnectSupervisor,
//! };
//!
//! # async fn run(connector: Arc<dyn Connector>) -> leap_connection::Result<()> {
//! let credentials = CredentialBundle::new("192.168.1.20", 8081, "ca", "cert", "key");
//! let connection = GatewayConnection::new(connector, credentials, ConnectionConfig::default())?;
//! connection.register_default_subscriptions()?;
//!
//! let mut events = connection.subscribe_events();
//! connection.connect().await?;
//! let supervisor = ReconnectSupervisor::for_connection(&connection);
//!
//! CommandDispatcher::new(connection.clone())
//!     .set_zone_on_off("622", true)
//!     .await?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{}: {:?}", event.kind(), event.device_id());
//! }
//! supervisor.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod message;
pub mod registry;
pub mod supervisor;
pub mod topology;
pub mod transport;

pub use config::ConnectionConfig;
pub use connection::{ConnectionState, GatewayConnection};
pub use credentials::{CredentialBundle, DEFAULT_LEAP_PORT};
pub use dispatcher::{CommandDispatcher, ZoneLevel};
pub use error::{CredentialError, GatewayError, Result, TransportError};
pub use event::{EventBus, GatewayEvent, StatusKind};
pub use message::{RequestKind, Response, ResponseHandler, ResponseHeader};
pub use registry::{
    EventHandler, NormalizationRule, ReplayReport, SubscriptionEntry, SubscriptionRegistry,
    SubscriptionTarget,
};
pub use supervisor::{Liveness, ReconnectSupervisor, SupervisorState, TickOutcome};
pub use topology::{ButtonInfo, LedRegistry, ResourceReader, Topology};
pub use transport::{Connector, Transport, TransportEvent, TransportSession};

pub use leap_normalizer::{LedState, NormalizedRecord};
