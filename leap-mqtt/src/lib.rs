//! # leap-mqtt
//!
//! Bridges a LEAP lighting gateway to an MQTT broker: gateway status is
//! published as retained per-field topics, and `set`/`press` messages on the
//! command topics become zone and button commands.
//!
//! See [`topics`] for the topic layout and [`config`] for the environment
//! variables read by [`BridgeConfig::from_env`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use leap_connection::Connector;
//! use leap_mqtt::{logging, run_bridge, BridgeConfig};
//!
//! # async fn start(connector: Arc<dyn Connector>) -> leap_mqtt::Result<()> {
//! logging::init_logging_from_env()?;
//! let config = BridgeConfig::from_env()?;
//! run_bridge(config, connector).await
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod publisher;
pub mod topics;

pub use bridge::{run_bridge, MqttBridge};
pub use config::{parse_mqtt_url, BridgeConfig};
pub use error::{BridgeError, ConfigError, Result, TopicError};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use publisher::BusPublisher;
pub use topics::{encode_value, BusCommand, StateMessage, Topics};
