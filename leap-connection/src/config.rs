//! Configuration for the gateway connection
//!
//! Controls liveness probing, LED discovery and event channel sizing.

use std::time::Duration;

use crate::error::GatewayError;

/// Configuration for a `GatewayConnection` and its `ReconnectSupervisor`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Resource read by `ping()`
    /// Default: `/server/1/status/ping`
    pub ping_path: String,

    /// Period of the reconnect supervisor's probe
    /// Default: 30 seconds
    pub probe_interval: Duration,

    /// A ping that has not answered after this long counts as failed
    /// Default: 10 seconds
    pub ping_timeout: Duration,

    /// Enumerate areas, keypads and buttons after connecting and subscribe
    /// to every LED found
    /// Default: true
    pub discover_leds: bool,

    /// Minimum delay between connecting and subscribing to LEDs
    /// Default: 5 seconds
    pub led_subscribe_delay: Duration,

    /// Capacity of the in-process event bus
    /// Default: 256
    pub event_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ping_path: "/server/1/status/ping".to_string(),
            probe_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(10),
            discover_leds: true,
            led_subscribe_delay: Duration::from_secs(5),
            event_buffer_size: 256,
        }
    }
}

impl ConnectionConfig {
    /// Create a ConnectionConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), GatewayError> {
        if !self.ping_path.starts_with('/') {
            return Err(GatewayError::Config(format!(
                "Ping path must be absolute, got {:?}",
                self.ping_path
            )));
        }

        if self.probe_interval == Duration::ZERO {
            return Err(GatewayError::Config(
                "Probe interval must be greater than 0".to_string(),
            ));
        }

        if self.ping_timeout == Duration::ZERO {
            return Err(GatewayError::Config(
                "Ping timeout must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(GatewayError::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    pub fn with_led_discovery(mut self, enabled: bool) -> Self {
        self.discover_leds = enabled;
        self
    }

    pub fn with_led_subscribe_delay(mut self, delay: Duration) -> Self {
        self.led_subscribe_delay = delay;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }
}
