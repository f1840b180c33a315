//! Zone and button commands
//!
//! Commands are sent as `CreateRequest`s against a device's command
//! processor. Nothing is queued: while the connection is down every command
//! fails with `GatewayError::NotConnected` before a request is built.

use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::connection::GatewayConnection;
use crate::error::{GatewayError, Result};
use crate::message::{RequestKind, Response};

/// A zone level from 0 (off) to 100 (full).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoneLevel(u8);

impl ZoneLevel {
    pub const OFF: ZoneLevel = ZoneLevel(0);
    pub const FULL: ZoneLevel = ZoneLevel(100);

    /// # Errors
    ///
    /// Returns `GatewayError::InvalidLevel` outside 0..=100.
    pub fn new(level: i64) -> Result<Self> {
        u8::try_from(level)
            .ok()
            .filter(|level| *level <= 100)
            .map(ZoneLevel)
            .ok_or_else(|| GatewayError::InvalidLevel(level.to_string()))
    }

    /// Parse a decimal integer such as `"75"`. Fractions are rejected.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        trimmed
            .parse::<i64>()
            .map_err(|_| GatewayError::InvalidLevel(trimmed.to_string()))
            .and_then(Self::new)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for ZoneLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn go_to_level_body(level: ZoneLevel) -> Value {
    json!({
        "Command": {
            "CommandType": "GoToLevel",
            "Parameter": [{"Type": "Level", "Value": level.value()}]
        }
    })
}

fn press_and_release_body() -> Value {
    json!({"Command": {"CommandType": "PressAndRelease"}})
}

/// Device ids become path segments, so they must be non-empty and free of `/`.
fn check_device_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains('/') || id.chars().any(char::is_whitespace) {
        return Err(GatewayError::InvalidDeviceId(id.to_string()));
    }
    Ok(())
}

/// Translates commands into gateway requests.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    connection: GatewayConnection,
}

impl CommandDispatcher {
    pub fn new(connection: GatewayConnection) -> Self {
        Self { connection }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connection.is_connected() {
            Ok(())
        } else {
            Err(GatewayError::NotConnected)
        }
    }

    /// Send `GoToLevel` to `/zone/{zone_id}/commandprocessor`.
    ///
    /// # Errors
    ///
    /// `NotConnected` while disconnected, `InvalidLevel` outside 0..=100,
    /// `InvalidDeviceId` for an unusable id, `RequestFailed` when the gateway
    /// rejects the command.
    pub async fn set_zone_level(&self, zone_id: &str, level: i64) -> Result<Response> {
        self.ensure_connected()?;
        let level = ZoneLevel::new(level)?;
        check_device_id(zone_id)?;

        let path = format!("/zone/{zone_id}/commandprocessor");
        info!(zone = %zone_id, %level, "Setting zone level");
        self.connection
            .request(RequestKind::Create, &path, Some(go_to_level_body(level)))
            .await
    }

    /// Full on (100) or off (0).
    pub async fn set_zone_on_off(&self, zone_id: &str, on: bool) -> Result<Response> {
        let level = if on { ZoneLevel::FULL } else { ZoneLevel::OFF };
        self.set_zone_level(zone_id, i64::from(level.value())).await
    }

    /// Send `PressAndRelease` to `/button/{button_id}/commandprocessor`.
    ///
    /// The request runs on its own task and its outcome is only logged. The
    /// returned handle resolves once that task finishes.
    ///
    /// # Errors
    ///
    /// `NotConnected` and `InvalidDeviceId` are reported before anything is
    /// spawned.
    pub fn press_button(&self, button_id: &str) -> Result<JoinHandle<()>> {
        self.ensure_connected()?;
        check_device_id(button_id)?;

        let connection = self.connection.clone();
        let button = button_id.to_string();
        let path = format!("/button/{button}/commandprocessor");

        Ok(tokio::spawn(async move {
            match connection
                .request(RequestKind::Create, &path, Some(press_and_release_body()))
                .await
            {
                Ok(_) => info!(button = %button, "Button pressed"),
                Err(e) => error!(button = %button, error = %e, "Button press failed"),
            }
        }))
    }
}
