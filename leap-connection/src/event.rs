//! Events emitted by the gateway connection
//!
//! Every observable change (lifecycle transitions, status pushes and
//! unsolicited gateway messages) is a [`GatewayEvent`] delivered through the
//! [`EventBus`]. Consumers subscribe for a receiver and match on the variant.

use leap_normalizer::{LedState, NormalizedRecord};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

/// Scope of a status collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Area,
    Zone,
}

impl StatusKind {
    /// Topic scope segment for this kind (`area` or `zone`).
    pub fn scope(&self) -> &'static str {
        match self {
            StatusKind::Area => "area",
            StatusKind::Zone => "zone",
        }
    }
}

/// Closed set of events produced by the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// A transport session was opened and the registry replayed
    Connected,

    /// The transport dropped or a liveness probe failed
    Disconnected,

    /// One item of an `/area/status` read or push
    AreaStatus(NormalizedRecord),

    /// One item of a `/zone/status` read or push
    ZoneStatus(NormalizedRecord),

    /// State of a single keypad LED
    LedStatus { led_id: String, state: LedState },

    /// A gateway message that matched no request or subscription
    Unsolicited(Value),
}

impl GatewayEvent {
    /// Build the status event for `kind`.
    pub fn status(kind: StatusKind, record: NormalizedRecord) -> Self {
        match kind {
            StatusKind::Area => GatewayEvent::AreaStatus(record),
            StatusKind::Zone => GatewayEvent::ZoneStatus(record),
        }
    }

    /// Short name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::Connected => "connected",
            GatewayEvent::Disconnected => "disconnected",
            GatewayEvent::AreaStatus(_) => "area-status",
            GatewayEvent::ZoneStatus(_) => "zone-status",
            GatewayEvent::LedStatus { .. } => "led-status",
            GatewayEvent::Unsolicited(_) => "unsolicited",
        }
    }

    /// Device id carried by the event, if any.
    pub fn device_id(&self) -> Option<&str> {
        match self {
            GatewayEvent::AreaStatus(record) | GatewayEvent::ZoneStatus(record) => {
                record.device.as_deref()
            }
            GatewayEvent::LedStatus { led_id, .. } => Some(led_id),
            _ => None,
        }
    }
}

/// Fan-out channel for [`GatewayEvent`]s.
///
/// Publishing never blocks. A receiver that falls more than the configured
/// capacity behind observes `RecvError::Lagged` and skips ahead.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GatewayEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver an event to every current subscriber.
    pub fn publish(&self, event: GatewayEvent) {
        let kind = event.kind();
        if self.sender.send(event).is_err() {
            trace!(kind, "No event subscribers");
        }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
