//! Output types produced by the normalizer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A flat record derived from one status item.
///
/// `device` holds the id parsed from the item's `href`; it is `None` only when
/// the item carried no usable `href`. `fields` holds every remaining non-null
/// status field that was not excluded, unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Device id taken from the item's self reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Status fields, keyed by their gateway names
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl NormalizedRecord {
    /// Create a record for a device with no fields yet.
    pub fn for_device(device: impl Into<String>) -> Self {
        Self {
            device: Some(device.into()),
            fields: Map::new(),
        }
    }

    /// Look up a field by its gateway name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// True when the record has a device id but no status fields.
    pub fn is_bare(&self) -> bool {
        self.fields.is_empty()
    }
}

/// On/off state reported for a keypad LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedState {
    On,
    Off,
}

impl LedState {
    /// Interpret the gateway's `State` string. Anything but `On` is off.
    pub fn from_gateway(state: &str) -> Self {
        if state == "On" {
            LedState::On
        } else {
            LedState::Off
        }
    }

    /// Bus payload for this state: `"1"` or `"0"`.
    pub fn as_payload(&self) -> &'static str {
        match self {
            LedState::On => "1",
            LedState::Off => "0",
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, LedState::On)
    }
}

impl std::fmt::Display for LedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedState::On => write!(f, "On"),
            LedState::Off => write!(f, "Off"),
        }
    }
}
