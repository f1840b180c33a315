//! Topic layout and payload encoding
//!
//! All topics live below one prefix:
//!
//! | Topic | Direction | Payload |
//! |---|---|---|
//! | `{prefix}/zone/{id}/set` | in | `0`-`100`, `on`/`off`, `true`/`false` |
//! | `{prefix}/button/{id}/press` | in | ignored |
//! | `{prefix}/{area,zone}/{id}/{field}` | out, retained | encoded field value |
//! | `{prefix}/led/{id}/state` | out, retained | `1` or `0` |
//! | `{prefix}/bridge/connected` | out, retained | `1` or `0` |
//! | `{prefix}/unsolicited` | out | raw JSON |

use leap_connection::{GatewayEvent, NormalizedRecord, StatusKind, ZoneLevel};
use serde_json::Value;
use tracing::debug;

use crate::error::TopicError;

/// A command decoded from an incoming bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCommand {
    SetZoneLevel { zone_id: String, level: ZoneLevel },
    SetZoneOnOff { zone_id: String, on: bool },
    PressButton { button_id: String },
}

/// One message to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

impl StateMessage {
    fn retained(topic: String, payload: impl Into<String>) -> Self {
        Self {
            topic,
            payload: payload.into(),
            retain: true,
        }
    }
}

/// Builds and parses topics below a fixed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    /// `prefix` is used without leading or trailing `/`.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Filters the bridge subscribes to for commands.
    pub fn command_filters(&self) -> [String; 2] {
        [
            format!("{}/+/+/set", self.prefix),
            format!("{}/+/+/press", self.prefix),
        ]
    }

    /// `{prefix}/{scope}/{id}/{field}` with the field name lower-cased.
    pub fn state(&self, scope: &str, id: &str, field: &str) -> String {
        format!("{}/{}/{}/{}", self.prefix, scope, id, field.to_lowercase())
    }

    pub fn led_state(&self, led_id: &str) -> String {
        format!("{}/led/{}/state", self.prefix, led_id)
    }

    pub fn availability(&self) -> String {
        format!("{}/bridge/connected", self.prefix)
    }

    pub fn unsolicited(&self) -> String {
        format!("{}/unsolicited", self.prefix)
    }

    /// Decode an incoming message into a command.
    pub fn parse_command(&self, topic: &str, payload: &[u8]) -> Result<BusCommand, TopicError> {
        let rest = topic
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| TopicError::Foreign(topic.to_string()))?;

        let segments: Vec<&str> = rest.split('/').collect();
        let [scope, id, command] = segments.as_slice() else {
            return Err(TopicError::Malformed(topic.to_string()));
        };
        if id.is_empty() {
            return Err(TopicError::Malformed(topic.to_string()));
        }

        match (*scope, *command) {
            ("zone", "set") => parse_zone_set(topic, id, payload),
            ("button", "press") => Ok(BusCommand::PressButton {
                button_id: id.to_string(),
            }),
            _ => Err(TopicError::UnknownCommand {
                scope: scope.to_string(),
                command: command.to_string(),
            }),
        }
    }

    /// Messages to publish for a gateway event.
    pub fn state_messages(&self, event: &GatewayEvent) -> Vec<StateMessage> {
        match event {
            GatewayEvent::Connected => vec![StateMessage::retained(self.availability(), "1")],
            GatewayEvent::Disconnected => vec![StateMessage::retained(self.availability(), "0")],
            GatewayEvent::AreaStatus(record) => self.record_messages(StatusKind::Area, record),
            GatewayEvent::ZoneStatus(record) => self.record_messages(StatusKind::Zone, record),
            GatewayEvent::LedStatus { led_id, state } => vec![StateMessage::retained(
                self.led_state(led_id),
                state.as_payload(),
            )],
            GatewayEvent::Unsolicited(raw) => vec![StateMessage {
                topic: self.unsolicited(),
                payload: raw.to_string(),
                retain: false,
            }],
        }
    }

    fn record_messages(&self, kind: StatusKind, record: &NormalizedRecord) -> Vec<StateMessage> {
        let Some(device) = record.device.as_deref() else {
            debug!(scope = kind.scope(), "Skipping status without a device id");
            return Vec::new();
        };

        record
            .fields
            .iter()
            .filter_map(|(field, value)| {
                encode_value(value).map(|payload| {
                    StateMessage::retained(self.state(kind.scope(), device, field), payload)
                })
            })
            .collect()
    }
}

fn parse_zone_set(topic: &str, zone_id: &str, payload: &[u8]) -> Result<BusCommand, TopicError> {
    let invalid = |reason: String| TopicError::InvalidPayload {
        topic: topic.to_string(),
        reason,
    };

    let text = std::str::from_utf8(payload)
        .map_err(|_| invalid("payload is not UTF-8".to_string()))?
        .trim();

    let zone_id = zone_id.to_string();
    match text.to_ascii_lowercase().as_str() {
        "on" | "true" => Ok(BusCommand::SetZoneOnOff { zone_id, on: true }),
        "off" | "false" => Ok(BusCommand::SetZoneOnOff { zone_id, on: false }),
        _ => ZoneLevel::parse(text)
            .map(|level| BusCommand::SetZoneLevel { zone_id, level })
            .map_err(|e| invalid(e.to_string())),
    }
}

/// Encode a status value as a bus payload.
///
/// Booleans and the `On`/`Off`, `Occupied`/`Unoccupied` strings become `1`/`0`,
/// numbers their decimal form, other strings pass through unchanged and
/// structured values are sent as JSON. `null` produces nothing.
pub fn encode_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(String::from(if *flag { "1" } else { "0" })),
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(match text.as_str() {
            "On" | "Occupied" => "1".to_string(),
            "Off" | "Unoccupied" => "0".to_string(),
            _ => text.clone(),
        }),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leap_connection::LedState;
    use rstest::rstest;
    use serde_json::json;

    fn topics() -> Topics {
        Topics::new("leap")
    }

    #[test]
    fn test_prefix_is_trimmed() {
        assert_eq!(Topics::new("/leap/").prefix(), "leap");
        assert_eq!(
            Topics::new("/leap/").availability(),
            "leap/bridge/connected"
        );
    }

    #[test]
    fn test_command_filters() {
        assert_eq!(
            topics().command_filters(),
            ["leap/+/+/set".to_string(), "leap/+/+/press".to_string()]
        );
    }

    #[rstest]
    #[case("75", BusCommand::SetZoneLevel { zone_id: "622".into(), level: ZoneLevel::new(75).unwrap() })]
    #[case("0", BusCommand::SetZoneLevel { zone_id: "622".into(), level: ZoneLevel::OFF })]
    #[case("on", BusCommand::SetZoneOnOff { zone_id: "622".into(), on: true })]
    #[case("OFF", BusCommand::SetZoneOnOff { zone_id: "622".into(), on: false })]
    #[case("true", BusCommand::SetZoneOnOff { zone_id: "622".into(), on: true })]
    #[case(" 100\n", BusCommand::SetZoneLevel { zone_id: "622".into(), level: ZoneLevel::FULL })]
    fn test_parse_zone_set(#[case] payload: &str, #[case] expected: BusCommand) {
        assert_eq!(
            topics().parse_command("leap/zone/622/set", payload.as_bytes()),
            Ok(expected)
        );
    }

    #[rstest]
    #[case("101")]
    #[case("-5")]
    #[case("50.5")]
    #[case("dim")]
    #[case("")]
    fn test_parse_zone_set_invalid_payload(#[case] payload: &str) {
        assert!(matches!(
            topics().parse_command("leap/zone/622/set", payload.as_bytes()),
            Err(TopicError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_parse_press_ignores_payload() {
        assert_eq!(
            topics().parse_command("leap/button/101/press", b"anything"),
            Ok(BusCommand::PressButton {
                button_id: "101".to_string()
            })
        );
    }

    #[rstest]
    #[case("other/zone/1/set")]
    #[case("leapx/zone/1/set")]
    fn test_foreign_topic(#[case] topic: &str) {
        assert!(matches!(
            topics().parse_command(topic, b"1"),
            Err(TopicError::Foreign(_))
        ));
    }

    #[rstest]
    #[case("leap/zone/set")]
    #[case("leap/zone//set")]
    #[case("leap/zone/1/2/set")]
    fn test_malformed_topic(#[case] topic: &str) {
        assert!(matches!(
            topics().parse_command(topic, b"1"),
            Err(TopicError::Malformed(_))
        ));
    }

    #[rstest]
    #[case("leap/area/3/set")]
    #[case("leap/zone/1/press")]
    #[case("leap/button/1/set")]
    fn test_unknown_command(#[case] topic: &str) {
        assert!(matches!(
            topics().parse_command(topic, b"1"),
            Err(TopicError::UnknownCommand { .. })
        ));
    }

    #[rstest]
    #[case(json!(true), Some("1"))]
    #[case(json!(false), Some("0"))]
    #[case(json!("On"), Some("1"))]
    #[case(json!("Off"), Some("0"))]
    #[case(json!("Occupied"), Some("1"))]
    #[case(json!("Unoccupied"), Some("0"))]
    #[case(json!(50), Some("50"))]
    #[case(json!(12.5), Some("12.5"))]
    #[case(json!("Unknown"), Some("Unknown"))]
    #[case(json!({"href": "/zone/1"}), Some(r#"{"href":"/zone/1"}"#))]
    #[case(json!(null), None)]
    fn test_encode_value(#[case] value: Value, #[case] expected: Option<&str>) {
        assert_eq!(encode_value(&value).as_deref(), expected);
    }

    #[test]
    fn test_zone_status_messages() {
        let mut record = NormalizedRecord::for_device("622");
        record.fields.insert("Level".to_string(), json!(50));
        record.fields.insert("SwitchedLevel".to_string(), json!("On"));

        let mut messages = topics().state_messages(&GatewayEvent::ZoneStatus(record));
        messages.sort_by(|a, b| a.topic.cmp(&b.topic));

        assert_eq!(
            messages,
            vec![
                StateMessage::retained("leap/zone/622/level".to_string(), "50"),
                StateMessage::retained("leap/zone/622/switchedlevel".to_string(), "1"),
            ]
        );
    }

    #[test]
    fn test_record_without_device_publishes_nothing() {
        let mut record = NormalizedRecord::default();
        record.fields.insert("Level".to_string(), json!(50));
        assert!(topics()
            .state_messages(&GatewayEvent::AreaStatus(record))
            .is_empty());
    }

    #[test]
    fn test_lifecycle_and_led_messages() {
        let topics = topics();
        assert_eq!(
            topics.state_messages(&GatewayEvent::Connected),
            vec![StateMessage::retained("leap/bridge/connected".to_string(), "1")]
        );
        assert_eq!(
            topics.state_messages(&GatewayEvent::Disconnected)[0].payload,
            "0"
        );
        assert_eq!(
            topics.state_messages(&GatewayEvent::LedStatus {
                led_id: "9".to_string(),
                state: LedState::On
            }),
            vec![StateMessage::retained("leap/led/9/state".to_string(), "1")]
        );

        let unsolicited = topics.state_messages(&GatewayEvent::Unsolicited(json!({"a": 1})));
        assert_eq!(unsolicited[0].topic, "leap/unsolicited");
        assert_eq!(unsolicited[0].payload, r#"{"a":1}"#);
        assert!(!unsolicited[0].retain);
    }
}
