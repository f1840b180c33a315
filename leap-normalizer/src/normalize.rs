//! Collection and single-item normalization.

use serde_json::{Map, Value};

use crate::href::device_id_from_href;
use crate::record::{LedState, NormalizedRecord};

/// Key of the self reference carried by every status item.
pub const HREF_KEY: &str = "href";

/// Segment index of the device id for single-item bodies.
const SINGLE_ITEM_SEGMENT: usize = 1;

/// Normalize a status collection.
///
/// `body` is the response `Body` document. The array under `body_key` is
/// walked in order and every item produces exactly one record, even when all
/// of its fields are excluded. A missing or non-array `body_key` yields an
/// empty vector.
pub fn normalize_collection<S: AsRef<str>>(
    body: &Value,
    body_key: &str,
    segment_index: usize,
    excluded: &[S],
) -> Vec<NormalizedRecord> {
    match body.get(body_key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| normalize_item(item, segment_index, excluded))
            .collect(),
        _ => Vec::new(),
    }
}

/// Normalize a single-item body such as `{"LEDStatus": {...}}`.
///
/// The device id is taken from segment index 1 of the item's href. Returns
/// `None` when `body_key` is missing or does not hold an object.
pub fn normalize_single<S: AsRef<str>>(
    body: &Value,
    body_key: &str,
    excluded: &[S],
) -> Option<NormalizedRecord> {
    match body.get(body_key) {
        Some(item @ Value::Object(_)) => Some(normalize_item(item, SINGLE_ITEM_SEGMENT, excluded)),
        _ => None,
    }
}

/// Read the state of an `LEDStatus` body.
pub fn led_state(body: &Value) -> Option<LedState> {
    body.get("LEDStatus")?
        .get("State")?
        .as_str()
        .map(LedState::from_gateway)
}

fn normalize_item<S: AsRef<str>>(
    item: &Value,
    segment_index: usize,
    excluded: &[S],
) -> NormalizedRecord {
    let Value::Object(entries) = item else {
        return NormalizedRecord::default();
    };

    let device = entries
        .get(HREF_KEY)
        .and_then(Value::as_str)
        .and_then(|href| device_id_from_href(href, segment_index));

    let fields: Map<String, Value> = entries
        .iter()
        .filter(|(key, value)| {
            key.as_str() != HREF_KEY
                && !value.is_null()
                && !excluded.iter().any(|name| name.as_ref() == key.as_str())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    NormalizedRecord { device, fields }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NO_EXCLUSIONS: &[&str] = &[];

    #[test]
    fn test_zone_status_scenario() {
        let body = json!({
            "ZoneStatuses": [{
                "href": "/zone/622/status",
                "Level": 50,
                "SwitchedLevel": "On",
                "Zone": {"href": "/zone/622"}
            }]
        });

        let records = normalize_collection(&body, "ZoneStatuses", 1, &["Zone"]);

        assert_eq!(records.len(), 1);
        assert_eq!(
            serde_json::to_value(&records[0]).unwrap(),
            json!({"device": "622", "Level": 50, "SwitchedLevel": "On"})
        );
    }

    #[test]
    fn test_area_status_keeps_all_fields() {
        let body = json!({
            "AreaStatuses": [
                {"href": "/area/3/status", "OccupancyStatus": "Occupied", "Level": 0},
                {"href": "/area/4/status", "OccupancyStatus": "Unoccupied"}
            ]
        });

        let records = normalize_collection(&body, "AreaStatuses", 1, NO_EXCLUSIONS);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].device.as_deref(), Some("3"));
        assert_eq!(records[0].field("OccupancyStatus"), Some(&json!("Occupied")));
        assert_eq!(records[0].field("Level"), Some(&json!(0)));
        assert_eq!(records[1].device.as_deref(), Some("4"));
        assert_eq!(records[1].fields.len(), 1);
    }

    #[test]
    fn test_missing_body_key_is_empty() {
        let body = json!({"Other": []});
        assert!(normalize_collection(&body, "ZoneStatuses", 1, NO_EXCLUSIONS).is_empty());
        assert!(normalize_collection(&Value::Null, "ZoneStatuses", 1, NO_EXCLUSIONS).is_empty());
        assert!(normalize_single(&body, "LEDStatus", NO_EXCLUSIONS).is_none());
    }

    #[test]
    fn test_non_array_collection_is_empty() {
        let body = json!({"ZoneStatuses": {"href": "/zone/1/status"}});
        assert!(normalize_collection(&body, "ZoneStatuses", 1, NO_EXCLUSIONS).is_empty());
    }

    #[test]
    fn test_null_fields_are_omitted() {
        let body = json!({
            "ZoneStatuses": [{"href": "/zone/1/status", "Level": null, "SwitchedLevel": "Off"}]
        });

        let records = normalize_collection(&body, "ZoneStatuses", 1, NO_EXCLUSIONS);
        assert!(!records[0].fields.contains_key("Level"));
        assert_eq!(records[0].field("SwitchedLevel"), Some(&json!("Off")));
    }

    #[test]
    fn test_item_with_only_excluded_fields_is_kept() {
        let body = json!({
            "ZoneStatuses": [{"href": "/zone/9/status", "Zone": {"href": "/zone/9"}}]
        });

        let records = normalize_collection(&body, "ZoneStatuses", 1, &["Zone"]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device.as_deref(), Some("9"));
        assert!(records[0].is_bare());
    }

    #[test]
    fn test_missing_href_has_no_device() {
        let body = json!({"ZoneStatuses": [{"Level": 10}]});

        let records = normalize_collection(&body, "ZoneStatuses", 1, NO_EXCLUSIONS);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device, None);
        assert_eq!(records[0].field("Level"), Some(&json!(10)));
    }

    #[test]
    fn test_non_object_item_still_counts() {
        let body = json!({"ZoneStatuses": [42, {"href": "/zone/2/status"}]});

        let records = normalize_collection(&body, "ZoneStatuses", 1, NO_EXCLUSIONS);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], NormalizedRecord::default());
        assert_eq!(records[1].device.as_deref(), Some("2"));
    }

    #[test]
    fn test_normalize_single() {
        let body = json!({"LEDStatus": {"href": "/led/1410/status", "State": "On"}});

        let record = normalize_single(&body, "LEDStatus", NO_EXCLUSIONS).unwrap();
        assert_eq!(record.device.as_deref(), Some("1410"));
        assert_eq!(record.field("State"), Some(&json!("On")));
    }

    #[test]
    fn test_normalize_single_with_exclusions() {
        let body = json!({"ZoneStatus": {"href": "/zone/5/status", "Level": 75, "Zone": {"href": "/zone/5"}}});

        let record = normalize_single(&body, "ZoneStatus", &["Zone"]).unwrap();
        assert_eq!(record.device.as_deref(), Some("5"));
        assert_eq!(record.fields.len(), 1);
    }

    #[test]
    fn test_led_state() {
        assert_eq!(led_state(&json!({"LEDStatus": {"State": "On"}})), Some(LedState::On));
        assert_eq!(led_state(&json!({"LEDStatus": {"State": "Off"}})), Some(LedState::Off));
        assert_eq!(led_state(&json!({"LEDStatus": {}})), None);
        assert_eq!(led_state(&json!({})), None);
    }
}
