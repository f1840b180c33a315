//! # leap-normalizer
//!
//! Pure functions that reduce the nested status documents returned by a LEAP
//! gateway into flat, uniform records.
//!
//! A status collection looks like this:
//!
//! ```json
//! {
//!   "ZoneStatuses": [
//!     { "href": "/zone/622/status", "Level": 50, "SwitchedLevel": "On", "Zone": { "href": "/zone/622" } }
//!   ]
//! }
//! ```
//!
//! and normalizes to one record per item, with the device id taken from the
//! item's `href`:
//!
//! ```
//! use leap_normalizer::normalize_collection;
//! use serde_json::json;
//!
//! let body = json!({
//!     "ZoneStatuses": [
//!         { "href": "/zone/622/status", "Level": 50, "SwitchedLevel": "On", "Zone": { "href": "/zone/622" } }
//!     ]
//! });
//!
//! let records = normalize_collection(&body, "ZoneStatuses", 1, &["Zone"]);
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].device.as_deref(), Some("622"));
//! assert_eq!(records[0].fields["Level"], json!(50));
//! assert!(!records[0].fields.contains_key("Zone"));
//! ```
//!
//! Nothing in this crate touches the network or keeps state.

pub mod href;
pub mod normalize;
pub mod record;

pub use href::device_id_from_href;
pub use normalize::{led_state, normalize_collection, normalize_single, HREF_KEY};
pub use record::{LedState, NormalizedRecord};
