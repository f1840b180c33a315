//! Best-effort enumeration of areas, keypads, buttons and LEDs
//!
//! Discovery walks `/area`, each area's associated control stations, and the
//! expanded button groups of every ganged device. Every step is a sequential
//! read; a failed step is logged and skipped so one unreachable keypad does
//! not hide the rest of the installation.

use std::collections::BTreeSet;

use async_trait::async_trait;
use leap_normalizer::device_id_from_href;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::message::Response;

/// Reads a single gateway resource.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    async fn read(&self, path: &str) -> Result<Response>;
}

/// A keypad button found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonInfo {
    pub id: String,
    pub name: Option<String>,
    pub engraving: Option<String>,
    /// Id of the LED lit by this button, if it has one
    pub led: Option<String>,
}

/// Everything discovery found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    pub areas: Vec<String>,
    pub buttons: Vec<ButtonInfo>,
    /// LED ids in discovery order, without duplicates
    pub leds: Vec<String>,
}

impl Topology {
    fn add_buttons(&mut self, buttons: Vec<ButtonInfo>) {
        for button in buttons {
            if let Some(led) = &button.led {
                if !self.leds.contains(led) {
                    self.leds.push(led.clone());
                }
            }
            self.buttons.push(button);
        }
    }
}

/// Ids of the first path segment after the resource type, e.g. `/area/3`.
fn id_of(value: &Value) -> Option<String> {
    value
        .get("href")
        .and_then(Value::as_str)
        .and_then(|href| device_id_from_href(href, 1))
}

fn array<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Area ids from an `/area` body.
pub fn parse_area_ids(body: &Value) -> Vec<String> {
    array(body, "Areas").filter_map(id_of).collect()
}

/// Ganged device ids from an `/area/{id}/associatedcontrolstation` body.
pub fn parse_gang_device_ids(body: &Value) -> Vec<String> {
    array(body, "ControlStations")
        .flat_map(|station| array(station, "AssociatedGangedDevices"))
        .filter_map(|gang| gang.get("Device").and_then(id_of))
        .collect()
}

/// Buttons from a `/device/{id}/buttongroup/expanded` body.
pub fn parse_buttons(body: &Value) -> Vec<ButtonInfo> {
    array(body, "ButtonGroupsExpanded")
        .flat_map(|group| array(group, "Buttons"))
        .filter_map(|button| {
            let id = id_of(button)?;
            Some(ButtonInfo {
                id,
                name: button.get("Name").and_then(Value::as_str).map(str::to_string),
                engraving: button
                    .get("Engraving")
                    .and_then(|engraving| engraving.get("Text"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                led: button.get("AssociatedLED").and_then(id_of),
            })
        })
        .collect()
}

/// Walk the installation and collect areas, buttons and LEDs.
pub async fn discover<R>(reader: &R) -> Topology
where
    R: ResourceReader + ?Sized,
{
    let mut topology = Topology::default();

    let areas = match reader.read("/area").await {
        Ok(response) => parse_area_ids(&response.body),
        Err(e) => {
            warn!(error = %e, "Area enumeration failed");
            return topology;
        }
    };

    for area in &areas {
        let path = format!("/area/{area}/associatedcontrolstation");
        let devices = match reader.read(&path).await {
            Ok(response) => parse_gang_device_ids(&response.body),
            Err(e) => {
                warn!(area = %area, error = %e, "Control station lookup failed");
                continue;
            }
        };

        for device in devices {
            let path = format!("/device/{device}/buttongroup/expanded");
            match reader.read(&path).await {
                Ok(response) => {
                    let buttons = parse_buttons(&response.body);
                    debug!(device = %device, buttons = buttons.len(), "Loaded button groups");
                    topology.add_buttons(buttons);
                }
                Err(e) => {
                    warn!(device = %device, error = %e, "Button group lookup failed");
                }
            }
        }
    }

    topology.areas = areas;
    info!(
        areas = topology.areas.len(),
        buttons = topology.buttons.len(),
        leds = topology.leds.len(),
        "Topology discovery finished"
    );
    topology
}

/// LED ids discovered for the current connection.
#[derive(Debug, Default)]
pub struct LedRegistry {
    ids: RwLock<BTreeSet<String>>,
}

impl LedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the known LEDs with a fresh discovery result.
    pub fn replace<I>(&self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        *self.ids.write() = ids.into_iter().collect();
    }

    pub fn clear(&self) {
        self.ids.write().clear();
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.read().iter().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}
