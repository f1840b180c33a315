//! Subscription registry with ordered replay
//!
//! The registry holds every status path the process wants to follow, the
//! rule used to normalize its payloads, and the handler receiving the
//! resulting events. It is filled at startup and replayed verbatim after
//! every successful connect.

use std::sync::Arc;

use async_trait::async_trait;
use leap_normalizer::normalize_collection;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, Result};
use crate::event::{GatewayEvent, StatusKind};
use crate::message::{Response, ResponseHandler};

/// How to turn a status payload into events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationRule {
    pub kind: StatusKind,
    /// Key of the collection inside the response body
    pub body_key: String,
    /// Index of the resource-type segment in each item's href; the device id
    /// is the segment after it
    pub segment_index: usize,
    /// Fields dropped from every record
    pub excluded: Vec<String>,
}

impl NormalizationRule {
    pub fn new(
        kind: StatusKind,
        body_key: impl Into<String>,
        segment_index: usize,
        excluded: &[&str],
    ) -> Self {
        Self {
            kind,
            body_key: body_key.into(),
            segment_index,
            excluded: excluded.iter().map(|field| field.to_string()).collect(),
        }
    }

    /// Rule for `/area/status`: `AreaStatuses`, no exclusions.
    pub fn area_status() -> Self {
        Self::new(StatusKind::Area, "AreaStatuses", 1, &[])
    }

    /// Rule for `/zone/status`: `ZoneStatuses`, the nested `Zone` link dropped.
    pub fn zone_status() -> Self {
        Self::new(StatusKind::Zone, "ZoneStatuses", 1, &["Zone"])
    }

    /// Normalize a response into one event per collection item.
    pub fn apply(&self, response: &Response) -> Vec<GatewayEvent> {
        let records = normalize_collection(
            &response.body,
            &self.body_key,
            self.segment_index,
            &self.excluded,
        );

        if records.is_empty() {
            debug!(body_key = %self.body_key, "Response carried no status items");
        }

        records
            .into_iter()
            .map(|record| {
                if record.device.is_none() {
                    warn!(
                        body_key = %self.body_key,
                        "Status item without a usable href"
                    );
                }
                GatewayEvent::status(self.kind, record)
            })
            .collect()
    }
}

/// Callback receiving normalized events.
pub type EventHandler = Arc<dyn Fn(GatewayEvent) + Send + Sync>;

/// One registered path.
#[derive(Clone)]
pub struct SubscriptionEntry {
    pub path: String,
    pub rule: NormalizationRule,
    handler: EventHandler,
}

impl SubscriptionEntry {
    pub fn new(path: impl Into<String>, rule: NormalizationRule, handler: EventHandler) -> Self {
        Self {
            path: path.into(),
            rule,
            handler,
        }
    }

    /// Response handler that normalizes with this entry's rule and forwards
    /// every event to the entry's handler.
    pub fn response_handler(&self) -> ResponseHandler {
        let rule = self.rule.clone();
        let handler = Arc::clone(&self.handler);
        Arc::new(move |response: &Response| {
            for event in rule.apply(response) {
                handler(event);
            }
        })
    }
}

impl std::fmt::Debug for SubscriptionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionEntry")
            .field("path", &self.path)
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}

/// Something that can read a path and then follow it for pushes.
#[async_trait]
pub trait SubscriptionTarget: Send + Sync {
    async fn read_and_subscribe(&self, path: &str, handler: ResponseHandler) -> Result<Response>;
}

/// Outcome of a replay.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplayReport {
    pub subscribed: Vec<String>,
    pub failed: Vec<(String, GatewayError)>,
}

impl ReplayReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ordered, append-only set of subscriptions.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    entries: Vec<SubscriptionEntry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. A path that is already registered is rejected and the
    /// registry is left unchanged.
    pub fn register(
        &mut self,
        path: impl Into<String>,
        rule: NormalizationRule,
        handler: EventHandler,
    ) -> Result<()> {
        let path = path.into();
        if self.contains(&path) {
            return Err(GatewayError::DuplicateSubscription(path));
        }

        debug!(path = %path, body_key = %rule.body_key, "Registered subscription");
        self.entries.push(SubscriptionEntry::new(path, rule, handler));
        Ok(())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|entry| entry.path == path)
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[SubscriptionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read and subscribe every entry in registration order.
    ///
    /// A failing entry is logged and recorded in the report; the remaining
    /// entries are still processed.
    pub async fn replay<T>(&self, target: &T) -> ReplayReport
    where
        T: SubscriptionTarget + ?Sized,
    {
        let mut report = ReplayReport::default();

        for entry in &self.entries {
            match target
                .read_and_subscribe(&entry.path, entry.response_handler())
                .await
            {
                Ok(_) => report.subscribed.push(entry.path.clone()),
                Err(e) => {
                    warn!(path = %entry.path, error = %e, "Failed to replay subscription");
                    report.failed.push((entry.path.clone(), e));
                }
            }
        }

        info!(
            subscribed = report.subscribed.len(),
            failed = report.failed.len(),
            "Subscription replay finished"
        );
        report
    }
}
