//! Request and response shapes exchanged with the transport.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of request sent to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// Read a resource
    Read,
    /// Create on a resource; used for command processors
    Create,
}

impl RequestKind {
    /// The LEAP communique type for this request.
    pub fn communique_type(&self) -> &'static str {
        match self {
            RequestKind::Read => "ReadRequest",
            RequestKind::Create => "CreateRequest",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.communique_type())
    }
}

/// Header of a gateway response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeader {
    /// Status line such as `200 OK` or `404 NotFound`
    #[serde(rename = "StatusCode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,

    /// Resource path the response refers to
    #[serde(rename = "Url", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Declared type of the body document
    #[serde(rename = "MessageBodyType", default, skip_serializing_if = "Option::is_none")]
    pub message_body_type: Option<String>,
}

/// A response, subscription push or unsolicited message from the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "CommuniqueType", default, skip_serializing_if = "Option::is_none")]
    pub communique_type: Option<String>,

    #[serde(rename = "Header", default)]
    pub header: ResponseHeader,

    /// Keyed body document; `Null` when the gateway sent none
    #[serde(rename = "Body", default)]
    pub body: Value,
}

impl Response {
    /// Build a response carrying only a body.
    pub fn with_body(body: Value) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }

    /// Attach a status line.
    pub fn with_status(mut self, status_code: impl Into<String>) -> Self {
        self.header.status_code = Some(status_code.into());
        self
    }

    /// Numeric part of the status line, if any.
    pub fn status(&self) -> Option<u16> {
        self.header
            .status_code
            .as_deref()?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    }

    /// A response without a status line counts as successful.
    pub fn is_success(&self) -> bool {
        self.status().map_or(true, |code| (200..300).contains(&code))
    }
}

/// Callback invoked with every response delivered for a subscribed path.
pub type ResponseHandler = Arc<dyn Fn(&Response) + Send + Sync>;
