use thiserror::Error;

/// Errors raised by a transport implementation.
///
/// The transport is an opaque collaborator; these variants only classify its
/// failures well enough to log them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(String),

    /// TLS or protocol handshake failed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The transport has been closed
    #[error("Transport closed")]
    Closed,

    /// The gateway sent something the transport could not interpret
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Errors surfaced by the gateway connection and the command surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Opening the transport or completing the handshake failed
    #[error("Failed to connect to gateway: {0}")]
    ConnectFailed(String),

    /// A single read, subscribe or command request failed
    #[error("Request to {path} failed: {reason}")]
    RequestFailed { path: String, reason: String },

    /// A command was issued while the connection is down
    #[error("Gateway is not connected")]
    NotConnected,

    /// A zone level outside 0-100 or not an integer
    #[error("Invalid zone level: {0} (expected an integer from 0 to 100)")]
    InvalidLevel(String),

    /// A device id that cannot be placed in a resource path
    #[error("Invalid device id: {0:?}")]
    InvalidDeviceId(String),

    /// A subscription path was registered twice
    #[error("Subscription already registered for {0}")]
    DuplicateSubscription(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A background task did not stop cleanly
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

impl GatewayError {
    pub(crate) fn request_failed(path: &str, reason: impl ToString) -> Self {
        GatewayError::RequestFailed {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors from loading credential material.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// A credential file could not be read
    #[error("Failed to read {kind} from {path}: {source}")]
    Read {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A credential file was empty
    #[error("Empty {kind} file at {path}")]
    Empty { kind: &'static str, path: String },
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
