use leap_connection::{CredentialError, GatewayError};
use thiserror::Error;

use crate::logging::LoggingError;

/// Errors from loading the bridge configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// An environment variable holds an unusable value
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    /// Credential files could not be loaded
    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

/// Errors from interpreting an incoming bus message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
    /// The topic is not below the configured prefix
    #[error("Topic {0} is outside the bridge prefix")]
    Foreign(String),

    /// The topic does not have the `{scope}/{id}/{command}` shape
    #[error("Malformed command topic {0}")]
    Malformed(String),

    /// No command with this name exists for the scope
    #[error("Unknown command {command} for {scope}")]
    UnknownCommand { scope: String, command: String },

    /// The payload cannot be turned into a command argument
    #[error("Invalid payload on {topic}: {reason}")]
    InvalidPayload { topic: String, reason: String },
}

/// Errors surfaced by the bridge runtime.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Topic(#[from] TopicError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// The MQTT client rejected a request
    #[error("MQTT client error: {0}")]
    Mqtt(String),

    /// A background task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(String),

    /// The gateway connection dropped and the bridge is configured to exit
    #[error("Gateway disconnected")]
    GatewayDisconnected,
}

impl From<rumqttc::ClientError> for BridgeError {
    fn from(error: rumqttc::ClientError) -> Self {
        BridgeError::Mqtt(error.to_string())
    }
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
