//! Top-level error type for the publish and subscribe commands
//!
//! Each variant corresponds to the stage that failed; [`CliError::exit_code`]
//! turns it into the process exit status.

use crate::config::ConfigError;
use crate::transport::mqtt::MqttError;
use thiserror::Error;

/// Exit status for configuration, certificate and setup problems
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit status for connect and subscribe failures
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit status for message body problems
pub const EXIT_INPUT_ERROR: u8 = 3;
/// Exit status for publish and delivery failures
pub const EXIT_TRANSPORT_ERROR: u8 = 4;

/// Main error type for command execution
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Connection failed: {0}")]
    Connection(#[source] MqttError),

    #[error("Subscription failed: {0}")]
    Subscription(#[source] MqttError),

    #[error("Transport error: {0}")]
    Transport(#[source] MqttError),

    #[error("message body cannot be empty")]
    EmptyBody,

    #[error("Failed to read message body from {origin}: {source}")]
    BodyRead {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

impl CliError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Configuration(_) | CliError::Signal(_) => EXIT_CONFIG_ERROR,
            CliError::Connection(_) | CliError::Subscription(_) => EXIT_CONNECTION_ERROR,
            CliError::EmptyBody | CliError::BodyRead { .. } => EXIT_INPUT_ERROR,
            CliError::Transport(_) => EXIT_TRANSPORT_ERROR,
        }
    }

    /// Create a body read error
    pub fn body_read<S: Into<String>>(origin: S, source: std::io::Error) -> Self {
        Self::BodyRead {
            origin: origin.into(),
            source,
        }
    }
}

/// Result type for command execution
pub type CliResult<T> = Result<T, CliError>;
