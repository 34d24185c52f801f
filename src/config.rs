//! Connection and command options
//!
//! [`ConnectOptions`] is the validated, immutable set of parameters for one
//! invocation. It is assembled from [`RawOptions`] (command line and
//! environment) optionally backed by a TOML [`ProfileFile`].

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default MQTT broker port
pub const DEFAULT_PORT: u16 = 1883;

/// Length of a generated client identifier
pub const CLIENT_ID_LENGTH: usize = 23;

/// Default keep-alive interval in seconds
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;

/// MQTT delivery guarantee level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QosLevel {
    /// QoS 0
    #[default]
    AtMostOnce,
    /// QoS 1
    AtLeastOnce,
    /// QoS 2
    ExactlyOnce,
}

impl QosLevel {
    /// Map a numeric level onto a QoS, falling back to the least strict
    /// level for anything outside 0..=2.
    pub fn from_level(level: u8) -> Self {
        match level {
            1 => QosLevel::AtLeastOnce,
            2 => QosLevel::ExactlyOnce,
            _ => QosLevel::AtMostOnce,
        }
    }

    /// Numeric value as carried on the wire
    pub fn as_u8(self) -> u8 {
        match self {
            QosLevel::AtMostOnce => 0,
            QosLevel::AtLeastOnce => 1,
            QosLevel::ExactlyOnce => 2,
        }
    }
}

/// Client certificate and private key used for mutual TLS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Option loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Broker host is required and cannot be empty")]
    MissingHost,
    #[error("At least one topic is required")]
    NoTopics,
    #[error("Topic at position {0} is empty")]
    EmptyTopic(usize),
    #[error("Invalid client ID: {0:?}")]
    InvalidClientId(String),
    #[error("Failed to read {}: {source}", path.display())]
    MaterialRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed PEM in {}: {reason}", path.display())]
    InvalidPem { path: PathBuf, reason: String },
    #[error("TLS configuration rejected: {0}")]
    TlsConfig(#[from] rumqttc::tokio_rustls::rustls::Error),
}

/// Generate a client identifier from the 62-character alphanumeric alphabet.
///
/// The random source is injected so callers can supply a seeded generator.
pub fn random_client_id<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// Unvalidated options as gathered from the command line and environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub ca_root: Option<PathBuf>,
    pub topics: Vec<String>,
    pub qos: u8,
    pub verbose: bool,
    pub keep_alive_secs: Option<u64>,
}

impl RawOptions {
    /// Fill every unset option from the profile file's `[broker]` section
    pub fn with_profile_file(self, file: ProfileFile) -> Self {
        let broker = file.broker;
        Self {
            host: self.host.or(broker.host),
            port: self.port.or(broker.port),
            client_id: self.client_id.or(broker.client_id),
            username: self.username.or(broker.username),
            password: self.password.or(broker.password),
            cert_file: self.cert_file.or(broker.cert_file),
            key_file: self.key_file.or(broker.key_file),
            ca_root: self.ca_root.or(broker.ca_root),
            keep_alive_secs: self.keep_alive_secs.or(broker.keep_alive_secs),
            ..self
        }
    }
}

/// Validated options for one publish or subscribe invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub ca_root: Option<PathBuf>,
    pub topics: Vec<String>,
    pub qos: QosLevel,
    pub verbose: bool,
    pub keep_alive: Duration,
}

impl ConnectOptions {
    /// Validate raw options. A client ID is drawn from `rng` when none was given.
    pub fn from_raw<R: Rng + ?Sized>(raw: RawOptions, rng: &mut R) -> Result<Self, ConfigError> {
        let host = raw
            .host
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHost)?;

        if raw.topics.is_empty() {
            return Err(ConfigError::NoTopics);
        }
        if let Some(index) = raw.topics.iter().position(|t| t.is_empty()) {
            return Err(ConfigError::EmptyTopic(index));
        }

        let client_id = match raw.client_id {
            Some(id) => {
                validate_client_id(&id)?;
                id
            }
            None => random_client_id(rng, CLIENT_ID_LENGTH),
        };

        if raw.password.is_some() && raw.username.is_none() {
            warn!("password given without a username; credentials will not be sent");
        }
        if raw.cert_file.is_some() != raw.key_file.is_some() {
            warn!("certificate authentication needs both --CertFile and --KeyFile; ignoring");
        }

        Ok(Self {
            host,
            port: raw.port.unwrap_or(DEFAULT_PORT),
            client_id,
            username: raw.username,
            password: raw.password,
            cert_file: raw.cert_file,
            key_file: raw.key_file,
            ca_root: raw.ca_root,
            topics: raw.topics,
            qos: QosLevel::from_level(raw.qos),
            verbose: raw.verbose,
            keep_alive: Duration::from_secs(raw.keep_alive_secs.unwrap_or(DEFAULT_KEEP_ALIVE_SECS)),
        })
    }

    /// The certificate/key pair, present only when both paths were given
    pub fn client_certificate(&self) -> Option<ClientCertificate> {
        match (&self.cert_file, &self.key_file) {
            (Some(cert_file), Some(key_file)) => Some(ClientCertificate {
                cert_file: cert_file.clone(),
                key_file: key_file.clone(),
            }),
            _ => None,
        }
    }
}

fn validate_client_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() || id.starts_with(' ') {
        return Err(ConfigError::InvalidClientId(id.to_string()));
    }
    Ok(())
}

/// Optional TOML file with connection defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileFile {
    #[serde(default)]
    pub broker: BrokerSection,
}

/// `[broker]` section of a profile file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BrokerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub ca_root: Option<PathBuf>,
    pub keep_alive_secs: Option<u64>,
}

impl ProfileFile {
    /// Load a profile file from disk
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
