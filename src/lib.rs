//! mqttc - command-line MQTT client
//!
//! Publishes messages to, and streams messages from, an MQTT broker over
//! TCP, TLS, or WebSockets.
//!
//! # Overview
//!
//! - [`config`] - Option validation and the TOML profile file
//! - [`profile`] - Transport and trust selection derived from the options
//! - [`transport`] - The [`transport::Session`] trait and its MQTT implementation
//! - [`commands`] - The publish and subscribe workflows
//! - [`cli`] - Command-line parsing
//!
//! # Quick Start
//!
//! ```rust
//! use mqttc::config::{ConnectOptions, RawOptions};
//! use mqttc::profile::ConnectionProfile;
//!
//! let raw = RawOptions {
//!     host: Some("broker.example.com".to_string()),
//!     port: Some(443),
//!     topics: vec!["sensors/temperature".to_string()],
//!     ..Default::default()
//! };
//! let options = ConnectOptions::from_raw(raw, &mut rand::thread_rng()).unwrap();
//! let profile = ConnectionProfile::derive(&options);
//!
//! assert!(profile.transport.use_websockets);
//! assert!(profile.transport.use_tls);
//! assert_eq!(profile.broker_address(), "wss://broker.example.com:443/mqtt");
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod observability;
pub mod profile;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, ConnectOptions, QosLevel};
pub use error::{CliError, CliResult};
pub use profile::ConnectionProfile;
pub use transport::mqtt::MqttSession;
pub use transport::{InboundMessage, Session, Subscription};
