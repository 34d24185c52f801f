//! MQTT session implementation
//!
//! Pure functions are kept apart from I/O so routing and configuration can
//! be tested without a broker.
//!
//! # Architecture
//!
//! - [`connection`] - Error type and mapping of a profile onto `rumqttc` options
//! - [`tls`] - Loading of CA bundles and client certificates
//! - [`message_handler`] - Pure event routing and acknowledgement matching
//! - [`client`] - Impure I/O operations and the event loop dispatcher
//!
//! # Usage
//!
//! ```rust,no_run
//! use mqttc::config::{ConnectOptions, RawOptions};
//! use mqttc::profile::ConnectionProfile;
//! use mqttc::transport::{mqtt::MqttSession, Session};
//!
//! # tokio_test::block_on(async {
//! let raw = RawOptions {
//!     host: Some("localhost".to_string()),
//!     topics: vec!["sensors/#".to_string()],
//!     ..Default::default()
//! };
//! let options = ConnectOptions::from_raw(raw, &mut rand::thread_rng())?;
//!
//! let mut session = MqttSession::new(&ConnectionProfile::derive(&options))?;
//! session.connect().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;
pub mod tls;

pub use client::MqttSession;
pub use connection::{configure_mqtt_options, MqttError};
pub use message_handler::{Acknowledgement, EventRoute, MessageHandler};
pub use tls::LoadedTrust;
