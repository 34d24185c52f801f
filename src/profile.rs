//! Connection profile derivation
//!
//! Maps validated [`ConnectOptions`] onto the transport, trust and identity
//! settings used to open a session. Derivation is a pure mapping; the only
//! fallible step (reading PEM material) lives in
//! [`crate::transport::mqtt::tls`].

use crate::config::{ClientCertificate, ConnectOptions};
use std::path::PathBuf;
use std::time::Duration;

/// Path appended to the broker address for MQTT over WebSockets
pub const WEBSOCKET_PATH: &str = "/mqtt";

/// Transport selection. Both flags are set for port 443.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportKind {
    pub use_websockets: bool,
    pub use_tls: bool,
}

impl TransportKind {
    /// Transport policy keyed on the well-known port numbers
    pub fn for_port(port: u16) -> Self {
        Self {
            use_websockets: matches!(port, 443 | 80),
            use_tls: matches!(port, 443 | 8884),
        }
    }

    /// Short scheme label used in log output
    pub fn scheme(&self) -> &'static str {
        match (self.use_websockets, self.use_tls) {
            (true, true) => "wss",
            (true, false) => "ws",
            (false, true) => "mqtts",
            (false, false) => "mqtt",
        }
    }
}

/// Trust anchors and client identity. Platform roots are always the base.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustConfig {
    /// Extra CA bundle added on top of the platform roots
    pub ca_root: Option<PathBuf>,
    /// Client certificate for mutual TLS
    pub identity: Option<ClientCertificate>,
}

/// Username/password sent in CONNECT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Everything needed to open a session to one broker
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionProfile {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub transport: TransportKind,
    pub trust: TrustConfig,
    pub credentials: Option<Credentials>,
    pub keep_alive: Duration,
}

impl ConnectionProfile {
    /// Derive the profile for `options`
    pub fn derive(options: &ConnectOptions) -> Self {
        let credentials = options.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: options.password.clone().unwrap_or_default(),
        });

        Self {
            host: options.host.clone(),
            port: options.port,
            client_id: options.client_id.clone(),
            transport: TransportKind::for_port(options.port),
            trust: TrustConfig {
                ca_root: options.ca_root.clone(),
                identity: options.client_certificate(),
            },
            credentials,
            keep_alive: options.keep_alive,
        }
    }

    /// Broker address handed to the MQTT client.
    ///
    /// Plain host name for TCP transports; a full `ws://`/`wss://` URL when
    /// tunnelling over WebSockets.
    pub fn broker_address(&self) -> String {
        if self.transport.use_websockets {
            let scheme = if self.transport.use_tls { "wss" } else { "ws" };
            format!("{scheme}://{}:{}{WEBSOCKET_PATH}", self.host, self.port)
        } else {
            self.host.clone()
        }
    }
}
