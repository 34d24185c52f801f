//! Pure connection configuration for the MQTT client
//!
//! This module contains the error type shared by the session layer and the
//! mapping from a [`ConnectionProfile`] onto `rumqttc` options.

use super::tls::LoadedTrust;
use crate::config::{ConfigError, QosLevel};
use crate::profile::ConnectionProfile;
use rumqttc::{MqttOptions, QoS, TlsConfiguration, Transport as RumqttcTransport};
use std::sync::Arc;
use thiserror::Error;

/// Largest packet accepted or sent, in bytes
pub const MAX_PACKET_SIZE: usize = 256 * 1024;

/// Capacity of the request channel between `AsyncClient` and `EventLoop`
pub const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// MQTT session errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Connection refused by broker: {0}")]
    ConnectionRefused(String),
    #[error("Publishing to {topic} failed: {source}")]
    PublishFailed {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Subscription request failed: {0}")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Broker rejected subscription to {0:?}")]
    SubscriptionRejected(Vec<String>),
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
    #[error("Session closed")]
    SessionClosed,
    #[error("Not connected")]
    NotConnected,
    #[error("Inbound message stream already taken")]
    StreamTaken,
}

impl From<QosLevel> for QoS {
    fn from(level: QosLevel) -> Self {
        match level {
            QosLevel::AtMostOnce => QoS::AtMostOnce,
            QosLevel::AtLeastOnce => QoS::AtLeastOnce,
            QosLevel::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

impl From<QoS> for QosLevel {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => QosLevel::AtMostOnce,
            QoS::AtLeastOnce => QosLevel::AtLeastOnce,
            QoS::ExactlyOnce => QosLevel::ExactlyOnce,
        }
    }
}

/// Build `rumqttc` options for a profile.
///
/// Reads any configured certificate, key and CA files, so malformed material
/// fails here even when the transport is plain TCP.
pub fn configure_mqtt_options(profile: &ConnectionProfile) -> Result<MqttOptions, ConfigError> {
    let mut mqtt_options = MqttOptions::new(
        profile.client_id.clone(),
        profile.broker_address(),
        profile.port,
    );

    mqtt_options.set_keep_alive(profile.keep_alive);
    mqtt_options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);

    if let Some(credentials) = &profile.credentials {
        mqtt_options.set_credentials(&credentials.username, &credentials.password);
    }

    let trust = LoadedTrust::load(&profile.trust)?;

    let transport = match (profile.transport.use_websockets, profile.transport.use_tls) {
        (false, false) => RumqttcTransport::Tcp,
        (true, false) => RumqttcTransport::Ws,
        (false, true) => RumqttcTransport::Tls(tls_configuration(trust)?),
        (true, true) => RumqttcTransport::Wss(tls_configuration(trust)?),
    };
    mqtt_options.set_transport(transport);

    Ok(mqtt_options)
}

fn tls_configuration(trust: LoadedTrust) -> Result<TlsConfiguration, ConfigError> {
    Ok(TlsConfiguration::Rustls(Arc::new(
        trust.into_client_config()?,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientCertificate;
    use crate::profile::{TransportKind, TrustConfig};
    use std::path::PathBuf;
    use std::time::Duration;

    fn test_profile(port: u16) -> ConnectionProfile {
        ConnectionProfile {
            host: "localhost".to_string(),
            port,
            client_id: "test-client".to_string(),
            transport: TransportKind::for_port(port),
            trust: TrustConfig::default(),
            credentials: None,
            keep_alive: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_qos_conversion() {
        for level in [
            QosLevel::AtMostOnce,
            QosLevel::AtLeastOnce,
            QosLevel::ExactlyOnce,
        ] {
            let qos: QoS = level.into();
            assert_eq!(QosLevel::from(qos), level);
        }
    }

    #[test]
    fn test_configure_plain_tcp() {
        let options = configure_mqtt_options(&test_profile(1883)).unwrap();
        assert_eq!(options.client_id(), "test-client");
        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
        assert!(matches!(options.transport(), RumqttcTransport::Tcp));
    }

    #[test]
    fn test_configure_websocket_transports() {
        let options = configure_mqtt_options(&test_profile(80)).unwrap();
        assert!(matches!(options.transport(), RumqttcTransport::Ws));
        assert_eq!(options.broker_address().0, "ws://localhost:80/mqtt");

        let options = configure_mqtt_options(&test_profile(443)).unwrap();
        assert!(matches!(options.transport(), RumqttcTransport::Wss(_)));
    }

    #[test]
    fn test_configure_tls() {
        let options = configure_mqtt_options(&test_profile(8884)).unwrap();
        assert!(matches!(options.transport(), RumqttcTransport::Tls(_)));
    }

    #[test]
    fn test_credentials_applied() {
        let mut profile = test_profile(1883);
        profile.credentials = Some(crate::profile::Credentials {
            username: "alice".to_string(),
            password: "secret".to_string(),
        });

        let options = configure_mqtt_options(&profile).unwrap();
        assert_eq!(
            options.credentials(),
            Some(("alice".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_missing_certificate_file_is_config_error() {
        let mut profile = test_profile(1883);
        profile.trust.identity = Some(ClientCertificate {
            cert_file: PathBuf::from("/nonexistent/client.pem"),
            key_file: PathBuf::from("/nonexistent/client.key"),
        });

        let result = configure_mqtt_options(&profile);
        assert!(matches!(result, Err(ConfigError::MaterialRead { .. })));
    }

    #[test]
    fn test_mqtt_error_display() {
        let errors = vec![
            MqttError::ConnectionFailed("test".to_string().into()),
            MqttError::ConnectionRefused("NotAuthorized".to_string()),
            MqttError::PublishFailed {
                topic: "a/b".to_string(),
                source: "test".to_string().into(),
            },
            MqttError::SubscriptionFailed("test".to_string().into()),
            MqttError::SubscriptionRejected(vec!["a/#".to_string()]),
            MqttError::DeliveryFailed("test".to_string()),
            MqttError::SessionClosed,
            MqttError::NotConnected,
            MqttError::StreamTaken,
        ];

        for error in errors {
            let error_string = error.to_string();
            assert!(!error_string.is_empty());
        }
    }
}
