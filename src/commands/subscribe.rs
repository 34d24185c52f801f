//! Subscribe to topics and log every message that arrives

use crate::config::{ConnectOptions, QosLevel};
use crate::error::{CliError, CliResult};
use crate::transport::{MqttError, Session, Subscription};
use tracing::{debug, error, info};

/// One subscription per topic, all at the same QoS
pub fn build_subscriptions(topics: &[String], qos: QosLevel) -> Vec<Subscription> {
    topics
        .iter()
        .map(|topic| Subscription::new(topic.clone(), qos))
        .collect()
}

/// Payload as logged: lossy UTF-8 with surrounding whitespace removed
pub fn render_content(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).trim().to_string()
}

/// Connect, subscribe and log inbound messages until the session ends.
///
/// Delivery errors are logged and skipped. The function only returns when
/// the connection or subscription fails, or when the inbound stream ends.
pub async fn run<S: Session>(session: &mut S, options: &ConnectOptions) -> CliResult<()> {
    session.connect().await.map_err(CliError::Connection)?;
    debug!(host = %options.host, port = options.port, "connected");

    let subscriptions = build_subscriptions(&options.topics, options.qos);
    session
        .subscribe(&subscriptions)
        .await
        .map_err(CliError::Subscription)?;
    debug!(topics = ?options.topics, qos = options.qos.as_u8(), "subscribed");

    let mut stream = session.messages().map_err(CliError::Subscription)?;
    while let Some(delivery) = stream.next().await {
        match delivery {
            Ok(message) => {
                info!(
                    topic = %message.topic,
                    content = %render_content(&message.payload),
                    "message received"
                );
            }
            Err(e) => error!(error = %e, "failed to receive PUBLISH"),
        }
    }

    Err(CliError::Transport(MqttError::SessionClosed))
}
