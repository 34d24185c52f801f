//! Impure I/O operations for the MQTT session
//!
//! This module owns the `rumqttc` client and event loop. After CONNACK the
//! event loop runs in a background dispatcher task that feeds the inbound
//! stream and the acknowledgement channel.

use super::connection::{configure_mqtt_options, MqttError, REQUEST_CHANNEL_CAPACITY};
use super::message_handler::{Acknowledgement, EventRoute, MessageHandler};
use crate::config::{ConfigError, QosLevel};
use crate::profile::ConnectionProfile;
use crate::transport::{Delivery, InboundStream, Session, Subscription};
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, ConnectionError, EventLoop, SubscribeFilter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

/// Buffered inbound deliveries before the dispatcher applies backpressure
pub const INBOUND_CHANNEL_CAPACITY: usize = 100;

/// MQTT session bound to one broker
pub struct MqttSession {
    client: AsyncClient,
    event_loop: Option<EventLoop>,
    event_loop_handle: Option<JoinHandle<()>>,
    inbound_tx: Option<mpsc::Sender<Delivery>>,
    inbound_rx: Option<mpsc::Receiver<Delivery>>,
    ack_rx: Option<mpsc::UnboundedReceiver<Acknowledgement>>,
}

impl MqttSession {
    /// Create a session for `profile`. Loads TLS material; does not connect.
    pub fn new(profile: &ConnectionProfile) -> Result<Self, ConfigError> {
        let mqtt_options = configure_mqtt_options(profile)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);

        debug!(
            broker = %profile.broker_address(),
            port = profile.port,
            transport = profile.transport.scheme(),
            client_id = %profile.client_id,
            "session configured"
        );

        Ok(Self {
            client,
            event_loop: Some(event_loop),
            event_loop_handle: None,
            inbound_tx: Some(inbound_tx),
            inbound_rx: Some(inbound_rx),
            ack_rx: None,
        })
    }

    /// Poll the event loop until the broker answers CONNECT
    async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), MqttError> {
        loop {
            let event = event_loop.poll().await.map_err(|e| match e {
                ConnectionError::ConnectionRefused(code) => {
                    MqttError::ConnectionRefused(format!("{code:?}"))
                }
                e => MqttError::ConnectionFailed(Box::new(e)),
            })?;

            match MessageHandler::route_event(&event) {
                EventRoute::ConnectionAcknowledged => return Ok(()),
                EventRoute::Disconnected => {
                    return Err(MqttError::ConnectionRefused(
                        "broker disconnected before CONNACK".to_string(),
                    ))
                }
                route => trace!(?route, "event before CONNACK"),
            }
        }
    }

    /// Drive the event loop until it fails or the broker disconnects.
    ///
    /// Never reconnects: polling a failed `EventLoop` again would.
    async fn run_event_loop(
        mut event_loop: EventLoop,
        inbound_tx: mpsc::Sender<Delivery>,
        ack_tx: mpsc::UnboundedSender<Acknowledgement>,
    ) {
        loop {
            match event_loop.poll().await {
                Ok(event) => match MessageHandler::route_event(&event) {
                    EventRoute::MessageReceived(message) => {
                        trace!(topic = %message.topic, "PUBLISH received");
                        if inbound_tx.send(Ok(message)).await.is_err() {
                            debug!("inbound stream dropped, discarding message");
                        }
                    }
                    EventRoute::Acknowledged(ack) => {
                        let _ = ack_tx.send(ack);
                    }
                    EventRoute::Disconnected => {
                        warn!("broker closed the session");
                        let _ = ack_tx.send(Acknowledgement::Failed(
                            "broker sent DISCONNECT".to_string(),
                        ));
                        let _ = inbound_tx.send(Err(MqttError::SessionClosed)).await;
                        break;
                    }
                    EventRoute::ConnectionAcknowledged => {
                        debug!("unexpected CONNACK on established session");
                    }
                    EventRoute::InfrastructureEvent(event) => {
                        trace!(target: "mqtt_transport", "MQTT event: {}", event);
                    }
                    EventRoute::OutgoingEvent => {}
                },
                Err(e) => {
                    error!(error = %e, "MQTT event loop failed");
                    let reason = e.to_string();
                    let _ = ack_tx.send(Acknowledgement::Failed(reason.clone()));
                    let _ = inbound_tx.send(Err(MqttError::DeliveryFailed(reason))).await;
                    break;
                }
            }
        }
        debug!("MQTT event loop stopped");
    }

    fn ack_receiver(&mut self) -> Result<&mut mpsc::UnboundedReceiver<Acknowledgement>, MqttError> {
        self.ack_rx.as_mut().ok_or(MqttError::NotConnected)
    }
}

#[async_trait]
impl Session for MqttSession {
    async fn connect(&mut self) -> Result<(), MqttError> {
        let mut event_loop = self.event_loop.take().ok_or_else(|| {
            MqttError::ConnectionFailed("event loop already started".into())
        })?;
        let inbound_tx = self.inbound_tx.take().ok_or(MqttError::SessionClosed)?;

        Self::wait_for_connack(&mut event_loop).await?;

        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        self.ack_rx = Some(ack_rx);
        self.event_loop_handle = Some(tokio::spawn(Self::run_event_loop(
            event_loop, inbound_tx, ack_tx,
        )));
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: Bytes,
        qos: QosLevel,
    ) -> Result<(), MqttError> {
        let publish_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            MqttError::PublishFailed {
                topic: topic.to_string(),
                source,
            }
        };

        if self.ack_rx.is_none() {
            return Err(MqttError::NotConnected);
        }

        self.client
            .publish(topic, qos.into(), false, payload.to_vec())
            .await
            .map_err(|e| publish_failed(e.into()))?;

        let ack_rx = self.ack_receiver()?;
        loop {
            match ack_rx.recv().await {
                Some(ack) if MessageHandler::completes_publish(qos, &ack) => return Ok(()),
                Some(Acknowledgement::Failed(reason)) => return Err(publish_failed(reason.into())),
                Some(ack) => trace!(?ack, "skipping acknowledgement"),
                None => return Err(MqttError::SessionClosed),
            }
        }
    }

    async fn subscribe(&mut self, subscriptions: &[Subscription]) -> Result<(), MqttError> {
        if self.ack_rx.is_none() {
            return Err(MqttError::NotConnected);
        }

        let filters: Vec<SubscribeFilter> = subscriptions
            .iter()
            .map(|s| SubscribeFilter::new(s.topic_filter.clone(), s.qos.into()))
            .collect();
        let topic_filters: Vec<String> = subscriptions
            .iter()
            .map(|s| s.topic_filter.clone())
            .collect();

        self.client
            .subscribe_many(filters)
            .await
            .map_err(|e| MqttError::SubscriptionFailed(Box::new(e)))?;

        let ack_rx = self.ack_receiver()?;
        loop {
            match ack_rx.recv().await {
                Some(Acknowledgement::SubAck { granted, .. }) => {
                    return MessageHandler::validate_subscription(&topic_filters, &granted)
                }
                Some(Acknowledgement::Failed(reason)) => {
                    return Err(MqttError::SubscriptionFailed(reason.into()))
                }
                Some(ack) => trace!(?ack, "skipping acknowledgement"),
                None => return Err(MqttError::SessionClosed),
            }
        }
    }

    fn messages(&mut self) -> Result<InboundStream, MqttError> {
        self.inbound_rx
            .take()
            .map(InboundStream::new)
            .ok_or(MqttError::StreamTaken)
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        // Dropping the session is the teardown; there is no DISCONNECT step
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
    }
}
