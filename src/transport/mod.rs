//! Transport layer for broker sessions
//!
//! This module provides the session abstraction the publish and subscribe
//! commands are written against, and its MQTT implementation.

use crate::config::QosLevel;
use bytes::Bytes;
use tokio::sync::mpsc;

pub mod mqtt;

pub use mqtt::MqttError;

/// A PUBLISH received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QosLevel,
    pub retain: bool,
}

/// One item of the inbound stream: a message or a delivery failure
pub type Delivery = Result<InboundMessage, MqttError>;

/// One topic filter of a SUBSCRIBE request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic_filter: String,
    pub qos: QosLevel,
}

impl Subscription {
    pub fn new<S: Into<String>>(topic_filter: S, qos: QosLevel) -> Self {
        Self {
            topic_filter: topic_filter.into(),
            qos,
        }
    }
}

/// Lazy, unbounded sequence of inbound deliveries.
///
/// Yields until the session ends, then returns `None`. Handed out once per
/// session.
#[derive(Debug)]
pub struct InboundStream {
    rx: mpsc::Receiver<Delivery>,
}

impl InboundStream {
    pub fn new(rx: mpsc::Receiver<Delivery>) -> Self {
        Self { rx }
    }

    /// Wait for the next delivery
    pub async fn next(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

/// Session trait for one broker connection
///
/// The publish and subscribe commands only talk to a broker through this
/// trait, so they can be driven by [`crate::testing::MockSession`] in tests.
#[async_trait::async_trait]
pub trait Session: Send {
    /// Establish the session; returns once the broker has acknowledged it
    async fn connect(&mut self) -> Result<(), MqttError>;

    /// Send one message and wait for its acknowledgement
    async fn publish(&mut self, topic: &str, payload: Bytes, qos: QosLevel)
        -> Result<(), MqttError>;

    /// Register every subscription in a single request and wait for SUBACK
    async fn subscribe(&mut self, subscriptions: &[Subscription]) -> Result<(), MqttError>;

    /// Take the inbound message stream. Fails if it was already taken.
    fn messages(&mut self) -> Result<InboundStream, MqttError>;
}
