//! Mock implementations for testing
//!
//! [`MockSession`] records every call made through the [`Session`] trait and
//! can be told to fail at each stage.

use crate::config::QosLevel;
use crate::transport::{Delivery, InboundStream, MqttError, Session, Subscription};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub type PublishedMessage = (String, Bytes, QosLevel);

/// Mock session for testing
#[derive(Debug, Default)]
pub struct MockSession {
    pub connect_calls: Arc<Mutex<usize>>,
    pub published_messages: Arc<Mutex<Vec<PublishedMessage>>>,
    pub subscribe_calls: Arc<Mutex<Vec<Vec<Subscription>>>>,
    pub fail_connect: bool,
    pub fail_subscribe: bool,
    /// Zero-based index of the publish call that fails
    pub fail_publish_at: Option<usize>,
    inbound: Vec<Delivery>,
    keep_stream_open: bool,
    held_sender: Option<mpsc::Sender<Delivery>>,
    connected: bool,
    stream_taken: bool,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_failure() -> Self {
        Self {
            fail_connect: true,
            ..Default::default()
        }
    }

    pub fn with_subscribe_failure() -> Self {
        Self {
            fail_subscribe: true,
            ..Default::default()
        }
    }

    pub fn with_publish_failure_at(index: usize) -> Self {
        Self {
            fail_publish_at: Some(index),
            ..Default::default()
        }
    }

    /// Items replayed by the inbound stream, in order. The stream ends after
    /// the last one unless [`MockSession::keep_stream_open`] is set.
    pub fn with_inbound(mut self, inbound: Vec<Delivery>) -> Self {
        self.inbound = inbound;
        self
    }

    /// Keep the inbound stream open after the scripted items
    pub fn keep_stream_open(mut self) -> Self {
        self.keep_stream_open = true;
        self
    }

    pub async fn get_connect_calls(&self) -> usize {
        *self.connect_calls.lock().await
    }

    pub async fn get_published_messages(&self) -> Vec<PublishedMessage> {
        self.published_messages.lock().await.clone()
    }

    pub async fn get_subscribe_calls(&self) -> Vec<Vec<Subscription>> {
        self.subscribe_calls.lock().await.clone()
    }
}

#[async_trait]
impl Session for MockSession {
    async fn connect(&mut self) -> Result<(), MqttError> {
        *self.connect_calls.lock().await += 1;
        if self.fail_connect {
            return Err(MqttError::ConnectionFailed("Mock connection failure".into()));
        }
        self.connected = true;
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: Bytes,
        qos: QosLevel,
    ) -> Result<(), MqttError> {
        if !self.connected {
            return Err(MqttError::NotConnected);
        }

        let mut published = self.published_messages.lock().await;
        if self.fail_publish_at == Some(published.len()) {
            return Err(MqttError::PublishFailed {
                topic: topic.to_string(),
                source: "Mock publish failure".into(),
            });
        }
        published.push((topic.to_string(), payload, qos));
        Ok(())
    }

    async fn subscribe(&mut self, subscriptions: &[Subscription]) -> Result<(), MqttError> {
        if !self.connected {
            return Err(MqttError::NotConnected);
        }

        self.subscribe_calls.lock().await.push(subscriptions.to_vec());
        if self.fail_subscribe {
            return Err(MqttError::SubscriptionRejected(
                subscriptions
                    .iter()
                    .map(|s| s.topic_filter.clone())
                    .collect(),
            ));
        }
        Ok(())
    }

    fn messages(&mut self) -> Result<InboundStream, MqttError> {
        if self.stream_taken {
            return Err(MqttError::StreamTaken);
        }
        self.stream_taken = true;

        let scripted = std::mem::take(&mut self.inbound);
        let (tx, rx) = mpsc::channel(scripted.len() + 1);
        for delivery in scripted {
            // Capacity covers every scripted item
            let _ = tx.try_send(delivery);
        }
        if self.keep_stream_open {
            self.held_sender = Some(tx);
        }
        Ok(InboundStream::new(rx))
    }
}
