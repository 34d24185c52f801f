//! Pure event routing for the MQTT session
//!
//! This module turns `rumqttc` events into routing decisions and checks
//! acknowledgements, without touching the network.

use crate::config::QosLevel;
use crate::transport::{InboundMessage, MqttError};
use rumqttc::{Event, Outgoing, Packet, SubscribeReasonCode};
use tracing::debug;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to the session dispatcher (pure routing decision)
    pub fn route_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived(InboundMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.clone(),
                    qos: publish.qos.into(),
                    retain: publish.retain,
                }),
                Packet::PubAck(ack) => EventRoute::Acknowledged(Acknowledgement::PubAck(ack.pkid)),
                Packet::PubComp(comp) => {
                    EventRoute::Acknowledged(Acknowledgement::PubComp(comp.pkid))
                }
                Packet::SubAck(suback) => EventRoute::Acknowledged(Acknowledgement::SubAck {
                    pkid: suback.pkid,
                    granted: suback
                        .return_codes
                        .iter()
                        .map(|code| match code {
                            SubscribeReasonCode::Success(qos) => Some(QosLevel::from(*qos)),
                            SubscribeReasonCode::Failure => None,
                        })
                        .collect(),
                }),
                Packet::Disconnect => EventRoute::Disconnected,
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(Outgoing::Publish(pkid)) => {
                EventRoute::Acknowledged(Acknowledgement::Written(*pkid))
            }
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// The acknowledgement that completes a publish at `qos` (pure function)
    pub fn completes_publish(qos: QosLevel, ack: &Acknowledgement) -> bool {
        matches!(
            (qos, ack),
            (QosLevel::AtMostOnce, Acknowledgement::Written(_))
                | (QosLevel::AtLeastOnce, Acknowledgement::PubAck(_))
                | (QosLevel::ExactlyOnce, Acknowledgement::PubComp(_))
        )
    }

    /// Validate SUBACK return codes against the requested filters (pure function)
    pub fn validate_subscription(
        topic_filters: &[String],
        granted: &[Option<QosLevel>],
    ) -> Result<(), MqttError> {
        let rejected: Vec<String> = topic_filters
            .iter()
            .zip(granted.iter())
            .filter(|(_, code)| code.is_none())
            .map(|(filter, _)| filter.clone())
            .collect();

        if !rejected.is_empty() {
            return Err(MqttError::SubscriptionRejected(rejected));
        }

        if granted.len() != topic_filters.len() {
            debug!(
                requested = topic_filters.len(),
                granted = granted.len(),
                "SUBACK return code count does not match request"
            );
        }
        Ok(())
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish/subscribe
    ConnectionAcknowledged,
    /// Message received on a subscribed topic
    MessageReceived(InboundMessage),
    /// Progress on an outstanding publish or subscribe
    Acknowledged(Acknowledgement),
    /// Broker sent DISCONNECT
    Disconnected,
    /// Infrastructure event (PingResp, PubRec, etc.)
    InfrastructureEvent(String),
    /// Outgoing event other than PUBLISH
    OutgoingEvent,
}

/// Acknowledgements forwarded from the event loop to waiting callers
#[derive(Debug, Clone, PartialEq)]
pub enum Acknowledgement {
    /// PUBLISH written to the network
    Written(u16),
    /// QoS 1 publish acknowledged
    PubAck(u16),
    /// QoS 2 publish completed
    PubComp(u16),
    /// Subscription answered; `None` marks a refused filter
    SubAck {
        pkid: u16,
        granted: Vec<Option<QosLevel>>,
    },
    /// The event loop failed and the session is over
    Failed(String),
}
