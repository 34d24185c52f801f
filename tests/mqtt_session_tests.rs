//! Integration tests for the MQTT session
//!
//! Runs `MqttSession` against a scripted in-process broker on a loopback
//! socket. Each test spells out the packets the broker sends back.

use bytes::Bytes;
use mqttc::config::{ConnectOptions, QosLevel, RawOptions};
use mqttc::profile::ConnectionProfile;
use mqttc::transport::mqtt::MqttSession;
use mqttc::transport::{MqttError, Session, Subscription};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const CONNECT: u8 = 0x10;
const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
const CONNACK_NOT_AUTHORIZED: [u8; 4] = [0x20, 0x02, 0x00, 0x05];
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn session_for(port: u16) -> MqttSession {
    let raw = RawOptions {
        host: Some("127.0.0.1".to_string()),
        port: Some(port),
        topics: vec!["a/b".to_string()],
        ..Default::default()
    };
    let options = ConnectOptions::from_raw(raw, &mut StdRng::seed_from_u64(11)).unwrap();
    MqttSession::new(&ConnectionProfile::derive(&options)).unwrap()
}

/// Read one packet: fixed header byte and body
async fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let header = stream.read_u8().await.unwrap();
    let mut remaining = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await.unwrap();
        remaining |= usize::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0; remaining];
    stream.read_exact(&mut body).await.unwrap();
    (header, body)
}

/// Accept one client and answer its CONNECT with `connack`
async fn accept(listener: &TcpListener, connack: [u8; 4]) -> TcpStream {
    let (mut stream, _) = listener.accept().await.unwrap();
    let (header, _) = read_packet(&mut stream).await;
    assert_eq!(header, CONNECT);
    stream.write_all(&connack).await.unwrap();
    stream
}

fn split_string(body: &[u8]) -> (String, &[u8]) {
    let len = usize::from(u16::from_be_bytes([body[0], body[1]]));
    let value = String::from_utf8(body[2..2 + len].to_vec()).unwrap();
    (value, &body[2 + len..])
}

fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
    let remaining = 2 + topic.len() + payload.len();
    let mut packet = vec![0x30, remaining as u8];
    packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    packet.extend_from_slice(topic.as_bytes());
    packet.extend_from_slice(payload);
    packet
}

#[tokio::test]
async fn test_connect_and_publish_at_most_once() {
    let (listener, port) = bind().await;
    let broker: JoinHandle<(String, Vec<u8>)> = tokio::spawn(async move {
        let mut stream = accept(&listener, CONNACK_ACCEPTED).await;
        let (header, body) = read_packet(&mut stream).await;
        assert_eq!(header & 0xf0, 0x30);
        let (topic, payload) = split_string(&body);
        (topic, payload.to_vec())
    });

    let mut session = session_for(port);
    timeout(TEST_TIMEOUT, session.connect()).await.unwrap().unwrap();
    timeout(
        TEST_TIMEOUT,
        session.publish("a/b", Bytes::from_static(b"hi"), QosLevel::AtMostOnce),
    )
    .await
    .unwrap()
    .unwrap();

    let (topic, payload) = timeout(TEST_TIMEOUT, broker).await.unwrap().unwrap();
    assert_eq!(topic, "a/b");
    assert_eq!(payload, b"hi");
}

#[tokio::test]
async fn test_publish_at_least_once_waits_for_puback() {
    let (listener, port) = bind().await;
    let broker = tokio::spawn(async move {
        let mut stream = accept(&listener, CONNACK_ACCEPTED).await;
        let (header, body) = read_packet(&mut stream).await;
        assert_eq!(header, 0x32);
        let (_, rest) = split_string(&body);
        let (pkid, payload) = rest.split_at(2);
        assert_eq!(payload, b"reading");
        stream
            .write_all(&[0x40, 0x02, pkid[0], pkid[1]])
            .await
            .unwrap();
        // Keep the socket open until the client is done
        let _ = stream.read_u8().await;
    });

    let mut session = session_for(port);
    timeout(TEST_TIMEOUT, session.connect()).await.unwrap().unwrap();
    let result = timeout(
        TEST_TIMEOUT,
        session.publish("a/b", Bytes::from_static(b"reading"), QosLevel::AtLeastOnce),
    )
    .await
    .unwrap();
    assert!(result.is_ok(), "{result:?}");

    drop(session);
    let _ = timeout(TEST_TIMEOUT, broker).await;
}

#[tokio::test]
async fn test_refused_connection() {
    let (listener, port) = bind().await;
    let broker = tokio::spawn(async move {
        let _stream = accept(&listener, CONNACK_NOT_AUTHORIZED).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
    });

    let mut session = session_for(port);
    let result = timeout(TEST_TIMEOUT, session.connect()).await.unwrap();
    assert!(
        matches!(result, Err(MqttError::ConnectionRefused(_))),
        "{result:?}"
    );

    let _ = broker.await;
}

#[tokio::test]
async fn test_subscribe_and_receive() {
    let (listener, port) = bind().await;
    let broker: JoinHandle<Vec<(String, u8)>> = tokio::spawn(async move {
        let mut stream = accept(&listener, CONNACK_ACCEPTED).await;

        let (header, body) = read_packet(&mut stream).await;
        assert_eq!(header, 0x82);
        let mut filters = Vec::new();
        let mut rest = &body[2..];
        while !rest.is_empty() {
            let (filter, tail) = split_string(rest);
            filters.push((filter, tail[0]));
            rest = &tail[1..];
        }

        let mut suback = vec![0x90, 2 + filters.len() as u8, body[0], body[1]];
        suback.extend(filters.iter().map(|(_, qos)| *qos));
        stream.write_all(&suback).await.unwrap();

        stream
            .write_all(&publish_packet("a/b", b"  hello \n"))
            .await
            .unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        filters
    });

    let mut session = session_for(port);
    timeout(TEST_TIMEOUT, session.connect()).await.unwrap().unwrap();
    timeout(
        TEST_TIMEOUT,
        session.subscribe(&[
            Subscription::new("a/b", QosLevel::AtLeastOnce),
            Subscription::new("c/d", QosLevel::AtLeastOnce),
        ]),
    )
    .await
    .unwrap()
    .unwrap();

    let mut stream = session.messages().unwrap();
    let message = timeout(TEST_TIMEOUT, stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(message.topic, "a/b");
    assert_eq!(message.payload, Bytes::from_static(b"  hello \n"));
    assert_eq!(message.qos, QosLevel::AtMostOnce);

    let filters = timeout(TEST_TIMEOUT, broker).await.unwrap().unwrap();
    assert_eq!(
        filters,
        vec![("a/b".to_string(), 1), ("c/d".to_string(), 1)]
    );

    // Broker closed the socket: one error item, then the stream ends
    let item = timeout(TEST_TIMEOUT, stream.next()).await.unwrap();
    assert!(matches!(item, Some(Err(_))), "{item:?}");
    let end = timeout(TEST_TIMEOUT, stream.next()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_rejected_filter() {
    let (listener, port) = bind().await;
    let broker = tokio::spawn(async move {
        let mut stream = accept(&listener, CONNACK_ACCEPTED).await;
        let (_, body) = read_packet(&mut stream).await;
        stream
            .write_all(&[0x90, 0x04, body[0], body[1], 0x00, 0x80])
            .await
            .unwrap();
        let _ = stream.read_u8().await;
    });

    let mut session = session_for(port);
    timeout(TEST_TIMEOUT, session.connect()).await.unwrap().unwrap();
    let result = timeout(
        TEST_TIMEOUT,
        session.subscribe(&[
            Subscription::new("a/b", QosLevel::AtMostOnce),
            Subscription::new("$SYS/#", QosLevel::AtMostOnce),
        ]),
    )
    .await
    .unwrap();

    match result {
        Err(MqttError::SubscriptionRejected(filters)) => {
            assert_eq!(filters, vec!["$SYS/#".to_string()])
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    drop(session);
    let _ = timeout(TEST_TIMEOUT, broker).await;
}

#[tokio::test]
async fn test_publish_fails_when_broker_goes_away() {
    let (listener, port) = bind().await;
    let broker = tokio::spawn(async move {
        let stream = accept(&listener, CONNACK_ACCEPTED).await;
        drop(stream);
    });

    let mut session = session_for(port);
    timeout(TEST_TIMEOUT, session.connect()).await.unwrap().unwrap();
    broker.await.unwrap();

    // QoS 1 cannot complete without a PUBACK
    let result = timeout(
        TEST_TIMEOUT,
        session.publish("a/b", Bytes::from_static(b"x"), QosLevel::AtLeastOnce),
    )
    .await
    .unwrap();
    assert!(result.is_err(), "{result:?}");
}
