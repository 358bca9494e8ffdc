//! MQTT 3.1.1 adapter built on `rumqttc`.
//!
//! MQTT has no exchanges: the routing key is the topic, with the exchange as
//! fallback when the key is blank.

use crate::error::PublishError;
use crate::publisher::{PublishChannel, Publisher};
use async_trait::async_trait;
use payload_core::ConnectionSettings;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SUPPORTED_VERSION: &str = "v311";
const TOPIC_EXCHANGE: &str = "amq.topic";
const REQUEST_CAPACITY: usize = 1024;
/// Upper bound for flushing queued publishes on close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// One MQTT session shared by all workers through cloned client handles.
pub struct MqttPublisher {
    client: AsyncClient,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    exchange_warned: Arc<AtomicBool>,
}

/// MQTT user name for `settings`.
///
/// Brokers such as RabbitMQ select the vhost through a `vhost:user` name.
pub fn user_name(settings: &ConnectionSettings) -> String {
    if settings.vhost != "/" && !settings.vhost.is_empty() && !settings.user.contains(':') {
        format!("{}:{}", settings.vhost, settings.user)
    } else {
        settings.user.clone()
    }
}

fn check_version(settings: &ConnectionSettings) -> Result<(), PublishError> {
    match settings.mqtt_protocol_version.as_deref().map(str::trim) {
        None | Some("") => Ok(()),
        Some(v) if v.eq_ignore_ascii_case(SUPPORTED_VERSION) => Ok(()),
        Some(other) => Err(PublishError::Unsupported(format!(
            "MQTT protocol version '{other}' (only {SUPPORTED_VERSION} is supported)"
        ))),
    }
}

impl MqttPublisher {
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self, PublishError> {
        check_version(settings)?;

        let client_id = format!("payload-sender-{}", uuid::Uuid::new_v4().simple());
        let mut options =
            MqttOptions::new(client_id, settings.server.clone(), settings.effective_port());
        options.set_credentials(user_name(settings), settings.password.clone());
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        wait_for_connack(&mut event_loop, settings).await?;
        info!("Connected to MQTT broker at {}", settings.masked_target());

        let handle = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    // Requests are handled in queue order, so every earlier
                    // publish has been written once the disconnect goes out.
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        debug!("MQTT disconnect sent");
                        break;
                    }
                    Ok(event) => debug!("MQTT event: {:?}", event),
                    Err(e) => {
                        debug!("MQTT event loop stopped: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            client,
            event_loop: Mutex::new(Some(handle)),
            exchange_warned: Arc::new(AtomicBool::new(false)),
        })
    }
}

async fn wait_for_connack(
    event_loop: &mut EventLoop,
    settings: &ConnectionSettings,
) -> Result<(), PublishError> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(PublishError::Connection(format!(
                        "Broker at {} refused the connection: {:?}",
                        settings.masked_target(),
                        ack.code
                    )))
                };
            }
            Ok(_) => continue,
            Err(e) => {
                return Err(PublishError::Connection(format!(
                    "Failed to connect to {}: {e}",
                    settings.masked_target()
                )))
            }
        }
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn open_channel(&self) -> Result<Box<dyn PublishChannel>, PublishError> {
        Ok(Box::new(MqttChannel {
            client: self.client.clone(),
            exchange_warned: Arc::clone(&self.exchange_warned),
        }))
    }

    async fn close(&self) -> Result<(), PublishError> {
        let result = self
            .client
            .disconnect()
            .await
            .map_err(|e| PublishError::Connection(format!("Failed to disconnect: {e}")));

        let handle = self
            .event_loop
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut handle).await.is_err() {
                warn!(
                    "MQTT event loop did not finish within {:?}; queued messages may be lost",
                    CLOSE_TIMEOUT
                );
                handle.abort();
            }
        }
        result
    }
}

struct MqttChannel {
    client: AsyncClient,
    exchange_warned: Arc<AtomicBool>,
}

/// Topic for a publish: the routing key, or the exchange when the key is blank.
pub fn topic_for<'a>(exchange: &'a str, routing_key: &'a str) -> &'a str {
    if routing_key.trim().is_empty() {
        exchange
    } else {
        routing_key
    }
}

#[async_trait]
impl PublishChannel for MqttChannel {
    async fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        _message_type: &str,
        body: &[u8],
    ) -> Result<(), PublishError> {
        if !exchange.is_empty()
            && exchange != TOPIC_EXCHANGE
            && !self.exchange_warned.swap(true, Ordering::Relaxed)
        {
            warn!(
                "MQTT ignores exchanges; '{}' is not used (messages go to the routing key topic)",
                exchange
            );
        }

        let topic = topic_for(exchange, routing_key);
        if topic.trim().is_empty() {
            return Err(PublishError::Unsupported(
                "MQTT publish needs a routing key or exchange to use as topic".to_string(),
            ));
        }

        self.client
            .publish(topic, QoS::AtLeastOnce, false, body.to_vec())
            .await
            .map_err(|e| PublishError::Channel(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payload_core::Protocol;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_packet(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
        let header = stream.read_u8().await.ok()?;
        let mut len = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await.ok()?;
            len |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.ok()?;
        Some((header, body))
    }

    /// Minimal MQTT 3.1.1 broker: acks CONNECT, QoS 1 PUBLISH and PINGREQ,
    /// and returns the number of PUBLISH packets seen before DISCONNECT.
    async fn count_publishes(listener: TcpListener) -> usize {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut published = 0;

        while let Some((header, body)) = read_packet(&mut stream).await {
            let reply = match header >> 4 {
                1 => vec![0x20, 0x02, 0x00, 0x00],
                3 => {
                    published += 1;
                    if (header >> 1) & 0x03 == 0 {
                        continue;
                    }
                    let topic_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
                    vec![0x40, 0x02, body[2 + topic_len], body[3 + topic_len]]
                }
                12 => vec![0xd0, 0x00],
                14 => break,
                _ => continue,
            };
            if stream.write_all(&reply).await.is_err() {
                break;
            }
        }
        published
    }

    #[tokio::test]
    async fn test_close_flushes_queued_publishes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = tokio::spawn(count_publishes(listener));

        let settings = ConnectionSettings {
            protocol: Protocol::Mqtt,
            server: "127.0.0.1".to_string(),
            port: Some(port),
            ..ConnectionSettings::default()
        };
        let publisher = MqttPublisher::connect(&settings).await.unwrap();
        let mut channel = publisher.open_channel().await.unwrap();

        for i in 0..500 {
            let body = format!("{{\"i\":{i}}}");
            channel
                .publish("amq.topic", "sensors.temp", "Reading", body.as_bytes())
                .await
                .unwrap();
        }
        publisher.close().await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(10), broker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, 500);
    }

    #[test]
    fn test_user_name_with_vhost() {
        let settings = ConnectionSettings {
            vhost: "sensors".to_string(),
            ..ConnectionSettings::default()
        };
        assert_eq!(user_name(&settings), "sensors:guest");

        let explicit = ConnectionSettings {
            vhost: "sensors".to_string(),
            user: "other:bob".to_string(),
            ..ConnectionSettings::default()
        };
        assert_eq!(user_name(&explicit), "other:bob");

        assert_eq!(user_name(&ConnectionSettings::default()), "guest");
    }

    #[test]
    fn test_topic_fallback() {
        assert_eq!(topic_for("amq.topic", "sensors.temp"), "sensors.temp");
        assert_eq!(topic_for("events", "  "), "events");
    }

    #[test]
    fn test_only_v311() {
        let mut settings = ConnectionSettings::default();
        assert!(check_version(&settings).is_ok());

        settings.mqtt_protocol_version = Some("V311".to_string());
        assert!(check_version(&settings).is_ok());

        settings.mqtt_protocol_version = Some("v500".to_string());
        assert!(matches!(
            check_version(&settings),
            Err(PublishError::Unsupported(_))
        ));
    }
}
