//! AMQP 0-9-1 adapter built on `lapin`.

use crate::error::PublishError;
use crate::publisher::{PublishChannel, Publisher};
use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use payload_core::ConnectionSettings;
use tracing::{debug, info};

const CONTENT_TYPE: &str = "application/json";
const PERSISTENT: u8 = 2;
const MESSAGE_TYPE_HEADER: &str = "x-message-type";

/// One AMQP connection shared by all workers.
pub struct AmqpPublisher {
    connection: Connection,
}

impl AmqpPublisher {
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self, PublishError> {
        let uri = AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: settings.user.clone(),
                    password: settings.password.clone(),
                },
                host: settings.server.clone(),
                port: settings.effective_port(),
            },
            vhost: settings.vhost.clone(),
            ..Default::default()
        };

        let connection = Connection::connect_uri(uri, ConnectionProperties::default())
            .await
            .map_err(|e| {
                PublishError::Connection(format!(
                    "Failed to connect to {}: {e}",
                    settings.masked_target()
                ))
            })?;
        info!("Connected to AMQP broker at {}", settings.masked_target());

        Ok(Self { connection })
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn open_channel(&self) -> Result<Box<dyn PublishChannel>, PublishError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| PublishError::Channel(e.to_string()))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| PublishError::Channel(format!("Failed to enable confirms: {e}")))?;
        debug!("Opened AMQP channel {}", channel.id());

        Ok(Box::new(AmqpChannel { channel }))
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.connection
            .close(200, "OK")
            .await
            .map_err(|e| PublishError::Connection(format!("Failed to close connection: {e}")))
    }
}

struct AmqpChannel {
    channel: Channel,
}

fn message_properties(message_type: &str) -> BasicProperties {
    let mut headers = FieldTable::default();
    headers.insert(
        ShortString::from(MESSAGE_TYPE_HEADER),
        AMQPValue::LongString(LongString::from(message_type.to_string())),
    );

    BasicProperties::default()
        .with_content_type(ShortString::from(CONTENT_TYPE))
        .with_delivery_mode(PERSISTENT)
        .with_kind(ShortString::from(message_type.to_string()))
        .with_message_id(ShortString::from(uuid::Uuid::new_v4().to_string()))
        .with_headers(headers)
}

#[async_trait]
impl PublishChannel for AmqpChannel {
    async fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message_type: &str,
        body: &[u8],
    ) -> Result<(), PublishError> {
        let confirm = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    mandatory: true,
                    ..BasicPublishOptions::default()
                },
                body,
                message_properties(message_type),
            )
            .await
            .map_err(|e| PublishError::Channel(e.to_string()))?;

        let confirmation = confirm
            .await
            .map_err(|e| PublishError::Channel(e.to_string()))?;

        match confirmation {
            Confirmation::Nack(_) => Err(PublishError::Rejected(format!(
                "Broker nacked message for '{exchange}' / '{routing_key}'"
            ))),
            Confirmation::Ack(Some(_)) => Err(PublishError::Rejected(format!(
                "Message returned as unroutable for '{exchange}' / '{routing_key}'"
            ))),
            Confirmation::Ack(None) | Confirmation::NotRequested => Ok(()),
        }
    }
}
