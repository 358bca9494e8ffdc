//! Broker adapters behind the [`Publisher`] contract.
//!
//! Each protocol is compiled in only with its cargo feature (`amqp`, `mqtt`).
//! Selecting a protocol that was not compiled in fails with
//! [`PublishError::FeatureDisabled`].

#[cfg(feature = "amqp")]
pub mod amqp;
#[cfg(feature = "mqtt")]
pub mod mqtt;

use crate::error::PublishError;
use crate::publisher::Publisher;
use payload_core::{ConnectionSettings, Protocol};
use std::sync::Arc;
use tracing::info;

/// Cargo feature that provides `protocol`.
pub fn feature_for(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Amqp => "amqp",
        Protocol::Mqtt => "mqtt",
    }
}

/// Whether an adapter for `protocol` was compiled in.
pub fn is_available(protocol: Protocol) -> bool {
    match protocol {
        Protocol::Amqp => cfg!(feature = "amqp"),
        Protocol::Mqtt => cfg!(feature = "mqtt"),
    }
}

/// Connect to the broker described by `settings`.
pub async fn connect(settings: &ConnectionSettings) -> Result<Arc<dyn Publisher>, PublishError> {
    info!("Connecting to {}", settings.masked_target());
    match settings.protocol {
        Protocol::Amqp => connect_amqp(settings).await,
        Protocol::Mqtt => connect_mqtt(settings).await,
    }
}

#[cfg(feature = "amqp")]
async fn connect_amqp(settings: &ConnectionSettings) -> Result<Arc<dyn Publisher>, PublishError> {
    let publisher = amqp::AmqpPublisher::connect(settings).await?;
    Ok(Arc::new(publisher))
}

#[cfg(not(feature = "amqp"))]
async fn connect_amqp(_settings: &ConnectionSettings) -> Result<Arc<dyn Publisher>, PublishError> {
    Err(disabled(Protocol::Amqp))
}

#[cfg(feature = "mqtt")]
async fn connect_mqtt(settings: &ConnectionSettings) -> Result<Arc<dyn Publisher>, PublishError> {
    let publisher = mqtt::MqttPublisher::connect(settings).await?;
    Ok(Arc::new(publisher))
}

#[cfg(not(feature = "mqtt"))]
async fn connect_mqtt(_settings: &ConnectionSettings) -> Result<Arc<dyn Publisher>, PublishError> {
    Err(disabled(Protocol::Mqtt))
}

#[cfg(any(not(feature = "amqp"), not(feature = "mqtt")))]
fn disabled(protocol: Protocol) -> PublishError {
    let feature = feature_for(protocol);
    PublishError::FeatureDisabled {
        protocol: feature,
        feature,
    }
}
