//! Publish contract between the dispatcher and broker adapters.

use crate::error::PublishError;
use async_trait::async_trait;

/// A connected broker.
///
/// The connection may be shared; every worker opens its own
/// [`PublishChannel`] so no channel is used from two tasks at once.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Open an exclusive channel for one worker.
    async fn open_channel(&self) -> Result<Box<dyn PublishChannel>, PublishError>;

    /// Close the connection once all channels are done.
    async fn close(&self) -> Result<(), PublishError> {
        Ok(())
    }
}

/// One worker's publish session.
#[async_trait]
pub trait PublishChannel: Send {
    /// Publish `body` to `exchange` with `routing_key`.
    ///
    /// For MQTT the routing key is the topic and `exchange` is only a
    /// fallback.
    async fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message_type: &str,
        body: &[u8],
    ) -> Result<(), PublishError>;
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePublisher, PublishCall};

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{PublishChannel, Publisher};
    use crate::error::PublishError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Recorded publish
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PublishCall {
        /// Id of the channel that published, in open order
        pub channel: usize,
        pub exchange: String,
        pub routing_key: String,
        pub message_type: String,
        pub body: String,
    }

    #[derive(Default)]
    struct State {
        calls: Mutex<Vec<PublishCall>>,
        channels_opened: AtomicUsize,
        closed: AtomicUsize,
        fail_channel_open: Mutex<bool>,
        reject_bodies_containing: Mutex<Option<String>>,
    }

    /// In-memory publisher that records every message.
    #[derive(Clone, Default)]
    pub struct FakePublisher {
        state: Arc<State>,
    }

    impl FakePublisher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every `open_channel` call fail.
        pub fn fail_channel_open(self) -> Self {
            *self
                .state
                .fail_channel_open
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = true;
            self
        }

        /// Reject publishes whose body contains `marker`.
        pub fn reject_bodies_containing(self, marker: &str) -> Self {
            *self
                .state
                .reject_bodies_containing
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = Some(marker.to_string());
            self
        }

        /// All recorded publishes
        pub fn calls(&self) -> Vec<PublishCall> {
            self.state
                .calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }

        pub fn channels_opened(&self) -> usize {
            self.state.channels_opened.load(Ordering::SeqCst)
        }

        pub fn close_count(&self) -> usize {
            self.state.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn open_channel(&self) -> Result<Box<dyn PublishChannel>, PublishError> {
            if *self
                .state
                .fail_channel_open
                .lock()
                .unwrap_or_else(|e| e.into_inner())
            {
                return Err(PublishError::Channel("channel refused".to_string()));
            }

            let id = self.state.channels_opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeChannel {
                id,
                state: Arc::clone(&self.state),
            }))
        }

        async fn close(&self) -> Result<(), PublishError> {
            self.state.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeChannel {
        id: usize,
        state: Arc<State>,
    }

    #[async_trait]
    impl PublishChannel for FakeChannel {
        async fn publish(
            &mut self,
            exchange: &str,
            routing_key: &str,
            message_type: &str,
            body: &[u8],
        ) -> Result<(), PublishError> {
            let body = String::from_utf8_lossy(body).into_owned();

            let rejected = self
                .state
                .reject_bodies_containing
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .as_deref()
                .is_some_and(|marker| body.contains(marker));
            if rejected {
                return Err(PublishError::Rejected(format!("nack for '{routing_key}'")));
            }

            self.state
                .calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(PublishCall {
                    channel: self.id,
                    exchange: exchange.to_string(),
                    routing_key: routing_key.to_string(),
                    message_type: message_type.to_string(),
                    body,
                });
            Ok(())
        }
    }
}
