//! Scheduling and publishing for payload-sender.
//!
//! The scheduler expands a loaded definition into an ordered list of items,
//! each with a 1-based index that never depends on how the list is later
//! split. The dispatcher renders every item with a
//! [`PayloadBuilder`](payload_generator::PayloadBuilder) and hands the body to
//! a [`Publisher`], one channel per worker.
//!
//! # Architecture
//!
//! ```text
//! Definition.payloads × iterations
//!        │
//!        ▼
//! ┌─────────────────┐
//! │    schedule()   │── index, exchange, routing key, message type
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │   Dispatcher    │────▶│  PublishChannel │── one per worker
//! │                 │     │  (amqp / mqtt)  │
//! │ - K stride      │     └─────────────────┘
//! │   workers       │
//! │ - cancellation  │
//! └────────┬────────┘
//!          ▼
//!   DispatchMetrics
//! ```
//!
//! Broker clients live behind the `amqp` and `mqtt` cargo features. Without
//! either, only validation runs are possible.

pub mod adapters;
pub mod args;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod publisher;
pub mod scheduler;

pub use args::SendArgs;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, ItemError, PublishError};
pub use metrics::{round3, DispatchMetrics, DispatchMode, MetricsReport};
#[cfg(any(test, feature = "test-support"))]
pub use publisher::{FakePublisher, PublishCall};
pub use publisher::{PublishChannel, Publisher};
pub use scheduler::{available_parallelism, resolve_parallelism, schedule, ScheduledPayload};
