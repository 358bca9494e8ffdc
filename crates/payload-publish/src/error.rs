//! Error types for publishing and dispatch.

use payload_generator::RenderError;
use thiserror::Error;

/// Errors from a broker adapter.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Publish rejected: {0}")]
    Rejected(String),

    #[error("Protocol '{protocol}' requires building with the '{feature}' feature")]
    FeatureDisabled {
        protocol: &'static str,
        feature: &'static str,
    },

    #[error("Unsupported configuration: {0}")]
    Unsupported(String),
}

/// Why a single scheduled item failed. Never aborts the run.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Errors that end a dispatch run.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Worker {worker} could not open a publish channel: {source}")]
    Channel {
        worker: usize,
        #[source]
        source: PublishError,
    },

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
