//! Core types for payload-sender.
//!
//! This crate owns the definition document and everything parsed out of it:
//!
//! - [`DefinitionDocument`] - the raw JSON/YAML document, kept for write-back
//! - [`Definition`] - connection settings, routing defaults and the
//!   count-expanded [`PayloadDefinition`] list for one iteration
//! - [`VariableDefinition`] / [`RandomValueDefinition`] - template variables
//! - [`PayloadContext`] - per scheduled item identity
//! - [`persist_sequence_progress`] - advances `sequence` variables after a run
//!
//! # Architecture
//!
//! ```text
//! payload-core (this crate)
//!    │
//!    ├─── payload-generator  (renders templates using the definition model)
//!    │
//!    └─── payload-publish    (schedules and dispatches rendered payloads)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use payload_core::Definition;
//!
//! let definition = Definition::from_file("orders.json").unwrap();
//! println!(
//!     "{} payload(s) per iteration x {} iteration(s)",
//!     definition.payloads.len(),
//!     definition.iterations
//! );
//! ```

pub mod context;
pub mod definition;
pub mod document;
pub mod error;
pub mod loader;
pub mod persist;

// Re-exports for convenience
pub use context::PayloadContext;
pub use definition::{
    ConnectionSettings, Definition, FormattingOptions, PayloadDefinition,
    PayloadExportDefinition, Protocol, RandomValueDefinition, RouteDefaults,
    VariableDefinition, VariableMap,
};
pub use document::{DefinitionDocument, DocumentFormat};
pub use error::DefinitionError;
pub use persist::{advance_sequences, persist_sequence_progress, SequenceAdvance};
