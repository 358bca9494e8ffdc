//! Payload rendering for payload-sender.
//!
//! Turns a [`PayloadDefinition`](payload_core::PayloadDefinition) and the
//! [`PayloadContext`](payload_core::PayloadContext) of one scheduled item into
//! the message body, exporting it to a file when the definition asks for it.
//!
//! # Architecture
//!
//! ```text
//! PayloadDefinition + PayloadContext
//!        │
//!        ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │  PayloadBuilder  │────▶│ VariableResolver │── cache, cycle stack
//! │                  │     │                  │
//! │  - template scan │     │  - generators    │── number, text, guid, ulid,
//! │  - export        │     └──────────────────┘   datetime, date, time, sequence
//! └────────┬─────────┘
//!          │
//!          ▼
//!    message body (UTF-8)
//! ```
//!
//! # Example
//!
//! ```rust
//! use payload_core::{PayloadContext, PayloadDefinition, RandomValueDefinition,
//!     VariableDefinition, VariableMap};
//! use payload_generator::PayloadBuilder;
//! use std::path::Path;
//!
//! let mut variables = VariableMap::new();
//! variables.insert(
//!     "n",
//!     VariableDefinition::Random(RandomValueDefinition::Number {
//!         min: 1,
//!         max: 1,
//!         padding: Some(3),
//!     }),
//! );
//! let payload = PayloadDefinition {
//!     variables,
//!     ..PayloadDefinition::new("/tpl/order.json", r#"{"n": "{{n}}", "i": {{context.index}}}"#)
//! };
//!
//! let builder = PayloadBuilder::default();
//! let context = PayloadContext::new(1, Path::new("/tpl/order.json"));
//! assert_eq!(builder.build_text(&payload, &context).unwrap(), r#"{"n": "001", "i": 1}"#);
//! ```

pub mod builder;
pub mod error;
pub mod export;
pub mod format;
pub mod generators;
pub mod resolver;
pub mod template;

pub use builder::PayloadBuilder;
pub use error::{GenerateError, RenderError};
pub use format::{apply_format, pad_integer};
pub use generators::generate_value;
pub use resolver::VariableResolver;
pub use template::render;
