//! Error types for loading definition documents.

use std::path::PathBuf;

/// Errors raised while reading, parsing or writing a definition document.
///
/// All of these are configuration errors: they abort a run before anything
/// is published.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("The definition document must be an object")]
    NotAnObject,

    #[error("The configuration must include a 'payloads' array")]
    MissingPayloads,

    #[error("Each payload entry must include a 'path'")]
    MissingPayloadPath,

    #[error("Unsupported payload entry. Use either a string path or an object with 'path'")]
    UnsupportedPayloadEntry,

    #[error("Unsupported variable definition for '{0}'. Use literals or objects with a 'type'")]
    UnsupportedVariable(String),

    #[error("Variable '{0}' must include a 'type'")]
    MissingVariableType(String),

    #[error("Unsupported random generator type '{kind}' for variable '{name}'")]
    UnsupportedVariableType { name: String, kind: String },

    #[error("Fixed variable '{0}' must include a non-empty 'value'")]
    MissingFixedValue(String),

    #[error("Export definitions must be objects")]
    InvalidExport,

    #[error("Enabled export definitions must include a 'template'")]
    MissingExportTemplate,

    #[error("Invalid date/time format string '{0}'")]
    InvalidFormat(String),

    #[error("Protocol '{0}' is not valid. Use 'amqp' or 'mqtt'")]
    UnknownProtocol(String),
}
