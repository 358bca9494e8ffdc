//! Error types for value generation and template rendering.

use std::path::PathBuf;

/// Errors from a single generator call.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("Sequence value overflows a 64-bit integer (start {start}, step {step}, index {index})")]
    SequenceOverflow { start: i64, step: i64, index: u64 },

    #[error("Invalid date/time format string '{0}'")]
    InvalidFormat(String),
}

/// Errors rendering one scheduled payload.
///
/// These fail the current item only; the dispatcher logs them and moves on.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Variable '{0}' is not defined.")]
    UndefinedVariable(String),

    #[error("Circular variable reference detected for '{0}'.")]
    CircularReference(String),

    #[error("Variable '{token}' is not defined for payload '{file}'. Message will not be sent.")]
    NotDefinedForPayload { token: String, file: String },

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error("Export template resolved to an empty path for payload '{0}'.")]
    EmptyExportPath(String),

    #[error("Export file '{}' already exists and overwrite is disabled.", .0.display())]
    ExportExists(PathBuf),

    #[error("Failed to export to '{}': {source}", path.display())]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
