//! Error type shared by the reader, the normalizer and the analysis helpers.
//!
//! Every failure is reported synchronously with a specific kind so a host
//! application can show a precise message. Non-fatal issues are not errors;
//! they travel as [`crate::warning::Warning`]s next to successful results.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while importing or processing SECM data
#[derive(Debug, Error)]
pub enum FluxError {
    /// Unknown format hint, unsupported extension, or ambiguous detection
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The file was read but its contents do not match the expected layout
    #[error("malformed file: {0}")]
    MalformedFile(String),

    /// The file could not be opened or read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No unambiguous independent/dependent column pair exists
    #[error("column selection failed: {0}")]
    ColumnSelection(String),

    /// Too few samples remain to build a trace
    #[error("insufficient data: {found} samples remain, at least {required} required")]
    InsufficientData { found: usize, required: usize },

    /// An analysis or construction parameter is out of its valid range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl FluxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FluxError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        FluxError::MalformedFile(message.into())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, FluxError>;
