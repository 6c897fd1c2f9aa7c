//! Error types for the export library.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::executor::ErrorInfo;
use crate::sink::SinkError;

pub const EXIT_CONFIG_ERROR: u8 = 1;
pub const EXIT_BATCH_FAILURES: u8 = 2;
pub const EXIT_CATALOG_ERROR: u8 = 3;
pub const EXIT_SINK_ERROR: u8 = 4;
pub const EXIT_IO_ERROR: u8 = 7;
pub const EXIT_SERIALIZATION_ERROR: u8 = 8;

/// Main error type for export operations.
///
/// Per-key catalog failures never show up here; they are captured as
/// [`ErrorInfo`] inside a batch. Only whole-run conditions are errors.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Configuration error (invalid YAML, bad worker count, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A catalog call outside of a batch failed (e.g. listing databases)
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// One or more tables could not be read; nothing was written
    #[error("{count} table(s) failed, fix them and try again")]
    BatchHasFailures {
        count: usize,
        failures: Vec<ErrorInfo>,
    },

    /// Writing the export artifact failed
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    /// Create a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        ExportError::Config(message.into())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExportError::Config(_) => EXIT_CONFIG_ERROR,
            ExportError::Yaml(_) => EXIT_CONFIG_ERROR,
            ExportError::BatchHasFailures { .. } => EXIT_BATCH_FAILURES,
            ExportError::Catalog(_) => EXIT_CATALOG_ERROR,
            ExportError::Sink(_) => EXIT_SINK_ERROR,
            ExportError::Io(_) => EXIT_IO_ERROR,
            ExportError::Json(_) => EXIT_SERIALIZATION_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
