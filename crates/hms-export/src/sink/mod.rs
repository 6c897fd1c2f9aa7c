//! Destinations for the export artifact.
//!
//! - [`FileSink`]: local filesystem
//! - [`DbfsSink`]: `dbfs:/` paths through the DBFS streaming API
//! - [`MemorySink`]: keeps writes in memory

mod dbfs;
mod file;
mod memory;

pub use dbfs::{DbfsSink, DBFS_SCHEME};
pub use file::FileSink;
pub use memory::MemorySink;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{CatalogConfig, Config};
use crate::error::{ExportError, Result};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failed write. Nothing written by a failed call is assumed durable.
#[derive(Error, Debug)]
#[error("failed to write {path}: {message}")]
pub struct SinkError {
    pub path: String,
    pub message: String,
    #[source]
    source: Option<BoxError>,
}

impl SinkError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Persists serialized text at a location.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Write `content` to `path`, replacing anything already there.
    async fn write(&self, path: &str, content: &str) -> std::result::Result<(), SinkError>;

    /// Sink type identifier (e.g., "file", "dbfs").
    fn sink_type(&self) -> &'static str;
}

/// Pick the sink for the configured output path.
///
/// `dbfs:/` outputs reuse the warehouse host and token.
pub fn from_config(config: &Config) -> Result<Arc<dyn Sink>> {
    if config.export.output.starts_with(DBFS_SCHEME) {
        match &config.catalog {
            CatalogConfig::Warehouse(warehouse) => Ok(Arc::new(DbfsSink::new(warehouse)?)),
            CatalogConfig::Snapshot(_) => Err(ExportError::Config(
                "dbfs:/ output requires a warehouse catalog (host and token)".into(),
            )),
        }
    } else {
        Ok(Arc::new(FileSink::new()))
    }
}
