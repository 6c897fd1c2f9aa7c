//! Catalog clients.
//!
//! A [`Catalog`] answers the three questions the export needs: which
//! databases exist, which tables a database holds, and what the create
//! script of a table is. Each call covers a single item and may fail on its
//! own; the exporter fans calls out and captures failures per key.
//!
//! Implementations:
//!
//! - [`WarehouseCatalog`]: SQL warehouse over the statement execution REST API
//! - [`MemoryCatalog`]: in-memory catalog, optionally loaded from a YAML snapshot

mod memory;
mod warehouse;

pub use memory::{CatalogSnapshot, DatabaseSnapshot, InjectedError, MemoryCatalog, TableSnapshot};
pub use warehouse::WarehouseCatalog;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::CatalogConfig;
use crate::error::Result;
use crate::executor::{ErrorInfo, ErrorKind, IntoErrorInfo};

/// Failure of a single catalog call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct CatalogError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CatalogError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }
}

impl IntoErrorInfo for CatalogError {
    fn into_error_info(self, key: String) -> ErrorInfo {
        ErrorInfo::new(key, self.kind, self.message)
    }
}

/// Read-only access to a metastore.
///
/// Implementations are shared by concurrent workers and must be safe for
/// concurrent use.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// List all database names.
    async fn list_databases(&self) -> std::result::Result<Vec<String>, CatalogError>;

    /// List the non-temporary tables of `database` as `database.table`.
    async fn list_tables(&self, database: &str) -> std::result::Result<Vec<String>, CatalogError>;

    /// Get the create script of a fully-qualified table.
    async fn get_create_script(&self, table: &str) -> std::result::Result<String, CatalogError>;

    /// Catalog type identifier (e.g., "warehouse", "snapshot").
    fn catalog_type(&self) -> &'static str;
}

/// Build the catalog client described by the configuration.
pub fn from_config(config: &CatalogConfig) -> Result<Arc<dyn Catalog>> {
    match config {
        CatalogConfig::Warehouse(warehouse) => Ok(Arc::new(WarehouseCatalog::new(warehouse)?)),
        CatalogConfig::Snapshot(snapshot) => Ok(Arc::new(MemoryCatalog::load(&snapshot.path)?)),
    }
}

/// Join a database and table name into a fully-qualified name.
pub fn qualified_name(database: &str, table: &str) -> String {
    format!("{}.{}", database, table)
}

/// Split `database.table` at the first dot.
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
    name.split_once('.')
        .filter(|(db, table)| !db.is_empty() && !table.is_empty())
}
