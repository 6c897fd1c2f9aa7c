//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::executor::DEFAULT_MAX_WORKERS;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where databases, tables and create scripts come from.
    pub catalog: CatalogConfig,

    /// Export behavior configuration.
    #[serde(default)]
    pub export: ExportConfig,
}

/// Catalog client selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogConfig {
    /// SQL warehouse attached to the metastore.
    Warehouse(WarehouseConfig),

    /// YAML catalog snapshot, for offline runs.
    Snapshot(SnapshotConfig),
}

/// SQL warehouse connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Workspace URL, e.g. `https://adb-123.azuredatabricks.net`.
    pub host: String,

    /// SQL warehouse ID.
    pub warehouse_id: String,

    /// Personal access token.
    pub token: String,

    /// Catalog the statements run in (e.g. "hive_metastore").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,

    /// Server-side wait before a statement is cancelled (5-50, default: 30).
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,

    /// Client-side HTTP request timeout (default: 120).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("host", &self.host)
            .field("warehouse_id", &self.warehouse_id)
            .field("token", &"[REDACTED]")
            .field("catalog", &self.catalog)
            .field("wait_timeout_secs", &self.wait_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Snapshot catalog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Path to the snapshot YAML file.
    pub path: PathBuf,
}

/// Export behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Maximum concurrent catalog calls (default: 16).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Databases to export. Empty exports every database in the catalog.
    #[serde(default)]
    pub databases: Vec<String>,

    /// Export only the first N databases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_limit: Option<usize>,

    /// Output location; `dbfs:/` paths go to DBFS, anything else is a local file.
    #[serde(default = "default_output")]
    pub output: String,

    /// Rewrite `CREATE TABLE` to `CREATE OR REPLACE TABLE` (default: true).
    #[serde(default = "default_true")]
    pub create_or_replace: bool,

    /// Per-call timeout for catalog calls made by workers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            workers: None,
            databases: Vec::new(),
            database_limit: None,
            output: default_output(),
            create_or_replace: true,
            call_timeout_secs: None,
        }
    }
}

impl ExportConfig {
    pub fn get_workers(&self) -> usize {
        self.workers.unwrap_or(DEFAULT_MAX_WORKERS)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}

// Default value functions for serde
fn default_wait_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_output() -> String {
    "tables_and_views.json".to_string()
}

fn default_true() -> bool {
    true
}
