//! # hms-export
//!
//! Export the create scripts of every table in a Hive metastore.
//!
//! The library enumerates databases, lists their tables and reads each
//! table's create script, fanning catalog calls out over a bounded worker
//! pool. Results are written as a single JSON document mapping
//! `database.table` to its script:
//!
//! - **Bounded concurrency** with per-key failure capture
//! - **Warehouse catalog** over the SQL statement execution REST API
//! - **Snapshot catalog** from YAML, for offline and repeatable runs
//! - **Local or DBFS output**
//!
//! ## Example
//!
//! ```rust,no_run
//! use hms_export::{Config, Exporter};
//!
//! #[tokio::main]
//! async fn main() -> hms_export::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let exporter = Exporter::from_config(config)?;
//!     let result = exporter.run().await?;
//!     println!("Exported {} tables", result.tables_exported);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod exporter;
pub mod sink;

// Re-exports for convenient access
pub use catalog::{Catalog, CatalogError, MemoryCatalog, WarehouseCatalog};
pub use config::{CatalogConfig, Config, ExportConfig, SnapshotConfig, WarehouseConfig};
pub use error::{ExportError, Result};
pub use executor::{BatchResult, ErrorInfo, ErrorKind, FanOut, WorkResult};
pub use exporter::{ExportPlan, ExportResult, Exporter, HealthCheckResult, TableListing};
pub use sink::{DbfsSink, FileSink, MemorySink, Sink, SinkError};
