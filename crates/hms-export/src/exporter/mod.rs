//! Export pipeline - main workflow coordinator.
//!
//! Databases are fanned out to `list_tables`, the combined table list is
//! fanned out to `get_create_script`, and the outcomes are split into
//! successes and failures. Output is written only when no table failed.

mod report;
mod script;

pub use report::{failure_banner, failure_report};
pub use script::create_or_replace;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::catalog::{self, Catalog};
use crate::config::Config;
use crate::error::{ExportError, Result};
use crate::executor::{BatchResult, ErrorInfo, FanOut, WorkResult};
use crate::sink::{self, Sink};

/// Export orchestrator.
pub struct Exporter {
    config: Config,
    catalog: Arc<dyn Catalog>,
    sink: Arc<dyn Sink>,
}

/// Tables found across a set of databases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableListing {
    /// Databases that were asked, in order.
    pub databases: Vec<String>,

    /// Fully-qualified table names, concatenated in database order.
    pub tables: Vec<String>,

    /// One entry per database whose tables could not be listed.
    pub database_failures: Vec<ErrorInfo>,
}

/// Everything an export would write, without writing it.
#[derive(Debug, Clone, Serialize)]
pub struct ExportPlan {
    pub databases: Vec<String>,
    pub database_failures: Vec<ErrorInfo>,

    /// Tables found across the databases, in listing order.
    pub tables: Vec<String>,

    /// Create scripts as returned by the catalog.
    pub scripts: IndexMap<String, String>,

    /// Tables whose create script could not be read.
    pub failures: IndexMap<String, ErrorInfo>,
}

/// Result of an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// When the export started.
    pub started_at: DateTime<Utc>,

    /// When the export completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Databases that were enumerated.
    pub databases_total: usize,

    /// Databases whose tables could not be listed.
    pub databases_failed: usize,

    /// Tables found.
    pub tables_total: usize,

    /// Create scripts written.
    pub tables_exported: usize,

    /// Where the artifact was written.
    pub output: String,

    /// Database-level failures, reported but not fatal.
    pub database_failures: Vec<ErrorInfo>,
}

/// Result of a catalog connectivity check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub catalog_type: String,
    pub sink_type: String,
    pub connected: bool,
    pub latency_ms: u64,
    pub databases_visible: Option<usize>,
    pub error: Option<ErrorInfo>,
}

impl Exporter {
    /// Create an exporter over explicit collaborators.
    pub fn new(config: Config, catalog: Arc<dyn Catalog>, sink: Arc<dyn Sink>) -> Self {
        Self {
            config,
            catalog,
            sink,
        }
    }

    /// Create an exporter with the catalog and sink described by the configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let catalog = catalog::from_config(&config.catalog)?;
        let sink = sink::from_config(&config)?;
        Ok(Self::new(config, catalog, sink))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn fan_out(&self) -> Result<FanOut> {
        Ok(FanOut::new(self.config.export.get_workers())?
            .with_call_timeout(self.config.export.call_timeout()))
    }

    /// Databases to export: the allow-list, or every database in the catalog.
    ///
    /// Duplicates are removed keeping the first occurrence, then the
    /// configured limit is applied.
    pub async fn resolve_databases(&self) -> Result<Vec<String>> {
        let databases = if self.config.export.databases.is_empty() {
            self.catalog.list_databases().await?
        } else {
            self.config.export.databases.clone()
        };

        let mut databases = dedup_preserving_order(databases);
        if let Some(limit) = self.config.export.database_limit {
            databases.truncate(limit);
        }
        Ok(databases)
    }

    /// List the tables of every database concurrently.
    pub async fn list_tables(&self, databases: Vec<String>) -> Result<TableListing> {
        let fan_out = self.fan_out()?;
        Ok(self.list_tables_with(&fan_out, databases).await)
    }

    /// Fetch the create script of every table concurrently.
    pub async fn fetch_scripts(&self, tables: Vec<String>) -> Result<BatchResult<String, String>> {
        let fan_out = self.fan_out()?;
        Ok(self.fetch_scripts_with(&fan_out, tables).await)
    }

    async fn list_tables_with(&self, fan_out: &FanOut, databases: Vec<String>) -> TableListing {
        let catalog = Arc::clone(&self.catalog);
        let batch = fan_out
            .run(databases.clone(), move |database: String| {
                let catalog = Arc::clone(&catalog);
                async move { catalog.list_tables(&database).await }
            })
            .await;

        let mut listing = TableListing {
            databases,
            ..TableListing::default()
        };
        for (database, outcome) in batch {
            match outcome {
                WorkResult::Success(tables) => {
                    info!("{}: {} tables", database, tables.len());
                    listing.tables.extend(tables);
                }
                WorkResult::Failure(failure) => listing.database_failures.push(failure),
            }
        }
        listing
    }

    async fn fetch_scripts_with(
        &self,
        fan_out: &FanOut,
        tables: Vec<String>,
    ) -> BatchResult<String, String> {
        let catalog = Arc::clone(&self.catalog);
        fan_out
            .run(tables, move |table: String| {
                let catalog = Arc::clone(&catalog);
                async move { catalog.get_create_script(&table).await }
            })
            .await
    }

    /// Enumerate and fetch everything, without writing.
    pub async fn plan(&self) -> Result<ExportPlan> {
        let fan_out = self.fan_out()?;

        info!("Phase 1: Resolving databases ({} catalog)", self.catalog.catalog_type());
        let databases = self.resolve_databases().await?;
        info!("Found {} databases to export", databases.len());

        info!(
            "Phase 2: Listing tables with {} workers",
            fan_out.max_workers()
        );
        let listing = self.list_tables_with(&fan_out, databases).await;
        info!(
            "Found {} tables ({} databases failed)",
            listing.tables.len(),
            listing.database_failures.len()
        );

        info!("Phase 3: Fetching create scripts");
        let parts = self
            .fetch_scripts_with(&fan_out, listing.tables.clone())
            .await
            .partition();
        info!("good: {}", parts.good.len());
        info!("bad: {}", parts.bad.len());

        Ok(ExportPlan {
            databases: listing.databases,
            database_failures: listing.database_failures,
            tables: listing.tables,
            scripts: parts.good,
            failures: parts.bad,
        })
    }

    /// Run the export.
    ///
    /// Fails with [`ExportError::BatchHasFailures`] without writing anything
    /// when any create script could not be read.
    pub async fn run(&self) -> Result<ExportResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting export run: {}", run_id);

        let ExportPlan {
            databases,
            database_failures,
            tables,
            scripts,
            failures,
        } = self.plan().await?;

        if !failures.is_empty() {
            for failure in failures.values() {
                error!("{}: {}: {}", failure.key, failure.kind, failure.message);
            }
            return Err(ExportError::BatchHasFailures {
                count: failures.len(),
                failures: failures.into_values().collect(),
            });
        }

        let tables_exported = scripts.len();
        let scripts: IndexMap<String, String> = if self.config.export.create_or_replace {
            scripts
                .into_iter()
                .map(|(table, script)| {
                    let rewritten = create_or_replace(&script);
                    (table, rewritten)
                })
                .collect()
        } else {
            scripts
        };

        let output = self.config.export.output.clone();
        info!(
            "Phase 4: Writing {} create scripts to {} ({} sink)",
            tables_exported,
            output,
            self.sink.sink_type()
        );
        let content = serde_json::to_string_pretty(&scripts)?;
        self.sink.write(&output, &content).await?;

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let result = ExportResult {
            run_id,
            status: "completed".to_string(),
            started_at,
            completed_at,
            duration_seconds: duration,
            databases_total: databases.len(),
            databases_failed: database_failures.len(),
            tables_total: tables.len(),
            tables_exported,
            output,
            database_failures,
        };

        info!(
            "Export {}: {} databases, {} tables in {:.1}s",
            result.status, result.databases_total, result.tables_exported, result.duration_seconds
        );

        Ok(result)
    }

    /// Check that the catalog answers `list_databases`.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let outcome = self.catalog.list_databases().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (databases_visible, error) = match outcome {
            Ok(databases) => (Some(databases.len()), None),
            Err(e) => (None, Some(ErrorInfo::new("catalog", e.kind, e.message))),
        };

        HealthCheckResult {
            catalog_type: self.catalog.catalog_type().to_string(),
            sink_type: self.sink.sink_type().to_string(),
            connected: error.is_none(),
            latency_ms,
            databases_visible,
            error,
        }
    }
}

impl ExportPlan {
    pub fn tables_total(&self) -> usize {
        self.tables.len()
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl ExportResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, MemoryCatalog};
    use crate::config::{CatalogConfig, ExportConfig, SnapshotConfig};
    use crate::executor::ErrorKind;
    use crate::sink::MemorySink;

    fn config(export: ExportConfig) -> Config {
        Config {
            catalog: CatalogConfig::Snapshot(SnapshotConfig {
                path: "catalog.yaml".into(),
            }),
            export: ExportConfig {
                output: "out/tables_and_views.json".into(),
                ..export
            },
        }
    }

    fn exporter(catalog: MemoryCatalog, sink: &MemorySink, export: ExportConfig) -> Exporter {
        Exporter::new(config(export), Arc::new(catalog), Arc::new(sink.clone()))
    }

    fn d1_d2_catalog() -> MemoryCatalog {
        MemoryCatalog::new()
            .with_table("d1", "t1", "CREATE TABLE t1 (...)")
            .fail_database("d2", CatalogError::permission_denied("permission denied"))
    }

    #[tokio::test]
    async fn test_failing_database_is_reported_not_fatal() {
        let sink = MemorySink::new();
        let exporter = exporter(d1_d2_catalog(), &sink, ExportConfig::default());

        let listing = exporter
            .list_tables(vec!["d1".into(), "d2".into()])
            .await
            .unwrap();
        assert_eq!(listing.tables, vec!["d1.t1"]);
        assert_eq!(listing.database_failures.len(), 1);
        assert_eq!(listing.database_failures[0].key, "d2");
        assert_eq!(
            listing.database_failures[0].kind,
            ErrorKind::PermissionDenied
        );

        let result = exporter.run().await.unwrap();
        assert_eq!(result.databases_total, 2);
        assert_eq!(result.databases_failed, 1);
        assert_eq!(result.tables_exported, 1);
        assert_eq!(result.tables_total, 1);

        let writes = sink.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "out/tables_and_views.json");
        assert_eq!(
            writes[0].1,
            "{\n  \"d1.t1\": \"CREATE OR REPLACE TABLE t1 (...)\"\n}"
        );
    }

    #[tokio::test]
    async fn test_failing_table_stops_before_sink() {
        let catalog = MemoryCatalog::new()
            .with_table("d1", "t1", "CREATE TABLE t1 (id INT)")
            .fail_table("d1", "t2", CatalogError::not_found("Table or view 'd1.t2' not found"))
            .with_table("d1", "t3", "CREATE TABLE t3 (id INT)");
        let sink = MemorySink::new();

        let err = exporter(catalog, &sink, ExportConfig::default())
            .run()
            .await
            .unwrap_err();

        match err {
            ExportError::BatchHasFailures { count, failures } => {
                assert_eq!(count, 1);
                assert_eq!(failures[0].key, "d1.t2");
                assert_eq!(failures[0].kind, ErrorKind::NotFound);
            }
            other => panic!("expected BatchHasFailures, got {:?}", other),
        }
        assert!(sink.writes().is_empty());
    }

    #[tokio::test]
    async fn test_plan_counts_listed_tables_including_failures() {
        let catalog = MemoryCatalog::new()
            .with_table("d1", "t1", "CREATE TABLE t1 ()")
            .fail_table("d1", "t2", CatalogError::other("corrupt metadata"))
            .with_table("d2", "t3", "CREATE TABLE t3 ()");
        let sink = MemorySink::new();

        let plan = exporter(catalog, &sink, ExportConfig::default())
            .plan()
            .await
            .unwrap();

        assert_eq!(plan.tables, vec!["d1.t1", "d1.t2", "d2.t3"]);
        assert_eq!(plan.tables_total(), 3);
        assert_eq!(plan.scripts.len(), 2);
        assert_eq!(plan.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_tables_concatenate_in_database_order() {
        let catalog = MemoryCatalog::new()
            .with_table("b", "t1", "CREATE TABLE t1 ()")
            .with_table("b", "t2", "CREATE TABLE t2 ()")
            .with_table("a", "t9", "CREATE TABLE t9 ()");
        let sink = MemorySink::new();
        let exporter = exporter(
            catalog,
            &sink,
            ExportConfig {
                workers: Some(1),
                ..ExportConfig::default()
            },
        );

        let plan = exporter.plan().await.unwrap();
        assert_eq!(plan.databases, vec!["b", "a"]);
        assert_eq!(
            plan.scripts.keys().collect::<Vec<_>>(),
            vec!["b.t1", "b.t2", "a.t9"]
        );
        assert!(sink.writes().is_empty());
    }

    #[tokio::test]
    async fn test_allow_list_is_deduplicated_and_limited() {
        let catalog = MemoryCatalog::new()
            .with_table("d1", "t1", "CREATE TABLE t1 ()")
            .with_table("d2", "t1", "CREATE TABLE t1 ()")
            .with_table("d3", "t1", "CREATE TABLE t1 ()");
        let sink = MemorySink::new();
        let exporter = exporter(
            catalog,
            &sink,
            ExportConfig {
                databases: vec!["d3".into(), "d1".into(), "d3".into(), "d2".into()],
                database_limit: Some(2),
                ..ExportConfig::default()
            },
        );

        assert_eq!(exporter.resolve_databases().await.unwrap(), vec!["d3", "d1"]);
    }

    #[tokio::test]
    async fn test_create_or_replace_can_be_disabled() {
        let catalog = MemoryCatalog::new().with_table("d1", "t1", "CREATE TABLE t1 (id INT)");
        let sink = MemorySink::new();
        exporter(
            catalog,
            &sink,
            ExportConfig {
                create_or_replace: false,
                ..ExportConfig::default()
            },
        )
        .run()
        .await
        .unwrap();

        let written: IndexMap<String, String> = serde_json::from_str(&sink.writes()[0].1).unwrap();
        assert_eq!(written["d1.t1"], "CREATE TABLE t1 (id INT)");
    }

    #[tokio::test]
    async fn test_list_databases_failure_is_fatal() {
        let catalog = d1_d2_catalog().fail_databases(CatalogError::transient("metastore unavailable"));
        let sink = MemorySink::new();
        let err = exporter(catalog, &sink, ExportConfig::default())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Catalog(_)));
        assert!(sink.writes().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_is_fatal() {
        let catalog = MemoryCatalog::new().with_table("d1", "t1", "CREATE TABLE t1 ()");
        let sink = MemorySink::rejecting("disk full");
        let err = exporter(catalog, &sink, ExportConfig::default())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Sink(_)));
    }

    #[tokio::test]
    async fn test_zero_workers_fails_before_any_catalog_call() {
        let catalog = MemoryCatalog::new()
            .fail_databases(CatalogError::other("list_databases must not be called"));
        let sink = MemorySink::new();
        let err = exporter(
            catalog,
            &sink,
            ExportConfig {
                workers: Some(0),
                ..ExportConfig::default()
            },
        )
        .run()
        .await
        .unwrap_err();
        assert!(matches!(err, ExportError::Config(_)));
    }

    #[tokio::test]
    async fn test_empty_catalog_writes_empty_object() {
        let sink = MemorySink::new();
        let result = exporter(MemoryCatalog::new(), &sink, ExportConfig::default())
            .run()
            .await
            .unwrap();
        assert_eq!(result.tables_exported, 0);
        assert_eq!(sink.writes()[0].1, "{}");
    }

    #[tokio::test]
    async fn test_health_check() {
        let sink = MemorySink::new();
        let healthy = exporter(d1_d2_catalog(), &sink, ExportConfig::default())
            .health_check()
            .await;
        assert!(healthy.connected);
        assert_eq!(healthy.databases_visible, Some(2));
        assert_eq!(healthy.catalog_type, "snapshot");

        let unhealthy = exporter(
            d1_d2_catalog().fail_databases(CatalogError::permission_denied("token expired")),
            &sink,
            ExportConfig::default(),
        )
        .health_check()
        .await;
        assert!(!unhealthy.connected);
        assert_eq!(unhealthy.error.unwrap().kind, ErrorKind::PermissionDenied);
    }
}
