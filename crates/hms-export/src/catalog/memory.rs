//! In-memory catalog backed by a snapshot.
//!
//! Snapshots describe databases, tables and their create scripts in YAML,
//! with optional injected failures:
//!
//! ```yaml
//! databases:
//!   d1:
//!     tables:
//!       t1:
//!         script: "CREATE TABLE t1 (id INT)"
//!       scratch:
//!         temporary: true
//!   d2:
//!     error:
//!       kind: permission_denied
//!       message: "User does not have USAGE on database d2"
//! ```

use std::path::Path;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{qualified_name, split_qualified, Catalog, CatalogError};
use crate::error::Result;
use crate::executor::ErrorKind;

/// A failure returned instead of data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&InjectedError> for CatalogError {
    fn from(injected: &InjectedError) -> Self {
        CatalogError::new(injected.kind, injected.message.clone())
    }
}

impl From<CatalogError> for InjectedError {
    fn from(err: CatalogError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// Whole-catalog snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub databases: IndexMap<String, DatabaseSnapshot>,

    /// Returned by `list_databases` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InjectedError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    #[serde(default)]
    pub tables: IndexMap<String, TableSnapshot>,

    /// Returned by `list_tables` for this database when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InjectedError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    #[serde(default)]
    pub script: String,

    /// Session-scoped tables are never listed.
    #[serde(default)]
    pub temporary: bool,

    /// Returned by `get_create_script` for this table when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InjectedError>,
}

/// Catalog that serves a [`CatalogSnapshot`] from memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    snapshot: CatalogSnapshot,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let snapshot: CatalogSnapshot = serde_yaml::from_str(&content)?;
        debug!(
            "Loaded catalog snapshot with {} databases from {:?}",
            snapshot.databases.len(),
            path.as_ref()
        );
        Ok(Self { snapshot })
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.snapshot
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.snapshot
            .databases
            .entry(database.to_string())
            .or_default();
        self
    }

    pub fn with_table(mut self, database: &str, table: &str, script: &str) -> Self {
        self.table_entry(database, table).script = script.to_string();
        self
    }

    pub fn with_temporary_table(mut self, database: &str, table: &str) -> Self {
        self.table_entry(database, table).temporary = true;
        self
    }

    pub fn fail_databases(mut self, error: CatalogError) -> Self {
        self.snapshot.error = Some(error.into());
        self
    }

    pub fn fail_database(mut self, database: &str, error: CatalogError) -> Self {
        self.snapshot
            .databases
            .entry(database.to_string())
            .or_default()
            .error = Some(error.into());
        self
    }

    pub fn fail_table(mut self, database: &str, table: &str, error: CatalogError) -> Self {
        self.table_entry(database, table).error = Some(error.into());
        self
    }

    fn table_entry(&mut self, database: &str, table: &str) -> &mut TableSnapshot {
        self.snapshot
            .databases
            .entry(database.to_string())
            .or_default()
            .tables
            .entry(table.to_string())
            .or_default()
    }

    fn database(&self, database: &str) -> std::result::Result<&DatabaseSnapshot, CatalogError> {
        self.snapshot.databases.get(database).ok_or_else(|| {
            CatalogError::not_found(format!("Database '{}' not found", database))
        })
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn list_databases(&self) -> std::result::Result<Vec<String>, CatalogError> {
        if let Some(ref err) = self.snapshot.error {
            return Err(err.into());
        }
        Ok(self.snapshot.databases.keys().cloned().collect())
    }

    async fn list_tables(&self, database: &str) -> std::result::Result<Vec<String>, CatalogError> {
        let db = self.database(database)?;
        if let Some(ref err) = db.error {
            return Err(err.into());
        }
        Ok(db
            .tables
            .iter()
            .filter(|(_, table)| !table.temporary)
            .map(|(name, _)| qualified_name(database, name))
            .collect())
    }

    async fn get_create_script(&self, table: &str) -> std::result::Result<String, CatalogError> {
        let (database, name) = split_qualified(table).ok_or_else(|| {
            CatalogError::other(format!("'{}' is not a fully-qualified table name", table))
        })?;
        let db = self.database(database)?;
        let entry = db.tables.get(name).ok_or_else(|| {
            CatalogError::not_found(format!("Table or view '{}' not found", table))
        })?;
        if let Some(ref err) = entry.error {
            return Err(err.into());
        }
        Ok(entry.script.clone())
    }

    fn catalog_type(&self) -> &'static str {
        "snapshot"
    }
}
