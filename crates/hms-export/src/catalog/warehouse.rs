//! SQL warehouse catalog over the statement execution REST API.
//!
//! Runs `SHOW DATABASES`, `SHOW TABLES IN` and `SHOW CREATE TABLE` against a
//! warehouse attached to the metastore and reads inline `JSON_ARRAY` results.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Catalog, CatalogError};
use crate::config::WarehouseConfig;
use crate::error::Result;
use crate::executor::ErrorKind;

const STATEMENTS_PATH: &str = "/api/2.0/sql/statements";

type Rows = Vec<Vec<Option<String>>>;

/// Catalog client that executes metadata statements on a SQL warehouse.
#[derive(Debug, Clone)]
pub struct WarehouseCatalog {
    client: reqwest::Client,
    base_url: String,
    warehouse_id: String,
    catalog: Option<String>,
    wait_timeout: String,
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog: Option<&'a str>,
    wait_timeout: &'a str,
    on_wait_timeout: &'static str,
    disposition: &'static str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    statement_id: Option<String>,
    status: StatementStatus,
    #[serde(default)]
    result: Option<ResultChunk>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: StatementState,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
struct ResultChunk {
    #[serde(default)]
    data_array: Rows,
    #[serde(default)]
    next_chunk_internal_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ServiceError {
    fn describe(&self) -> String {
        match (&self.error_code, &self.message) {
            (Some(code), Some(message)) => format!("{}: {}", code, message),
            (None, Some(message)) => message.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

impl WarehouseCatalog {
    /// Create a client for the configured warehouse.
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        let client = config.http_client()?;

        Ok(Self {
            client,
            base_url: config.host.trim_end_matches('/').to_string(),
            warehouse_id: config.warehouse_id.clone(),
            catalog: config.catalog.clone(),
            wait_timeout: format!("{}s", config.wait_timeout_secs),
        })
    }

    /// Execute a statement and return all result rows.
    async fn execute(&self, statement: &str) -> std::result::Result<Rows, CatalogError> {
        debug!("Executing metadata statement: {}", statement);

        let request = StatementRequest {
            statement,
            warehouse_id: &self.warehouse_id,
            catalog: self.catalog.as_deref(),
            wait_timeout: &self.wait_timeout,
            on_wait_timeout: "CANCEL",
            disposition: "INLINE",
            format: "JSON_ARRAY",
        };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, STATEMENTS_PATH))
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let body: StatementResponse = decode(response).await?;
        check_state(&body.status)?;

        let mut rows = Rows::new();
        let mut next = None;
        if let Some(chunk) = body.result {
            rows.extend(chunk.data_array);
            next = chunk.next_chunk_internal_link;
        }

        while let Some(link) = next {
            debug!(
                "Fetching next result chunk for statement {}",
                body.statement_id.as_deref().unwrap_or("?")
            );
            let response = self
                .client
                .get(format!("{}{}", self.base_url, link))
                .send()
                .await
                .map_err(transport_error)?;
            let chunk: ResultChunk = decode(response).await?;
            rows.extend(chunk.data_array);
            next = chunk.next_chunk_internal_link;
        }

        Ok(rows)
    }
}

#[async_trait]
impl Catalog for WarehouseCatalog {
    async fn list_databases(&self) -> std::result::Result<Vec<String>, CatalogError> {
        let rows = self.execute("SHOW DATABASES").await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect())
    }

    async fn list_tables(&self, database: &str) -> std::result::Result<Vec<String>, CatalogError> {
        let statement = format!("SHOW TABLES IN {}", quote_identifier(database));
        let rows = self.execute(&statement).await?;
        Ok(table_names_from_rows(database, rows))
    }

    async fn get_create_script(&self, table: &str) -> std::result::Result<String, CatalogError> {
        let statement = format!("SHOW CREATE TABLE {}", quote_identifier(table));
        let rows = self.execute(&statement).await?;
        rows.into_iter()
            .next()
            .and_then(|row| row.into_iter().next().flatten())
            .ok_or_else(|| CatalogError::not_found(format!("No create script returned for {}", table)))
    }

    fn catalog_type(&self) -> &'static str {
        "warehouse"
    }
}

/// Quote every dot-separated part of a name with backticks.
pub(crate) fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("`{}`", part.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(".")
}

/// `SHOW TABLES` rows are `[database, tableName, isTemporary]`.
fn table_names_from_rows(database: &str, rows: Rows) -> Vec<String> {
    rows.into_iter()
        .filter_map(|row| {
            let mut cols = row.into_iter();
            let db = cols.next().flatten().unwrap_or_default();
            let table = cols.next().flatten()?;
            let temporary = cols
                .next()
                .flatten()
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            if temporary {
                return None;
            }
            let db = if db.is_empty() { database.to_string() } else { db };
            Some(super::qualified_name(&db, &table))
        })
        .collect()
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> std::result::Result<T, CatalogError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(http_error(status, &text));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| CatalogError::other(format!("invalid statement response: {}", e)))
}

fn transport_error(e: reqwest::Error) -> CatalogError {
    if e.is_timeout() {
        CatalogError::new(ErrorKind::Timeout, format!("request timed out: {}", e))
    } else {
        CatalogError::transient(format!("request failed: {}", e))
    }
}

fn http_error(status: StatusCode, body: &str) -> CatalogError {
    let detail = serde_json::from_str::<ServiceError>(body).unwrap_or_default();
    let message = if detail.error_code.is_none() && detail.message.is_none() {
        format!("HTTP {}: {}", status, body.trim())
    } else {
        format!("HTTP {}: {}", status, detail.describe())
    };

    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::PermissionDenied,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::Transient,
        s if s.is_server_error() => ErrorKind::Transient,
        _ => classify(&detail),
    };
    CatalogError::new(kind, message)
}

fn check_state(status: &StatementStatus) -> std::result::Result<(), CatalogError> {
    match status.state {
        StatementState::Succeeded => Ok(()),
        StatementState::Failed => {
            let detail = status.error.as_ref();
            let message = detail.map(ServiceError::describe).unwrap_or_else(|| "statement failed".into());
            let kind = detail.map(classify).unwrap_or(ErrorKind::Other);
            Err(CatalogError::new(kind, message))
        }
        state => Err(CatalogError::transient(format!(
            "statement ended in state {:?} before producing a result",
            state
        ))),
    }
}

fn classify(detail: &ServiceError) -> ErrorKind {
    let text = format!(
        "{} {}",
        detail.error_code.as_deref().unwrap_or_default(),
        detail.message.as_deref().unwrap_or_default()
    )
    .to_uppercase();

    if ["TABLE_OR_VIEW_NOT_FOUND", "SCHEMA_NOT_FOUND", "NOSUCHTABLEEXCEPTION", "NOSUCHDATABASEEXCEPTION", "RESOURCE_DOES_NOT_EXIST"]
        .iter()
        .any(|marker| text.contains(marker))
    {
        ErrorKind::NotFound
    } else if ["PERMISSION_DENIED", "INSUFFICIENT_PERMISSIONS", "UNAUTHORIZED"]
        .iter()
        .any(|marker| text.contains(marker))
    {
        ErrorKind::PermissionDenied
    } else if ["TEMPORARILY_UNAVAILABLE", "RESOURCE_EXHAUSTED", "DEADLINE_EXCEEDED"]
        .iter()
        .any(|marker| text.contains(marker))
    {
        ErrorKind::Transient
    } else {
        ErrorKind::Other
    }
}
