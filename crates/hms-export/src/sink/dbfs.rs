//! DBFS sink using the streaming `create` / `add-block` / `close` API.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{Sink, SinkError};
use crate::config::WarehouseConfig;
use crate::error::Result;

/// Path prefix routed to DBFS.
pub const DBFS_SCHEME: &str = "dbfs:/";

/// Raw bytes per `add-block` call; the API caps encoded blocks at 1 MB.
const BLOCK_SIZE: usize = 512 * 1024;

#[derive(Debug, Clone)]
pub struct DbfsSink {
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    path: &'a str,
    overwrite: bool,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    handle: i64,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct AddBlockRequest {
    handle: i64,
    data: String,
}

#[derive(Debug, Serialize)]
struct CloseRequest {
    handle: i64,
}

/// One POST against `/api/2.0/dbfs/{endpoint}`.
#[async_trait]
trait DbfsTransport: Send + Sync {
    async fn post(&self, path: &str, endpoint: &str, body: Value)
        -> std::result::Result<Value, SinkError>;
}

#[derive(Debug, Clone)]
struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

#[async_trait]
impl DbfsTransport for HttpTransport {
    async fn post(
        &self,
        path: &str,
        endpoint: &str,
        body: Value,
    ) -> std::result::Result<Value, SinkError> {
        let response = self
            .client
            .post(format!("{}/api/2.0/dbfs/{}", self.base_url, endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                SinkError::new(path, format!("dbfs {} request failed", endpoint)).with_source(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(path, endpoint, status, &text));
        }

        response.json::<Value>().await.map_err(|e| {
            SinkError::new(path, format!("invalid dbfs {} response", endpoint)).with_source(e)
        })
    }
}

impl DbfsSink {
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        let client = config.http_client()?;

        Ok(Self {
            transport: HttpTransport {
                client,
                base_url: config.host.trim_end_matches('/').to_string(),
            },
        })
    }
}

/// `dbfs:/a/b.json` becomes `/a/b.json`.
pub(crate) fn dbfs_path(path: &str) -> Option<&str> {
    path.strip_prefix("dbfs:").filter(|p| p.starts_with('/'))
}

fn status_error(path: &str, endpoint: &str, status: StatusCode, body: &str) -> SinkError {
    SinkError::new(
        path,
        format!("dbfs {} returned HTTP {}: {}", endpoint, status, body.trim()),
    )
}

/// `add-block` bodies for `content`, in order.
fn block_requests(handle: i64, content: &str) -> Vec<AddBlockRequest> {
    content
        .as_bytes()
        .chunks(BLOCK_SIZE)
        .map(|block| AddBlockRequest {
            handle,
            data: STANDARD.encode(block),
        })
        .collect()
}

fn to_body<T: Serialize>(path: &str, request: &T) -> std::result::Result<Value, SinkError> {
    serde_json::to_value(request)
        .map_err(|e| SinkError::new(path, "cannot encode dbfs request").with_source(e))
}

/// Stream `content` to `remote`. Once `create` succeeds the handle is always
/// closed; the first error wins.
async fn upload<T: DbfsTransport + ?Sized>(
    transport: &T,
    path: &str,
    remote: &str,
    content: &str,
) -> std::result::Result<(), SinkError> {
    let body = to_body(
        path,
        &CreateRequest {
            path: remote,
            overwrite: true,
        },
    )?;
    let created: CreateResponse = serde_json::from_value(transport.post(path, "create", body).await?)
        .map_err(|e| SinkError::new(path, "invalid dbfs create response").with_source(e))?;

    let mut outcome = Ok(());
    for block in block_requests(created.handle, content) {
        let sent = match to_body(path, &block) {
            Ok(body) => transport.post(path, "add-block", body).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            outcome = Err(e);
            break;
        }
    }

    let closed = match to_body(path, &CloseRequest { handle: created.handle }) {
        Ok(body) => transport.post(path, "close", body).await.map(|_| ()),
        Err(e) => Err(e),
    };

    match (outcome, closed) {
        (Err(e), Err(close_err)) => {
            warn!("{}: closing dbfs handle {} also failed - {}", path, created.handle, close_err);
            Err(e)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}

#[async_trait]
impl Sink for DbfsSink {
    async fn write(&self, path: &str, content: &str) -> std::result::Result<(), SinkError> {
        let remote = dbfs_path(path).ok_or_else(|| SinkError::new(path, "not a dbfs:/ path"))?;

        upload(&self.transport, path, remote, content).await?;

        debug!("Wrote {} bytes to {}", content.len(), path);
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "dbfs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every call; fails the `fail_at`-th call (0-based) when set.
    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<(String, Value)>>,
        fail_at: Option<usize>,
    }

    impl RecordingTransport {
        fn failing_at(n: usize) -> Self {
            Self {
                fail_at: Some(n),
                ..Self::default()
            }
        }

        fn endpoints(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
        }
    }

    #[async_trait]
    impl DbfsTransport for RecordingTransport {
        async fn post(
            &self,
            path: &str,
            endpoint: &str,
            body: Value,
        ) -> std::result::Result<Value, SinkError> {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len();
            calls.push((endpoint.to_string(), body));
            if self.fail_at == Some(index) {
                return Err(status_error(
                    path,
                    endpoint,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "backend error",
                ));
            }
            Ok(if endpoint == "create" {
                json!({ "handle": 7 })
            } else {
                json!({})
            })
        }
    }

    const PATH: &str = "dbfs:/hms-export/tables_and_views.json";

    #[test]
    fn test_dbfs_path() {
        assert_eq!(
            dbfs_path("dbfs:/hms-export/tables_and_views.json"),
            Some("/hms-export/tables_and_views.json")
        );
        assert_eq!(dbfs_path("/local/file.json"), None);
        assert_eq!(dbfs_path("dbfs:relative"), None);
    }

    #[test]
    fn test_blocks_fit_api_limit() {
        let encoded = STANDARD.encode(vec![0u8; BLOCK_SIZE]);
        assert!(encoded.len() <= 1024 * 1024);
    }

    #[test]
    fn test_block_requests_split_large_content() {
        let content = "a".repeat(BLOCK_SIZE * 2 + 10);
        let blocks = block_requests(3, &content);

        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.handle == 3));
        assert_eq!(blocks[0].data, STANDARD.encode("a".repeat(BLOCK_SIZE)));
        assert_eq!(blocks[2].data, STANDARD.encode("a".repeat(10)));
        assert!(block_requests(3, "").is_empty());
    }

    #[test]
    fn test_status_error_names_endpoint_and_status() {
        let err = status_error(PATH, "add-block", StatusCode::FORBIDDEN, " no access \n");
        assert_eq!(err.path, PATH);
        assert_eq!(err.message, "dbfs add-block returned HTTP 403 Forbidden: no access");
    }

    #[tokio::test]
    async fn test_upload_sequence() {
        let transport = RecordingTransport::default();
        let content = "x".repeat(BLOCK_SIZE + 1);

        upload(&transport, PATH, "/hms-export/tables_and_views.json", &content)
            .await
            .unwrap();

        assert_eq!(
            transport.endpoints(),
            vec!["create", "add-block", "add-block", "close"]
        );
        let calls = transport.calls.lock().unwrap();
        assert_eq!(
            calls[0].1,
            json!({ "path": "/hms-export/tables_and_views.json", "overwrite": true })
        );
        assert_eq!(calls[2].1["data"], STANDARD.encode("x"));
        assert_eq!(calls[3].1, json!({ "handle": 7 }));
    }

    #[tokio::test]
    async fn test_failed_block_still_closes_handle() {
        let transport = RecordingTransport::failing_at(2);
        let content = "x".repeat(BLOCK_SIZE * 3);

        let err = upload(&transport, PATH, "/hms-export/tables_and_views.json", &content)
            .await
            .unwrap_err();

        assert!(err.message.contains("dbfs add-block returned HTTP 500"));
        assert_eq!(
            transport.endpoints(),
            vec!["create", "add-block", "add-block", "close"]
        );
    }

    #[tokio::test]
    async fn test_failed_create_sends_nothing_else() {
        let transport = RecordingTransport::failing_at(0);

        let err = upload(&transport, PATH, "/x.json", "{}").await.unwrap_err();

        assert!(err.message.contains("dbfs create"));
        assert_eq!(transport.endpoints(), vec!["create"]);
    }

    #[tokio::test]
    async fn test_close_failure_is_reported() {
        let transport = RecordingTransport::failing_at(2);

        let err = upload(&transport, PATH, "/x.json", "{}").await.unwrap_err();

        assert!(err.message.contains("dbfs close"));
        assert_eq!(transport.endpoints(), vec!["create", "add-block", "close"]);
    }
}
