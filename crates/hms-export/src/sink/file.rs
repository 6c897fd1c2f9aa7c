//! Local filesystem sink.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::{Sink, SinkError};

#[derive(Debug, Clone, Default)]
pub struct FileSink;

impl FileSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn write(&self, path: &str, content: &str) -> Result<(), SinkError> {
        let target = Path::new(path);
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SinkError::new(path, format!("cannot create directory {:?}", parent)).with_source(e)
            })?;
        }

        tokio::fs::write(target, content.as_bytes())
            .await
            .map_err(|e| SinkError::new(path, "write failed").with_source(e))?;

        debug!("Wrote {} bytes to {}", content.len(), path);
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hms-export").join("tables.json");
        let path = path.to_str().unwrap();

        FileSink::new().write(path, "{}").await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");
        let path = path.to_str().unwrap();

        let sink = FileSink::new();
        sink.write(path, "first, longer content").await.unwrap();
        sink.write(path, "second").await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_write_into_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("tables.json");

        let err = FileSink::new()
            .write(path.to_str().unwrap(), "{}")
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to write"));
    }
}
