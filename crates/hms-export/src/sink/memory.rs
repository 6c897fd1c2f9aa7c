//! In-memory sink.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{Sink, SinkError};

/// Records every write; optionally rejects them.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    writes: Arc<Mutex<Vec<(String, String)>>>,
    reject: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose writes all fail with `message`.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            writes: Arc::default(),
            reject: Some(message.into()),
        }
    }

    /// `(path, content)` pairs in write order.
    pub fn writes(&self) -> Vec<(String, String)> {
        match self.writes.lock() {
            Ok(writes) => writes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(&self, path: &str, content: &str) -> Result<(), SinkError> {
        if let Some(ref message) = self.reject {
            return Err(SinkError::new(path, message.clone()));
        }
        let mut writes = self
            .writes
            .lock()
            .map_err(|_| SinkError::new(path, "sink lock poisoned"))?;
        writes.push((path.to_string(), content.to_string()));
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "memory"
    }
}
