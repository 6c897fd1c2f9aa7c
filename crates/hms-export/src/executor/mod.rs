//! Bounded fan-out executor.
//!
//! Runs a single-key worker across many keys with at most `max_workers`
//! invocations in flight and collects every outcome. A failing key is
//! recorded as [`WorkResult::Failure`]; it never cancels its siblings.

mod result;

pub use result::{BatchResult, ErrorInfo, ErrorKind, IntoErrorInfo, Partitioned, WorkResult};

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ExportError, Result};

/// Default concurrency ceiling.
pub const DEFAULT_MAX_WORKERS: usize = 16;

/// Fan-out executor with a concurrency ceiling.
#[derive(Debug, Clone)]
pub struct FanOut {
    max_workers: usize,
    call_timeout: Option<Duration>,
}

enum Slot<V> {
    Ready(WorkResult<V>),
    Spawned(JoinHandle<WorkResult<V>>),
}

impl FanOut {
    /// Create an executor. Fails when `max_workers` is zero.
    pub fn new(max_workers: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(ExportError::Config(
                "max_workers must be at least 1".into(),
            ));
        }
        Ok(Self {
            max_workers,
            call_timeout: None,
        })
    }

    /// Bound each worker call. An elapsed call becomes an [`ErrorKind::Timeout`] failure.
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Run `worker` for every key and return one outcome per key, in input order.
    ///
    /// Returns only after every invocation has finished. A single key is
    /// awaited on the calling task instead of being spawned; a panic there is
    /// captured the same way as in a spawned task.
    pub async fn run<K, V, E, F, Fut>(&self, keys: Vec<K>, worker: F) -> BatchResult<K, V>
    where
        K: Clone + Display + Send + 'static,
        V: Send + 'static,
        E: IntoErrorInfo + Send + 'static,
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        if keys.is_empty() {
            return BatchResult::empty();
        }

        if keys.len() == 1 {
            let mut entries = Vec::with_capacity(1);
            for key in keys {
                let outcome = match AssertUnwindSafe(invoke(key.clone(), &worker, self.call_timeout))
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(panic) => panicked(&key, panic_message(&*panic)),
                };
                entries.push((key, outcome));
            }
            return BatchResult::from_entries(entries);
        }

        debug!(
            "Fanning out {} keys with {} workers",
            keys.len(),
            self.max_workers
        );

        let worker = Arc::new(worker);
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut slots = Vec::with_capacity(keys.len());

        for key in keys {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    let info = ErrorInfo::new(key.to_string(), ErrorKind::Other, e.to_string());
                    slots.push((key, Slot::Ready(WorkResult::Failure(info))));
                    continue;
                }
            };

            let worker = Arc::clone(&worker);
            let call_timeout = self.call_timeout;
            let task_key = key.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                invoke(task_key, worker.as_ref(), call_timeout).await
            });

            slots.push((key, Slot::Spawned(handle)));
        }

        let mut entries = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            let outcome = match slot {
                Slot::Ready(outcome) => outcome,
                Slot::Spawned(handle) => match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => panicked(&key, e.to_string()),
                },
            };
            entries.push((key, outcome));
        }

        let batch = BatchResult::from_entries(entries);
        info!(
            "Fan-out finished: {} succeeded, {} failed",
            batch.success_count(),
            batch.failure_count()
        );
        batch
    }
}

fn panicked<K: Display, V>(key: &K, detail: String) -> WorkResult<V> {
    warn!("{}: worker task panicked - {}", key, detail);
    WorkResult::Failure(ErrorInfo::new(
        key.to_string(),
        ErrorKind::Panicked,
        format!("Task panicked: {}", detail),
    ))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

async fn invoke<K, V, E, F, Fut>(key: K, worker: &F, call_timeout: Option<Duration>) -> WorkResult<V>
where
    K: Display,
    E: IntoErrorInfo,
    F: Fn(K) -> Fut,
    Fut: Future<Output = std::result::Result<V, E>>,
{
    let label = key.to_string();
    debug!("{}: started", label);

    let outcome = match call_timeout {
        Some(limit) => match tokio::time::timeout(limit, worker(key)).await {
            Ok(outcome) => outcome.map_err(|e| e.into_error_info(label.clone())),
            Err(_) => Err(ErrorInfo::new(
                label.clone(),
                ErrorKind::Timeout,
                format!("call did not complete within {}ms", limit.as_millis()),
            )),
        },
        None => worker(key).await.map_err(|e| e.into_error_info(label.clone())),
    };

    match outcome {
        Ok(value) => {
            debug!("{}: completed", label);
            WorkResult::Success(value)
        }
        Err(info) => {
            warn!("{}: failed - {}: {}", label, info.kind, info.message);
            WorkResult::Failure(info)
        }
    }
}
