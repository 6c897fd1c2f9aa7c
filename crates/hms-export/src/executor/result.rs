//! Per-key outcomes produced by the fan-out executor.

use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Classification of a captured failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The database or table does not exist.
    NotFound,
    /// The caller may not read the object.
    PermissionDenied,
    /// Throttling, connection resets, 5xx responses.
    Transient,
    /// The per-call timeout elapsed.
    Timeout,
    /// The worker task panicked.
    Panicked,
    /// Anything else.
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::Transient => "transient",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Panicked => "panicked",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured failure for one key, printable on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// The key whose worker failed.
    pub key: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(key: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.key, self.kind, self.message)
    }
}

/// Conversion from a worker's error into an [`ErrorInfo`] for `key`.
pub trait IntoErrorInfo {
    fn into_error_info(self, key: String) -> ErrorInfo;
}

impl IntoErrorInfo for ErrorInfo {
    fn into_error_info(self, key: String) -> ErrorInfo {
        ErrorInfo { key, ..self }
    }
}

/// Outcome of one worker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkResult<V> {
    Success(V),
    Failure(ErrorInfo),
}

impl<V> WorkResult<V> {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkResult::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, WorkResult::Failure(_))
    }

    pub fn success(&self) -> Option<&V> {
        match self {
            WorkResult::Success(value) => Some(value),
            WorkResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ErrorInfo> {
        match self {
            WorkResult::Success(_) => None,
            WorkResult::Failure(info) => Some(info),
        }
    }

    pub fn into_result(self) -> Result<V, ErrorInfo> {
        match self {
            WorkResult::Success(value) => Ok(value),
            WorkResult::Failure(info) => Err(info),
        }
    }
}

impl<V> From<Result<V, ErrorInfo>> for WorkResult<V> {
    fn from(result: Result<V, ErrorInfo>) -> Self {
        match result {
            Ok(value) => WorkResult::Success(value),
            Err(info) => WorkResult::Failure(info),
        }
    }
}

/// Every outcome of one executor run, in input-key order.
///
/// There is exactly one entry per input key, including duplicates. Entries
/// can be read but not modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult<K, V> {
    entries: Vec<(K, WorkResult<V>)>,
}

/// A batch split into successes and failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partitioned<K: Hash + Eq, V> {
    pub good: IndexMap<K, V>,
    pub bad: IndexMap<K, ErrorInfo>,
}

impl<K, V> BatchResult<K, V> {
    pub(crate) fn from_entries(entries: Vec<(K, WorkResult<V>)>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &WorkResult<V>)> {
        self.entries.iter().map(|(key, result)| (key, result))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn successes(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries
            .iter()
            .filter_map(|(key, result)| result.success().map(|value| (key, value)))
    }

    pub fn failures(&self) -> impl Iterator<Item = &ErrorInfo> {
        self.entries.iter().filter_map(|(_, result)| result.failure())
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_failure()).count()
    }

    pub fn into_entries(self) -> Vec<(K, WorkResult<V>)> {
        self.entries
    }
}

impl<K: PartialEq, V> BatchResult<K, V> {
    /// First outcome recorded for `key`.
    pub fn get(&self, key: &K) -> Option<&WorkResult<V>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, result)| result)
    }
}

impl<K: Hash + Eq, V> BatchResult<K, V> {
    /// Split into successes and failures, keeping input order.
    ///
    /// A duplicated key is reported once, under its last outcome.
    pub fn partition(self) -> Partitioned<K, V> {
        let mut good = IndexMap::new();
        let mut bad = IndexMap::new();
        for (key, result) in self.entries {
            match result {
                WorkResult::Success(value) => {
                    bad.shift_remove(&key);
                    good.insert(key, value);
                }
                WorkResult::Failure(info) => {
                    good.shift_remove(&key);
                    bad.insert(key, info);
                }
            }
        }
        Partitioned { good, bad }
    }
}

impl<K, V> IntoIterator for BatchResult<K, V> {
    type Item = (K, WorkResult<V>);
    type IntoIter = std::vec::IntoIter<(K, WorkResult<V>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
