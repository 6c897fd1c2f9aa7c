//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::error::{ExportError, Result};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl WarehouseConfig {
    /// Build an HTTP client that authenticates every request with the token.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.token)).map_err(|e| {
            ExportError::Config(format!("catalog.token is not a valid header value: {}", e))
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()
            .map_err(|e| ExportError::Config(format!("failed to build HTTP client: {}", e)))
    }
}
