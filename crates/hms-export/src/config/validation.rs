//! Configuration validation.

use super::{CatalogConfig, Config};
use crate::error::{ExportError, Result};
use crate::sink::DBFS_SCHEME;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    match &config.catalog {
        CatalogConfig::Warehouse(warehouse) => {
            if warehouse.host.is_empty() {
                return Err(ExportError::Config("catalog.host is required".into()));
            }
            if !warehouse.host.starts_with("https://") && !warehouse.host.starts_with("http://") {
                return Err(ExportError::Config(format!(
                    "catalog.host must start with https:// or http://, got '{}'",
                    warehouse.host
                )));
            }
            if warehouse.warehouse_id.is_empty() {
                return Err(ExportError::Config("catalog.warehouse_id is required".into()));
            }
            if warehouse.token.is_empty() {
                return Err(ExportError::Config("catalog.token is required".into()));
            }
            if !(5..=50).contains(&warehouse.wait_timeout_secs) {
                return Err(ExportError::Config(format!(
                    "catalog.wait_timeout_secs must be between 5 and 50, got {}",
                    warehouse.wait_timeout_secs
                )));
            }
            if warehouse.request_timeout_secs == 0 {
                return Err(ExportError::Config(
                    "catalog.request_timeout_secs must be at least 1".into(),
                ));
            }
        }
        CatalogConfig::Snapshot(snapshot) => {
            if snapshot.path.as_os_str().is_empty() {
                return Err(ExportError::Config("catalog.path is required".into()));
            }
            if config.export.output.starts_with(DBFS_SCHEME) {
                return Err(ExportError::Config(
                    "export.output on dbfs:/ requires a warehouse catalog".into(),
                ));
            }
        }
    }

    // Export config validation - only check if explicitly set
    if let Some(0) = config.export.workers {
        return Err(ExportError::Config(
            "export.workers must be at least 1".into(),
        ));
    }
    if let Some(0) = config.export.database_limit {
        return Err(ExportError::Config(
            "export.database_limit must be at least 1".into(),
        ));
    }
    if let Some(0) = config.export.call_timeout_secs {
        return Err(ExportError::Config(
            "export.call_timeout_secs must be at least 1".into(),
        ));
    }
    if config.export.output.trim().is_empty() {
        return Err(ExportError::Config("export.output is required".into()));
    }
    if config.export.databases.iter().any(|db| db.trim().is_empty()) {
        return Err(ExportError::Config(
            "export.databases must not contain empty names".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExportConfig, SnapshotConfig, WarehouseConfig};

    fn warehouse_config() -> Config {
        Config {
            catalog: CatalogConfig::Warehouse(WarehouseConfig {
                host: "https://adb-123.azuredatabricks.net".to_string(),
                warehouse_id: "abc123".to_string(),
                token: "dapi0123456789".to_string(),
                catalog: None,
                wait_timeout_secs: 30,
                request_timeout_secs: 120,
            }),
            export: ExportConfig::default(),
        }
    }

    fn snapshot_config() -> Config {
        Config {
            catalog: CatalogConfig::Snapshot(SnapshotConfig {
                path: "catalog.yaml".into(),
            }),
            export: ExportConfig::default(),
        }
    }

    fn warehouse(config: &mut Config) -> &mut WarehouseConfig {
        match &mut config.catalog {
            CatalogConfig::Warehouse(w) => w,
            CatalogConfig::Snapshot(_) => unreachable!(),
        }
    }

    #[test]
    fn test_valid_configs() {
        assert!(validate(&warehouse_config()).is_ok());
        assert!(validate(&snapshot_config()).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = warehouse_config();
        warehouse(&mut config).host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_host_without_scheme() {
        let mut config = warehouse_config();
        warehouse(&mut config).host = "adb-123.azuredatabricks.net".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wait_timeout_bounds() {
        let mut config = warehouse_config();
        warehouse(&mut config).wait_timeout_secs = 4;
        assert!(validate(&config).is_err());
        warehouse(&mut config).wait_timeout_secs = 51;
        assert!(validate(&config).is_err());
        warehouse(&mut config).wait_timeout_secs = 50;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = snapshot_config();
        config.export.workers = Some(0);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("export.workers"));
    }

    #[test]
    fn test_zero_database_limit_rejected() {
        let mut config = snapshot_config();
        config.export.database_limit = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_database_name_rejected() {
        let mut config = snapshot_config();
        config.export.databases = vec!["d1".into(), " ".into()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_dbfs_output_requires_warehouse() {
        let mut config = snapshot_config();
        config.export.output = "dbfs:/hms-export/tables_and_views.json".into();
        assert!(validate(&config).is_err());

        let mut config = warehouse_config();
        config.export.output = "dbfs:/hms-export/tables_and_views.json".into();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_warehouse_config_debug_redacts_token() {
        let mut config = warehouse_config();
        warehouse(&mut config).token = "dapi_super_secret_456".to_string();
        let debug_output = format!("{:?}", config.catalog);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("dapi_super_secret_456"),
            "Debug output should not contain actual token value"
        );
    }

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = Config::from_yaml(
            r#"
catalog:
  type: snapshot
  path: catalog.yaml
"#,
        )
        .unwrap();
        assert_eq!(config.export.get_workers(), 16);
        assert!(config.export.create_or_replace);
        assert_eq!(config.export.output, "tables_and_views.json");
        assert!(config.export.call_timeout().is_none());
    }

    #[test]
    fn test_from_yaml_warehouse() {
        let config = Config::from_yaml(
            r#"
catalog:
  type: warehouse
  host: https://adb-123.azuredatabricks.net
  warehouse_id: abc123
  token: dapi0123
export:
  workers: 8
  databases: [sales, finance]
  database_limit: 20
  output: dbfs:/hms-export/tables_and_views.json
  create_or_replace: false
  call_timeout_secs: 60
"#,
        )
        .unwrap();
        assert_eq!(config.export.get_workers(), 8);
        assert_eq!(config.export.databases, vec!["sales", "finance"]);
        assert_eq!(config.export.database_limit, Some(20));
        assert!(!config.export.create_or_replace);
        assert_eq!(
            config.export.call_timeout(),
            Some(std::time::Duration::from_secs(60))
        );
        match config.catalog {
            CatalogConfig::Warehouse(w) => assert_eq!(w.wait_timeout_secs, 30),
            CatalogConfig::Snapshot(_) => panic!("expected warehouse catalog"),
        }
    }

    #[test]
    fn test_from_yaml_rejects_unknown_catalog_type() {
        let result = Config::from_yaml(
            r#"
catalog:
  type: thrift
  host: localhost
"#,
        );
        assert!(matches!(result, Err(ExportError::Yaml(_))));
    }
}
