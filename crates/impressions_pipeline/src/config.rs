//! YAML application configuration.
//!
//! Every field has a default, so a run without `--config` uses S3 with the
//! default AWS provider chain, the bundled impressions schema path and
//! `info` logging.

use std::path::{Path, PathBuf};

use impressions_core::aggregate::default_dedup_columns;
use impressions_core::transform::{TransformSettings, DEFAULT_IMPRESSIONS_SCHEMA};
use serde::Deserialize;

use crate::handlers::pipeline::PipelineConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub storage: StorageSettings,
    pub pipeline: PipelineSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    S3,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    /// Root directory holding one sub-directory per bucket when
    /// `backend: local`.
    pub local_root: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            region: None,
            endpoint_url: None,
            force_path_style: false,
            local_root: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    pub impressions_schema: PathBuf,
    pub dedup_columns: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            impressions_schema: PathBuf::from(DEFAULT_IMPRESSIONS_SCHEMA),
            dedup_columns: default_dedup_columns(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.dedup_columns.is_empty() {
            return Err(ConfigError::Invalid(
                "pipeline.dedup_columns must name at least one column".to_string(),
            ));
        }
        if self
            .pipeline
            .dedup_columns
            .iter()
            .any(|column| column.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "pipeline.dedup_columns must not contain blank names".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "logging.level cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            transform: TransformSettings {
                impressions_schema: self.pipeline.impressions_schema.clone(),
                dedup_columns: self.pipeline.dedup_columns.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, contents).expect("write config");
        (dir, path)
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let (_dir, path) = write_config("storage:\n  region: eu-west-1\n");
        let config = AppConfig::load(&path).expect("config should load");

        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.pipeline, PipelineSettings::default());
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn local_backend_config_parses() {
        let (_dir, path) = write_config(
            "storage:\n  backend: local\n  local_root: /tmp/buckets\nlogging:\n  level: debug\n  format: json\n",
        );
        let config = AppConfig::load(&path).expect("config should load");

        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.local_root, PathBuf::from("/tmp/buckets"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn rejects_unknown_keys() {
        let (_dir, path) = write_config("storage:\n  access_key_id: AKIA\n");
        let error = AppConfig::load(&path).expect_err("unknown key should fail");
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn rejects_empty_dedup_columns() {
        let (_dir, path) = write_config("pipeline:\n  dedup_columns: []\n");
        let error = AppConfig::load(&path).expect_err("empty dedup columns should fail");
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn pipeline_config_carries_schema_and_dedup_columns() {
        let config = AppConfig {
            pipeline: PipelineSettings {
                impressions_schema: PathBuf::from("custom.yaml"),
                dedup_columns: vec!["IMPRESSION_ID".to_string()],
            },
            ..AppConfig::default()
        };

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.transform.impressions_schema, PathBuf::from("custom.yaml"));
        assert_eq!(pipeline.transform.dedup_columns, ["IMPRESSION_ID"]);
    }
}
