use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::types::Project;

use super::cli::CliConfig;
use super::constants::{
    CLICKHOUSE_DEFAULT_DATABASE, CLICKHOUSE_DEFAULT_TIMEOUT_SECS, CONFIG_FILE_NAME,
    DEFAULT_BATCH_SIZE_PER_CPU, DEFAULT_CUM_TO_DELTA_PER_CPU, MAX_BATCH_SIZE,
    MAX_CUM_TO_DELTA_SIZE,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Metrics pipeline configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MetricsFileConfig {
    /// Number of datapoints per processed batch
    pub batch_size: Option<usize>,
    /// Inbound queue capacity
    pub buffer_size: Option<usize>,
    /// Capacity of the cumulative-to-delta cache (distinct series)
    pub cum_to_delta_size: Option<usize>,
    /// Attribute keys dropped from every datapoint
    pub drop_attrs: Option<Vec<String>>,
}

/// ClickHouse configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ClickhouseFileConfig {
    /// ClickHouse connection URL (or use DELTAPOINT_CLICKHOUSE_URL env var)
    pub url: Option<String>,
    /// Database name (default: "deltapoint")
    pub database: Option<String>,
    /// Username for authentication
    pub user: Option<String>,
    /// Password for authentication
    pub password: Option<String>,
    /// Query timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Project entry in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectFileConfig {
    pub id: u32,
    pub name: String,
    /// Prometheus-compatible project (15s storage buckets instead of 60s)
    #[serde(default)]
    pub prom_compat: bool,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub metrics: Option<MetricsFileConfig>,
    pub clickhouse: Option<ClickhouseFileConfig>,
    pub projects: Option<Vec<ProjectFileConfig>>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Metrics pipeline configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Datapoints per processed batch
    pub batch_size: usize,
    /// Inbound queue capacity
    pub buffer_size: usize,
    /// Capacity of the cumulative-to-delta cache (distinct series)
    pub cum_to_delta_size: usize,
    /// Attribute keys dropped from every datapoint
    pub drop_attrs: Vec<String>,
}

/// ClickHouse configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct ClickhouseConfig {
    pub url: String,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub metrics: MetricsConfig,
    pub clickhouse: ClickhouseConfig,
    pub projects: Vec<Project>,
    pub debug: bool,
}

/// Scale a per-core default with the number of available cores, capped at `max`.
pub fn scale_with_cpu(per_cpu: usize, max: usize) -> usize {
    let cores = thread::available_parallelism().map_or(1, |n| n.get());
    (per_cpu * cores).min(max)
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults (scaled with the number of cores)
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let config_path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        let file_config = match config_path {
            Some(ref path) => {
                let config = FileConfig::load_from_file(path)?;
                config.warn_unknown_fields();
                config
            }
            None => FileConfig::default(),
        };

        let file_metrics = file_config.metrics.unwrap_or_default();
        let file_clickhouse = file_config.clickhouse.unwrap_or_default();

        let batch_size = cli
            .batch_size
            .or(file_metrics.batch_size)
            .unwrap_or_else(|| scale_with_cpu(DEFAULT_BATCH_SIZE_PER_CPU, MAX_BATCH_SIZE));
        let buffer_size = cli
            .buffer_size
            .or(file_metrics.buffer_size)
            .unwrap_or_else(|| {
                let cores = thread::available_parallelism().map_or(1, |n| n.get());
                cores * batch_size
            });
        let cum_to_delta_size = cli
            .cum_to_delta_size
            .or(file_metrics.cum_to_delta_size)
            .unwrap_or_else(|| scale_with_cpu(DEFAULT_CUM_TO_DELTA_PER_CPU, MAX_CUM_TO_DELTA_SIZE));

        let metrics = MetricsConfig {
            batch_size,
            buffer_size,
            cum_to_delta_size,
            drop_attrs: file_metrics.drop_attrs.unwrap_or_default(),
        };

        let clickhouse = ClickhouseConfig {
            url: cli
                .clickhouse_url
                .clone()
                .or(file_clickhouse.url)
                .unwrap_or_default(),
            database: file_clickhouse
                .database
                .unwrap_or_else(|| CLICKHOUSE_DEFAULT_DATABASE.to_string()),
            user: file_clickhouse.user,
            password: file_clickhouse.password,
            timeout_secs: file_clickhouse
                .timeout_secs
                .unwrap_or(CLICKHOUSE_DEFAULT_TIMEOUT_SECS),
        };

        let projects = file_config
            .projects
            .unwrap_or_default()
            .into_iter()
            .map(|p| Project {
                id: p.id,
                name: p.name,
                prom_compat: p.prom_compat,
            })
            .collect();

        let debug = cli.debug || file_config.debug.unwrap_or(false);

        let config = Self {
            metrics,
            clickhouse,
            projects,
            debug,
        };

        config.validate()?;

        tracing::debug!(
            batch_size = config.metrics.batch_size,
            buffer_size = config.metrics.buffer_size,
            cum_to_delta_size = config.metrics.cum_to_delta_size,
            drop_attrs = config.metrics.drop_attrs.len(),
            projects = config.projects.len(),
            clickhouse_database = %config.clickhouse.database,
            debug = config.debug,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.metrics.batch_size == 0 {
            anyhow::bail!("Configuration error: metrics.batch_size must be greater than 0");
        }
        if self.metrics.buffer_size == 0 {
            anyhow::bail!("Configuration error: metrics.buffer_size must be greater than 0");
        }
        if self.metrics.cum_to_delta_size == 0 {
            anyhow::bail!("Configuration error: metrics.cum_to_delta_size must be greater than 0");
        }

        if self.clickhouse.url.is_empty() {
            anyhow::bail!(
                "Configuration error: clickhouse.url is required (or set DELTAPOINT_CLICKHOUSE_URL)"
            );
        }

        let mut seen = std::collections::HashSet::new();
        for project in &self.projects {
            if project.id == 0 {
                anyhow::bail!("Configuration error: project id must be greater than 0");
            }
            if !seen.insert(project.id) {
                anyhow::bail!("Configuration error: duplicate project id {}", project.id);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base_cli() -> CliConfig {
        CliConfig {
            config: None,
            debug: false,
            batch_size: None,
            buffer_size: None,
            cum_to_delta_size: None,
            clickhouse_url: Some("http://localhost:8123".to_string()),
        }
    }

    #[test]
    fn test_defaults_scale_with_cpu() {
        let config = AppConfig::load(&base_cli()).unwrap();
        assert!(config.metrics.batch_size >= DEFAULT_BATCH_SIZE_PER_CPU);
        assert!(config.metrics.batch_size <= MAX_BATCH_SIZE);
        assert!(config.metrics.buffer_size >= config.metrics.batch_size);
        assert!(config.metrics.cum_to_delta_size >= DEFAULT_CUM_TO_DELTA_PER_CPU);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"metrics": {{"batch_size": 500}}, "clickhouse": {{"url": "http://file:8123"}}}}"#
        )
        .unwrap();

        let mut cli = base_cli();
        cli.config = Some(file.path().to_path_buf());
        cli.batch_size = Some(42);

        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.metrics.batch_size, 42);
        // CLI url wins over the file
        assert_eq!(config.clickhouse.url, "http://localhost:8123");
    }

    #[test]
    fn test_projects_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "clickhouse": {{"url": "http://localhost:8123"}},
                "projects": [
                    {{"id": 1, "name": "app"}},
                    {{"id": 2, "name": "prom", "prom_compat": true}}
                ]
            }}"#
        )
        .unwrap();

        let mut cli = base_cli();
        cli.config = Some(file.path().to_path_buf());
        cli.clickhouse_url = None;

        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.projects.len(), 2);
        assert!(!config.projects[0].prom_compat);
        assert!(config.projects[1].prom_compat);
    }

    #[test]
    fn test_duplicate_project_ids_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "clickhouse": {{"url": "http://localhost:8123"}},
                "projects": [
                    {{"id": 1, "name": "a"}},
                    {{"id": 1, "name": "b"}}
                ]
            }}"#
        )
        .unwrap();

        let mut cli = base_cli();
        cli.config = Some(file.path().to_path_buf());

        assert!(AppConfig::load(&cli).is_err());
    }

    #[test]
    fn test_missing_clickhouse_url_rejected() {
        let mut cli = base_cli();
        cli.clickhouse_url = None;
        assert!(AppConfig::load(&cli).is_err());
    }
}
