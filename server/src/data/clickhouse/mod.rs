//! ClickHouse telemetry store
//!
//! Batch writes for datapoints and the metric catalog. Uses async HTTP
//! connections with LZ4 compression; inserts are already batched by the
//! processor so each call maps to a single INSERT.

mod rows;
pub mod schema;

use std::time::Duration;

use async_trait::async_trait;
use clickhouse::Client;

use crate::core::config::ClickhouseConfig;
use crate::core::constants::{DATAPOINTS_TABLE, METRICS_TABLE};
use crate::data::error::DataError;
use crate::data::traits::TelemetryStore;
use crate::data::types::{Datapoint, Metric};
use crate::utils::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, retry_with_backoff};

use rows::{DatapointRow, MetricRow};

/// ClickHouse storage service
///
/// The clickhouse crate's Client internally uses hyper with connection
/// pooling via HTTP keep-alive, so one service is shared across tasks.
pub struct ClickhouseService {
    client: Client,
    timeout: Duration,
}

impl ClickhouseService {
    /// Initialize the ClickHouse connection and ensure the schema exists
    pub async fn init(config: &ClickhouseConfig) -> Result<Self, DataError> {
        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_compression(clickhouse::Compression::Lz4);

        if let Some(ref user) = config.user {
            client = client.with_user(user);
        }
        if let Some(ref password) = config.password {
            client = client.with_password(password);
        }

        let service = Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
        };

        // fail fast on an unreachable server before running any DDL
        service.health_check().await?;
        service.ensure_schema().await?;

        tracing::debug!(
            url = %config.url,
            database = %config.database,
            timeout_secs = config.timeout_secs,
            "ClickhouseService initialized"
        );

        Ok(service)
    }

    /// Verify the connection is alive
    pub async fn health_check(&self) -> Result<(), DataError> {
        self.client
            .query("SELECT 1")
            .execute()
            .await
            .map_err(DataError::from)
    }

    /// Close the connection gracefully (no-op for the HTTP client)
    pub async fn close(&self) {
        tracing::debug!("ClickHouse connection closed");
    }

    async fn ensure_schema(&self) -> Result<(), DataError> {
        for statement in schema::table_statements() {
            self.client.query(statement).execute().await?;
        }
        Ok(())
    }

    /// Run `op` with a timeout and exponential-backoff retries
    async fn with_retry<F, Fut>(&self, backend: &'static str, mut op: F) -> Result<(), DataError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<(), clickhouse::error::Error>>,
    {
        let timeout_secs = self.timeout.as_secs();
        let result = retry_with_backoff(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY_MS, || {
            let fut = op();
            async move {
                match tokio::time::timeout(self.timeout, fut).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(DataError::from(e)),
                    Err(_) => Err(DataError::timeout(backend, timeout_secs)),
                }
            }
        })
        .await;

        match result {
            Ok(_) => Ok(()),
            Err((e, attempts)) => {
                tracing::error!(error = %e, attempts, backend, "ClickHouse write failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl TelemetryStore for ClickhouseService {
    async fn insert_datapoints(&self, datapoints: &[Datapoint]) -> Result<(), DataError> {
        if datapoints.is_empty() {
            return Ok(());
        }

        self.with_retry("clickhouse.datapoints", || async {
            let mut insert: clickhouse::insert::Insert<DatapointRow> =
                self.client.insert(DATAPOINTS_TABLE).await?;
            for dp in datapoints {
                insert.write(&DatapointRow::from(dp)).await?;
            }
            insert.end().await
        })
        .await?;

        tracing::trace!(count = datapoints.len(), "Inserted datapoints");
        Ok(())
    }

    async fn upsert_metrics(&self, metrics: &[Metric]) -> Result<(), DataError> {
        if metrics.is_empty() {
            return Ok(());
        }

        // ReplacingMergeTree keyed on (project_id, name) makes plain inserts
        // behave as upserts after background merges
        self.with_retry("clickhouse.metrics", || async {
            let mut insert: clickhouse::insert::Insert<MetricRow> =
                self.client.insert(METRICS_TABLE).await?;
            for metric in metrics {
                insert.write(&MetricRow::from(metric)).await?;
            }
            insert.end().await
        })
        .await?;

        tracing::trace!(count = metrics.len(), "Upserted metrics");
        Ok(())
    }
}
