//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::core::cli::{self, CliConfig};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG, STATS_LOG_INTERVAL};
use crate::core::shutdown::ShutdownService;
use crate::data::{ClickhouseService, ConfigProjectDirectory};
use crate::domain::metrics::DatapointProcessor;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub store: Arc<ClickhouseService>,
    pub processor: Arc<DatapointProcessor>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let cli_config = cli::parse();
        let app = Self::init(&cli_config).await?;
        app.start().await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let store = Arc::new(
            ClickhouseService::init(&config.clickhouse)
                .await
                .context("Failed to initialize ClickHouse")?,
        );

        let projects = Arc::new(ConfigProjectDirectory::new(&config.projects));
        if projects.is_empty() {
            tracing::warn!("No projects configured; every datapoint will be dropped");
        }

        let processor = Arc::new(DatapointProcessor::new(
            &config.metrics,
            store.clone(),
            projects,
        ));

        Ok(Self {
            shutdown: ShutdownService::new(),
            config,
            store,
            processor,
        })
    }

    async fn start(self) -> Result<()> {
        self.shutdown.install_signal_handlers();

        self.processor.start(&self.shutdown);
        self.start_stats_task().await;

        tracing::info!(
            projects = self.config.projects.len(),
            debug = self.config.debug,
            "{} is running",
            crate::core::constants::APP_NAME
        );

        self.shutdown.wait().await;

        // stop the drain loop first so in-flight batches land in storage
        self.processor.stop().await;
        self.shutdown.shutdown().await;
        self.store.close().await;

        Ok(())
    }

    /// Periodically log per-project pipeline outcomes and queue depth
    async fn start_stats_task(&self) {
        let processor = Arc::clone(&self.processor);
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(STATS_LOG_INTERVAL);
            interval.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        for (project_id, outcome) in processor.stats().snapshot() {
                            tracing::info!(
                                project_id,
                                inserted = outcome.inserted,
                                dropped = outcome.dropped,
                                queue_depth = processor.queue_depth(),
                                tracked_series = processor.tracked_series(),
                                "Pipeline stats"
                            );
                        }
                    }
                }
            }
        });

        self.shutdown.register(handle).await;
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}
