use std::path::PathBuf;

use clap::Parser;

use super::constants::{
    ENV_BATCH_SIZE, ENV_BUFFER_SIZE, ENV_CLICKHOUSE_URL, ENV_CONFIG, ENV_CUM_TO_DELTA_SIZE,
    ENV_DEBUG,
};

#[derive(Parser)]
#[command(name = "deltapoint")]
#[command(version, about = "Telemetry metrics ingestion backend", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Enable debug logging of processed batches
    #[arg(long, env = ENV_DEBUG)]
    pub debug: bool,

    /// Number of datapoints per processed batch
    #[arg(long, env = ENV_BATCH_SIZE)]
    pub batch_size: Option<usize>,

    /// Inbound queue capacity (datapoints)
    #[arg(long, env = ENV_BUFFER_SIZE)]
    pub buffer_size: Option<usize>,

    /// Capacity of the cumulative-to-delta conversion cache (series)
    #[arg(long, env = ENV_CUM_TO_DELTA_SIZE)]
    pub cum_to_delta_size: Option<usize>,

    /// ClickHouse connection URL
    #[arg(long, env = ENV_CLICKHOUSE_URL)]
    pub clickhouse_url: Option<String>,
}

/// Parsed CLI configuration passed to `AppConfig::load`
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub debug: bool,
    pub batch_size: Option<usize>,
    pub buffer_size: Option<usize>,
    pub cum_to_delta_size: Option<usize>,
    pub clickhouse_url: Option<String>,
}

pub fn parse() -> CliConfig {
    let cli = Cli::parse();
    CliConfig {
        config: cli.config,
        debug: cli.debug,
        batch_size: cli.batch_size,
        buffer_size: cli.buffer_size,
        cum_to_delta_size: cli.cum_to_delta_size,
        clickhouse_url: cli.clickhouse_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
