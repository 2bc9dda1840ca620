//! Command-line interface definitions for deploy-monitor.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use url::Url;

#[derive(Parser, Debug, Clone)]
#[command(name = "deploy-monitor", version)]
#[command(
    about = "Probes deployment health endpoints, diffs results against the previous run, and alerts only on healthy/unhealthy transitions"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the TOML registry of environment targets.
    #[arg(long, env = "MONITOR_CONFIG", default_value = "monitor.toml")]
    pub config: PathBuf,

    /// Path of the JSON file holding the previous snapshot.
    #[arg(long, env = "MONITOR_STATE_FILE", default_value = "deploy-monitor-state.json")]
    pub state_file: PathBuf,

    /// Per-probe timeout in milliseconds.
    #[arg(long, env = "MONITOR_TIMEOUT_MS", default_value = "5000")]
    pub timeout_ms: u64,

    /// Retries per probe on transport failures (HTTP errors are never retried).
    #[arg(long, env = "MONITOR_RETRIES", default_value = "1")]
    pub retries: u32,

    /// Maximum concurrent probes per run.
    #[arg(long, env = "MONITOR_MAX_IN_FLIGHT", default_value = "5")]
    pub max_in_flight: usize,

    /// Consecutive failing runs before an endpoint is reported down.
    #[arg(long, env = "MONITOR_FAILURE_THRESHOLD", default_value = "1")]
    pub failure_threshold: u32,

    /// Overall budget for one run (e.g. "30s"). Probes still outstanding
    /// when it expires are recorded as timeouts.
    #[arg(long, env = "MONITOR_RUN_BUDGET", default_value = "30s")]
    pub run_budget: String,

    /// Optional append-only JSON-lines file receiving every alert.
    #[arg(long, env = "MONITOR_ALERT_LOG")]
    pub alert_log: Option<PathBuf>,

    /// Optional webhook URL receiving every alert as a JSON POST.
    #[arg(long, env = "MONITOR_WEBHOOK_URL")]
    pub webhook_url: Option<Url>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "MONITOR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format: `json` or `text`.
    #[arg(long, env = "MONITOR_LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run one monitoring pass. Exit 0 = all healthy, 1 = any unhealthy,
    /// 2 = the monitor itself faulted.
    #[command(visible_alias = "once")]
    Check,

    /// Run the fixed-interval loop until SIGINT/SIGTERM.
    #[command(visible_alias = "continuous")]
    Watch {
        /// Interval between runs (e.g. "60s", "5m").
        #[arg(long, env = "MONITOR_INTERVAL", default_value = "60s")]
        interval: String,
    },

    /// Print the environment registry.
    ListTargets,
}

impl Args {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn parse_run_budget(&self) -> Result<Duration> {
        humantime::parse_duration(self.run_budget.trim())
            .with_context(|| format!("invalid run budget: {}", self.run_budget))
    }
}

/// Parse a humantime interval string (e.g. "60s", "5m").
pub fn parse_interval(interval: &str) -> Result<Duration> {
    humantime::parse_duration(interval.trim())
        .with_context(|| format!("invalid interval: {interval}"))
}
