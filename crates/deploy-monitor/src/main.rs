//! `deploy-monitor` — binary entry point.
//!
//! Parses CLI / env-var configuration, loads the environment registry,
//! wires the pipeline from the library crate, and dispatches the chosen
//! subcommand. Exit codes: 0 all healthy, 1 at least one target unhealthy,
//! 2 the monitor itself could not complete a check.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use deploy_monitor::{
    alert::{AlertSink, ConsoleSink, JsonLinesSink, WebhookSink},
    cli::{Args, Command, parse_interval},
    detector::Detector,
    probe::Prober,
    registry::Registry,
    runner::Runner,
    store::SnapshotStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    init_tracing(&args.log_level, &args.log_format);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            // Exit code 2: the monitor faulted, distinct from "a target is down".
            error!(error = format!("{e:#}"), "monitor fault");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let registry = Registry::from_path(&args.config)?;

    if let Command::ListTargets = args.command {
        for target in registry.targets() {
            let frontend = target
                .frontend_url
                .as_ref()
                .map(|u| u.as_str().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{}\tbackend={}\tfrontend={}\tpaths={}",
                target.name,
                target.backend_url,
                frontend,
                target.health_paths.join(",")
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let runner = build_runner(&args, registry)?;

    match args.command {
        Command::Check => {
            let summary = runner.run_once().await?;
            Ok(ExitCode::from(summary.exit_code()))
        }
        Command::Watch { ref interval } => {
            let interval = parse_interval(interval)?;
            let cancel = CancellationToken::new();
            tokio::spawn(await_shutdown(cancel.clone()));
            runner.run_forever(interval, cancel).await;
            Ok(ExitCode::SUCCESS)
        }
        Command::ListTargets => unreachable!("handled above"),
    }
}

/// Assemble the pipeline from parsed arguments.
fn build_runner(args: &Args, registry: Registry) -> Result<Runner> {
    let prober = Prober::new(args.probe_timeout(), args.retries)?;
    let store = SnapshotStore::new(&args.state_file);
    let detector = Detector::new(args.failure_threshold);

    let mut sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(ConsoleSink)];
    if let Some(path) = &args.alert_log {
        info!(path = %path.display(), "alert audit log enabled");
        sinks.push(Box::new(JsonLinesSink::new(path)));
    }
    if let Some(url) = &args.webhook_url {
        info!(url = %url, "alert webhook enabled");
        sinks.push(Box::new(WebhookSink::new(url.clone())));
    }

    Ok(Runner::new(
        registry,
        prober,
        store,
        detector,
        sinks,
        args.max_in_flight,
        args.parse_run_budget()?,
    ))
}

/// Initialise `tracing` with the given level and format (`json` or `text`).
fn init_tracing(level: &str, format: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        "json" => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

/// Wait for SIGINT / SIGTERM and trigger the cancellation token.
async fn await_shutdown(cancel: CancellationToken) {
    use tokio::signal;

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("received SIGTERM, shutting down");
        }
    }

    cancel.cancel();
}
