#![forbid(unsafe_code)]

use clap::Parser;
use conntrack_cleaner_lib::cleaner::{self, spawn_signal_listener};
use conntrack_cleaner_lib::config::{apply_env_overrides, load_from_path, Config};
use conntrack_cleaner_lib::conntrack::ConntrackCli;
use conntrack_cleaner_lib::telemetry::{
    init_metrics, init_tracing_with_otel, start_observability_server, Readiness,
};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Deletes stale unanswered conntrack entries")]
struct Cli {
    /// Path to configuration TOML file; built-in defaults are used when omitted
    #[arg(short, long, value_name = "FILE", env = "CONNTRACK_CLEANER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_from_path(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("failed to load configuration from {}: {err}", path.display());
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Err(err) = init_tracing_with_otel(
        &config.logging.level,
        config.logging.show_target,
        &config.telemetry.otel_log_level,
    ) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    apply_env_overrides(&mut config.cleaner);
    info!(?config, "configuration loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let readiness = Readiness::new();

    let metrics = match config.telemetry.metrics_port {
        Some(port) => match init_metrics() {
            Ok((metrics, registry)) => {
                let readiness = readiness.clone();
                let shutdown = shutdown_rx.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        start_observability_server(port, registry, readiness, shutdown).await
                    {
                        error!(error = %e, "observability server failed");
                    }
                });
                Some(metrics)
            }
            Err(e) => {
                warn!(error = %e, "failed to initialize metrics, continuing without them");
                None
            }
        },
        None => None,
    };

    if let Err(err) = spawn_signal_listener(shutdown_tx) {
        error!(%err, "failed to install signal handlers");
        std::process::exit(1);
    }

    let cli_tool = ConntrackCli::from_config(&config.conntrack);
    let stats = cleaner::run(
        &config.cleaner,
        cli_tool.clone(),
        cli_tool,
        metrics,
        readiness,
        shutdown_rx,
    )
    .await;

    info!(
        observed = stats.observed,
        stale = stats.stale,
        deleted = stats.deleted,
        deletion_failures = stats.deletion_failures,
        suppressed = stats.suppressed,
        rotations = stats.rotations,
        purged = stats.purged,
        "conntrack cleaner stopped"
    );
}
