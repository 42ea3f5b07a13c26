mod app;
mod config_commands;
mod serve;
mod sync_commands;

use std::{path::PathBuf, process::ExitCode};

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "shelfsync", about = "Shelfsync: catalog sync and scheduling engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Directory searched first for `shelfsync.{toml,yaml,yml,json}`.
    #[arg(long, global = true, env = "SHELFSYNC_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Install the metrics recorder.
    #[cfg(feature = "metrics")]
    #[arg(long, global = true, default_value_t = false)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the standing jobs and accept JSON control requests on stdin
    /// (default when no subcommand is provided).
    Serve,
    /// Run one manual sync now.
    Sync,
    /// List recent sync runs, most recent first.
    Runs {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Product and run summary.
    Stats,
    /// Validate the configuration and report errors/warnings.
    Check {
        /// Show informational diagnostics too.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries command output and control responses.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "shelfsync starting");

    let config_dir = cli.config_dir.as_deref();
    if let Some(Commands::Check { verbose }) = cli.command {
        let ok = config_commands::check(config_dir, verbose)?;
        return Ok(if ok {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let config = shelfsync_config::discover_and_load(config_dir);

    #[cfg(feature = "metrics")]
    let metrics = shelfsync_metrics::init_metrics(shelfsync_metrics::MetricsRecorderConfig {
        enabled: cli.metrics,
        global_labels: vec![("service".into(), "shelfsync".into())],
    })?;

    let engine = app::build(&config).await?;

    let code = match cli.command {
        None | Some(Commands::Serve) => {
            serve::serve(engine, &config).await?;
            ExitCode::SUCCESS
        },
        Some(Commands::Sync) => {
            if sync_commands::sync(&engine).await? {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        },
        Some(Commands::Runs { limit }) => {
            sync_commands::runs(&engine, limit).await?;
            ExitCode::SUCCESS
        },
        Some(Commands::Stats) => {
            sync_commands::stats(&engine, &config).await?;
            ExitCode::SUCCESS
        },
        Some(Commands::Check { .. }) => ExitCode::SUCCESS,
    };

    #[cfg(feature = "metrics")]
    {
        let rendered = metrics.render();
        if !rendered.is_empty() {
            eprintln!("{rendered}");
        }
    }

    Ok(code)
}
