use anyhow::{Context, Result};
use clap::Parser;
use oxwatch_agent::logging::{self, LogTarget, DEFAULT_DATE_FORMAT};
use oxwatch_agent::{ConfigDocument, Monitor, StopHandle};
use oxwatch_common::types::SeverityOrder;
use oxwatch_notify::{ActionExecutor, RecordingExecutor, ShellExecutor};
use std::path::PathBuf;
use std::sync::Arc;

/// Samples host metrics and escalates when configured incidents trigger.
#[derive(Debug, Parser)]
#[command(name = "oxwatch", version, about)]
struct Cli {
    /// Configuration documents (JSON, or TOML when the name ends in .toml)
    #[arg(short, long, required = true, num_args = 1..)]
    config: Vec<PathBuf>,

    /// Seconds between evaluations; zero or negative evaluates once
    #[arg(short, long, default_value_t = -1.0, allow_negative_numbers = true)]
    interval: f64,

    /// Log file; without it only warnings reach stderr
    #[arg(short, long, env = "OXWATCH_LOG")]
    log: Option<PathBuf>,

    /// strftime layout of log file timestamps
    #[arg(long, default_value = DEFAULT_DATE_FORMAT)]
    log_dateformat: String,

    /// Severity levels, highest priority first
    #[arg(long, num_args = 1.., default_values = ["error", "warn", "info"])]
    levels: Vec<String>,

    /// Fetch and evaluate everything once without escalating, printing what
    /// each name resolves to
    #[arg(long)]
    verify: bool,

    /// Debug level logging in the log file
    #[arg(short, long)]
    debug: bool,

    /// Log escalation commands instead of running them
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn log_target(&self) -> LogTarget {
        if self.verify {
            LogTarget::Verify
        } else if let Some(path) = &self.log {
            LogTarget::File {
                path: path.clone(),
                debug: self.debug,
                date_format: self.log_dateformat.clone(),
            }
        } else {
            LogTarget::Quiet
        }
    }
}

async fn shutdown_signal(stop: StopHandle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    stop.stop();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_target())?;

    let order = SeverityOrder::new(cli.levels.clone())
        .map_err(|e| anyhow::anyhow!("invalid --levels: {e}"))?;
    let executor: Arc<dyn ActionExecutor> = if cli.dry_run {
        Arc::new(RecordingExecutor::new())
    } else {
        Arc::new(ShellExecutor::new())
    };
    tracing::info!(levels = %order, executor = executor.name(), "oxwatch starting");

    let mut monitor = Monitor::new(order, executor);
    for path in &cli.config {
        let document = ConfigDocument::load(path)?;
        let counts = monitor
            .load_document(&document)
            .with_context(|| format!("failed to apply configuration {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            constants = counts.constants,
            variables = counts.variables,
            derivatives = counts.derivatives,
            incidents = counts.incidents,
            "Configuration loaded"
        );
    }

    if cli.verify {
        let context = monitor.verify()?;
        tracing::info!(names = context.len(), "Configuration verified");
        return Ok(());
    }

    tokio::spawn(shutdown_signal(monitor.stop_handle()));
    let monitor = monitor.run(cli.interval).await?;
    tracing::info!(cycles = monitor.cycles(), "Shutting down gracefully");
    Ok(())
}
