use anyhow::Context;
use chrono::format::{Item, StrftimeItems};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

/// Timestamp layout used for log files unless overridden.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

/// Where diagnostics go for one run of the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Configuration check: everything down to debug on stdout, no timestamps.
    Verify,
    /// Append to a file with local timestamps.
    File {
        path: PathBuf,
        debug: bool,
        date_format: String,
    },
    /// Only warnings and errors, on stderr.
    Quiet,
}

impl LogTarget {
    /// Level applied to the `oxwatch` crates.
    pub fn level(&self) -> &'static str {
        match self {
            LogTarget::Verify => "debug",
            LogTarget::File { debug: true, .. } => "debug",
            LogTarget::File { debug: false, .. } => "info",
            LogTarget::Quiet => "warn",
        }
    }
}

/// Rejects strftime layouts chrono cannot render.
pub fn check_date_format(format: &str) -> anyhow::Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        anyhow::bail!("invalid log date format '{format}'");
    }
    Ok(())
}

fn filter(level: &str) -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::from_default_env().add_directive(format!("oxwatch={level}").parse()?))
}

/// Installs the global subscriber. `RUST_LOG` directives still apply on top
/// of the level chosen for `target`.
pub fn init(target: &LogTarget) -> anyhow::Result<()> {
    let env_filter = filter(target.level())?;

    let installed = match target {
        LogTarget::Verify => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stdout)
            .with_target(false)
            .without_time()
            .try_init(),
        LogTarget::File {
            path, date_format, ..
        } => {
            check_date_format(date_format)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_timer(ChronoLocal::new(date_format.clone()))
                .try_init()
        }
        LogTarget::Quiet => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}
