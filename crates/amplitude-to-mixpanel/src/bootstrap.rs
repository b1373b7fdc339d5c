use std::path::{Path, PathBuf};

use a2m_runtime::run_log::default_logs_dir;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the results log directory exists, returning it.
///
/// Uses `~/.amplitude-to-mixpanel/logs/` unless `logs_dir` is given.
pub fn ensure_logs_dir(logs_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = logs_dir.map(Path::to_path_buf).unwrap_or_else(default_logs_dir);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Like [`ensure_logs_dir`], but a failure is only warned about.
pub fn prepare_logs_dir(logs_dir: Option<&Path>) -> Option<PathBuf> {
    match ensure_logs_dir(logs_dir) {
        Ok(dir) => Some(dir),
        Err(e) => {
            tracing::warn!("could not prepare logs directory: {}", e);
            None
        }
    }
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a CLI level name to an [`EnvFilter`] directive.
pub fn filter_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" => "error",
        _ => "info",
    }
}

/// Initialise the global `tracing` subscriber on stderr.
///
/// `RUST_LOG` takes precedence over `log_level` when set.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));

    let subscriber = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()?;

    Ok(())
}
