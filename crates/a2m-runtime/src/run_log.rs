//! Per-invocation run log and results persistence.
//!
//! A [`RunLog`] lives for exactly one invocation. Every line it records is
//! mirrored to `tracing`, and its completion notice fires at most once no
//! matter how many code paths try to emit it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use a2m_core::error::{ConvertError, Result};
use a2m_core::formatting::{format_count, format_duration_ms};
use a2m_core::models::{RecordType, Results};
use chrono::Utc;

/// Prefix of every persisted results file.
pub const LOG_FILE_PREFIX: &str = "amplitude-import-log";

/// Log directory used when none is configured: `~/.amplitude-to-mixpanel/logs`.
pub fn default_logs_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".amplitude-to-mixpanel").join("logs")
}

/// Lines recorded during one invocation.
#[derive(Debug, Default)]
pub struct RunLog {
    verbose: bool,
    lines: Mutex<Vec<String>>,
    completed: AtomicBool,
}

impl RunLog {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Default::default()
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.push(message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.push(message);
    }

    /// Recorded only in verbose mode; always forwarded to `tracing`.
    pub fn detail(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("{}", message);
        if self.verbose {
            self.push(message);
        }
    }

    /// Running success counter for one record type after one file.
    pub fn progress(&self, record_type: RecordType, file: usize, files: usize, success: u64) {
        self.info(format!(
            "{}s: {} (file {}/{})",
            record_type,
            format_count(success),
            file,
            files
        ));
    }

    /// Emit the completion notice. Returns `false` if it was already emitted.
    pub fn complete(&self, result: std::result::Result<&Results, &ConvertError>) -> bool {
        if self.completed.swap(true, Ordering::SeqCst) {
            return false;
        }
        match result {
            Ok(results) => {
                for record_type in RecordType::ALL {
                    let outcome = results.get(record_type);
                    if outcome.total == 0 && outcome.errors.is_empty() {
                        continue;
                    }
                    self.info(format!(
                        "{}s: {} imported, {} failed, {} skipped in {}",
                        record_type,
                        format_count(outcome.success),
                        format_count(outcome.failed),
                        format_count(outcome.empty),
                        format_duration_ms(outcome.duration)
                    ));
                }
                self.info("import finished");
            }
            Err(e) => {
                self.warn(format!("import failed: {}", e));
            }
        }
        true
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Snapshot of the recorded lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Recorded lines joined with newlines.
    pub fn text(&self) -> String {
        let mut text = self.lines().join("\n");
        text.push('\n');
        text
    }

    fn push(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line);
    }
}

/// Write `results` as one pretty JSON document into `dir`, creating it if
/// needed. Returns the written path.
pub fn persist_results(results: &Results, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|source| ConvertError::FileRead {
        path: dir.to_path_buf(),
        source,
    })?;

    let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ");
    let path = dir.join(format!("{}-{}.json", LOG_FILE_PREFIX, stamp));
    let json = serde_json::to_string_pretty(results)?;

    // Write to a temp file then rename so readers never see a partial log.
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, &path)?;
    Ok(path)
}
