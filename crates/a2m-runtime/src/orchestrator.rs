//! Pipeline orchestration.
//!
//! Runs one importer call per enabled record type. The pipelines are
//! interleaved on the calling task with `tokio::join!`, so a slow or failing
//! pipeline never cancels its siblings, and each one writes only its own
//! slot of the final [`Results`].

use std::path::PathBuf;
use std::sync::Arc;

use a2m_core::error::ConvertError;
use a2m_core::models::{Credentials, Outcome, RecordType, RecordTypes, Results};
use a2m_core::summary::summarize;
use a2m_data::source::FileOrder;

use crate::importer::{ImportInput, Importer, PipelineConfig, PipelineOptions};
use crate::run_log::RunLog;

// ── Public types ──────────────────────────────────────────────────────────────

/// How a directory is handed to the importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// All files of a directory as one ordered stream per record type.
    #[default]
    Merged,
    /// One importer call per file, strictly sequential per record type.
    PerFile,
}

/// The input after source resolution.
#[derive(Debug, Clone)]
pub enum ResolvedInput {
    File(PathBuf),
    /// Record files of a directory, ascending by name.
    Directory(Vec<PathBuf>),
    Bytes(Arc<[u8]>),
}

// ── PipelineOrchestrator ──────────────────────────────────────────────────────

/// Fans one input out to the enabled record-type pipelines.
pub struct PipelineOrchestrator<'a, I: Importer + ?Sized> {
    importer: &'a I,
    log: &'a RunLog,
    mode: IngestMode,
    file_order: FileOrder,
}

impl<'a, I: Importer + ?Sized> PipelineOrchestrator<'a, I> {
    pub fn new(importer: &'a I, log: &'a RunLog) -> Self {
        Self {
            importer,
            log,
            mode: IngestMode::default(),
            file_order: FileOrder::default(),
        }
    }

    pub fn with_mode(mut self, mode: IngestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_file_order(mut self, file_order: FileOrder) -> Self {
        self.file_order = file_order;
        self
    }

    /// Run every enabled pipeline and collect their outcomes.
    ///
    /// Disabled record types get a zeroed [`Outcome`].
    pub async fn run(
        &self,
        creds: &Credentials,
        input: &ResolvedInput,
        enabled: RecordTypes,
        options: &PipelineOptions,
    ) -> Results {
        let (events, users, groups) = tokio::join!(
            self.run_pipeline(creds, input, enabled, RecordType::Event, options),
            self.run_pipeline(creds, input, enabled, RecordType::User, options),
            self.run_pipeline(creds, input, enabled, RecordType::Group, options),
        );

        Results {
            events,
            users,
            groups,
        }
    }

    // ── Private implementation ────────────────────────────────────────────

    async fn run_pipeline(
        &self,
        creds: &Credentials,
        input: &ResolvedInput,
        enabled: RecordTypes,
        record_type: RecordType,
        options: &PipelineOptions,
    ) -> Outcome {
        if !enabled.is_enabled(record_type) {
            return Outcome::empty(record_type);
        }

        let config = PipelineConfig::new(record_type, options);
        self.log.detail(format!("starting {} pipeline", record_type));

        match input {
            ResolvedInput::File(path) => {
                self.import_once(creds, &ImportInput::File(path.clone()), &config)
                    .await
            }
            ResolvedInput::Bytes(bytes) => {
                self.import_once(creds, &ImportInput::Bytes(Arc::clone(bytes)), &config)
                    .await
            }
            ResolvedInput::Directory(files) => {
                let ordered = self.file_order.apply(record_type, files);
                match self.mode {
                    IngestMode::Merged => {
                        self.import_once(creds, &ImportInput::Files(ordered), &config)
                            .await
                    }
                    IngestMode::PerFile => self.import_per_file(creds, &ordered, &config).await,
                }
            }
        }
    }

    /// Import `files` one at a time, reporting the running success count
    /// after each, then fold the per-file outcomes.
    async fn import_per_file(
        &self,
        creds: &Credentials,
        files: &[PathBuf],
        config: &PipelineConfig,
    ) -> Outcome {
        if files.is_empty() {
            return Outcome::empty(config.record_type);
        }

        let mut outcomes = Vec::with_capacity(files.len());
        let mut running_success = 0u64;

        for (index, file) in files.iter().enumerate() {
            let outcome = self
                .import_once(creds, &ImportInput::File(file.clone()), config)
                .await;
            running_success += outcome.success;
            self.log
                .progress(config.record_type, index + 1, files.len(), running_success);
            outcomes.push(outcome);
        }

        summarize(&outcomes)
    }

    /// One importer call. Errors become a failed outcome instead of
    /// propagating to sibling pipelines.
    async fn import_once(
        &self,
        creds: &Credentials,
        input: &ImportInput,
        config: &PipelineConfig,
    ) -> Outcome {
        match self.importer.import(creds, input, config).await {
            Ok(outcome) => {
                if outcome.failed > 0 {
                    let failure = ConvertError::PipelineFailure {
                        record_type: config.record_type.to_string(),
                        failed: outcome.failed,
                    };
                    self.log.warn(failure.to_string());
                }
                outcome
            }
            Err(e) => {
                self.log
                    .warn(format!("{} pipeline could not run: {}", config.record_type, e));
                Outcome::from_failure(config.record_type, e.to_string())
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
