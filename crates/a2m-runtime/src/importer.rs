//! The bulk-import seam.
//!
//! The orchestrator hands every enabled record type to an [`Importer`] along
//! with an immutable [`PipelineConfig`] carrying the bound transform. How the
//! importer batches, transmits and retries is its own business.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use a2m_core::error::Result;
use a2m_core::models::{Credentials, Outcome, RecordType, Region};
use a2m_core::transforms::{Transform, TransformOptions};
use async_trait::async_trait;

// ── Input ─────────────────────────────────────────────────────────────────────

/// What a single importer call reads.
#[derive(Debug, Clone)]
pub enum ImportInput {
    /// One file.
    File(PathBuf),
    /// Several files, read in the given order as one stream.
    Files(Vec<PathBuf>),
    /// A drained byte stream.
    Bytes(Arc<[u8]>),
}

/// Wire format of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFormat {
    /// One JSON object per line.
    #[default]
    Jsonl,
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Settings shared by every pipeline of one invocation.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub region: Region,
    pub strict: bool,
    pub verbose: bool,
    pub dedupe: bool,
    pub compress: bool,
    /// Property renames, `from → to`.
    pub aliases: BTreeMap<String, String>,
    /// Properties added to every record.
    pub tags: BTreeMap<String, String>,
    pub transform: TransformOptions,
}

/// Immutable per-record-type importer settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub record_type: RecordType,
    pub region: Region,
    pub strict: bool,
    pub verbose: bool,
    pub dedupe: bool,
    pub compress: bool,
    /// Report errors only, not every response.
    pub abridged: bool,
    pub remove_nulls: bool,
    /// Let the importer repair malformed profile payloads.
    pub fix_data: bool,
    pub force_stream: bool,
    pub stream_format: StreamFormat,
    /// Concurrency hint for the importer.
    pub workers: usize,
    pub aliases: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
    pub transform: Transform,
}

/// Worker hint passed to every pipeline.
pub const DEFAULT_WORKERS: usize = 25;

impl PipelineConfig {
    pub fn new(record_type: RecordType, options: &PipelineOptions) -> Self {
        Self {
            record_type,
            region: options.region,
            strict: options.strict,
            verbose: options.verbose,
            dedupe: options.dedupe,
            compress: options.compress,
            abridged: true,
            remove_nulls: true,
            fix_data: record_type != RecordType::Event,
            force_stream: true,
            stream_format: StreamFormat::Jsonl,
            workers: DEFAULT_WORKERS,
            aliases: options.aliases.clone(),
            tags: options.tags.clone(),
            transform: Transform::for_record_type(record_type, options.transform.clone()),
        }
    }
}

// ── Importer ──────────────────────────────────────────────────────────────────

/// A bulk-import capability.
///
/// Implementations must apply `config.transform` once per raw record, accept
/// newline-delimited JSON, and report counters in the returned [`Outcome`].
/// Per-record problems belong in the outcome; an `Err` means the pipeline
/// could not run at all.
#[async_trait]
pub trait Importer: Send + Sync {
    async fn import(
        &self,
        creds: &Credentials,
        input: &ImportInput,
        config: &PipelineConfig,
    ) -> Result<Outcome>;
}
