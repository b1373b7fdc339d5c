//! Local newline-delimited JSON importer.
//!
//! Reads export files or a drained stream line by line, applies the bound
//! transform, post-processes each record the way the remote importer would
//! (null removal, aliases, tags, dedupe, strict validation), and delivers
//! batches to a local sink: either memory or one `<type>.jsonl` file per
//! record type in an output directory.
//!
//! Bad lines are counted as failed records. An input that cannot be opened
//! or read is recorded in the outcome's errors and the remaining inputs are
//! still imported, so the counters always match what reached the sink.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use a2m_core::error::{ConvertError, Result};
use a2m_core::models::{Credentials, Destination, Outcome, RecordType};
use a2m_data::reader::decode_line;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::importer::{ImportInput, Importer, PipelineConfig};

/// Records per delivered batch.
pub const DEFAULT_BATCH_SIZE: usize = 2000;

enum Sink {
    Memory(Mutex<HashMap<RecordType, Vec<Value>>>),
    Directory(PathBuf),
}

/// An [`Importer`] that delivers converted records locally.
pub struct JsonlImporter {
    sink: Sink,
    batch_size: usize,
}

impl JsonlImporter {
    /// Keep converted records in memory; read them back with [`records`](Self::records).
    pub fn in_memory() -> Self {
        Self {
            sink: Sink::Memory(Mutex::new(HashMap::new())),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Append converted records to `<dir>/<record type>.jsonl`.
    pub fn to_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            sink: Sink::Directory(dir.into()),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Records delivered so far for `record_type`. Always empty for a
    /// directory sink.
    pub fn records(&self, record_type: RecordType) -> Vec<Value> {
        match &self.sink {
            Sink::Memory(store) => store
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(&record_type)
                .cloned()
                .unwrap_or_default(),
            Sink::Directory(_) => Vec::new(),
        }
    }

    /// Output file for `record_type` in a directory sink.
    pub fn output_path(dir: &Path, record_type: RecordType) -> PathBuf {
        dir.join(format!("{}.jsonl", record_type))
    }

    // ── Reading ───────────────────────────────────────────────────────────

    async fn read_file(&self, path: &Path, run: &mut PipelineRun<'_>) -> Result<()> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| ConvertError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        let label = path.display().to_string();
        self.read_lines(BufReader::new(file), &label, run).await
    }

    async fn read_lines<R>(
        &self,
        mut reader: R,
        label: &str,
        run: &mut PipelineRun<'_>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let mut buf = Vec::new();
        let mut line_no = 0u64;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            line_no += 1;

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(e) => {
                    run.outcome.total += 1;
                    run.fail(json!({ "source": label, "line": line_no, "error": e.to_string() }));
                    continue;
                }
            };
            let Some(decoded) = decode_line(line) else {
                continue;
            };
            run.outcome.total += 1;

            let raw = match decoded {
                Ok(raw) => raw,
                Err(e) => {
                    run.fail(json!({ "source": label, "line": line_no, "error": e.to_string() }));
                    continue;
                }
            };

            let Some(mut record) = run.config.transform.apply(raw) else {
                run.outcome.empty += 1;
                continue;
            };

            prepare_record(&mut record, run.config);

            if run.config.strict {
                if let Err(reason) = validate_record(&record) {
                    run.fail(json!({ "source": label, "line": line_no, "error": reason }));
                    continue;
                }
            }

            let value = serde_json::to_value(&record)?;
            if run.config.dedupe && !run.seen.insert(value.to_string()) {
                run.outcome.duplicates += 1;
                continue;
            }

            run.batch.push(value);
            if run.batch.len() >= self.batch_size {
                self.flush(run).await?;
            }
        }

        debug!(
            source = label,
            lines = line_no,
            record_type = %run.config.record_type,
            "finished reading input"
        );
        Ok(())
    }

    // ── Delivery ──────────────────────────────────────────────────────────

    async fn flush(&self, run: &mut PipelineRun<'_>) -> Result<()> {
        if run.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut run.batch);
        let count = batch.len() as u64;

        if let Err(e) = self.deliver(run.config.record_type, batch).await {
            run.outcome.failed += count;
            return Err(e);
        }

        run.outcome.batches += 1;
        run.outcome.requests += 1;
        run.outcome.success += count;
        if !run.config.abridged {
            run.outcome
                .responses
                .push(json!({ "code": 200, "num_records_imported": count, "status": "OK" }));
        }
        Ok(())
    }

    async fn deliver(&self, record_type: RecordType, batch: Vec<Value>) -> Result<()> {
        match &self.sink {
            Sink::Memory(store) => {
                store
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .entry(record_type)
                    .or_default()
                    .extend(batch);
            }
            Sink::Directory(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                let path = Self::output_path(dir, record_type);
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await
                    .map_err(|source| ConvertError::FileRead {
                        path: path.clone(),
                        source,
                    })?;
                let mut buf = String::new();
                for value in &batch {
                    buf.push_str(&value.to_string());
                    buf.push('\n');
                }
                file.write_all(buf.as_bytes()).await?;
                file.flush().await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Importer for JsonlImporter {
    async fn import(
        &self,
        creds: &Credentials,
        input: &ImportInput,
        config: &PipelineConfig,
    ) -> Result<Outcome> {
        debug!(
            project = %creds.project,
            region = %config.region,
            record_type = %config.record_type,
            "starting local import"
        );

        let started = Instant::now();
        let mut run = PipelineRun::new(config);

        match input {
            ImportInput::File(path) => {
                if let Err(e) = self.read_file(path, &mut run).await {
                    run.input_error(&path.display().to_string(), &e);
                }
            }
            ImportInput::Files(paths) => {
                for path in paths {
                    if let Err(e) = self.read_file(path, &mut run).await {
                        run.input_error(&path.display().to_string(), &e);
                    }
                }
            }
            ImportInput::Bytes(bytes) => {
                if let Err(e) = self.read_lines(&bytes[..], "stream", &mut run).await {
                    run.input_error("stream", &e);
                }
            }
        }
        if let Err(e) = self.flush(&mut run).await {
            run.input_error("sink", &e);
        }

        let elapsed = started.elapsed();
        let mut outcome = run.outcome;
        outcome.duration = elapsed.as_millis() as u64;
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            outcome.eps = outcome.success as f64 / secs;
            outcome.rps = outcome.requests as f64 / secs;
        }

        if outcome.failed > 0 {
            warn!(
                record_type = %outcome.record_type,
                failed = outcome.failed,
                "some records were rejected"
            );
        }
        Ok(outcome)
    }
}

// ── Per-call state ────────────────────────────────────────────────────────────

struct PipelineRun<'a> {
    config: &'a PipelineConfig,
    outcome: Outcome,
    batch: Vec<Value>,
    seen: HashSet<String>,
}

impl<'a> PipelineRun<'a> {
    fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            outcome: Outcome::empty(config.record_type),
            batch: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn fail(&mut self, detail: Value) {
        self.outcome.failed += 1;
        self.outcome.errors.push(detail);
    }

    /// A failure that stopped reading one input. Counters already gathered
    /// are kept.
    fn input_error(&mut self, source: &str, error: &ConvertError) {
        warn!(source, record_type = %self.config.record_type, "input abandoned: {}", error);
        self.outcome
            .errors
            .push(json!({ "source": source, "error": error.to_string() }));
    }
}

// ── Record post-processing ────────────────────────────────────────────────────

/// Apply null removal, aliases and tags to the record's property map.
fn prepare_record(record: &mut Destination, config: &PipelineConfig) {
    let props = record.properties_mut();

    if config.remove_nulls {
        props.retain(|_, v| !v.is_null());
    }

    for (from, to) in &config.aliases {
        if let Some(value) = props.remove(from) {
            props.insert(to.clone(), value);
        }
    }

    for (key, value) in &config.tags {
        props.insert(key.clone(), Value::String(value.clone()));
    }
}

/// Minimum shape the destination accepts in strict mode.
fn validate_record(record: &Destination) -> std::result::Result<(), String> {
    match record {
        Destination::Event(e) => {
            if e.event.is_empty() {
                return Err("event name is missing".to_string());
            }
            if !e.properties.get("time").map(Value::is_i64).unwrap_or(false) {
                return Err("event time is missing".to_string());
            }
            Ok(())
        }
        Destination::User(u) if u.distinct_id.is_empty() => {
            Err("profile distinct id is missing".to_string())
        }
        Destination::User(_) => Ok(()),
        Destination::Group(g) if g.set.is_empty() => Err("group profile is empty".to_string()),
        Destination::Group(_) => Ok(()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
