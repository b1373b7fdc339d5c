//! Input source resolution and directory listing.
//!
//! A configured directory wins over a configured file, and either wins over
//! a raw stream. Directory entries are listed one level deep and filtered by
//! [`RECORD_EXTENSIONS`](crate::reader::RECORD_EXTENSIONS).

use std::path::{Path, PathBuf};
use std::str::FromStr;

use a2m_core::error::{ConvertError, Result};
use a2m_core::models::RecordType;
use tracing::{debug, warn};

use crate::reader::has_record_extension;

// ── Ordering ──────────────────────────────────────────────────────────────────

/// Order of a directory listing, compared by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = ConvertError;

    /// `asc` or `desc`, case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(ConvertError::Config(format!("unknown file order: {}", other))),
        }
    }
}

/// Per-record-type directory ordering.
///
/// Defaults to events newest-first and profiles oldest-first. This only
/// changes which errors surface first, never what gets imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOrder {
    pub events: SortOrder,
    pub profiles: SortOrder,
}

impl Default for FileOrder {
    fn default() -> Self {
        Self {
            events: SortOrder::Descending,
            profiles: SortOrder::Ascending,
        }
    }
}

impl FileOrder {
    /// The same order for every record type.
    pub fn uniform(order: SortOrder) -> Self {
        Self {
            events: order,
            profiles: order,
        }
    }

    pub fn for_record_type(&self, record_type: RecordType) -> SortOrder {
        match record_type {
            RecordType::Event => self.events,
            RecordType::User | RecordType::Group => self.profiles,
        }
    }

    /// `files` ordered for `record_type`.
    pub fn apply(&self, record_type: RecordType, files: &[PathBuf]) -> Vec<PathBuf> {
        let mut ordered = files.to_vec();
        ordered.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        if self.for_record_type(record_type) == SortOrder::Descending {
            ordered.reverse();
        }
        ordered
    }
}

// ── Source ────────────────────────────────────────────────────────────────────

/// The resolved input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// One regular file.
    File(PathBuf),
    /// A directory and its record files, ascending by file name.
    Directory { path: PathBuf, files: Vec<PathBuf> },
    /// The caller-supplied byte stream.
    Stream,
}

/// Resolve the configured input.
///
/// # Errors
/// * [`ConvertError::PathNotFound`] when a configured path does not exist.
/// * [`ConvertError::NoInput`] when nothing was configured.
pub fn resolve_source(dir: Option<&Path>, file: Option<&Path>, has_stream: bool) -> Result<Source> {
    let Some(path) = dir.or(file) else {
        return if has_stream {
            debug!("no path configured; reading from stream");
            Ok(Source::Stream)
        } else {
            Err(ConvertError::NoInput)
        };
    };

    let path = absolute(path)?;
    if !path.exists() {
        return Err(ConvertError::PathNotFound(path));
    }

    if path.is_file() {
        debug!("input is a single file: {}", path.display());
        return Ok(Source::File(path));
    }

    if path.is_dir() {
        let files = find_record_files(&path);
        if files.is_empty() {
            warn!("No record files found in {}", path.display());
        }
        debug!("input is a directory of {} files: {}", files.len(), path.display());
        return Ok(Source::Directory { path, files });
    }

    if has_stream {
        return Ok(Source::Stream);
    }
    Err(ConvertError::PathNotFound(path))
}

/// Immediate entries of `dir` with a record extension, ascending by name.
pub fn find_record_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && has_record_extension(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
