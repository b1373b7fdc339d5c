//! Newline-delimited JSON decoding.

use std::path::Path;

use a2m_core::error::Result;
use a2m_core::models::RawRecord;

/// File extensions holding one JSON record per line.
pub const RECORD_EXTENSIONS: &[&str] = &["json", "jsonl", "ndjson"];

/// `true` when `path` carries one of [`RECORD_EXTENSIONS`].
pub fn has_record_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            RECORD_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Decode one line into a raw record.
///
/// Blank lines yield `None`. Lines that are not a JSON object yield an error.
pub fn decode_line(line: &str) -> Option<Result<RawRecord>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str::<RawRecord>(trimmed).map_err(Into::into))
}
