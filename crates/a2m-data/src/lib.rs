//! Input layer for the importer.
//!
//! Resolves the configured input into a file, a directory listing or a
//! stream, orders directory listings per record type, and decodes
//! newline-delimited JSON lines into raw records.

pub mod reader;
pub mod source;

pub use a2m_core as core;
