//! Core types and record mapping rules for the Amplitude → Mixpanel importer.
//!
//! Holds the destination data model, the error type, identity resolution,
//! the default-property table, the three record transforms, timestamp
//! parsing, the outcome summarizer and the CLI settings.

pub mod defaults;
pub mod error;
pub mod formatting;
pub mod identity;
pub mod models;
pub mod settings;
pub mod summary;
pub mod time_utils;
pub mod transforms;

pub use error::{ConvertError, Result};
