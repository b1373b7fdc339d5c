use clap::{ArgAction, Parser};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Result;
use crate::models::{Credentials, RecordTypes, Region};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Import Amplitude export files into Mixpanel
#[derive(Parser, Debug, Clone)]
#[command(
    name = "amplitude-to-mixpanel",
    about = "Import Amplitude export files into Mixpanel",
    version
)]
pub struct Settings {
    /// Directory of UNCOMPRESSED Amplitude export files
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// A single UNCOMPRESSED Amplitude export file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Mixpanel project token
    #[arg(long, env = "MP_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Mixpanel API secret
    #[arg(long, env = "MP_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Mixpanel project id
    #[arg(long, env = "MP_PROJECT")]
    pub project: String,

    /// Use strict mode
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub strict: bool,

    /// Data residency
    #[arg(long, default_value = "US", value_parser = ["US", "EU"])]
    pub region: String,

    /// Verbosely log to the console
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub verbose: bool,

    /// Write a results log file
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub logs: bool,

    /// Send events
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub events: bool,

    /// Send user profiles
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub users: bool,

    /// Send group profiles
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub groups: bool,

    /// Key to use for $user_id instead of `user_id`
    #[arg(long)]
    pub custom_user_id: Option<String>,

    /// Rename a property key (repeatable), e.g. `--alias old=new`
    #[arg(long = "alias", value_parser = parse_key_value)]
    pub aliases: Vec<(String, String)>,

    /// Add a property to every record (repeatable), e.g. `--tag source=backfill`
    #[arg(long = "tag", value_parser = parse_key_value)]
    pub tags: Vec<(String, String)>,

    /// Import a directory one file at a time instead of as one stream
    #[arg(long)]
    pub per_file: bool,

    /// Directory receiving one `<type>.jsonl` file per record type
    #[arg(long, default_value = "out")]
    pub out_dir: PathBuf,

    /// Drop exact duplicate records
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub dedupe: bool,

    /// Compress payloads sent to the importer
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub compress: bool,

    /// Order of event files in a directory, by file name
    #[arg(long, default_value = "desc", value_parser = ["asc", "desc"])]
    pub events_order: String,

    /// Order of user and group profile files in a directory, by file name
    #[arg(long, default_value = "asc", value_parser = ["asc", "desc"])]
    pub profiles_order: String,

    /// Directory for results logs
    #[arg(long)]
    pub logs_dir: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,
}

impl Settings {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            secret: self.secret.clone(),
            token: self.token.clone(),
            project: self.project.clone(),
        }
    }

    pub fn region(&self) -> Result<Region> {
        self.region.parse()
    }

    pub fn record_types(&self) -> RecordTypes {
        RecordTypes {
            events: self.events,
            users: self.users,
            groups: self.groups,
        }
    }

    /// Aliases as a map. Later repetitions of the same key win.
    pub fn alias_map(&self) -> BTreeMap<String, String> {
        self.aliases.iter().cloned().collect()
    }

    pub fn tag_map(&self) -> BTreeMap<String, String> {
        self.tags.iter().cloned().collect()
    }

    /// `--verbose` overrides the configured level.
    pub fn effective_log_level(&self) -> &str {
        if self.verbose {
            "DEBUG"
        } else {
            &self.log_level
        }
    }
}

/// Parse `key=value`. The value may itself contain `=`.
fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got \"{}\"", s)),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
