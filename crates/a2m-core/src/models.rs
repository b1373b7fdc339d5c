use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::ConvertError;

/// One source-export JSON object, read-only input to the transforms.
pub type RawRecord = Map<String, Value>;

/// The three destination record kinds, one pipeline each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    #[default]
    Event,
    User,
    Group,
}

impl RecordType {
    pub const ALL: [RecordType; 3] = [RecordType::Event, RecordType::User, RecordType::Group];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Event => "event",
            RecordType::User => "user",
            RecordType::Group => "group",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-record-type enable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTypes {
    pub events: bool,
    pub users: bool,
    pub groups: bool,
}

impl Default for RecordTypes {
    fn default() -> Self {
        Self {
            events: true,
            users: true,
            groups: false,
        }
    }
}

impl RecordTypes {
    pub fn is_enabled(&self, record_type: RecordType) -> bool {
        match record_type {
            RecordType::Event => self.events,
            RecordType::User => self.users,
            RecordType::Group => self.groups,
        }
    }
}

/// Data residency of the destination project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Region {
    #[default]
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "EU")]
    Eu,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Us => f.write_str("US"),
            Region::Eu => f.write_str("EU"),
        }
    }
}

impl FromStr for Region {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "US" => Ok(Region::Us),
            "EU" => Ok(Region::Eu),
            _ => Err(ConvertError::InvalidRegion(s.to_string())),
        }
    }
}

/// Destination project credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub secret: String,
    pub token: String,
    pub project: String,
}

// Keep secrets out of log output.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret", &"<redacted>")
            .field("token", &"<redacted>")
            .field("project", &self.project)
            .finish()
    }
}

// ── Destination records ───────────────────────────────────────────────────────

/// A destination event: a name plus a flat property map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event: String,
    pub properties: Map<String, Value>,
}

/// A destination user-profile update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "$distinct_id")]
    pub distinct_id: String,
    /// Copied verbatim from the source `ip_address`, never validated.
    #[serde(rename = "$ip", default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<Value>,
    #[serde(rename = "$set")]
    pub set: Map<String, Value>,
}

/// A destination group-profile update.
///
/// `group_key` and `group_id` are always `None`: no mapping from the source
/// `groups` structure to a destination key/id pair exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupProfile {
    #[serde(rename = "$group_key")]
    pub group_key: Option<String>,
    #[serde(rename = "$group_id")]
    pub group_id: Option<String>,
    #[serde(rename = "$set")]
    pub set: Map<String, Value>,
}

/// Any record a transform can produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Destination {
    Event(EventRecord),
    User(UserProfile),
    Group(GroupProfile),
}

impl Destination {
    pub fn record_type(&self) -> RecordType {
        match self {
            Destination::Event(_) => RecordType::Event,
            Destination::User(_) => RecordType::User,
            Destination::Group(_) => RecordType::Group,
        }
    }

    /// The property map a destination carries (`properties` or `$set`).
    pub fn properties_mut(&mut self) -> &mut Map<String, Value> {
        match self {
            Destination::Event(e) => &mut e.properties,
            Destination::User(u) => &mut u.set,
            Destination::Group(g) => &mut g.set,
        }
    }

    pub fn properties(&self) -> &Map<String, Value> {
        match self {
            Destination::Event(e) => &e.properties,
            Destination::User(u) => &u.set,
            Destination::Group(g) => &g.set,
        }
    }
}

// ── Outcomes ──────────────────────────────────────────────────────────────────

/// Aggregate statistics and error/response log for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub record_type: RecordType,
    /// Raw records read.
    pub total: u64,
    /// Records accepted by the destination.
    pub success: u64,
    /// Records that could not be parsed, validated or delivered.
    pub failed: u64,
    /// Records for which the transform produced nothing.
    pub empty: u64,
    /// Records dropped as exact duplicates.
    pub duplicates: u64,
    pub batches: u64,
    pub requests: u64,
    pub retries: u64,
    /// Wall-clock milliseconds.
    pub duration: u64,
    /// Events per second.
    pub eps: f64,
    /// Requests per second.
    pub rps: f64,
    pub errors: Vec<Value>,
    pub responses: Vec<Value>,
}

impl Outcome {
    /// The zeroed outcome for `record_type`.
    pub fn empty(record_type: RecordType) -> Self {
        Self {
            record_type,
            ..Default::default()
        }
    }

    /// An outcome recording that the pipeline could not run at all.
    pub fn from_failure(record_type: RecordType, message: impl Into<String>) -> Self {
        let mut outcome = Self::empty(record_type);
        outcome.errors.push(serde_json::json!({ "error": message.into() }));
        outcome
    }

    /// `true` when the pipeline finished without any failed record or error.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.errors.is_empty()
    }
}

/// The engine's sole output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub events: Outcome,
    pub users: Outcome,
    pub groups: Outcome,
}

impl Default for Results {
    fn default() -> Self {
        Self {
            events: Outcome::empty(RecordType::Event),
            users: Outcome::empty(RecordType::User),
            groups: Outcome::empty(RecordType::Group),
        }
    }
}

impl Results {
    pub fn get(&self, record_type: RecordType) -> &Outcome {
        match record_type {
            RecordType::Event => &self.events,
            RecordType::User => &self.users,
            RecordType::Group => &self.groups,
        }
    }

    pub fn set(&mut self, outcome: Outcome) {
        match outcome.record_type {
            RecordType::Event => self.events = outcome,
            RecordType::User => self.users = outcome,
            RecordType::Group => self.groups = outcome,
        }
    }
}
