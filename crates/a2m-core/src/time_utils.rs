use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

/// Epoch values above this are taken as milliseconds rather than seconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Parses `event_time` values as found in export files.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Parse `value` into a UTC [`DateTime`].
    ///
    /// Handles:
    /// * JSON string → RFC 3339 (including `Z`-suffix) or a naive date-time,
    ///   which export files write in UTC.
    /// * JSON number → Unix epoch in seconds or milliseconds.
    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => Self::parse_str(s.trim()),
            Value::Number(n) => {
                if let Some(raw) = n.as_i64() {
                    Self::from_epoch_millis(if raw.abs() > MILLIS_THRESHOLD {
                        raw
                    } else {
                        raw.saturating_mul(1000)
                    })
                } else if let Some(f) = n.as_f64() {
                    let millis = if f.abs() > MILLIS_THRESHOLD as f64 {
                        f
                    } else {
                        f * 1000.0
                    };
                    Self::from_epoch_millis(millis.round() as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Parse `value` straight to UTC epoch milliseconds.
    pub fn epoch_millis(value: &Value) -> Option<i64> {
        Self::parse(value).map(|dt| dt.timestamp_millis())
    }

    fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(millis).single()
    }

    fn parse_str(s: &str) -> Option<DateTime<Utc>> {
        if s.is_empty() {
            return None;
        }

        if let Ok(n) = s.parse::<i64>() {
            return Self::parse(&Value::from(n));
        }

        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }

        const FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
        ];

        for fmt in FORMATS {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&naive));
        }

        warn!(
            "TimestampProcessor: could not parse timestamp string \"{}\"",
            s
        );
        None
    }
}
