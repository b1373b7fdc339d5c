//! Mapping rules from one source export record to destination records.
//!
//! Every transform is a plain function value of type [`TransformFn`]. A
//! [`Transform`] binds one of them to its [`TransformOptions`] so the
//! importer can apply it once per raw record without any captured state.

use std::fmt;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;

use crate::defaults::{is_populated, DEFAULT_PROPERTY_PAIRS};
use crate::identity::{resolve_identity, DEFAULT_ID_FIELD};
use crate::models::{Destination, EventRecord, GroupProfile, RawRecord, RecordType, UserProfile};
use crate::time_utils::TimestampProcessor;

/// Provenance tag stamped on every converted event.
pub const SOURCE_TAG: &str = "amplitude-to-mixpanel";

/// Source fields consumed by the event transform, besides the identity field.
const CONSUMED_FIELDS: &[&str] = &[
    "device_id",
    "event_time",
    "$insert_id",
    "user_properties",
    "group_properties",
    "global_user_properties",
    "event_properties",
    "groups",
    "data",
];

/// `(source field, destination property)` pairs copied into every event.
const CANONICAL_COPIES: &[(&str, &str)] = &[
    ("$insert_id", "$insert_id"),
    ("ip_address", "ip"),
    ("city", "$city"),
    ("region", "$region"),
    ("country", "mp_country_code"),
];

// ── Options ───────────────────────────────────────────────────────────────────

/// Settings shared by all transforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// Field to key identities on.
    pub custom_user_id: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            custom_user_id: DEFAULT_ID_FIELD.to_string(),
        }
    }
}

impl TransformOptions {
    pub fn new(custom_user_id: Option<&str>) -> Self {
        match custom_user_id {
            Some(field) if !field.is_empty() => Self {
                custom_user_id: field.to_string(),
            },
            _ => Self::default(),
        }
    }
}

// ── Transform ─────────────────────────────────────────────────────────────────

/// Signature shared by the three transforms. `None` means "not applicable".
pub type TransformFn = fn(RawRecord, &TransformOptions) -> Option<Destination>;

/// A transform bound to its options.
#[derive(Clone)]
pub struct Transform {
    record_type: RecordType,
    func: TransformFn,
    options: TransformOptions,
}

impl Transform {
    /// The transform producing records of `record_type`.
    pub fn for_record_type(record_type: RecordType, options: TransformOptions) -> Self {
        let func: TransformFn = match record_type {
            RecordType::Event => event_transform,
            RecordType::User => user_transform,
            RecordType::Group => group_transform,
        };
        Self {
            record_type,
            func,
            options,
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    pub fn apply(&self, raw: RawRecord) -> Option<Destination> {
        (self.func)(raw, &self.options)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("record_type", &self.record_type)
            .field("options", &self.options)
            .finish()
    }
}

// ── Event ─────────────────────────────────────────────────────────────────────

/// Map a source record to a destination event. Never returns `None`.
///
/// Precedence, lowest first: `event_properties`, `groups`, `user_properties`,
/// then the canonical fields. Default properties and leftover source fields
/// only fill keys that are still unset.
pub fn event_transform(mut raw: RawRecord, options: &TransformOptions) -> Option<Destination> {
    let id_field = options.custom_user_id.as_str();
    let user_id = resolve_identity(&raw, id_field);

    let event = raw.get("event_type").map(scalar_string).unwrap_or_default();
    let device_id = raw.get("device_id").map(scalar_string).unwrap_or_default();
    let time = match raw.get("event_time").and_then(TimestampProcessor::epoch_millis) {
        Some(ms) => ms,
        None => {
            debug!(event = %event, "event_time missing or unparseable; using current time");
            Utc::now().timestamp_millis()
        }
    };

    let mut properties = Map::new();
    for key in ["event_properties", "groups", "user_properties"] {
        if let Some(Value::Object(map)) = raw.get(key) {
            properties.extend(map.clone());
        }
    }

    properties.insert("$device_id".to_string(), Value::String(device_id));
    properties.insert("time".to_string(), Value::from(time));
    for (source, dest) in CANONICAL_COPIES {
        match raw.get(*source) {
            Some(Value::Null) | None => {}
            Some(value) => {
                properties.insert((*dest).to_string(), value.clone());
            }
        }
    }
    properties.insert("$source".to_string(), Value::String(SOURCE_TAG.to_string()));
    if let Some(id) = user_id {
        properties.insert("$user_id".to_string(), Value::String(id));
    }

    raw.remove(id_field);
    for field in CONSUMED_FIELDS {
        raw.remove(*field);
    }

    for (source, dest) in DEFAULT_PROPERTY_PAIRS {
        if is_populated(raw.get(*source)) {
            if let Some(value) = raw.remove(*source) {
                properties.entry(*dest).or_insert(value);
            }
        }
    }

    for (key, value) in raw {
        properties.entry(key).or_insert(value);
    }

    Some(Destination::Event(EventRecord { event, properties }))
}

// ── User ──────────────────────────────────────────────────────────────────────

/// Map a source record to a user-profile update.
///
/// `None` when the record has no user properties or no resolvable identity.
/// Default properties are always written into `$set`, replacing any value
/// already there.
pub fn user_transform(raw: RawRecord, options: &TransformOptions) -> Option<Destination> {
    let mut set = non_empty_object(&raw, "user_properties")?;
    let distinct_id = resolve_identity(&raw, &options.custom_user_id)?;

    for (source, dest) in DEFAULT_PROPERTY_PAIRS {
        if let Some(value) = raw.get(*source).filter(|v| is_populated(Some(*v))) {
            set.insert((*dest).to_string(), value.clone());
        }
    }

    Some(Destination::User(UserProfile {
        distinct_id,
        ip: raw.get("ip_address").cloned(),
        set,
    }))
}

// ── Group ─────────────────────────────────────────────────────────────────────

/// Map a source record to a group-profile update.
pub fn group_transform(raw: RawRecord, options: &TransformOptions) -> Option<Destination> {
    let set = non_empty_object(&raw, "group_properties")?;
    resolve_identity(&raw, &options.custom_user_id)?;

    Some(Destination::Group(GroupProfile {
        group_key: None,
        group_id: None,
        set,
    }))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn non_empty_object(raw: &RawRecord, key: &str) -> Option<Map<String, Value>> {
    match raw.get(key) {
        Some(Value::Object(map)) if !map.is_empty() => Some(map.clone()),
        _ => None,
    }
}

/// Strings as-is, other scalars as JSON text, `null` and containers as `""`.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn event_of(raw: Value) -> EventRecord {
        match event_transform(record(raw), &TransformOptions::default()) {
            Some(Destination::Event(e)) => e,
            other => panic!("expected event, got {:?}", other),
        }
    }

    fn user_of(raw: Value) -> Option<UserProfile> {
        match user_transform(record(raw), &TransformOptions::default()) {
            Some(Destination::User(u)) => Some(u),
            None => None,
            other => panic!("expected user, got {:?}", other),
        }
    }

    // ── event ─────────────────────────────────────────────────────────────

    #[test]
    fn test_event_canonical_fields() {
        let e = event_of(json!({
            "event_type": "login",
            "user_id": "u1",
            "device_id": "d1",
            "event_time": "2024-01-01T00:00:00Z",
            "$insert_id": "ins-1",
            "ip_address": "10.0.0.1",
            "city": "Paris",
            "region": "IDF",
            "country": "FR",
        }));

        assert_eq!(e.event, "login");
        let p = &e.properties;
        assert_eq!(p["$device_id"], "d1");
        assert_eq!(p["time"], 1_704_067_200_000i64);
        assert_eq!(p["$insert_id"], "ins-1");
        assert_eq!(p["ip"], "10.0.0.1");
        assert_eq!(p["$city"], "Paris");
        assert_eq!(p["$region"], "IDF");
        assert_eq!(p["mp_country_code"], "FR");
        assert_eq!(p["$source"], SOURCE_TAG);
        assert_eq!(p["$user_id"], "u1");
    }

    #[test]
    fn test_event_consumed_fields_are_not_passed_through() {
        let e = event_of(json!({
            "event_type": "x",
            "user_id": "u1",
            "device_id": "d1",
            "event_time": "2024-01-01T00:00:00Z",
            "global_user_properties": { "a": 1 },
            "group_properties": { "g": 1 },
            "data": { "blob": true },
            "city": "Oslo",
            "region": "Oslo",
        }));
        for key in [
            "user_id",
            "device_id",
            "event_time",
            "global_user_properties",
            "group_properties",
            "data",
            "city",
            "region",
        ] {
            assert!(!e.properties.contains_key(key), "{key} leaked");
        }
    }

    #[test]
    fn test_event_missing_device_id_is_empty_string() {
        let e = event_of(json!({ "event_type": "x" }));
        assert_eq!(e.properties["$device_id"], "");
    }

    #[test]
    fn test_event_missing_identity_has_no_user_id_key() {
        let e = event_of(json!({ "event_type": "x", "device_id": "d1" }));
        assert!(!e.properties.contains_key("$user_id"));
    }

    #[test]
    fn test_event_properties_beat_leftover_fields() {
        let e = event_of(json!({
            "event_type": "x",
            "event_properties": { "x": 1 },
            "x": 2,
        }));
        assert_eq!(e.properties["x"], 1);
    }

    #[test]
    fn test_event_merge_precedence() {
        let e = event_of(json!({
            "event_type": "x",
            "device_id": "real",
            "event_properties": { "k": "event", "$device_id": "spoof" },
            "groups": { "k": "groups", "company": "acme" },
            "user_properties": { "k": "user", "plan": "pro" },
        }));
        assert_eq!(e.properties["k"], "user");
        assert_eq!(e.properties["company"], "acme");
        assert_eq!(e.properties["plan"], "pro");
        assert_eq!(e.properties["$device_id"], "real");
    }

    #[test]
    fn test_event_defaults_fill_gaps() {
        let e = event_of(json!({
            "event_type": "x",
            "os_name": "iOS",
            "app_version": "2.1",
            "device_model": "iPhone",
        }));
        assert_eq!(e.properties["$os"], "iOS");
        assert_eq!(e.properties["$app_version_string"], "2.1");
        assert_eq!(e.properties["$model"], "iPhone");
        // os_name is consumed by the first pair.
        assert!(!e.properties.contains_key("$browser"));
        assert!(!e.properties.contains_key("os_name"));
    }

    #[test]
    fn test_event_leftover_fields_pass_through() {
        let e = event_of(json!({ "event_type": "x", "library": "http/1.0", "session_id": 9 }));
        assert_eq!(e.properties["library"], "http/1.0");
        assert_eq!(e.properties["session_id"], 9);
        assert_eq!(e.properties["event_type"], "x");
    }

    #[test]
    fn test_event_custom_id_field() {
        let options = TransformOptions::new(Some("email"));
        let raw = record(json!({
            "event_type": "x",
            "user_id": "internal",
            "user_properties": { "email": "a@b.c" },
        }));
        let Some(Destination::Event(e)) = event_transform(raw, &options) else {
            panic!("expected event");
        };
        assert_eq!(e.properties["$user_id"], "a@b.c");
    }

    #[test]
    fn test_event_unparseable_time_still_has_time() {
        let e = event_of(json!({ "event_type": "x", "event_time": "garbage" }));
        assert!(e.properties["time"].as_i64().is_some());
    }

    // ── user ──────────────────────────────────────────────────────────────

    #[test]
    fn test_user_none_without_properties() {
        assert!(user_of(json!({ "user_id": "u1" })).is_none());
        assert!(user_of(json!({ "user_id": "u1", "user_properties": {} })).is_none());
    }

    #[test]
    fn test_user_none_without_identity() {
        assert!(user_of(json!({ "device_id": "d1", "user_properties": { "plan": "pro" } })).is_none());
    }

    #[test]
    fn test_user_profile_shape() {
        let u = user_of(json!({
            "user_id": "u1",
            "ip_address": "not-an-ip",
            "user_properties": { "plan": "pro" },
            "os_name": "Android",
        }))
        .unwrap();
        assert_eq!(u.distinct_id, "u1");
        assert_eq!(u.ip, Some(json!("not-an-ip")));
        assert_eq!(u.set["plan"], "pro");
        assert_eq!(u.set["$os"], "Android");
        assert_eq!(u.set["$browser"], "Android");
    }

    // ── group ─────────────────────────────────────────────────────────────

    #[test]
    fn test_group_profile() {
        let raw = record(json!({ "user_id": "u1", "group_properties": { "tier": "gold" } }));
        let Some(Destination::Group(g)) = group_transform(raw, &TransformOptions::default()) else {
            panic!("expected group");
        };
        assert!(g.group_key.is_none());
        assert!(g.group_id.is_none());
        assert_eq!(g.set["tier"], "gold");
    }

    #[test]
    fn test_group_none_without_properties_or_identity() {
        let options = TransformOptions::default();
        assert!(group_transform(record(json!({ "user_id": "u1" })), &options).is_none());
        assert!(group_transform(
            record(json!({ "group_properties": { "tier": "gold" } })),
            &options
        )
        .is_none());
    }

    // ── Transform binding ─────────────────────────────────────────────────

    #[test]
    fn test_transform_for_record_type() {
        let raw = record(json!({ "user_id": "u1", "user_properties": { "plan": "pro" } }));
        let users = Transform::for_record_type(RecordType::User, TransformOptions::default());
        let out = users.apply(raw.clone()).unwrap();
        assert_eq!(out.record_type(), RecordType::User);

        let events = Transform::for_record_type(RecordType::Event, TransformOptions::default());
        assert_eq!(events.apply(raw).unwrap().record_type(), RecordType::Event);
    }

    #[test]
    fn test_transform_options_new() {
        assert_eq!(TransformOptions::new(None).custom_user_id, "user_id");
        assert_eq!(TransformOptions::new(Some("")).custom_user_id, "user_id");
        assert_eq!(TransformOptions::new(Some("email")).custom_user_id, "email");
    }

    // ── properties ────────────────────────────────────────────────────────

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            "[a-z]{0,6}".prop_map(Value::from),
        ]
    }

    fn raw_record() -> impl Strategy<Value = RawRecord> {
        let known = prop::sample::select(vec![
            "event_type",
            "user_id",
            "device_id",
            "event_time",
            "os_name",
            "city",
            "region",
            "country",
            "app_version",
            "extra",
        ]);
        (
            prop::collection::vec((known, scalar()), 0..10),
            prop::collection::vec(("[a-z]{1,4}", scalar()), 0..4),
        )
            .prop_map(|(fields, user_props)| {
                let mut raw = RawRecord::new();
                for (k, v) in fields {
                    raw.insert(k.to_string(), v);
                }
                if !user_props.is_empty() {
                    let props: Map<String, Value> = user_props.into_iter().collect();
                    raw.insert("user_properties".to_string(), Value::Object(props));
                }
                raw
            })
    }

    proptest! {
        #[test]
        fn event_is_always_produced_with_string_device_id(raw in raw_record()) {
            let out = event_transform(raw, &TransformOptions::default());
            let Some(Destination::Event(e)) = out else {
                return Err(TestCaseError::fail("event transform skipped a record"));
            };
            prop_assert!(e.properties["$device_id"].is_string());
            prop_assert!(e.properties["time"].is_i64());
        }

        #[test]
        fn user_none_without_subject_properties(mut raw in raw_record()) {
            raw.remove("user_properties");
            prop_assert!(user_transform(raw, &TransformOptions::default()).is_none());
        }

        #[test]
        fn user_none_without_identity(mut raw in raw_record()) {
            raw.remove("user_id");
            if let Some(Value::Object(props)) = raw.get_mut("user_properties") {
                props.remove("user_id");
            }
            prop_assert!(user_transform(raw, &TransformOptions::default()).is_none());
        }

        #[test]
        fn default_backfill_fills_events_and_overwrites_users(
            os in "[A-Za-z]{1,8}",
            preset in prop::option::of("[A-Za-z]{1,8}"),
        ) {
            let mut raw = record(json!({
                "event_type": "x",
                "user_id": "u1",
                "os_name": os.clone(),
            }));
            let mut props = Map::new();
            props.insert("plan".to_string(), json!("pro"));
            if let Some(p) = &preset {
                props.insert("$os".to_string(), json!(p));
            }
            raw.insert("user_properties".to_string(), Value::Object(props));

            let Some(Destination::Event(e)) = event_transform(raw.clone(), &TransformOptions::default()) else {
                return Err(TestCaseError::fail("no event"));
            };
            let Some(Destination::User(u)) = user_transform(raw, &TransformOptions::default()) else {
                return Err(TestCaseError::fail("no user"));
            };

            // Event: a pre-existing `$os` is kept.
            let expected_event_os = preset.clone().unwrap_or_else(|| os.clone());
            prop_assert_eq!(&e.properties["$os"], &json!(expected_event_os));
            // User: the default always wins.
            prop_assert_eq!(&u.set["$os"], &json!(os));
        }
    }
}
