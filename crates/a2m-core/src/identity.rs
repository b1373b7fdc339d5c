use serde_json::Value;

use crate::models::RawRecord;

/// Field keyed on when no custom identity field is configured.
pub const DEFAULT_ID_FIELD: &str = "user_id";

/// Resolve the canonical subject identifier of `record`.
///
/// `user_properties[id_field]` is used first; a top-level `record[id_field]`
/// overrides it. Returns `None` when neither is present.
pub fn resolve_identity(record: &RawRecord, id_field: &str) -> Option<String> {
    let nested = record
        .get("user_properties")
        .and_then(|p| p.get(id_field))
        .and_then(identity_string);

    record.get(id_field).and_then(identity_string).or(nested)
}

/// Render an identity value. `null`, `""` and containers are not identities.
fn identity_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
