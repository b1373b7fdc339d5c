//! Source default fields and the destination default properties they fill.

use serde_json::Value;

/// Ordered `(source field, destination property)` pairs.
///
/// `os_name` maps to both `$os` and `$browser`. In the event transform the
/// source field is removed after its first copy, so only `$os` is filled
/// there; the user transform does not remove and fills both.
pub const DEFAULT_PROPERTY_PAIRS: &[(&str, &str)] = &[
    ("app_version", "$app_version_string"),
    ("os_name", "$os"),
    ("os_name", "$browser"),
    ("os_version", "$os_version"),
    ("device_brand", "$brand"),
    ("device_manufacturer", "$manufacturer"),
    ("device_model", "$model"),
    ("region", "$region"),
    ("city", "$city"),
];

/// Whether a field counts as populated: present and not `null`, `false`,
/// `0` or `""`.
pub fn is_populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
