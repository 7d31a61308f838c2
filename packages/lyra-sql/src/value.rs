use rusqlite::types::ValueRef;

/// Converts a SQLite column value to JSON for the tool-protocol response.
/// Blobs aren't rendered in full (this is an exploration surface, not a
/// data export path) — just their length, so a result set stays
/// JSON-printable regardless of what a row happens to contain.
pub fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => serde_json::Value::String(format!("<blob, {} bytes>", bytes.len())),
    }
}
