use serde_json::Value;

/// Strips any object key not named in `allowed` (spec 4.16: "fields not in
/// the tool's declared output schema are stripped"). Applied at the top
/// level of a tool response only — nested objects (e.g. `rows[]` from
/// `query_sql`) are controlled by the query itself, not by this allowlist,
/// since their shape is caller-determined rather than schema-fixed.
pub fn strip_unlisted_fields(value: &mut Value, allowed: &[&str]) {
    if let Value::Object(map) = value {
        map.retain(|key, _| allowed.contains(&key.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_keys_outside_the_allowlist() {
        let mut value = json!({"task_id": "abc", "internal_debug": "leaked"});
        strip_unlisted_fields(&mut value, &["task_id"]);
        assert_eq!(value, json!({"task_id": "abc"}));
    }

    #[test]
    fn leaves_listed_keys_and_non_objects_alone() {
        let mut value = json!("not an object");
        strip_unlisted_fields(&mut value, &["task_id"]);
        assert_eq!(value, json!("not an object"));
    }
}
