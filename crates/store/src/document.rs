//! Dotted-path access into JSON documents.
//!
//! Filters and partial updates address nested fields with dotted keys
//! (`data.file_cleaned.path`). These helpers are the only place that
//! syntax is interpreted.

use serde_json::Value;

/// Read the value at a dotted path, if every segment exists.
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write `value` at a dotted path, creating intermediate objects as
/// needed. Intermediate non-object values are replaced.
pub fn set_path(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Default::default());
        }
        let Value::Object(map) = current else { return };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_path_reads_nested_fields() {
        let doc = json!({"data": {"file_id": "f1", "file_cleaned": {"path": null}}});
        assert_eq!(get_path(&doc, "data.file_id"), Some(&json!("f1")));
        assert_eq!(get_path(&doc, "data.file_cleaned.path"), Some(&json!(null)));
        assert_eq!(get_path(&doc, "data.missing"), None);
        assert_eq!(get_path(&doc, "data.file_id.deeper"), None);
    }

    #[test]
    fn set_path_overwrites_leaf() {
        let mut doc = json!({"data": {"status": "added"}});
        set_path(&mut doc, "data.status", json!("in_queue"));
        assert_eq!(doc, json!({"data": {"status": "in_queue"}}));
    }

    #[test]
    fn set_path_creates_intermediate_objects() {
        let mut doc = json!({});
        set_path(&mut doc, "data.file_cleaned.path", json!("cleaned/f1.csv"));
        assert_eq!(
            doc,
            json!({"data": {"file_cleaned": {"path": "cleaned/f1.csv"}}})
        );
    }

    #[test]
    fn set_path_replaces_non_object_intermediate() {
        let mut doc = json!({"data": "scalar"});
        set_path(&mut doc, "data.uid", json!("x"));
        assert_eq!(doc, json!({"data": {"uid": "x"}}));
    }
}
