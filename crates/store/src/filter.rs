//! Filters, partial updates, and query options.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::document::get_path;

/// Equality filter over dotted-path keys. An empty filter matches every
/// document (the settings singleton is read with `Filter::all()`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter(BTreeMap<String, Value>);

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Single-key convenience constructor.
    pub fn by(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(path, value)
    }

    pub fn and(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(path.into(), value.into());
        self
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.0
            .iter()
            .all(|(path, expected)| get_path(doc, path) == Some(expected))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Partial update: a set of dotted-path writes applied to a matching
/// document. Unmentioned fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct Update(BTreeMap<String, Value>);

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(path.into(), value.into());
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sort direction for `find_many`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    Asc,
    Desc,
}

/// Options for `find_many`. Defaults: no sort (insertion order), no
/// limit, no skip.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<(String, Sort)>,
    pub limit: Option<usize>,
    pub skip: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::all().matches(&json!({"uid": "a"})));
        assert!(Filter::all().matches(&json!(null)));
    }

    #[test]
    fn dotted_filter_matches_nested_value() {
        let doc = json!({"data": {"file_id": "f1", "status": "added"}});
        assert!(Filter::by("data.file_id", "f1").matches(&doc));
        assert!(!Filter::by("data.file_id", "f2").matches(&doc));
        assert!(Filter::by("data.file_id", "f1")
            .and("data.status", "added")
            .matches(&doc));
        assert!(!Filter::by("data.file_id", "f1")
            .and("data.status", "done")
            .matches(&doc));
    }

    #[test]
    fn missing_path_never_matches() {
        let doc = json!({"data": {}});
        assert!(!Filter::by("data.file_id", "f1").matches(&doc));
        // Explicit null is a value and can be matched.
        let doc = json!({"data": {"file_id": null}});
        assert!(Filter::by("data.file_id", Value::Null).matches(&doc));
    }
}
