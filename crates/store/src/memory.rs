//! In-memory [`DocumentStore`] backed by per-collection `Vec`s.
//!
//! Insertion order is preserved, which is what gives `find_one` its
//! first-match semantics. Used by tests and the simulator; a networked
//! backend would implement the same trait.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::adapter::{DocumentStore, StoreError};
use crate::document::{get_path, set_path};
use crate::filter::{Filter, FindOptions, Sort, Update};

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        let mut matches: Vec<Value> = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default();

        if let Some((field, order)) = &options.sort {
            matches.sort_by(|a, b| {
                let av = get_path(a, field).map(value_sort_key);
                let bv = get_path(b, field).map(value_sort_key);
                let ord = av.partial_cmp(&bv).unwrap_or(std::cmp::Ordering::Equal);
                match order {
                    Sort::Asc => ord,
                    Sort::Desc => ord.reverse(),
                }
            });
        }

        let iter = matches.into_iter().skip(options.skip);
        Ok(match options.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        })
    }

    async fn insert_one(&self, collection: &str, document: Value) -> Result<Value, StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some(doc) = docs.iter_mut().find(|d| filter.matches(d)) else {
            return Ok(false);
        };
        for (path, value) in update.entries() {
            set_path(doc, path, value.clone());
        }
        Ok(true)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter().position(|d| filter.matches(d)) {
            Some(pos) => {
                docs.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Comparable projection of a JSON value for sorting. Mixed-type fields
/// sort by type bucket first, which is stable enough for audit fields.
fn value_sort_key(v: &Value) -> (u8, f64, String) {
    match v {
        Value::Null => (0, 0.0, String::new()),
        Value::Bool(b) => (1, *b as u8 as f64, String::new()),
        Value::Number(n) => (2, n.as_f64().unwrap_or(0.0), String::new()),
        Value::String(s) => (3, 0.0, s.clone()),
        other => (4, 0.0, other.to_string()),
    }
}
