//! Generic CRUD over a key-value store.
//!
//! The key-value backend has no tables and no filters: `source` is a literal
//! key. Writes follow a three-way shape rule captured by [`WritePlan`]:
//!
//! | Payload | Native writes |
//! |---------|---------------|
//! | Mapping with several fields | one hash-field set per field under `source` |
//! | Mapping with one field `f` | one value set under `"<source>:<f>"` |
//! | Any other value | one value set under `source` |
//!
//! The single-field key suffix is a naming convention callers rely on.

use super::traits::{Adapter, KeyValueStore};
use crate::config::BackendType;
use crate::models::{Filter, InsertOutcome, Record, SelectQuery, WriteSpec};
use crate::{Error, Result};
use serde_json::Value;
use tracing::{debug, warn};

/// Native writes derived from one generic insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritePlan {
    /// Hash-field entries under one key.
    Hash {
        /// Hash key.
        key: String,
        /// Field/value pairs in payload order.
        fields: Vec<(String, String)>,
    },
    /// A single-field mapping stored under a suffixed key.
    Field {
        /// `"<source>:<field>"`.
        key: String,
        /// Stringified value.
        value: String,
    },
    /// A plain value stored under `source`.
    Value {
        /// The source key.
        key: String,
        /// Stringified value.
        value: String,
    },
}

impl WritePlan {
    /// Decides how a payload is written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Operation`] for an empty mapping.
    pub fn for_insert(source: &str, data: &Value) -> Result<Self> {
        let Value::Object(map) = data else {
            return Ok(Self::Value {
                key: source.to_string(),
                value: stringify(data),
            });
        };

        match map.len() {
            0 => Err(Error::Operation(
                "insert requires at least one field".to_string(),
            )),
            1 => {
                let (field, value) = map
                    .iter()
                    .next()
                    .ok_or_else(|| Error::Operation("insert requires at least one field".to_string()))?;
                Ok(Self::Field {
                    key: format!("{source}:{field}"),
                    value: stringify(value),
                })
            },
            _ => Ok(Self::Hash {
                key: source.to_string(),
                fields: map
                    .iter()
                    .map(|(field, value)| (field.clone(), stringify(value)))
                    .collect(),
            }),
        }
    }

    /// Number of native set calls the plan issues.
    #[must_use]
    pub fn writes(&self) -> u64 {
        match self {
            Self::Hash { fields, .. } => fields.len() as u64,
            Self::Field { .. } | Self::Value { .. } => 1,
        }
    }

    /// Executes the plan against a store.
    ///
    /// # Errors
    ///
    /// Returns an error if any native write fails.
    pub fn apply(&self, store: &mut dyn KeyValueStore) -> Result<u64> {
        match self {
            Self::Hash { key, fields } => {
                for (field, value) in fields {
                    store.hset(key, field, value)?;
                }
            },
            Self::Field { key, value } | Self::Value { key, value } => {
                store.set(key, value, None)?;
            },
        }
        Ok(self.writes())
    }
}

/// Renders a value for storage: strings as-is, everything else as JSON.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Generic CRUD adapter over any [`KeyValueStore`].
pub struct KeyValueAdapter<S> {
    store: S,
}

impl<S: KeyValueStore> KeyValueAdapter<S> {
    /// Wraps a connected store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the wrapped store.
    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn write(&mut self, operation: &str, source: &str, data: &Value) -> Result<u64> {
        let plan = WritePlan::for_insert(source, data)?;
        debug!(operation, key = source, writes = plan.writes(), "Key-value write");
        plan.apply(&mut self.store)
    }
}

impl<S: KeyValueStore> Adapter for KeyValueAdapter<S> {
    fn backend_type(&self) -> BackendType {
        BackendType::Redis
    }

    fn find_all(&mut self, source: &str, query: &SelectQuery) -> Result<Vec<Record>> {
        if query.non_empty_filter().is_some() || query.columns.is_some() || query.order_by.is_some() {
            warn!(key = source, "Filter, columns and order_by are not applicable to key-value reads");
        }
        debug!(key = source, "Key-value get");

        let Some(value) = self.store.get(source)? else {
            return Ok(Vec::new());
        };
        let mut record = Record::new();
        record.insert("key".to_string(), Value::String(source.to_string()));
        record.insert("value".to_string(), Value::String(value));
        Ok(vec![record])
    }

    fn find_one(&mut self, _source: &str, _filter: &Filter) -> Result<Option<Record>> {
        Err(Error::Configuration(
            "find_one is not supported by the redis backend; use select with a key".to_string(),
        ))
    }

    fn insert(&mut self, source: &str, data: &Value) -> Result<InsertOutcome> {
        let writes = self.write("insert", source, data)?;
        Ok(InsertOutcome::Stored { writes })
    }

    fn update(&mut self, source: &str, data: &WriteSpec, filter: &Filter) -> Result<u64> {
        if !filter.is_empty() {
            warn!(key = source, "Filter is not applicable to key-value updates");
        }
        self.write("update", source, &Value::Object(data.clone()))
    }

    fn delete(&mut self, source: &str, filter: Option<&Filter>) -> Result<u64> {
        if filter.is_some_and(|f| !f.is_empty()) {
            warn!(key = source, "Filter is not applicable to key-value deletes");
        }
        debug!(key = source, "Key-value delete");
        self.store.del(&[source])
    }

    fn key_value(&mut self) -> Option<&mut dyn KeyValueStore> {
        Some(&mut self.store)
    }

    fn close(&mut self) -> Result<()> {
        self.store.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryStore;
    use serde_json::json;

    fn adapter() -> KeyValueAdapter<MemoryStore> {
        KeyValueAdapter::new(MemoryStore::new())
    }

    #[test]
    fn test_plan_multi_field_is_hash() {
        let plan = WritePlan::for_insert("user:1", &json!({ "a": "1", "b": 2 })).unwrap();
        assert_eq!(
            plan,
            WritePlan::Hash {
                key: "user:1".to_string(),
                fields: vec![
                    ("a".to_string(), "1".to_string()),
                    ("b".to_string(), "2".to_string()),
                ],
            }
        );
        assert_eq!(plan.writes(), 2);
    }

    #[test]
    fn test_plan_single_field_uses_suffixed_key() {
        let plan = WritePlan::for_insert("session", &json!({ "token": "abc" })).unwrap();
        assert_eq!(
            plan,
            WritePlan::Field {
                key: "session:token".to_string(),
                value: "abc".to_string(),
            }
        );
    }

    #[test]
    fn test_plan_plain_value() {
        let plan = WritePlan::for_insert("counter", &json!(42)).unwrap();
        assert_eq!(
            plan,
            WritePlan::Value {
                key: "counter".to_string(),
                value: "42".to_string(),
            }
        );

        let plan = WritePlan::for_insert("list", &json!([1, 2])).unwrap();
        assert!(matches!(plan, WritePlan::Value { value, .. } if value == "[1,2]"));
    }

    #[test]
    fn test_plan_empty_mapping_rejected() {
        assert!(matches!(
            WritePlan::for_insert("k", &json!({})),
            Err(Error::Operation(_))
        ));
    }

    #[test]
    fn test_insert_multi_field_readable_as_hash() {
        let mut adapter = adapter();
        let outcome = adapter.insert("K", &json!({ "a": "1", "b": "2" })).unwrap();
        assert_eq!(outcome, InsertOutcome::Stored { writes: 2 });

        let store = adapter.store_mut();
        assert_eq!(store.hget("K", "a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.hget("K", "b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_insert_single_field_readable_under_suffix() {
        let mut adapter = adapter();
        adapter.insert("K", &json!({ "a": "1" })).unwrap();

        assert_eq!(adapter.store_mut().get("K:a").unwrap().as_deref(), Some("1"));
        assert!(!adapter.store_mut().exists("K").unwrap());
    }

    #[test]
    fn test_select_returns_key_value_record() {
        let mut adapter = adapter();
        adapter.insert("greeting", &json!("hello")).unwrap();

        let rows = adapter.find_all("greeting", &SelectQuery::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(Value::Object(rows[0].clone()), json!({ "key": "greeting", "value": "hello" }));

        assert!(adapter.find_all("missing", &SelectQuery::new()).unwrap().is_empty());
    }

    #[test]
    fn test_update_is_insert() {
        let mut adapter = adapter();
        adapter.insert("cfg", &json!({ "mode": "a" })).unwrap();
        let mut data = WriteSpec::new();
        data.insert("mode".to_string(), json!("b"));

        let affected = adapter.update("cfg", &data, &Filter::new()).unwrap();
        assert_eq!(affected, 1);
        assert_eq!(adapter.store_mut().get("cfg:mode").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_delete_counts_removed_keys() {
        let mut adapter = adapter();
        adapter.insert("k", &json!("v")).unwrap();
        assert_eq!(adapter.delete("k", None).unwrap(), 1);
        assert_eq!(adapter.delete("k", None).unwrap(), 0);
    }

    #[test]
    fn test_find_one_not_supported() {
        assert!(matches!(
            adapter().find_one("k", &Filter::new()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_query_not_supported() {
        assert!(matches!(
            adapter().query("SELECT 1", &[]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_primitives_exposed() {
        let mut adapter = adapter();
        let store = adapter.key_value().unwrap();
        store.rpush("jobs", &["a", "b"]).unwrap();
        assert_eq!(store.lrange("jobs", 0, -1).unwrap(), vec!["a", "b"]);
    }
}
