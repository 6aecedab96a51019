//! Adapter, key-value primitive and connector traits.

use crate::config::{BackendType, ClientConfig};
use crate::models::{Filter, InsertOutcome, QueryOutcome, Record, SelectQuery, WriteSpec};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Generic CRUD capability set implemented once per backend.
///
/// An adapter owns exactly one native connection. Methods take `&mut self`:
/// an adapter is never shared between threads or clients.
pub trait Adapter: Send {
    /// Returns the backend this adapter talks to.
    fn backend_type(&self) -> BackendType;

    /// Returns every record matching the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the native call fails.
    fn find_all(&mut self, source: &str, query: &SelectQuery) -> Result<Vec<Record>>;

    /// Returns the first record matching the filter, if any.
    ///
    /// The default implementation is built on [`Adapter::find_all`].
    ///
    /// # Errors
    ///
    /// Returns an error if the native call fails, or
    /// [`Error::Configuration`] on backends without a filter concept.
    fn find_one(&mut self, source: &str, filter: &Filter) -> Result<Option<Record>> {
        let query = SelectQuery::new().filter(filter.clone()).limit(1);
        Ok(self.find_all(source, &query)?.into_iter().next())
    }

    /// Writes one record (or, for key-value stores, one value).
    ///
    /// # Errors
    ///
    /// Returns an error if the payload shape is unusable or the native call
    /// fails.
    fn insert(&mut self, source: &str, data: &Value) -> Result<InsertOutcome>;

    /// Applies a write to every record matching the filter.
    ///
    /// Returns the affected count.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is empty or the native call fails.
    fn update(&mut self, source: &str, data: &WriteSpec, filter: &Filter) -> Result<u64>;

    /// Removes matching records and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the call violates the backend's delete contract
    /// or the native call fails.
    fn delete(&mut self, source: &str, filter: Option<&Filter>) -> Result<u64>;

    /// Executes a raw statement (relational backends only).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] on non-relational backends.
    fn query(&mut self, _sql: &str, _params: &[Value]) -> Result<QueryOutcome> {
        Err(Error::Configuration(format!(
            "raw queries are not supported by the {} backend; use the document or key-value operations",
            self.backend_type()
        )))
    }

    /// Exposes key-value primitives when the backend is a key-value store.
    fn key_value(&mut self) -> Option<&mut dyn KeyValueStore> {
        None
    }

    /// Releases the native connection.
    ///
    /// Called exactly once per established connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver reports a failure while closing.
    fn close(&mut self) -> Result<()>;
}

/// Fine-grained key-value primitives.
///
/// The generic key-value operations are built from these; they are also
/// reachable directly through [`crate::Client::key_value`] for use cases
/// the generic contract cannot express.
pub trait KeyValueStore: Send {
    /// Gets a string value.
    ///
    /// # Errors
    ///
    /// Returns an error if the native call fails (including wrong type).
    fn get(&mut self, key: &str) -> Result<Option<String>>;

    /// Sets a string value, optionally expiring after `expire_secs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the native call fails.
    fn set(&mut self, key: &str, value: &str, expire_secs: Option<u64>) -> Result<()>;

    /// Deletes keys and returns how many existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the native call fails.
    fn del(&mut self, keys: &[&str]) -> Result<u64>;

    /// Returns whether a key exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the native call fails.
    fn exists(&mut self, key: &str) -> Result<bool>;

    /// Gets a hash field.
    ///
    /// # Errors
    ///
    /// Returns an error if the native call fails (including wrong type).
    fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>>;

    /// Sets a hash field; returns 1 if the field is new, 0 if overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the native call fails (including wrong type).
    fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<u64>;

    /// Gets every field of a hash, ordered by field name.
    ///
    /// # Errors
    ///
    /// Returns an error if the native call fails (including wrong type).
    fn hgetall(&mut self, key: &str) -> Result<BTreeMap<String, String>>;

    /// Pushes values onto the head of a list; returns the new length.
    ///
    /// # Errors
    ///
    /// Returns an error if the native call fails (including wrong type).
    fn lpush(&mut self, key: &str, values: &[&str]) -> Result<u64>;

    /// Pushes values onto the tail of a list; returns the new length.
    ///
    /// # Errors
    ///
    /// Returns an error if the native call fails (including wrong type).
    fn rpush(&mut self, key: &str, values: &[&str]) -> Result<u64>;

    /// Returns list elements between `start` and `stop` inclusive.
    ///
    /// Negative indexes count from the tail (`-1` is the last element).
    ///
    /// # Errors
    ///
    /// Returns an error if the native call fails (including wrong type).
    fn lrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;

    /// Releases the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver reports a failure while closing.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Establishes native connections and binds the matching adapter.
pub trait Connector: Send + Sync {
    /// Connects to the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the session cannot be established,
    /// or [`Error::Configuration`]/[`Error::FeatureNotEnabled`] if the
    /// backend is unusable.
    fn connect(&self, config: &ClientConfig) -> Result<Box<dyn Adapter>>;
}
