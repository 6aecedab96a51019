//! The client facade.
//!
//! A [`Client`] owns one configuration and at most one live adapter. The
//! connection state is explicit:
//!
//! ```text
//! Disconnected --connect / first operation--> Connected --disconnect--> Disconnected
//! ```
//!
//! A failed connect leaves the client `Disconnected`. Every generic
//! operation connects lazily, so a client can be used without calling
//! [`Client::connect`] first. For a unit of work that must not leak its
//! connection, use [`Client::scoped`] or [`Client::session`].

use crate::backends::{Adapter, Connector, KeyValueStore, NativeConnector};
use crate::config::{BackendType, ClientConfig, ClientMode, ConnectionOverrides};
use crate::connection_string;
use crate::models::{Filter, InsertOutcome, QueryOutcome, Record, SelectQuery, WriteSpec};
use crate::normalize::Normalizer;
use crate::{Error, Result};
use serde_json::Value;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Message carried by every remote-API failure.
pub const REMOTE_API_PENDING: &str = "API mode will be implemented in a future release";

/// Metrics label used for remote-API clients, which have no backend type.
const REMOTE_API_LABEL: &str = "remote_api";

/// Observable connection state of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No native connection is held.
    Disconnected,
    /// An adapter is bound to a live native connection.
    Connected,
}

/// Unified data-access client.
pub struct Client {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    adapter: Option<Box<dyn Adapter>>,
    normalizer: Normalizer,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client that connects through the native drivers.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, Arc::new(NativeConnector::new()))
    }

    /// Creates a client with a custom connector.
    #[must_use]
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let normalizer = Normalizer::new(config.flag_aliases.clone());
        Self {
            config,
            connector,
            adapter: None,
            normalizer,
        }
    }

    /// Creates a client from a connection string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the connection string is empty,
    /// malformed or names an unsupported backend.
    pub fn from_connection_string(uri: &str, overrides: ConnectionOverrides) -> Result<Self> {
        connection_string::parse(uri, overrides).map(Self::new)
    }

    /// Creates a remote-API client.
    ///
    /// Construction succeeds; every operation fails with
    /// [`Error::NotImplemented`].
    #[must_use]
    pub fn from_api_token(
        token: impl Into<String>,
        instance_id: impl Into<String>,
        api_url: Option<&str>,
    ) -> Self {
        Self::new(ClientConfig::remote_api(token, instance_id, api_url))
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the configured backend type (`None` in remote-API mode).
    #[must_use]
    pub const fn backend_type(&self) -> Option<BackendType> {
        self.config.backend_type
    }

    /// Returns the current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        if self.adapter.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Returns `true` while a native connection is held.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.adapter.is_some()
    }

    /// Establishes the native connection. No-op when already connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotImplemented`] in remote-API mode,
    /// [`Error::Connection`] if the driver cannot establish a session, and
    /// [`Error::FeatureNotEnabled`] if the backend was not compiled in.
    pub fn connect(&mut self) -> Result<()> {
        if self.adapter.is_some() {
            return Ok(());
        }
        if self.config.mode == ClientMode::RemoteApi {
            return Err(Error::NotImplemented(REMOTE_API_PENDING.to_string()));
        }

        let backend = self.backend_label();
        match self.connector.connect(&self.config) {
            Ok(adapter) => {
                metrics::counter!(
                    "polystore_connections_total",
                    "backend" => backend,
                    "status" => "success"
                )
                .increment(1);
                info!(
                    backend,
                    host = %self.config.host,
                    port = self.config.port,
                    database = %self.config.database,
                    "Connected"
                );
                self.adapter = Some(adapter);
                Ok(())
            },
            Err(e) => {
                metrics::counter!(
                    "polystore_connections_total",
                    "backend" => backend,
                    "status" => "error"
                )
                .increment(1);
                warn!(backend, error = %e, "Connect failed");
                Err(e)
            },
        }
    }

    /// Releases the native connection. No-op when not connected.
    ///
    /// The client is `Disconnected` afterwards even if closing fails.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if closing the connection fails.
    pub fn disconnect(&mut self) -> Result<()> {
        let Some(mut adapter) = self.adapter.take() else {
            return Ok(());
        };
        let result = adapter.close();
        info!(backend = self.backend_label(), "Disconnected");
        result
    }

    /// Returns every record of `source` matching `query`.
    ///
    /// | Backend | Behavior |
    /// |---------|----------|
    /// | Relational | `SELECT` with positional bind parameters |
    /// | Document | filter and limit applied; columns and ordering ignored |
    /// | Key-value | `source` is a key; one `{key, value}` record or none |
    ///
    /// # Errors
    ///
    /// Returns an error if connecting or the native call fails.
    #[instrument(skip(self, query), fields(operation = "select"))]
    pub fn select(&mut self, source: &str, query: SelectQuery) -> Result<Vec<Record>> {
        let records = self.run("select", |adapter| adapter.find_all(source, &query))?;
        Ok(self.normalizer.records(records))
    }

    /// Returns the first record of `source` matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] on the key-value backend, or an
    /// error if connecting or the native call fails.
    #[instrument(skip(self, filter), fields(operation = "find_one"))]
    pub fn find_one(&mut self, source: &str, filter: &Filter) -> Result<Option<Record>> {
        let record = self.run("find_one", |adapter| adapter.find_one(source, filter))?;
        Ok(record.map(|r| self.normalizer.record(r)))
    }

    /// Writes `data` into `source`.
    ///
    /// On the key-value backend the shape of `data` decides the write: a
    /// mapping with several fields becomes hash fields under `source`, a
    /// single field is stored under `"<source>:<field>"`, and any other
    /// value is stored under `source` itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Operation`] for an empty or unusable payload, or an
    /// error if connecting or the native call fails.
    #[instrument(skip(self, data), fields(operation = "insert"))]
    pub fn insert(&mut self, source: &str, data: impl Into<Value>) -> Result<InsertOutcome> {
        let data = data.into();
        self.run("insert", |adapter| adapter.insert(source, &data))
    }

    /// Applies `data` to every record of `source` matching `filter`.
    ///
    /// Returns the affected count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Operation`] for an empty payload (or an empty filter
    /// on a relational backend), or an error if connecting or the native
    /// call fails.
    #[instrument(skip(self, data, filter), fields(operation = "update"))]
    pub fn update(&mut self, source: &str, data: &WriteSpec, filter: &Filter) -> Result<u64> {
        self.run("update", |adapter| adapter.update(source, data, filter))
    }

    /// Removes records of `source` matching `filter`.
    ///
    /// A relational delete without a non-empty filter is rejected before
    /// any connection is made. A document delete without a filter removes
    /// nothing. On the key-value backend `source` is the key to remove.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Operation`] for a relational delete without a
    /// filter, or an error if connecting or the native call fails.
    #[instrument(skip(self, filter), fields(operation = "delete"))]
    pub fn delete(&mut self, source: &str, filter: Option<&Filter>) -> Result<u64> {
        let unfiltered = filter.is_none_or(Filter::is_empty);
        if unfiltered && self.backend_type().is_some_and(BackendType::is_relational) {
            let result = Err(Error::Operation("delete requires a filter".to_string()));
            record_operation(self.backend_label(), "delete", &result);
            return result;
        }
        self.run("delete", |adapter| adapter.delete(source, filter))
    }

    /// Removes one or more keys and returns how many existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] on non-key-value backends, or an
    /// error if connecting or the native call fails.
    pub fn delete_keys(&mut self, keys: &[&str]) -> Result<u64> {
        self.require_key_value()?;
        let backend = self.backend_label();
        self.run("delete", |adapter| {
            adapter
                .key_value()
                .ok_or_else(|| key_value_unavailable(backend))?
                .del(keys)
        })
    }

    /// Executes a raw statement on a relational backend.
    ///
    /// Statements starting with `SELECT` return their rows; anything else
    /// returns the affected count. Results are not normalized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] on non-relational backends, or an
    /// error if connecting or the native call fails.
    #[instrument(skip(self, sql, params), fields(operation = "query"))]
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutcome> {
        self.run("query", |adapter| adapter.query(sql, params))
    }

    /// Returns the key-value primitives of the bound store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] on non-key-value backends, or an
    /// error if connecting fails.
    pub fn key_value(&mut self) -> Result<&mut dyn KeyValueStore> {
        self.require_key_value()?;
        let backend = self.backend_label();
        self.adapter_mut()?
            .key_value()
            .ok_or_else(|| key_value_unavailable(backend))
    }

    /// Connects and returns a guard that disconnects when dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting fails; nothing is held in that case.
    pub fn session(&mut self) -> Result<Session<'_>> {
        self.connect()?;
        Ok(Session { client: self })
    }

    /// Runs `body` between a connect and an unconditional disconnect.
    ///
    /// When both the body and the disconnect fail, the body's error is
    /// returned and the disconnect error is logged.
    ///
    /// # Errors
    ///
    /// Returns the connect error, the body's error, or the disconnect error,
    /// in that order of precedence.
    pub fn scoped<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.connect()?;
        let outcome = body(self);
        let released = self.disconnect();
        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "Disconnect failed after scoped error");
                Err(e)
            },
        }
    }

    fn backend_label(&self) -> &'static str {
        self.config
            .backend_type
            .map_or(REMOTE_API_LABEL, BackendType::as_str)
    }

    fn require_key_value(&self) -> Result<()> {
        match self.config.backend_type {
            Some(backend) if !backend.is_key_value() => Err(key_value_unavailable(backend.as_str())),
            _ => Ok(()),
        }
    }

    fn adapter_mut(&mut self) -> Result<&mut Box<dyn Adapter>> {
        self.connect()?;
        self.adapter
            .as_mut()
            .ok_or_else(|| Error::NotImplemented(REMOTE_API_PENDING.to_string()))
    }

    fn run<T>(
        &mut self,
        operation: &'static str,
        call: impl FnOnce(&mut dyn Adapter) -> Result<T>,
    ) -> Result<T> {
        let backend = self.backend_label();
        debug!(backend, operation, "Dispatching");
        let result = self
            .adapter_mut()
            .and_then(|adapter| call(&mut **adapter));
        record_operation(backend, operation, &result);
        result
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            warn!(error = %e, "Disconnect failed while dropping client");
        }
    }
}

fn key_value_unavailable(backend: &str) -> Error {
    Error::Configuration(format!(
        "key-value primitives are not available on the {backend} backend"
    ))
}

fn record_operation<T>(backend: &'static str, operation: &'static str, result: &Result<T>) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::counter!(
        "polystore_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// A connected client that disconnects when dropped.
///
/// Dereferences to [`Client`], so every operation is available on it.
#[derive(Debug)]
pub struct Session<'a> {
    client: &'a mut Client,
}

impl Session<'_> {
    /// Disconnects now, reporting any close error.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if closing the connection fails.
    pub fn finish(self) -> Result<()> {
        // Drop runs afterwards and finds nothing to release.
        self.client.disconnect()
    }
}

impl Deref for Session<'_> {
    type Target = Client;

    fn deref(&self) -> &Client {
        self.client
    }
}

impl DerefMut for Session<'_> {
    fn deref_mut(&mut self) -> &mut Client {
        self.client
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.client.disconnect() {
            warn!(error = %e, "Disconnect failed while ending session");
        }
    }
}
