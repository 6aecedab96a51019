//! Client configuration.
//!
//! A [`ClientConfig`] is built in one of three mutually exclusive ways:
//!
//! | Path | Entry point |
//! |------|-------------|
//! | Direct credentials | [`ClientConfig::direct`] |
//! | Connection string | [`crate::connection_string::parse`] |
//! | Remote API token | [`ClientConfig::remote_api`] |
//!
//! The configuration is immutable once handed to a [`crate::Client`].

mod backend;
mod file;

pub use backend::BackendType;
pub use file::{ConfigFile, ConfigFileConnection, ConfigFileFlagAlias};

use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::fmt;

/// Default host used when none is given.
pub const DEFAULT_HOST: &str = "localhost";

/// Default base URL for the remote API transport.
pub const DEFAULT_API_URL: &str = "https://dbforge.dev/api";

/// How a client reaches its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientMode {
    /// Native driver connection to the backend.
    #[default]
    Direct,
    /// Centralized API transport (accepted, not implemented).
    RemoteApi,
}

/// Remote API credentials.
#[derive(Clone)]
pub struct RemoteApiConfig {
    /// API token.
    pub token: SecretString,
    /// Database instance identifier.
    pub instance_id: String,
    /// API base URL.
    pub api_url: String,
}

impl fmt::Debug for RemoteApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteApiConfig")
            .field("token", &"***REDACTED***")
            .field("instance_id", &self.instance_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// A boolean column stored under a legacy name.
///
/// Normalization coalesces `legacy` into `canonical`, preferring
/// `canonical` when both are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagAlias {
    /// Name exposed to callers.
    pub canonical: String,
    /// Alternate name found in older schemas.
    pub legacy: String,
}

impl FlagAlias {
    /// Creates a new alias pair.
    pub fn new(canonical: impl Into<String>, legacy: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            legacy: legacy.into(),
        }
    }
}

/// Full client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Transport mode.
    pub mode: ClientMode,
    /// Backend type; always set in direct mode.
    pub backend_type: Option<BackendType>,
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Username (empty when absent).
    pub username: String,
    /// Password (empty when absent).
    pub password: SecretString,
    /// Database name, or logical database index for Redis.
    pub database: String,
    /// Backend-specific driver options.
    pub extra_options: BTreeMap<String, String>,
    /// Boolean columns stored under alternate names.
    pub flag_aliases: Vec<FlagAlias>,
    /// Remote API credentials (remote-API mode only).
    pub remote_api: Option<RemoteApiConfig>,
}

impl ClientConfig {
    /// Starts a direct-credentials configuration for a backend.
    ///
    /// Host defaults to `localhost` and port to the backend's default port.
    #[must_use]
    pub fn direct(backend: BackendType) -> DirectConfigBuilder {
        DirectConfigBuilder::new(backend)
    }

    /// Builds a remote-API configuration.
    ///
    /// Construction succeeds; every operation on a client built from it
    /// fails with [`crate::Error::NotImplemented`].
    #[must_use]
    pub fn remote_api(
        token: impl Into<String>,
        instance_id: impl Into<String>,
        api_url: Option<&str>,
    ) -> Self {
        Self {
            mode: ClientMode::RemoteApi,
            backend_type: None,
            host: String::new(),
            port: 0,
            username: String::new(),
            password: SecretString::from(String::new()),
            database: String::new(),
            extra_options: BTreeMap::new(),
            flag_aliases: Vec::new(),
            remote_api: Some(RemoteApiConfig {
                token: SecretString::from(token.into()),
                instance_id: instance_id.into(),
                api_url: api_url.unwrap_or(DEFAULT_API_URL).to_string(),
            }),
        }
    }

    /// Returns the password in clear text for handing to a driver.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns an extra option by name.
    #[must_use]
    pub fn option(&self, key: &str) -> Option<&str> {
        self.extra_options.get(key).map(String::as_str)
    }

    /// Applies keyword overrides field by field.
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConnectionOverrides) -> Self {
        if let Some(backend) = overrides.backend_type {
            self.backend_type = Some(backend);
        }
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(username) = overrides.username {
            self.username = username;
        }
        if let Some(password) = overrides.password {
            self.password = SecretString::from(password);
        }
        if let Some(database) = overrides.database {
            self.database = database;
        }
        self.extra_options.extend(overrides.extra_options);
        self.flag_aliases.extend(overrides.flag_aliases);
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("mode", &self.mode)
            .field("backend_type", &self.backend_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***REDACTED***")
            .field("database", &self.database)
            .field("extra_options", &self.extra_options)
            .field("flag_aliases", &self.flag_aliases)
            .field("remote_api", &self.remote_api)
            .finish()
    }
}

/// Builder for direct-credentials configuration.
#[derive(Debug, Clone)]
pub struct DirectConfigBuilder {
    config: ClientConfig,
}

impl DirectConfigBuilder {
    fn new(backend: BackendType) -> Self {
        Self {
            config: ClientConfig {
                mode: ClientMode::Direct,
                backend_type: Some(backend),
                host: DEFAULT_HOST.to_string(),
                port: backend.default_port(),
                username: String::new(),
                password: SecretString::from(String::new()),
                database: String::new(),
                extra_options: BTreeMap::new(),
                flag_aliases: Vec::new(),
                remote_api: None,
            },
        }
    }

    /// Sets the host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    /// Sets the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = SecretString::from(password.into());
        self
    }

    /// Sets the database name (or Redis database index).
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = database.into();
        self
    }

    /// Adds a backend-specific driver option.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.extra_options.insert(key.into(), value.into());
        self
    }

    /// Registers a legacy name for a boolean column.
    #[must_use]
    pub fn flag_alias(mut self, canonical: impl Into<String>, legacy: impl Into<String>) -> Self {
        self.config.flag_aliases.push(FlagAlias::new(canonical, legacy));
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Keyword overrides applied on top of a parsed connection string.
///
/// Each `Some` field replaces the parsed value.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    /// Backend type override.
    pub backend_type: Option<BackendType>,
    /// Host override.
    pub host: Option<String>,
    /// Port override.
    pub port: Option<u16>,
    /// Username override.
    pub username: Option<String>,
    /// Password override.
    pub password: Option<String>,
    /// Database override.
    pub database: Option<String>,
    /// Extra options merged over parsed ones.
    pub extra_options: BTreeMap<String, String>,
    /// Additional flag aliases.
    pub flag_aliases: Vec<FlagAlias>,
}
