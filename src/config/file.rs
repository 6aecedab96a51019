//! TOML configuration file support.
//!
//! ```toml
//! [connection]
//! url = "postgresql://app@localhost/tasks"
//!
//! [connection.options]
//! application_name = "polystore"
//!
//! [[flag_aliases]]
//! canonical = "done"
//! legacy = "is_done"
//! ```
//!
//! Direct fields (`backend`, `host`, `port`, ...) may be used instead of
//! `url`; when both are present they act as overrides on the parsed URL.

use super::{BackendType, ClientConfig, ConnectionOverrides, FlagAlias};
use crate::connection_string;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Connection section.
    pub connection: Option<ConfigFileConnection>,
    /// Boolean column aliases.
    #[serde(default)]
    pub flag_aliases: Vec<ConfigFileFlagAlias>,
}

/// Connection section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileConnection {
    /// Connection URI.
    pub url: Option<String>,
    /// Backend name (`postgresql`, `mysql`, `mariadb`, `mongodb`, `redis`).
    pub backend: Option<String>,
    /// Host.
    pub host: Option<String>,
    /// Port.
    pub port: Option<u16>,
    /// Username.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Database name.
    pub database: Option<String>,
    /// Driver options.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Flag alias entry in config file.
#[derive(Debug, Deserialize)]
pub struct ConfigFileFlagAlias {
    /// Canonical column name.
    pub canonical: String,
    /// Legacy column name.
    pub legacy: String,
}

impl ConfigFile {
    /// Parses a configuration file from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the TOML is malformed.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Configuration(format!("invalid config file: {e}")))
    }

    /// Loads a configuration file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::parse(&text)
    }

    /// Resolves the file into a client configuration.
    ///
    /// `url_override` (e.g. from the command line) replaces the file's URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if neither a URL nor a backend is
    /// configured, or if either is invalid.
    pub fn into_client_config(self, url_override: Option<&str>) -> Result<ClientConfig> {
        let connection = self.connection.unwrap_or_default();
        let flag_aliases: Vec<FlagAlias> = self
            .flag_aliases
            .into_iter()
            .map(|alias| FlagAlias::new(alias.canonical, alias.legacy))
            .collect();

        let backend = connection
            .backend
            .as_deref()
            .map(BackendType::parse)
            .transpose()?;

        let url = url_override.map(str::to_string).or(connection.url);
        let overrides = ConnectionOverrides {
            backend_type: backend,
            host: connection.host,
            port: connection.port,
            username: connection.username,
            password: connection.password,
            database: connection.database,
            extra_options: connection.options,
            flag_aliases,
        };

        match (url, backend) {
            (Some(url), _) => connection_string::parse(&url, overrides),
            (None, Some(backend)) => Ok(ClientConfig::direct(backend).build().with_overrides(overrides)),
            (None, None) => Err(Error::Configuration(
                "connection string required".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_url_file() {
        let file = ConfigFile::parse(
            r#"
            [connection]
            url = "redis://:pw@cache:6380/2"

            [[flag_aliases]]
            canonical = "done"
            legacy = "is_done"
            "#,
        )
        .unwrap();
        let config = file.into_client_config(None).unwrap();

        assert_eq!(config.backend_type, Some(BackendType::Redis));
        assert_eq!(config.host, "cache");
        assert_eq!(config.port, 6380);
        assert_eq!(config.database, "2");
        assert_eq!(config.password(), "pw");
        assert_eq!(config.flag_aliases.len(), 1);
    }

    #[test]
    fn test_direct_fields_without_url() {
        let file = ConfigFile::parse(
            r#"
            [connection]
            backend = "mariadb"
            host = "maria"
            username = "notes"
            database = "notes"

            [connection.options]
            charset = "utf8mb4"
            "#,
        )
        .unwrap();
        let config = file.into_client_config(None).unwrap();

        assert_eq!(config.backend_type, Some(BackendType::MariaDb));
        assert_eq!(config.port, 3306);
        assert_eq!(config.option("charset"), Some("utf8mb4"));
    }

    #[test]
    fn test_url_override_replaces_file_url() {
        let file = ConfigFile::parse(
            r#"
            [connection]
            url = "mysql://a@h/db"
            "#,
        )
        .unwrap();
        let config = file
            .into_client_config(Some("mongodb://m:27018/catalog"))
            .unwrap();
        assert_eq!(config.backend_type, Some(BackendType::MongoDb));
        assert_eq!(config.port, 27018);
    }

    #[test]
    fn test_empty_file_requires_connection() {
        let file = ConfigFile::parse("").unwrap();
        assert!(matches!(
            file.into_client_config(None),
            Err(Error::Configuration(msg)) if msg == "connection string required"
        ));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nurl = \"postgres://localhost/app\"").unwrap();
        let config = ConfigFile::load(file.path())
            .unwrap()
            .into_client_config(None)
            .unwrap();
        assert_eq!(config.backend_type, Some(BackendType::Postgres));
        assert_eq!(config.database, "app");
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            ConfigFile::parse("[connection"),
            Err(Error::Configuration(_))
        ));
    }
}
