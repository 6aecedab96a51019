//! Backend type identification.

use crate::{Error, Result};
use std::fmt;

/// Supported storage backends.
///
/// Exactly one adapter exists per variant; selection happens once, at
/// connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    /// PostgreSQL.
    Postgres,
    /// MySQL.
    MySql,
    /// `MariaDB` (MySQL wire protocol).
    MariaDb,
    /// MongoDB document store.
    MongoDb,
    /// Redis key-value store.
    Redis,
}

impl BackendType {
    /// All backend types, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Postgres,
        Self::MySql,
        Self::MariaDb,
        Self::MongoDb,
        Self::Redis,
    ];

    /// Maps a URI scheme token to a backend type.
    ///
    /// Aliases: `postgresql`/`postgres`, `mongodb`/`mongo`.
    #[must_use]
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Some(Self::Postgres),
            "mysql" => Some(Self::MySql),
            "mariadb" => Some(Self::MariaDb),
            "mongodb" | "mongo" => Some(Self::MongoDb),
            "redis" => Some(Self::Redis),
            _ => None,
        }
    }

    /// Parses a backend name, accepting the same spellings as URI schemes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unrecognized names.
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_scheme(name.trim())
            .ok_or_else(|| Error::Configuration(format!("unsupported backend: {name}")))
    }

    /// Returns the conventional default port.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::MySql | Self::MariaDb => 3306,
            Self::MongoDb => 27017,
            Self::Redis => 6379,
        }
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::MySql => "mysql",
            Self::MariaDb => "mariadb",
            Self::MongoDb => "mongodb",
            Self::Redis => "redis",
        }
    }

    /// Returns true for SQL backends.
    #[must_use]
    pub const fn is_relational(self) -> bool {
        matches!(self, Self::Postgres | Self::MySql | Self::MariaDb)
    }

    /// Returns true for the document backend.
    #[must_use]
    pub const fn is_document(self) -> bool {
        matches!(self, Self::MongoDb)
    }

    /// Returns true for the key-value backend.
    #[must_use]
    pub const fn is_key_value(self) -> bool {
        matches!(self, Self::Redis)
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
