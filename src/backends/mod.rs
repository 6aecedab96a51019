//! Backend adapters.
//!
//! One adapter per storage paradigm, selected once at connect time:
//!
//! | Backend | Adapter | Driver | Feature |
//! |---------|---------|--------|---------|
//! | PostgreSQL | [`PostgresAdapter`] | `tokio-postgres` | `postgres` |
//! | MySQL / MariaDB | [`MySqlAdapter`] | `sqlx` | `mysql` |
//! | MongoDB | [`MongoAdapter`] | `mongodb` | `mongodb` |
//! | Redis | [`KeyValueAdapter`] over [`RedisStore`] | `redis` | `redis` |
//!
//! Backends whose feature is not compiled in fail to connect with
//! [`Error::FeatureNotEnabled`]. [`MemoryStore`] is always available for
//! programmatic use.

pub mod document;
pub mod key_value;
pub mod memory;
mod mongodb;
mod mysql;
mod postgres;
mod redis;
pub mod sql;
mod traits;

pub use key_value::{KeyValueAdapter, WritePlan};
pub use memory::MemoryStore;
pub use mongodb::MongoAdapter;
pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use redis::RedisStore;
pub use traits::{Adapter, Connector, KeyValueStore};

use crate::config::{BackendType, ClientConfig};
use crate::{Error, Result};

const POSTGRES_OPTIONS: &[&str] = &["application_name", "options", "sslmode"];
const MYSQL_OPTIONS: &[&str] = &["charset"];
const REDIS_OPTIONS: &[&str] = &[];

/// Connects through the compiled-in native drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeConnector;

impl NativeConnector {
    /// Creates the native connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Driver options each backend understands.
    ///
    /// `None` means every option is forwarded to the driver.
    #[must_use]
    pub const fn known_options(backend: BackendType) -> Option<&'static [&'static str]> {
        match backend {
            BackendType::Postgres => Some(POSTGRES_OPTIONS),
            BackendType::MySql | BackendType::MariaDb => Some(MYSQL_OPTIONS),
            BackendType::MongoDb => None,
            BackendType::Redis => Some(REDIS_OPTIONS),
        }
    }

    fn warn_unknown_options(backend: BackendType, config: &ClientConfig) {
        let Some(known) = Self::known_options(backend) else {
            return;
        };
        for key in config.extra_options.keys() {
            if !known.contains(&key.as_str()) {
                tracing::warn!(backend = %backend, option = %key, "Ignoring unsupported driver option");
            }
        }
    }
}

impl Connector for NativeConnector {
    fn connect(&self, config: &ClientConfig) -> Result<Box<dyn Adapter>> {
        let backend = config
            .backend_type
            .ok_or_else(|| Error::Configuration("backend type required".to_string()))?;
        Self::warn_unknown_options(backend, config);

        match backend {
            BackendType::Postgres => Ok(Box::new(PostgresAdapter::connect(config)?)),
            BackendType::MySql | BackendType::MariaDb => {
                Ok(Box::new(MySqlAdapter::connect(backend, config)?))
            },
            BackendType::MongoDb => Ok(Box::new(MongoAdapter::connect(config)?)),
            BackendType::Redis => Ok(Box::new(KeyValueAdapter::new(RedisStore::connect(
                config,
            )?))),
        }
    }
}
