//! Redis key-value store.
//!
//! Uses one synchronous connection. The logical database index comes from
//! the configured database name (`""` selects database 0).

#[cfg(any(feature = "redis", test))]
use crate::config::ClientConfig;
#[cfg(any(feature = "redis", test))]
use crate::connection_string::encode_component;
#[cfg(any(feature = "redis", test))]
use crate::{Error, Result};

/// Parses the logical database index.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the name is not a non-negative
/// integer.
#[cfg(any(feature = "redis", test))]
pub fn database_index(database: &str) -> Result<u32> {
    let database = database.trim();
    if database.is_empty() {
        return Ok(0);
    }
    database
        .parse()
        .map_err(|_| Error::Configuration(format!("invalid redis database index: {database}")))
}

/// Builds the driver URL from a configuration.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the database index is invalid.
#[cfg(any(feature = "redis", test))]
pub fn connection_url(config: &ClientConfig) -> Result<String> {
    let db = database_index(&config.database)?;
    let auth = match (config.username.as_str(), config.password()) {
        ("", "") => String::new(),
        ("", password) => format!(":{}@", encode_component(password)),
        (username, password) => format!(
            "{}:{}@",
            encode_component(username),
            encode_component(password)
        ),
    };
    Ok(format!("redis://{auth}{}:{}/{db}", config.host, config.port))
}

#[cfg(feature = "redis")]
mod implementation {
    use super::connection_url;
    use crate::backends::traits::KeyValueStore;
    use crate::config::{BackendType, ClientConfig};
    use crate::{Error, Result};
    use redis::{Client, Commands, Connection};
    use std::collections::BTreeMap;
    use tracing::info;

    /// Redis-backed key-value store.
    pub struct RedisStore {
        connection: Option<Connection>,
    }

    impl RedisStore {
        /// Opens a connection (authenticating and selecting the database).
        ///
        /// # Errors
        ///
        /// Returns [`Error::Connection`] if the server cannot be reached or
        /// rejects the handshake.
        pub fn connect(config: &ClientConfig) -> Result<Self> {
            let url = connection_url(config)?;
            let client =
                Client::open(url).map_err(|e| Error::connection(BackendType::Redis, e))?;
            let connection = client
                .get_connection()
                .map_err(|e| Error::connection(BackendType::Redis, e))?;

            info!(
                host = %config.host,
                port = config.port,
                database = %config.database,
                "Connected to Redis"
            );
            Ok(Self {
                connection: Some(connection),
            })
        }

        fn conn(&mut self) -> Result<&mut Connection> {
            self.connection
                .as_mut()
                .ok_or_else(|| Error::driver("redis", "connection closed"))
        }
    }

    impl KeyValueStore for RedisStore {
        fn get(&mut self, key: &str) -> Result<Option<String>> {
            self.conn()?
                .get(key)
                .map_err(|e| Error::driver("redis_get", e))
        }

        fn set(&mut self, key: &str, value: &str, expire_secs: Option<u64>) -> Result<()> {
            let conn = self.conn()?;
            let result: redis::RedisResult<()> = match expire_secs {
                Some(secs) => conn.set_ex(key, value, secs),
                None => conn.set(key, value),
            };
            result.map_err(|e| Error::driver("redis_set", e))
        }

        fn del(&mut self, keys: &[&str]) -> Result<u64> {
            if keys.is_empty() {
                return Ok(0);
            }
            self.conn()?
                .del(keys)
                .map_err(|e| Error::driver("redis_del", e))
        }

        fn exists(&mut self, key: &str) -> Result<bool> {
            self.conn()?
                .exists(key)
                .map_err(|e| Error::driver("redis_exists", e))
        }

        fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>> {
            self.conn()?
                .hget(key, field)
                .map_err(|e| Error::driver("redis_hget", e))
        }

        fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<u64> {
            self.conn()?
                .hset(key, field, value)
                .map_err(|e| Error::driver("redis_hset", e))
        }

        fn hgetall(&mut self, key: &str) -> Result<BTreeMap<String, String>> {
            self.conn()?
                .hgetall(key)
                .map_err(|e| Error::driver("redis_hgetall", e))
        }

        fn lpush(&mut self, key: &str, values: &[&str]) -> Result<u64> {
            let conn = self.conn()?;
            let result = if values.is_empty() {
                conn.llen(key)
            } else {
                conn.lpush(key, values)
            };
            result.map_err(|e| Error::driver("redis_lpush", e))
        }

        fn rpush(&mut self, key: &str, values: &[&str]) -> Result<u64> {
            let conn = self.conn()?;
            let result = if values.is_empty() {
                conn.llen(key)
            } else {
                conn.rpush(key, values)
            };
            result.map_err(|e| Error::driver("redis_rpush", e))
        }

        fn lrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
            let start = isize::try_from(start).map_err(|e| Error::driver("redis_lrange", e))?;
            let stop = isize::try_from(stop).map_err(|e| Error::driver("redis_lrange", e))?;
            self.conn()?
                .lrange(key, start, stop)
                .map_err(|e| Error::driver("redis_lrange", e))
        }

        fn close(&mut self) -> Result<()> {
            if self.connection.take().is_some() {
                info!("Closed Redis connection");
            }
            Ok(())
        }
    }
}

#[cfg(feature = "redis")]
pub use implementation::RedisStore;

#[cfg(not(feature = "redis"))]
mod stub {
    use crate::backends::traits::KeyValueStore;
    use crate::config::ClientConfig;
    use crate::{Error, Result};
    use std::collections::BTreeMap;

    /// Stub Redis store when the feature is not enabled.
    pub struct RedisStore {
        _private: (),
    }

    impl RedisStore {
        /// Connects to Redis (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn connect(_config: &ClientConfig) -> Result<Self> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }
    }

    impl KeyValueStore for RedisStore {
        fn get(&mut self, _key: &str) -> Result<Option<String>> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn set(&mut self, _key: &str, _value: &str, _expire_secs: Option<u64>) -> Result<()> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn del(&mut self, _keys: &[&str]) -> Result<u64> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn exists(&mut self, _key: &str) -> Result<bool> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn hget(&mut self, _key: &str, _field: &str) -> Result<Option<String>> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn hset(&mut self, _key: &str, _field: &str, _value: &str) -> Result<u64> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn hgetall(&mut self, _key: &str) -> Result<BTreeMap<String, String>> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn lpush(&mut self, _key: &str, _values: &[&str]) -> Result<u64> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn rpush(&mut self, _key: &str, _values: &[&str]) -> Result<u64> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn lrange(&mut self, _key: &str, _start: i64, _stop: i64) -> Result<Vec<String>> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }
    }
}

#[cfg(not(feature = "redis"))]
pub use stub::RedisStore;
