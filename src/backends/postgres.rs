//! PostgreSQL adapter.
//!
//! Holds one `tokio-postgres` session driven by a private current-thread
//! runtime; every call blocks until the server answers.
//!
//! Parameters are sent in text format so the server parses each value
//! against the column type it inferred for the placeholder. Result columns
//! are decoded by type:
//!
//! | Column type | Record value |
//! |-------------|--------------|
//! | `bool` | boolean |
//! | `int2`/`int4`/`int8`/`oid`, `float4`/`float8` | number |
//! | `numeric` | string (exact decimal) |
//! | `json`/`jsonb` | nested value |
//! | `timestamptz`, `timestamp`, `date`, `time` | ISO 8601 string |
//! | `uuid` | string |
//! | `bytea` | hex string |
//! | anything else | text |

#[cfg(any(feature = "postgres", test))]
use crate::config::ClientConfig;
#[cfg(any(feature = "postgres", test))]
use crate::{Error, Result};
#[cfg(any(feature = "postgres", test))]
use serde_json::Value;

/// Resolves the `sslmode` option.
///
/// Only `disable` and `prefer` are accepted; TLS is not compiled in, so
/// `prefer` falls back to a plain connection.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for any other mode.
#[cfg(any(feature = "postgres", test))]
pub fn check_ssl_mode(config: &ClientConfig) -> Result<bool> {
    match config.option("sslmode") {
        None | Some("prefer") => Ok(true),
        Some("disable") => Ok(false),
        Some(other) => Err(Error::Configuration(format!(
            "sslmode '{other}' is not supported; use 'disable' or 'prefer'"
        ))),
    }
}

/// Renders a binary `numeric` value as an exact decimal string.
///
/// Returns `None` if the buffer is malformed.
#[cfg(any(feature = "postgres", test))]
#[must_use]
pub fn decode_numeric(raw: &[u8]) -> Option<String> {
    let word = |i: usize| -> Option<u16> {
        Some(u16::from_be_bytes([*raw.get(i)?, *raw.get(i + 1)?]))
    };
    let ndigits = usize::from(word(0)?);
    let weight = i32::from(word(2)?.cast_signed());
    let sign = word(4)?;
    let dscale = usize::from(word(6)?);

    match sign {
        0xC000 => return Some("NaN".to_string()),
        0xD000 => return Some("Infinity".to_string()),
        0xF000 => return Some("-Infinity".to_string()),
        _ => {},
    }

    let digits = (0..ndigits)
        .map(|i| word(8 + i * 2))
        .collect::<Option<Vec<u16>>>()?;
    let digit = |index: i32| -> u16 {
        usize::try_from(index)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit(0).to_string());
        for index in 1..=weight {
            out.push_str(&format!("{:04}", digit(index)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::new();
        let mut index = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit(index)));
            index += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }
    Some(out)
}

/// Renders a JSON array as a PostgreSQL array literal, e.g. `{1,"a b",NULL}`.
///
/// Nested arrays become nested literals and objects are embedded as quoted
/// JSON text.
#[cfg(any(feature = "postgres", test))]
#[must_use]
pub fn array_literal(items: &[Value]) -> String {
    let elements: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => quote_element(s),
            Value::Array(inner) => array_literal(inner),
            Value::Object(_) => quote_element(&item.to_string()),
        })
        .collect();
    format!("{{{}}}", elements.join(","))
}

#[cfg(any(feature = "postgres", test))]
fn quote_element(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(feature = "postgres")]
mod implementation {
    use super::{array_literal, check_ssl_mode, decode_numeric};
    use crate::backends::sql::{self, Dialect, Statement};
    use crate::backends::traits::Adapter;
    use crate::config::{BackendType, ClientConfig};
    use crate::models::{Filter, InsertOutcome, QueryOutcome, Record, SelectQuery, WriteSpec};
    use crate::{Error, Result};
    use bytes::BytesMut;
    use serde_json::Value;
    use std::error::Error as StdError;
    use tokio::runtime::{Builder, Runtime};
    use tokio::task::JoinHandle;
    use tokio_postgres::config::SslMode;
    use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};
    use tokio_postgres::{Client, Config, NoTls, Row};
    use tracing::{debug, info, warn};

    type BoxError = Box<dyn StdError + Sync + Send>;

    /// A JSON value bound as a text-format parameter.
    ///
    /// Arrays bound to array-typed placeholders are sent as array literals;
    /// anywhere else they are sent as JSON text.
    #[derive(Debug)]
    struct TextParam<'a>(&'a Value);

    impl ToSql for TextParam<'_> {
        fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
            match self.0 {
                Value::Null => return Ok(IsNull::Yes),
                Value::String(s) => out.extend_from_slice(s.as_bytes()),
                Value::Array(items) if matches!(ty.kind(), Kind::Array(_)) => {
                    out.extend_from_slice(array_literal(items).as_bytes());
                },
                other => out.extend_from_slice(other.to_string().as_bytes()),
            }
            Ok(IsNull::No)
        }

        fn accepts(_ty: &Type) -> bool {
            true
        }

        fn encode_format(&self, _ty: &Type) -> tokio_postgres::types::Format {
            tokio_postgres::types::Format::Text
        }

        to_sql_checked!();
    }

    /// Server message and SQLSTATE when the server answered, otherwise the
    /// driver's error chain.
    fn driver_cause(e: &tokio_postgres::Error) -> String {
        if let Some(db) = e.as_db_error() {
            let mut cause = format!("{} (SQLSTATE {})", db.message(), db.code().code());
            if let Some(detail) = db.detail() {
                cause.push_str(": ");
                cause.push_str(detail);
            }
            return cause;
        }
        let mut cause = e.to_string();
        let mut source = e.source();
        while let Some(inner) = source {
            cause.push_str(": ");
            cause.push_str(&inner.to_string());
            source = inner.source();
        }
        cause
    }

    /// Exact decimal rendering of a `numeric` column.
    struct Numeric(String);

    impl<'a> FromSql<'a> for Numeric {
        fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
            decode_numeric(raw)
                .map(Self)
                .ok_or_else(|| "malformed numeric value".into())
        }

        fn accepts(ty: &Type) -> bool {
            *ty == Type::NUMERIC
        }
    }

    /// Raw column bytes for types without a dedicated decoder.
    struct Raw(String);

    impl<'a> FromSql<'a> for Raw {
        fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
            Ok(Self(
                String::from_utf8(raw.to_vec()).unwrap_or_else(|e| hex::encode(e.into_bytes())),
            ))
        }

        fn accepts(_ty: &Type) -> bool {
            true
        }
    }

    /// PostgreSQL adapter.
    pub struct PostgresAdapter {
        client: Option<Client>,
        connection: Option<JoinHandle<()>>,
        runtime: Runtime,
    }

    impl PostgresAdapter {
        /// Opens a session.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Configuration`] for an unsupported `sslmode`,
        /// or [`Error::Connection`] if the session cannot be established.
        pub fn connect(config: &ClientConfig) -> Result<Self> {
            let pg_config = Self::pg_config(config)?;
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| Error::connection(BackendType::Postgres, e))?;

            let (client, connection) = runtime
                .block_on(pg_config.connect(NoTls))
                .map_err(|e| Error::connection(BackendType::Postgres, driver_cause(&e)))?;
            let handle = runtime.spawn(async move {
                if let Err(e) = connection.await {
                    warn!(error = %e, "PostgreSQL connection ended with error");
                }
            });

            info!(
                host = %config.host,
                port = config.port,
                database = %config.database,
                "Connected to PostgreSQL"
            );
            Ok(Self {
                client: Some(client),
                connection: Some(handle),
                runtime,
            })
        }

        fn pg_config(config: &ClientConfig) -> Result<Config> {
            let mut pg = Config::new();
            pg.host(&config.host).port(config.port);

            let user = if config.username.is_empty() {
                std::env::var("USER").unwrap_or_default()
            } else {
                config.username.clone()
            };
            if !user.is_empty() {
                pg.user(&user);
            }
            if !config.password().is_empty() {
                pg.password(config.password());
            }
            if !config.database.is_empty() {
                pg.dbname(&config.database);
            }
            if let Some(name) = config.option("application_name") {
                pg.application_name(name);
            }
            if let Some(options) = config.option("options") {
                pg.options(options);
            }
            pg.ssl_mode(if check_ssl_mode(config)? {
                SslMode::Prefer
            } else {
                SslMode::Disable
            });
            Ok(pg)
        }

        fn client(&self) -> Result<&Client> {
            self.client
                .as_ref()
                .ok_or_else(|| Error::driver("postgres", "connection closed"))
        }

        fn fetch(&self, operation: &str, stmt: &Statement) -> Result<Vec<Record>> {
            debug!(sql = %stmt.sql, params = stmt.params.len(), "PostgreSQL query");
            let client = self.client()?;
            let params: Vec<TextParam<'_>> = stmt.params.iter().map(TextParam).collect();
            let refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

            let rows = self
                .runtime
                .block_on(client.query(stmt.sql.as_str(), &refs))
                .map_err(|e| Error::driver(operation, driver_cause(&e)))?;
            rows.iter().map(row_to_record).collect()
        }

        fn execute(&self, operation: &str, stmt: &Statement) -> Result<u64> {
            debug!(sql = %stmt.sql, params = stmt.params.len(), "PostgreSQL execute");
            let client = self.client()?;
            let params: Vec<TextParam<'_>> = stmt.params.iter().map(TextParam).collect();
            let refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

            self.runtime
                .block_on(client.execute(stmt.sql.as_str(), &refs))
                .map_err(|e| Error::driver(operation, driver_cause(&e)))
        }
    }

    fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>> {
        row.try_get::<_, Option<T>>(idx)
            .map_err(|e| Error::driver("postgres_decode", driver_cause(&e)))
    }

    fn column_value(row: &Row, idx: usize, ty: &Type) -> Result<Value> {
        let value = match *ty {
            Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
            Type::INT2 => get::<i16>(row, idx)?.map(Value::from),
            Type::INT4 => get::<i32>(row, idx)?.map(Value::from),
            Type::INT8 => get::<i64>(row, idx)?.map(Value::from),
            Type::OID => get::<u32>(row, idx)?.map(Value::from),
            Type::FLOAT4 => get::<f32>(row, idx)?.map(|v| Value::from(f64::from(v))),
            Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::from),
            Type::NUMERIC => get::<Numeric>(row, idx)?.map(|n| Value::String(n.0)),
            Type::JSON | Type::JSONB => get::<Value>(row, idx)?,
            Type::TIMESTAMPTZ => get::<chrono::DateTime<chrono::Utc>>(row, idx)?
                .map(|t| Value::String(t.to_rfc3339())),
            Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, idx)?
                .map(|t| Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
            Type::DATE => get::<chrono::NaiveDate>(row, idx)?.map(|d| Value::String(d.to_string())),
            Type::TIME => get::<chrono::NaiveTime>(row, idx)?.map(|t| Value::String(t.to_string())),
            Type::UUID => get::<uuid::Uuid>(row, idx)?.map(|u| Value::String(u.to_string())),
            Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(|b| Value::String(hex::encode(b))),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                get::<String>(row, idx)?.map(Value::String)
            },
            _ => get::<Raw>(row, idx)?.map(|r| Value::String(r.0)),
        };
        Ok(value.unwrap_or(Value::Null))
    }

    fn row_to_record(row: &Row) -> Result<Record> {
        let mut record = Record::new();
        for (idx, column) in row.columns().iter().enumerate() {
            record.insert(column.name().to_string(), column_value(row, idx, column.type_())?);
        }
        Ok(record)
    }

    impl Adapter for PostgresAdapter {
        fn backend_type(&self) -> BackendType {
            BackendType::Postgres
        }

        fn find_all(&mut self, source: &str, query: &SelectQuery) -> Result<Vec<Record>> {
            let stmt = sql::select(Dialect::Postgres, source, query);
            self.fetch("select", &stmt)
        }

        fn insert(&mut self, source: &str, data: &Value) -> Result<InsertOutcome> {
            let stmt = sql::insert(Dialect::Postgres, source, sql::as_row(data)?)?;
            let count = self.execute("insert", &stmt)?;
            Ok(InsertOutcome::RowsAffected { count })
        }

        fn update(&mut self, source: &str, data: &WriteSpec, filter: &Filter) -> Result<u64> {
            let stmt = sql::update(Dialect::Postgres, source, data, filter)?;
            self.execute("update", &stmt)
        }

        fn delete(&mut self, source: &str, filter: Option<&Filter>) -> Result<u64> {
            let stmt = sql::delete(Dialect::Postgres, source, filter)?;
            self.execute("delete", &stmt)
        }

        fn query(&mut self, sql_text: &str, params: &[Value]) -> Result<QueryOutcome> {
            let stmt = Statement {
                sql: sql_text.to_string(),
                params: params.to_vec(),
            };
            if sql::is_row_returning(sql_text) {
                self.fetch("query", &stmt).map(QueryOutcome::Rows)
            } else {
                self.execute("query", &stmt).map(QueryOutcome::Affected)
            }
        }

        fn close(&mut self) -> Result<()> {
            // Dropping the client makes the connection task send Terminate and finish.
            drop(self.client.take());
            if let Some(handle) = self.connection.take() {
                self.runtime
                    .block_on(handle)
                    .map_err(|e| Error::driver("postgres_close", e))?;
                info!("Closed PostgreSQL connection");
            }
            Ok(())
        }
    }
}

#[cfg(feature = "postgres")]
pub use implementation::PostgresAdapter;

#[cfg(not(feature = "postgres"))]
mod stub {
    use crate::backends::traits::Adapter;
    use crate::config::{BackendType, ClientConfig};
    use crate::models::{Filter, InsertOutcome, Record, SelectQuery, WriteSpec};
    use crate::{Error, Result};
    use serde_json::Value;

    /// Stub PostgreSQL adapter when the feature is not enabled.
    pub struct PostgresAdapter {
        _private: (),
    }

    impl PostgresAdapter {
        /// Opens a session (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn connect(_config: &ClientConfig) -> Result<Self> {
            Err(Error::FeatureNotEnabled("postgres".to_string()))
        }
    }

    impl Adapter for PostgresAdapter {
        fn backend_type(&self) -> BackendType {
            BackendType::Postgres
        }

        fn find_all(&mut self, _source: &str, _query: &SelectQuery) -> Result<Vec<Record>> {
            Err(Error::FeatureNotEnabled("postgres".to_string()))
        }

        fn insert(&mut self, _source: &str, _data: &Value) -> Result<InsertOutcome> {
            Err(Error::FeatureNotEnabled("postgres".to_string()))
        }

        fn update(&mut self, _source: &str, _data: &WriteSpec, _filter: &Filter) -> Result<u64> {
            Err(Error::FeatureNotEnabled("postgres".to_string()))
        }

        fn delete(&mut self, _source: &str, _filter: Option<&Filter>) -> Result<u64> {
            Err(Error::FeatureNotEnabled("postgres".to_string()))
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(not(feature = "postgres"))]
pub use stub::PostgresAdapter;
