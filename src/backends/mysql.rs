//! MySQL and MariaDB adapter.
//!
//! Both backends speak the same protocol and share this adapter; only the
//! reported backend type differs.

#[cfg(feature = "mysql")]
mod implementation {
    use crate::backends::sql::{self, Dialect, Statement};
    use crate::backends::traits::Adapter;
    use crate::config::{BackendType, ClientConfig};
    use crate::models::{Filter, InsertOutcome, QueryOutcome, Record, SelectQuery, WriteSpec};
    use crate::{Error, Result};
    use serde_json::Value;
    use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
    use sqlx::query::Query;
    use sqlx::{Column, Connection, Row, TypeInfo, ValueRef};
    use tokio::runtime::{Builder, Runtime};
    use tracing::{debug, info};

    /// MySQL / MariaDB adapter.
    pub struct MySqlAdapter {
        backend: BackendType,
        connection: Option<MySqlConnection>,
        runtime: Runtime,
    }

    impl MySqlAdapter {
        /// Opens a session.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Connection`] if the session cannot be established.
        pub fn connect(backend: BackendType, config: &ClientConfig) -> Result<Self> {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| Error::connection(backend, e))?;

            let mut options = MySqlConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .username(&config.username)
                .password(config.password());
            if !config.database.is_empty() {
                options = options.database(&config.database);
            }
            if let Some(charset) = config.option("charset") {
                options = options.charset(charset);
            }

            let connection = runtime
                .block_on(MySqlConnection::connect_with(&options))
                .map_err(|e| Error::connection(backend, e))?;

            info!(
                backend = %backend,
                host = %config.host,
                port = config.port,
                database = %config.database,
                "Connected to MySQL"
            );
            Ok(Self {
                backend,
                connection: Some(connection),
                runtime,
            })
        }

        fn parts(&mut self) -> Result<(&Runtime, &mut MySqlConnection)> {
            match self.connection.as_mut() {
                Some(connection) => Ok((&self.runtime, connection)),
                None => Err(Error::driver("mysql", "connection closed")),
            }
        }

        fn fetch(&mut self, operation: &str, stmt: &Statement) -> Result<Vec<Record>> {
            debug!(sql = %stmt.sql, params = stmt.params.len(), "MySQL query");
            let (runtime, connection) = self.parts()?;
            let query = stmt.params.iter().fold(sqlx::query(&stmt.sql), bind);
            let rows = runtime
                .block_on(query.fetch_all(connection))
                .map_err(|e| Error::driver(operation, e))?;
            rows.iter().map(row_to_record).collect()
        }

        fn execute(&mut self, operation: &str, stmt: &Statement) -> Result<u64> {
            debug!(sql = %stmt.sql, params = stmt.params.len(), "MySQL execute");
            let (runtime, connection) = self.parts()?;
            let result = if stmt.params.is_empty() {
                runtime.block_on(sqlx::raw_sql(&stmt.sql).execute(connection))
            } else {
                let query = stmt.params.iter().fold(sqlx::query(&stmt.sql), bind);
                runtime.block_on(query.execute(connection))
            };
            result
                .map(|r| r.rows_affected())
                .map_err(|e| Error::driver(operation, e))
        }
    }

    /// Binds a JSON value with the closest native type.
    fn bind<'q>(
        query: Query<'q, MySql, MySqlArguments>,
        value: &Value,
    ) -> Query<'q, MySql, MySqlArguments> {
        match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(u) = n.as_u64() {
                    query.bind(u)
                } else {
                    query.bind(n.as_f64())
                }
            },
            Value::String(s) => query.bind(s.clone()),
            other => query.bind(sqlx::types::Json(other.clone())),
        }
    }

    fn decode<'r, T>(row: &'r MySqlRow, idx: usize) -> Result<Value>
    where
        T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql> + Into<Value>,
    {
        row.try_get_unchecked::<Option<T>, _>(idx)
            .map(|v| v.map_or(Value::Null, Into::into))
            .map_err(|e| Error::driver("mysql_decode", e))
    }

    fn column_value(row: &MySqlRow, idx: usize, type_name: &str) -> Result<Value> {
        let raw = row
            .try_get_raw(idx)
            .map_err(|e| Error::driver("mysql_decode", e))?;
        if raw.is_null() {
            return Ok(Value::Null);
        }

        match type_name {
            "BOOLEAN" => decode::<bool>(row, idx),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
                decode::<i64>(row, idx)
            },
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" | "BIT" => decode::<u64>(row, idx),
            "FLOAT" => row
                .try_get_unchecked::<Option<f32>, _>(idx)
                .map(|v| v.map_or(Value::Null, |f| Value::from(f64::from(f))))
                .map_err(|e| Error::driver("mysql_decode", e)),
            "DOUBLE" => decode::<f64>(row, idx),
            "JSON" => row
                .try_get_unchecked::<Option<sqlx::types::Json<Value>>, _>(idx)
                .map(|v| v.map_or(Value::Null, |j| j.0))
                .map_err(|e| Error::driver("mysql_decode", e)),
            "DATE" => row
                .try_get_unchecked::<Option<chrono::NaiveDate>, _>(idx)
                .map(|v| v.map_or(Value::Null, |d| Value::String(d.to_string())))
                .map_err(|e| Error::driver("mysql_decode", e)),
            "TIME" => row
                .try_get_unchecked::<Option<chrono::NaiveTime>, _>(idx)
                .map(|v| v.map_or(Value::Null, |t| Value::String(t.to_string())))
                .map_err(|e| Error::driver("mysql_decode", e)),
            "DATETIME" => row
                .try_get_unchecked::<Option<chrono::NaiveDateTime>, _>(idx)
                .map(|v| {
                    v.map_or(Value::Null, |t| {
                        Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
                    })
                })
                .map_err(|e| Error::driver("mysql_decode", e)),
            "TIMESTAMP" => row
                .try_get_unchecked::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
                .map(|v| v.map_or(Value::Null, |t| Value::String(t.to_rfc3339())))
                .map_err(|e| Error::driver("mysql_decode", e)),
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
                .try_get_unchecked::<Option<Vec<u8>>, _>(idx)
                .map(|v| v.map_or(Value::Null, |b| Value::String(hex::encode(b))))
                .map_err(|e| Error::driver("mysql_decode", e)),
            // DECIMAL, character and enum types all arrive as text.
            _ => decode::<String>(row, idx),
        }
    }

    fn row_to_record(row: &MySqlRow) -> Result<Record> {
        let mut record = Record::new();
        for (idx, column) in row.columns().iter().enumerate() {
            let value = column_value(row, idx, column.type_info().name())?;
            record.insert(column.name().to_string(), value);
        }
        Ok(record)
    }

    impl Adapter for MySqlAdapter {
        fn backend_type(&self) -> BackendType {
            self.backend
        }

        fn find_all(&mut self, source: &str, query: &SelectQuery) -> Result<Vec<Record>> {
            let stmt = sql::select(Dialect::MySql, source, query);
            self.fetch("select", &stmt)
        }

        fn insert(&mut self, source: &str, data: &Value) -> Result<InsertOutcome> {
            let stmt = sql::insert(Dialect::MySql, source, sql::as_row(data)?)?;
            let count = self.execute("insert", &stmt)?;
            Ok(InsertOutcome::RowsAffected { count })
        }

        fn update(&mut self, source: &str, data: &WriteSpec, filter: &Filter) -> Result<u64> {
            let stmt = sql::update(Dialect::MySql, source, data, filter)?;
            self.execute("update", &stmt)
        }

        fn delete(&mut self, source: &str, filter: Option<&Filter>) -> Result<u64> {
            let stmt = sql::delete(Dialect::MySql, source, filter)?;
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
            if let Some(connection) = self.connection.take() {
                self.runtime
                    .block_on(connection.close())
                    .map_err(|e| Error::driver("mysql_close", e))?;
                info!(backend = %self.backend, "Closed MySQL connection");
            }
            Ok(())
        }
    }
}

#[cfg(feature = "mysql")]
pub use implementation::MySqlAdapter;

#[cfg(not(feature = "mysql"))]
mod stub {
    use crate::backends::traits::Adapter;
    use crate::config::{BackendType, ClientConfig};
    use crate::models::{Filter, InsertOutcome, Record, SelectQuery, WriteSpec};
    use crate::{Error, Result};
    use serde_json::Value;

    /// Stub MySQL / MariaDB adapter when the feature is not enabled.
    pub struct MySqlAdapter {
        backend: BackendType,
    }

    impl MySqlAdapter {
        /// Opens a session (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn connect(_backend: BackendType, _config: &ClientConfig) -> Result<Self> {
            Err(Error::FeatureNotEnabled("mysql".to_string()))
        }
    }

    impl Adapter for MySqlAdapter {
        fn backend_type(&self) -> BackendType {
            self.backend
        }

        fn find_all(&mut self, _source: &str, _query: &SelectQuery) -> Result<Vec<Record>> {
            Err(Error::FeatureNotEnabled("mysql".to_string()))
        }

        fn insert(&mut self, _source: &str, _data: &Value) -> Result<InsertOutcome> {
            Err(Error::FeatureNotEnabled("mysql".to_string()))
        }

        fn update(&mut self, _source: &str, _data: &WriteSpec, _filter: &Filter) -> Result<u64> {
            Err(Error::FeatureNotEnabled("mysql".to_string()))
        }

        fn delete(&mut self, _source: &str, _filter: Option<&Filter>) -> Result<u64> {
            Err(Error::FeatureNotEnabled("mysql".to_string()))
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(not(feature = "mysql"))]
pub use stub::MySqlAdapter;
