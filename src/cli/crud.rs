//! Data commands: `select`, `insert`, `update`, `delete` and `ping`.
//!
//! Every command runs inside one scoped acquisition and produces a JSON
//! value for the binary to print.
//!
//! # Usage
//!
//! ```bash
//! polystore --url postgresql://app@localhost/tasks select tasks --filter '{"done": false}' --limit 5
//! polystore --url mongodb://localhost/inventory insert items '{"sku": "A-1", "qty": 3}'
//! polystore --url redis://localhost/0 insert greeting hello
//! polystore --url mysql://app@localhost/tasks delete tasks --filter '{"id": 9}'
//! ```

use crate::client::Client;
use crate::config::BackendType;
use crate::models::{Filter, SelectQuery};
use crate::{Error, Result};
use clap::Subcommand;
use serde_json::{Value, json};

/// Data commands.
#[derive(Debug, Clone, Subcommand)]
pub enum CrudCommand {
    /// Read records from a table, collection or key.
    Select {
        /// Table, collection or key.
        source: String,

        /// Columns to return (comma-separated).
        #[arg(long)]
        columns: Option<String>,

        /// Equality filter as a JSON object.
        #[arg(short, long)]
        filter: Option<String>,

        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<u64>,

        /// Ordering expression.
        #[arg(long)]
        order_by: Option<String>,
    },

    /// Write one record (or value).
    Insert {
        /// Table, collection or key.
        source: String,

        /// JSON payload; text that is not JSON is stored as a string.
        data: String,
    },

    /// Update matching records.
    Update {
        /// Table, collection or key.
        source: String,

        /// Fields to write, as a JSON object.
        data: String,

        /// Equality filter as a JSON object.
        #[arg(short, long)]
        filter: String,
    },

    /// Delete matching records (or a key).
    Delete {
        /// Table, collection or key.
        source: String,

        /// Equality filter as a JSON object.
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Check that the backend accepts a connection.
    Ping,
}

impl CrudCommand {
    /// Runs the command in one scoped acquisition.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument is not valid JSON, or if connecting
    /// or the operation fails.
    pub fn execute(&self, client: &mut Client) -> Result<Value> {
        client.scoped(|db| self.run(db))
    }

    fn run(&self, db: &mut Client) -> Result<Value> {
        match self {
            Self::Select {
                source,
                columns,
                filter,
                limit,
                order_by,
            } => {
                let mut query = SelectQuery::new();
                if let Some(columns) = columns {
                    query = query.columns(split_columns(columns));
                }
                if let Some(filter) = filter {
                    query = query.filter(parse_mapping("--filter", filter)?);
                }
                if let Some(limit) = limit {
                    query = query.limit(*limit);
                }
                if let Some(order_by) = order_by {
                    query = query.order_by(order_by.as_str());
                }
                let records = db.select(source, query)?;
                Ok(Value::Array(records.into_iter().map(Value::Object).collect()))
            },
            Self::Insert { source, data } => {
                let outcome = db.insert(source, parse_payload(data))?;
                serde_json::to_value(outcome).map_err(|e| Error::driver("serialize_output", e))
            },
            Self::Update {
                source,
                data,
                filter,
            } => {
                let data = parse_mapping("data", data)?;
                let filter = parse_mapping("--filter", filter)?;
                let affected = db.update(source, &data, &filter)?;
                Ok(json!({ "affected": affected }))
            },
            Self::Delete { source, filter } => {
                let filter = filter
                    .as_deref()
                    .map(|f| parse_mapping("--filter", f))
                    .transpose()?;
                let affected = db.delete(source, filter.as_ref())?;
                Ok(json!({ "affected": affected }))
            },
            Self::Ping => Ok(json!({
                "backend": db.backend_type().map(BackendType::as_str),
                "connected": db.is_connected(),
            })),
        }
    }
}

fn split_columns(columns: &str) -> Vec<String> {
    columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_mapping(what: &str, text: &str) -> Result<Filter> {
    match serde_json::from_str(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::Configuration(format!("{what} must be a JSON object"))),
        Err(e) => Err(Error::Configuration(format!("invalid JSON for {what}: {e}"))),
    }
}

fn parse_payload(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
