//! Parameterized statement builder shared by the relational adapters.
//!
//! Filters become `col = <placeholder>` terms joined with `AND`; values are
//! never spliced into the SQL text. Table and column names are emitted
//! verbatim.

use crate::models::{Filter, Record, SelectQuery, WriteSpec};
use crate::{Error, Result};
use serde_json::Value;

/// Placeholder flavor of a relational backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Numbered placeholders (`$1`, `$2`, ...).
    Postgres,
    /// Anonymous placeholders (`?`).
    MySql,
}

impl Dialect {
    /// Returns the placeholder for the 1-based parameter `index`.
    #[must_use]
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::MySql => "?".to_string(),
        }
    }
}

/// A SQL statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Statement text.
    pub sql: String,
    /// Values bound in placeholder order.
    pub params: Vec<Value>,
}

/// Builds a `SELECT`.
///
/// `limit` of zero is treated as "no limit".
#[must_use]
pub fn select(dialect: Dialect, table: &str, query: &SelectQuery) -> Statement {
    let columns = query
        .columns
        .as_ref()
        .filter(|c| !c.is_empty())
        .map_or_else(|| "*".to_string(), |c| c.join(", "));

    let mut sql = format!("SELECT {columns} FROM {table}");
    let mut params = Vec::new();

    if let Some(filter) = query.non_empty_filter() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions(dialect, filter, &mut params));
    }
    if let Some(order_by) = query.order_by.as_deref().filter(|o| !o.trim().is_empty()) {
        sql.push_str(&format!(" ORDER BY {order_by}"));
    }
    if let Some(limit) = query.limit.filter(|l| *l > 0) {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    Statement { sql, params }
}

/// Builds an `INSERT` of one row.
///
/// # Errors
///
/// Returns [`Error::Operation`] if `data` is empty.
pub fn insert(dialect: Dialect, table: &str, data: &Record) -> Result<Statement> {
    if data.is_empty() {
        return Err(Error::Operation("insert requires at least one column".to_string()));
    }

    let columns: Vec<&str> = data.keys().map(String::as_str).collect();
    let placeholders: Vec<String> = (1..=data.len()).map(|i| dialect.placeholder(i)).collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );

    Ok(Statement {
        sql,
        params: data.values().cloned().collect(),
    })
}

/// Builds an `UPDATE`; `SET` values are bound before `WHERE` values.
///
/// # Errors
///
/// Returns [`Error::Operation`] if `data` or `filter` is empty.
pub fn update(dialect: Dialect, table: &str, data: &WriteSpec, filter: &Filter) -> Result<Statement> {
    if data.is_empty() {
        return Err(Error::Operation("update requires at least one column".to_string()));
    }
    if filter.is_empty() {
        return Err(Error::Operation("update requires a filter".to_string()));
    }

    let mut params = Vec::with_capacity(data.len() + filter.len());
    let assignments = data
        .iter()
        .map(|(column, value)| {
            params.push(value.clone());
            format!("{column} = {}", dialect.placeholder(params.len()))
        })
        .collect::<Vec<_>>()
        .join(", ");
    let where_clause = conditions(dialect, filter, &mut params);

    Ok(Statement {
        sql: format!("UPDATE {table} SET {assignments} WHERE {where_clause}"),
        params,
    })
}

/// Builds a `DELETE`.
///
/// # Errors
///
/// Returns [`Error::Operation`] ("delete requires a filter") when the filter
/// is absent or empty.
pub fn delete(dialect: Dialect, table: &str, filter: Option<&Filter>) -> Result<Statement> {
    let filter = filter
        .filter(|f| !f.is_empty())
        .ok_or_else(|| Error::Operation("delete requires a filter".to_string()))?;

    let mut params = Vec::with_capacity(filter.len());
    let where_clause = conditions(dialect, filter, &mut params);

    Ok(Statement {
        sql: format!("DELETE FROM {table} WHERE {where_clause}"),
        params,
    })
}

/// Requires an insert payload to be a column mapping.
///
/// # Errors
///
/// Returns [`Error::Operation`] for any other value.
pub fn as_row(data: &Value) -> Result<&Record> {
    data.as_object().ok_or_else(|| {
        Error::Operation("insert requires a mapping of column to value".to_string())
    })
}

/// Returns true if the statement produces rows.
#[must_use]
pub fn is_row_returning(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
}

/// Renders `a = ? AND b = ?`, appending values to `params`.
fn conditions(dialect: Dialect, filter: &Filter, params: &mut Vec<Value>) -> String {
    filter
        .iter()
        .map(|(column, value)| {
            params.push(value.clone());
            format!("{column} = {}", dialect.placeholder(params.len()))
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn map(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[test]
    fn test_select_all() {
        let stmt = select(Dialect::Postgres, "tasks", &SelectQuery::new());
        assert_eq!(stmt.sql, "SELECT * FROM tasks");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_full_postgres() {
        let query = SelectQuery::new()
            .columns(["id", "title"])
            .filter(map(json!({ "done": false, "owner": "ana" })))
            .order_by("created_at DESC")
            .limit(10);
        let stmt = select(Dialect::Postgres, "tasks", &query);

        assert_eq!(
            stmt.sql,
            "SELECT id, title FROM tasks WHERE done = $1 AND owner = $2 ORDER BY created_at DESC LIMIT 10"
        );
        assert_eq!(stmt.params, vec![json!(false), json!("ana")]);
    }

    #[test]
    fn test_select_mysql_placeholders() {
        let query = SelectQuery::new().filter(map(json!({ "a": 1, "b": 2 })));
        let stmt = select(Dialect::MySql, "notes", &query);
        assert_eq!(stmt.sql, "SELECT * FROM notes WHERE a = ? AND b = ?");
    }

    #[test_case(Some(0), "SELECT * FROM t" ; "zero limit omitted")]
    #[test_case(Some(3), "SELECT * FROM t LIMIT 3" ; "positive limit")]
    #[test_case(None, "SELECT * FROM t" ; "no limit")]
    fn test_select_limit(limit: Option<u64>, expected: &str) {
        let query = SelectQuery {
            limit,
            ..SelectQuery::default()
        };
        assert_eq!(select(Dialect::Postgres, "t", &query).sql, expected);
    }

    #[test]
    fn test_select_empty_filter_has_no_where() {
        let query = SelectQuery::new().filter(Record::new());
        assert_eq!(select(Dialect::MySql, "t", &query).sql, "SELECT * FROM t");
    }

    #[test]
    fn test_insert() {
        let stmt = insert(
            Dialect::Postgres,
            "tasks",
            &map(json!({ "title": "x", "done": false })),
        )
        .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO tasks (title, done) VALUES ($1, $2)");
        assert_eq!(stmt.params, vec![json!("x"), json!(false)]);

        let stmt = insert(Dialect::MySql, "tasks", &map(json!({ "title": "x" }))).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO tasks (title) VALUES (?)");
    }

    #[test]
    fn test_insert_empty_rejected() {
        assert!(matches!(
            insert(Dialect::Postgres, "t", &Record::new()),
            Err(Error::Operation(_))
        ));
    }

    #[test]
    fn test_update_binds_set_before_where() {
        let stmt = update(
            Dialect::Postgres,
            "tasks",
            &map(json!({ "title": "new", "done": true })),
            &map(json!({ "id": 4 })),
        )
        .unwrap();
        assert_eq!(stmt.sql, "UPDATE tasks SET title = $1, done = $2 WHERE id = $3");
        assert_eq!(stmt.params, vec![json!("new"), json!(true), json!(4)]);
    }

    #[test]
    fn test_update_requires_filter() {
        let result = update(
            Dialect::MySql,
            "tasks",
            &map(json!({ "done": true })),
            &Record::new(),
        );
        assert!(matches!(result, Err(Error::Operation(msg)) if msg == "update requires a filter"));
    }

    #[test]
    fn test_delete() {
        let stmt = delete(Dialect::MySql, "notes", Some(&map(json!({ "id": 9 })))).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM notes WHERE id = ?");
        assert_eq!(stmt.params, vec![json!(9)]);
    }

    #[test]
    fn test_delete_requires_filter() {
        for filter in [None, Some(Record::new())] {
            let result = delete(Dialect::Postgres, "notes", filter.as_ref());
            assert!(
                matches!(result, Err(Error::Operation(ref msg)) if msg == "delete requires a filter")
            );
        }
    }

    #[test]
    fn test_as_row_rejects_scalars() {
        assert!(as_row(&json!({ "a": 1 })).is_ok());
        assert!(matches!(as_row(&json!([1, 2])), Err(Error::Operation(_))));
    }

    #[test_case("SELECT 1", true)]
    #[test_case("  select * from t", true)]
    #[test_case("INSERT INTO t VALUES (1)", false)]
    #[test_case("CREATE TABLE t (id int)", false)]
    #[test_case("sel", false)]
    fn test_is_row_returning(sql: &str, expected: bool) {
        assert_eq!(is_row_returning(sql), expected);
    }
}
