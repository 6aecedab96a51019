//! Backend-neutral values exchanged with every adapter.

use serde::Serialize;
use serde_json::{Map, Value};

/// An ordered mapping from field or column name to value.
///
/// The common currency of every read path and the input shape of writes.
pub type Record = Map<String, Value>;

/// Exact-match field to value mapping used to select existing data.
pub type Filter = Map<String, Value>;

/// Field to new-value mapping describing a write.
pub type WriteSpec = Map<String, Value>;

/// Arguments of a generic `select`.
///
/// Not every backend uses every argument; see [`crate::Client::select`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    /// Columns to return (`*` when `None`). Relational only.
    pub columns: Option<Vec<String>>,
    /// Equality filter.
    pub filter: Option<Filter>,
    /// Maximum number of results.
    pub limit: Option<u64>,
    /// `ORDER BY` expression. Relational only.
    pub order_by: Option<String>,
}

impl SelectQuery {
    /// Creates an unrestricted query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the returned columns.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the equality filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Bounds the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the ordering expression.
    #[must_use]
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Returns the filter if it has at least one entry.
    #[must_use]
    pub fn non_empty_filter(&self) -> Option<&Filter> {
        self.filter.as_ref().filter(|f| !f.is_empty())
    }
}

/// Backend-specific result of an insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsertOutcome {
    /// Relational: number of affected rows.
    RowsAffected {
        /// Affected row count.
        count: u64,
    },
    /// Document: identifier generated for the new document.
    Inserted {
        /// Stringified identifier.
        id: String,
    },
    /// Key-value: number of native writes issued.
    Stored {
        /// Native set calls performed.
        writes: u64,
    },
}

impl InsertOutcome {
    /// Returns the affected count, treating an inserted document as one.
    #[must_use]
    pub const fn affected(&self) -> u64 {
        match self {
            Self::RowsAffected { count } => *count,
            Self::Inserted { .. } => 1,
            Self::Stored { writes } => *writes,
        }
    }

    /// Returns the generated identifier for document inserts.
    #[must_use]
    pub fn inserted_id(&self) -> Option<&str> {
        match self {
            Self::Inserted { id } => Some(id),
            _ => None,
        }
    }
}

/// Result of a raw relational query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    /// Rows returned by a `SELECT`.
    Rows(Vec<Record>),
    /// Rows affected by any other statement.
    Affected(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_query_builder() {
        let mut filter = Filter::new();
        filter.insert("done".to_string(), json!(false));

        let query = SelectQuery::new()
            .columns(["id", "title"])
            .filter(filter)
            .limit(5)
            .order_by("created_at DESC");

        assert_eq!(
            query.columns,
            Some(vec!["id".to_string(), "title".to_string()])
        );
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.order_by.as_deref(), Some("created_at DESC"));
        assert!(query.non_empty_filter().is_some());
    }

    #[test]
    fn test_empty_filter_is_treated_as_absent() {
        let query = SelectQuery::new().filter(Filter::new());
        assert!(query.non_empty_filter().is_none());
    }

    #[test]
    fn test_insert_outcome_accessors() {
        let inserted = InsertOutcome::Inserted {
            id: "65a1f0c2e4b0a1b2c3d4e5f6".to_string(),
        };
        assert_eq!(inserted.inserted_id(), Some("65a1f0c2e4b0a1b2c3d4e5f6"));
        assert_eq!(inserted.affected(), 1);
        assert_eq!(InsertOutcome::Stored { writes: 3 }.affected(), 3);
        assert_eq!(InsertOutcome::RowsAffected { count: 1 }.inserted_id(), None);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(InsertOutcome::RowsAffected { count: 2 }).unwrap();
        assert_eq!(json, json!({ "kind": "rows_affected", "count": 2 }));

        let json = serde_json::to_value(QueryOutcome::Affected(4)).unwrap();
        assert_eq!(json, json!(4));
    }
}
