//! Result normalization applied on every read path.
//!
//! Two rewrites, in order:
//!
//! 1. The backend-native identifier field `_id` is renamed to `id` and
//!    stringified, keeping its position in the record.
//! 2. For each configured [`FlagAlias`], a boolean column stored under its
//!    legacy name is coalesced into the canonical name. When both names are
//!    present the canonical value wins; the legacy column is dropped.

use crate::config::FlagAlias;
use crate::models::Record;
use serde_json::Value;

/// Name of the native identifier field on the document backend.
pub const NATIVE_ID_FIELD: &str = "_id";

/// Name of the common identifier field.
pub const ID_FIELD: &str = "id";

/// Applies identifier and flag normalization to records.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    flag_aliases: Vec<FlagAlias>,
}

impl Normalizer {
    /// Creates a normalizer with the given flag aliases.
    #[must_use]
    pub const fn new(flag_aliases: Vec<FlagAlias>) -> Self {
        Self { flag_aliases }
    }

    /// Normalizes a single record.
    #[must_use]
    pub fn record(&self, record: Record) -> Record {
        let mut record = rename_native_id(record);
        for alias in &self.flag_aliases {
            record = coalesce_flag(record, alias);
        }
        record
    }

    /// Normalizes every record of a result set.
    #[must_use]
    pub fn records(&self, records: Vec<Record>) -> Vec<Record> {
        records.into_iter().map(|r| self.record(r)).collect()
    }
}

/// Renames `_id` to `id` in place, stringifying the value.
///
/// An existing `id` field is replaced by the native identifier.
#[must_use]
pub fn rename_native_id(record: Record) -> Record {
    if !record.contains_key(NATIVE_ID_FIELD) {
        return record;
    }

    let mut out = Record::new();
    for (key, value) in record {
        if key == NATIVE_ID_FIELD {
            out.insert(ID_FIELD.to_string(), Value::String(stringify_id(&value)));
        } else if key != ID_FIELD {
            out.insert(key, value);
        }
    }
    out
}

/// Stringifies an identifier value.
///
/// Extended-JSON object ids (`{"$oid": "..."}`) yield their hex string.
#[must_use]
pub fn stringify_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("$oid") {
            Some(Value::String(hex)) => hex.clone(),
            _ => value.to_string(),
        },
        other => other.to_string(),
    }
}

/// Coalesces a legacy boolean column into its canonical name.
fn coalesce_flag(record: Record, alias: &FlagAlias) -> Record {
    let has_canonical = record.contains_key(&alias.canonical);
    let has_legacy = record.contains_key(&alias.legacy);
    if !has_canonical && !has_legacy {
        return record;
    }

    let mut out = Record::new();
    for (key, value) in record {
        if key == alias.canonical {
            out.insert(key, Value::Bool(truthy(&value)));
        } else if key == alias.legacy {
            if !has_canonical {
                out.insert(alias.canonical.clone(), Value::Bool(truthy(&value)));
            }
        } else {
            out.insert(key, value);
        }
    }
    out
}

/// Interprets a stored flag value as a boolean.
///
/// Numbers are true when non-zero; strings are true for `true`, `t`, `1`,
/// `yes`, `y` and `on` (case-insensitive).
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "t" | "1" | "yes" | "y" | "on"
        ),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}
