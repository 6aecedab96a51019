//! Driver-independent translation rules for the document backend.

use crate::models::{Filter, Record, WriteSpec};
use crate::normalize::{ID_FIELD, NATIVE_ID_FIELD};
use crate::{Error, Result};
use serde_json::{Map, Value};

/// Prefix of document modification operators (`$set`, `$inc`, ...).
pub const OPERATOR_SIGIL: char = '$';

/// Operator used to wrap bare field maps.
pub const SET_OPERATOR: &str = "$set";

/// Extended-JSON key carrying an object id.
pub const OID_KEY: &str = "$oid";

/// Turns an update payload into a modification document.
///
/// A payload with no operator key is wrapped in `$set`; a payload that
/// already uses operators is passed through untouched.
///
/// # Errors
///
/// Returns [`Error::Operation`] if the payload is empty.
pub fn wrap_update(data: &WriteSpec) -> Result<Record> {
    if data.is_empty() {
        return Err(Error::Operation("update requires at least one field".to_string()));
    }
    if has_operator(data) {
        return Ok(data.clone());
    }

    let mut wrapped = Record::new();
    wrapped.insert(SET_OPERATOR.to_string(), Value::Object(data.clone()));
    Ok(wrapped)
}

/// Returns true if any top-level key is a modification operator.
#[must_use]
pub fn has_operator(data: &WriteSpec) -> bool {
    data.keys().any(|k| k.starts_with(OPERATOR_SIGIL))
}

/// Builds the native filter for a read or write.
///
/// An absent filter becomes an empty filter. A common `id` (or native `_id`)
/// carrying an object-id hex string is reconstructed into the native
/// identifier.
#[must_use]
pub fn prepare_filter(filter: Option<&Filter>) -> Filter {
    let Some(filter) = filter else {
        return Filter::new();
    };

    let mut out = Filter::new();
    for (key, value) in filter {
        if key == ID_FIELD || key == NATIVE_ID_FIELD {
            match value.as_str().filter(|s| is_object_id_hex(s)) {
                Some(hex) => out.insert(NATIVE_ID_FIELD.to_string(), object_id(hex)),
                None => out.insert(NATIVE_ID_FIELD.to_string(), value.clone()),
            };
        } else {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

/// Builds the native filter for a delete.
///
/// Returns `None` when the filter is absent or empty: such a delete matches
/// nothing and must never reach the driver, where an empty filter would
/// match every document.
#[must_use]
pub fn delete_filter(filter: Option<&Filter>) -> Option<Filter> {
    filter
        .filter(|f| !f.is_empty())
        .map(|f| prepare_filter(Some(f)))
}

/// Validates an insert payload.
///
/// # Errors
///
/// Returns [`Error::Operation`] if `data` is not a non-empty mapping.
pub fn prepare_document(data: &Value) -> Result<Record> {
    match data {
        Value::Object(map) if !map.is_empty() => Ok(map.clone()),
        Value::Object(_) => Err(Error::Operation(
            "insert requires at least one field".to_string(),
        )),
        _ => Err(Error::Operation(
            "insert requires a mapping of field to value".to_string(),
        )),
    }
}

/// Returns true for a 24-character hexadecimal object id.
#[must_use]
pub fn is_object_id_hex(s: &str) -> bool {
    s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Extended-JSON object id value.
fn object_id(hex: &str) -> Value {
    let mut map = Map::new();
    map.insert(OID_KEY.to_string(), Value::String(hex.to_ascii_lowercase()));
    Value::Object(map)
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
    fn test_bare_fields_wrapped_once() {
        let wrapped = wrap_update(&map(json!({ "price": 10, "name": "lamp" }))).unwrap();
        assert_eq!(
            Value::Object(wrapped),
            json!({ "$set": { "price": 10, "name": "lamp" } })
        );
    }

    #[test]
    fn test_operator_payload_passes_through() {
        let payload = map(json!({ "$inc": { "stock": 1 } }));
        assert_eq!(wrap_update(&payload).unwrap(), payload);

        let already_set = map(json!({ "$set": { "a": 1 } }));
        assert_eq!(wrap_update(&already_set).unwrap(), already_set);
    }

    #[test]
    fn test_empty_update_rejected() {
        assert!(matches!(
            wrap_update(&Record::new()),
            Err(Error::Operation(_))
        ));
    }

    #[test]
    fn test_absent_filter_is_empty() {
        assert!(prepare_filter(None).is_empty());
    }

    #[test]
    fn test_id_hex_becomes_object_id() {
        let filter = prepare_filter(Some(&map(json!({ "id": "65A1F0C2E4B0A1B2C3D4E5F6" }))));
        assert_eq!(
            Value::Object(filter),
            json!({ "_id": { "$oid": "65a1f0c2e4b0a1b2c3d4e5f6" } })
        );
    }

    #[test]
    fn test_non_hex_id_kept_as_native_id() {
        let filter = prepare_filter(Some(&map(json!({ "_id": "sku-1", "stock": 3 }))));
        assert_eq!(Value::Object(filter), json!({ "_id": "sku-1", "stock": 3 }));
    }

    #[test]
    fn test_delete_without_filter_matches_nothing() {
        assert!(delete_filter(None).is_none());
        assert!(delete_filter(Some(&Record::new())).is_none());

        let filter = delete_filter(Some(&map(json!({ "sku": "a" })))).unwrap();
        assert_eq!(filter["sku"], json!("a"));
    }

    #[test_case("65a1f0c2e4b0a1b2c3d4e5f6", true)]
    #[test_case("65a1f0c2e4b0a1b2c3d4e5f", false ; "too short")]
    #[test_case("zza1f0c2e4b0a1b2c3d4e5f6", false ; "not hex")]
    fn test_is_object_id_hex(s: &str, expected: bool) {
        assert_eq!(is_object_id_hex(s), expected);
    }

    #[test]
    fn test_prepare_document() {
        assert!(prepare_document(&json!({ "name": "lamp" })).is_ok());
        assert!(matches!(prepare_document(&json!({})), Err(Error::Operation(_))));
        assert!(matches!(prepare_document(&json!("x")), Err(Error::Operation(_))));
    }
}
