//! MongoDB Integration Tests
//!
//! Runs the document contract against a live MongoDB server:
//! - Insert returns the generated id, which select and find_one accept
//! - Bare update maps are wrapped in `$set`
//! - Delete without a filter removes nothing
//!
//! These tests require a running MongoDB server. Set the environment variable
//! `POLYSTORE_TEST_MONGODB_URL` to enable these tests:
//!
//! ```bash
//! export POLYSTORE_TEST_MONGODB_URL="mongodb://localhost:27017/polystore_test"
//! cargo test --features mongodb --test mongodb_integration
//! ```

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
#![cfg(feature = "mongodb")]

use polystore::{Client, ConnectionOverrides, Error, Filter, SelectQuery};
use serde_json::{Value, json};
use std::env;
use uuid::Uuid;

/// Environment variable for MongoDB test connection URL.
const MONGODB_URL_ENV: &str = "POLYSTORE_TEST_MONGODB_URL";

/// Macro to skip tests when MongoDB is not available.
macro_rules! require_mongodb {
    () => {
        match env::var(MONGODB_URL_ENV) {
            Ok(url) => url,
            Err(_) => {
                eprintln!("Skipping test: {MONGODB_URL_ENV} not set.");
                return;
            },
        }
    };
}

fn mapping(value: Value) -> Filter {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[test]
fn test_document_contract() {
    let url = require_mongodb!();
    let mut client = Client::from_connection_string(&url, ConnectionOverrides::default()).unwrap();
    let collection = format!("items_{}", Uuid::new_v4().simple());

    let outcome = client
        .insert(&collection, json!({"sku": "A-1", "qty": 3}))
        .unwrap();
    let id = outcome.inserted_id().unwrap().to_string();
    assert_eq!(id.len(), 24);

    let rows = client
        .select(&collection, SelectQuery::new().filter(mapping(json!({"sku": "A-1"}))))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&json!(id)));
    assert!(!rows[0].contains_key("_id"));

    let updated = client
        .update(&collection, &mapping(json!({"qty": 5})), &mapping(json!({"id": id})))
        .unwrap();
    assert_eq!(updated, 1);
    let updated = client
        .update(
            &collection,
            &mapping(json!({"$inc": {"qty": 1}})),
            &mapping(json!({"sku": "A-1"})),
        )
        .unwrap();
    assert_eq!(updated, 1);

    let row = client
        .find_one(&collection, &mapping(json!({"id": id})))
        .unwrap()
        .unwrap();
    assert_eq!(row.get("qty"), Some(&json!(6)));
    assert_eq!(row.get("sku"), Some(&json!("A-1")));

    assert_eq!(client.delete(&collection, None).unwrap(), 0);
    assert_eq!(client.delete(&collection, Some(&Filter::new())).unwrap(), 0);
    assert_eq!(
        client
            .delete(&collection, Some(&mapping(json!({"sku": "A-1"}))))
            .unwrap(),
        1
    );

    assert!(matches!(client.query("SELECT 1", &[]), Err(Error::Configuration(_))));
    client.disconnect().unwrap();
}

#[test]
fn test_select_limit() {
    let url = require_mongodb!();
    let mut client = Client::from_connection_string(&url, ConnectionOverrides::default()).unwrap();
    let collection = format!("items_{}", Uuid::new_v4().simple());

    for n in 0..5 {
        client.insert(&collection, json!({ "n": n })).unwrap();
    }
    let rows = client
        .scoped(|db| db.select(&collection, SelectQuery::new().limit(2)))
        .unwrap();
    assert_eq!(rows.len(), 2);

    let removed = client
        .scoped(|db| db.delete(&collection, Some(&mapping(json!({"n": {"$gte": 0}})))))
        .unwrap();
    assert_eq!(removed, 5);
}
