//! In-process key-value store.
//!
//! Mirrors the semantics of the networked key-value backend closely enough
//! to exercise the generic operations without a server: string, hash and
//! list entries, optional expiry, and wrong-type errors.

use super::traits::KeyValueStore;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug, Clone)]
enum Entry {
    Str(String),
    Hash(BTreeMap<String, String>),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Slot {
    entry: Entry,
    expires_at: Option<Instant>,
}

/// Key-value store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: HashMap<String, Slot>,
    closed: bool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once [`KeyValueStore::close`] has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the live entry for `key`, dropping it first if expired.
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let expired = self
            .slots
            .get(key)
            .and_then(|slot| slot.expires_at)
            .is_some_and(|at| at <= Instant::now());
        if expired {
            self.slots.remove(key);
        }
        self.slots.get_mut(key).map(|slot| &mut slot.entry)
    }

    fn hash_mut(&mut self, key: &str) -> Result<&mut BTreeMap<String, String>> {
        if self.live(key).is_none() {
            self.slots.insert(
                key.to_string(),
                Slot {
                    entry: Entry::Hash(BTreeMap::new()),
                    expires_at: None,
                },
            );
        }
        match self.live(key) {
            Some(Entry::Hash(hash)) => Ok(hash),
            _ => Err(wrong_type(key)),
        }
    }

    fn list_mut(&mut self, key: &str) -> Result<&mut VecDeque<String>> {
        if self.live(key).is_none() {
            self.slots.insert(
                key.to_string(),
                Slot {
                    entry: Entry::List(VecDeque::new()),
                    expires_at: None,
                },
            );
        }
        match self.live(key) {
            Some(Entry::List(list)) => Ok(list),
            _ => Err(wrong_type(key)),
        }
    }
}

fn wrong_type(key: &str) -> Error {
    Error::OperationFailed {
        operation: format!("key '{key}'"),
        cause: WRONG_TYPE.to_string(),
    }
}

/// Resolves a possibly negative index against a list length.
#[allow(clippy::cast_possible_wrap)]
const fn resolve(index: i64, len: usize) -> i64 {
    if index < 0 { len as i64 + index } else { index }
}

impl KeyValueStore for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn set(&mut self, key: &str, value: &str, expire_secs: Option<u64>) -> Result<()> {
        self.slots.insert(
            key.to_string(),
            Slot {
                entry: Entry::Str(value.to_string()),
                // An expiry past the clock's range never fires.
                expires_at: expire_secs
                    .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs))),
            },
        );
        Ok(())
    }

    fn del(&mut self, keys: &[&str]) -> Result<u64> {
        let mut removed = 0;
        for key in keys {
            if self.live(key).is_some() {
                self.slots.remove(*key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn exists(&mut self, key: &str) -> Result<bool> {
        Ok(self.live(key).is_some())
    }

    fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<u64> {
        let hash = self.hash_mut(key)?;
        let added = hash.insert(field.to_string(), value.to_string()).is_none();
        Ok(u64::from(added))
    }

    fn hgetall(&mut self, key: &str) -> Result<BTreeMap<String, String>> {
        match self.live(key) {
            None => Ok(BTreeMap::new()),
            Some(Entry::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn lpush(&mut self, key: &str, values: &[&str]) -> Result<u64> {
        let list = self.list_mut(key)?;
        for value in values {
            list.push_front((*value).to_string());
        }
        Ok(list.len() as u64)
    }

    fn rpush(&mut self, key: &str, values: &[&str]) -> Result<u64> {
        let list = self.list_mut(key)?;
        list.extend(values.iter().map(|v| (*v).to_string()));
        Ok(list.len() as u64)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss
    )]
    fn lrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let list = match self.live(key) {
            None => return Ok(Vec::new()),
            Some(Entry::List(list)) => list,
            Some(_) => return Err(wrong_type(key)),
        };
        let len = list.len();
        let start = resolve(start, len).max(0);
        let stop = resolve(stop, len).min(len as i64 - 1);
        if len == 0 || start > stop {
            return Ok(Vec::new());
        }
        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_roundtrip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v", None).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert!(store.exists("k").unwrap());
    }

    #[test]
    fn test_expired_key_disappears() {
        let mut store = MemoryStore::new();
        store.set("short", "v", Some(0)).unwrap();
        assert_eq!(store.get("short").unwrap(), None);
        assert!(!store.exists("short").unwrap());
    }

    #[test]
    fn test_huge_expiry_never_fires() {
        let mut store = MemoryStore::new();
        store.set("forever", "v", Some(u64::MAX)).unwrap();
        assert_eq!(store.get("forever").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_del_counts_existing_only() {
        let mut store = MemoryStore::new();
        store.set("a", "1", None).unwrap();
        store.set("b", "2", None).unwrap();
        assert_eq!(store.del(&["a", "b", "c"]).unwrap(), 2);
        assert_eq!(store.del(&["a"]).unwrap(), 0);
    }

    #[test]
    fn test_hash_operations() {
        let mut store = MemoryStore::new();
        assert_eq!(store.hset("h", "f", "1").unwrap(), 1);
        assert_eq!(store.hset("h", "f", "2").unwrap(), 0);
        store.hset("h", "a", "x").unwrap();

        assert_eq!(store.hget("h", "f").unwrap().as_deref(), Some("2"));
        let all = store.hgetall("h").unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["a", "f"]);
        assert!(store.hgetall("missing").unwrap().is_empty());
    }

    #[test]
    fn test_list_operations() {
        let mut store = MemoryStore::new();
        assert_eq!(store.rpush("q", &["b", "c"]).unwrap(), 2);
        assert_eq!(store.lpush("q", &["a"]).unwrap(), 3);

        assert_eq!(store.lrange("q", 0, -1).unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.lrange("q", 1, 1).unwrap(), vec!["b"]);
        assert_eq!(store.lrange("q", -2, 10).unwrap(), vec!["b", "c"]);
        assert!(store.lrange("q", 2, 1).unwrap().is_empty());
        assert!(store.lrange("none", 0, -1).unwrap().is_empty());
    }

    #[test]
    fn test_lpush_order_matches_server() {
        let mut store = MemoryStore::new();
        store.lpush("q", &["a", "b"]).unwrap();
        assert_eq!(store.lrange("q", 0, -1).unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_wrong_type_errors() {
        let mut store = MemoryStore::new();
        store.set("s", "v", None).unwrap();
        assert!(matches!(
            store.hget("s", "f"),
            Err(Error::OperationFailed { cause, .. }) if cause.starts_with("WRONGTYPE")
        ));
        assert!(store.rpush("s", &["x"]).is_err());

        store.hset("h", "f", "v").unwrap();
        assert!(store.get("h").is_err());
    }

    #[test]
    fn test_close_marks_store() {
        let mut store = MemoryStore::new();
        assert!(!store.is_closed());
        store.close().unwrap();
        assert!(store.is_closed());
    }
}
