//! Process-local memo backend
//!
//! Used when no shared store is configured, and as the permanent fallback once
//! the shared store fails mid-run. Nothing here survives a restart.

use crate::memo::traits::{MemoBackend, MemoError, MemoResult};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

#[derive(Debug)]
enum Value {
    Set(HashSet<String>),
    Hash(HashMap<String, String>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Self::Set(_) => "set",
            Self::Hash(_) => "hash",
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// In-memory memo backend
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: HashMap<String, Entry>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_if_expired(&mut self, key: &str) {
        let now = Instant::now();
        if self.entries.get(key).map(|e| e.is_expired(now)).unwrap_or(false) {
            self.entries.remove(key);
        }
    }

    fn live(&mut self, key: &str) -> Option<&Entry> {
        self.evict_if_expired(key);
        self.entries.get(key)
    }

    /// Gets or creates the entry at `key`, refreshing its expiry when a ttl is given
    fn entry_for_write(
        &mut self,
        key: &str,
        empty: fn() -> Value,
        ttl: Option<Duration>,
    ) -> &mut Entry {
        self.evict_if_expired(key);
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: empty(),
            expires_at: None,
        });
        if let Some(ttl) = ttl {
            // Past the clock's range the key simply never expires
            entry.expires_at = Instant::now().checked_add(ttl);
        }
        entry
    }

    fn set_ref(&mut self, key: &str) -> MemoResult<Option<&HashSet<String>>> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(Some(set)),
            Some(entry) => Err(wrong_type(key, "set", entry.value.kind())),
        }
    }

    fn hash_ref(&mut self, key: &str) -> MemoResult<Option<&HashMap<String, String>>> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => Ok(Some(hash)),
            Some(entry) => Err(wrong_type(key, "hash", entry.value.kind())),
        }
    }
}

fn wrong_type(key: &str, expected: &'static str, actual: &str) -> MemoError {
    MemoError::WrongType {
        key: key.to_string(),
        expected,
        actual: actual.to_string(),
    }
}

fn empty_set() -> Value {
    Value::Set(HashSet::new())
}

fn empty_hash() -> Value {
    Value::Hash(HashMap::new())
}

impl MemoBackend for InMemoryBackend {
    fn set_add(&mut self, key: &str, member: &str, ttl: Option<Duration>) -> MemoResult<()> {
        let entry = self.entry_for_write(key, empty_set, ttl);
        match &mut entry.value {
            Value::Set(set) => {
                set.insert(member.to_string());
                Ok(())
            }
            other => Err(wrong_type(key, "set", other.kind())),
        }
    }

    fn set_remove(&mut self, key: &str, member: &str) -> MemoResult<()> {
        self.evict_if_expired(key);
        let now_empty = match self.entries.get_mut(key) {
            None => return Ok(()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => {
                set.remove(member);
                set.is_empty()
            }
            Some(entry) => return Err(wrong_type(key, "set", entry.value.kind())),
        };
        if now_empty {
            self.entries.remove(key);
        }
        Ok(())
    }

    fn set_is_member(&mut self, key: &str, member: &str) -> MemoResult<bool> {
        Ok(self
            .set_ref(key)?
            .map(|set| set.contains(member))
            .unwrap_or(false))
    }

    fn set_members(&mut self, key: &str) -> MemoResult<HashSet<String>> {
        Ok(self.set_ref(key)?.cloned().unwrap_or_default())
    }

    fn set_diff_is_empty(&mut self, left: &str, right: &str) -> MemoResult<bool> {
        let left = self.set_members(left)?;
        if left.is_empty() {
            return Ok(true);
        }
        let right = self.set_members(right)?;
        Ok(left.is_subset(&right))
    }

    fn hash_get(&mut self, key: &str, field: &str) -> MemoResult<Option<String>> {
        Ok(self
            .hash_ref(key)?
            .and_then(|hash| hash.get(field).cloned()))
    }

    fn hash_set(
        &mut self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> MemoResult<()> {
        let entry = self.entry_for_write(key, empty_hash, ttl);
        match &mut entry.value {
            Value::Hash(hash) => {
                hash.insert(field.to_string(), value.to_string());
                Ok(())
            }
            other => Err(wrong_type(key, "hash", other.kind())),
        }
    }

    fn hash_incr(
        &mut self,
        key: &str,
        field: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> MemoResult<i64> {
        let entry = self.entry_for_write(key, empty_hash, ttl);
        let hash = match &mut entry.value {
            Value::Hash(hash) => hash,
            other => return Err(wrong_type(key, "hash", other.kind())),
        };
        let current = match hash.get(field) {
            None => 0,
            Some(raw) => raw.parse::<i64>().map_err(|_| MemoError::NotAnInteger {
                key: key.to_string(),
                field: field.to_string(),
            })?,
        };
        let next = current + delta;
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    fn delete_prefix(&mut self, prefix: &str) -> MemoResult<usize> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - self.entries.len())
    }
}
