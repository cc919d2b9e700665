//! SQLite memo backend
//!
//! The shared, restart-surviving store for crawl progress. Several crawler
//! processes on one host can point at the same file; expiry is stored per key
//! and enforced lazily on every operation.

use crate::memo::traits::{MemoBackend, MemoError, MemoResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// SQL schema for the memo tables
pub const MEMO_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS memo_keys (
    key TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    expires_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_memo_keys_expires ON memo_keys(expires_at);

CREATE TABLE IF NOT EXISTS memo_set_members (
    key TEXT NOT NULL REFERENCES memo_keys(key) ON DELETE CASCADE,
    member TEXT NOT NULL,
    PRIMARY KEY (key, member)
);

CREATE TABLE IF NOT EXISTS memo_hash_fields (
    key TEXT NOT NULL REFERENCES memo_keys(key) ON DELETE CASCADE,
    field TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (key, field)
);
"#;

const KIND_SET: &str = "set";
const KIND_HASH: &str = "hash";

/// Absolute expiry in epoch milliseconds, or `None` when out of range
fn expiry_millis(ttl: Duration) -> Option<i64> {
    let ttl_ms = i64::try_from(ttl.as_millis()).ok()?;
    Utc::now().timestamp_millis().checked_add(ttl_ms)
}

/// SQLite memo backend
pub struct SqliteMemoBackend {
    conn: Connection,
}

impl SqliteMemoBackend {
    /// Opens the store named by a connection string
    ///
    /// Accepts `sqlite://<path>`, a bare path, or `:memory:`.
    pub fn connect(connection: &str) -> MemoResult<Self> {
        let target = connection
            .strip_prefix("sqlite://")
            .unwrap_or(connection)
            .trim();

        if target.is_empty() {
            return Err(MemoError::Backend(format!(
                "connection string '{}' names no database",
                connection
            )));
        }

        if target == ":memory:" {
            return Self::new_in_memory();
        }

        Self::open(Path::new(target))
    }

    /// Opens or creates a memo database file
    pub fn open(path: &Path) -> MemoResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        conn.execute_batch(MEMO_SCHEMA_SQL)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> MemoResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(MEMO_SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    fn purge_expired(&self) -> MemoResult<()> {
        let now = Utc::now().timestamp_millis();
        self.conn.execute(
            "DELETE FROM memo_keys WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now],
        )?;
        Ok(())
    }

    fn key_kind(&self, key: &str) -> MemoResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT kind FROM memo_keys WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn expect_kind(&self, key: &str, expected: &'static str) -> MemoResult<bool> {
        match self.key_kind(key)? {
            None => Ok(false),
            Some(kind) if kind == expected => Ok(true),
            Some(kind) => Err(MemoError::WrongType {
                key: key.to_string(),
                expected,
                actual: kind,
            }),
        }
    }

    /// Registers the key (if new) and applies the ttl to it
    fn touch_key(&self, key: &str, kind: &'static str, ttl: Option<Duration>) -> MemoResult<()> {
        self.expect_kind(key, kind)?;
        let expires_at = ttl.and_then(expiry_millis);
        self.conn.execute(
            "INSERT INTO memo_keys (key, kind, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET expires_at = COALESCE(excluded.expires_at, memo_keys.expires_at)",
            params![key, kind, expires_at],
        )?;
        Ok(())
    }
}

impl MemoBackend for SqliteMemoBackend {
    fn set_add(&mut self, key: &str, member: &str, ttl: Option<Duration>) -> MemoResult<()> {
        self.purge_expired()?;
        self.touch_key(key, KIND_SET, ttl)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO memo_set_members (key, member) VALUES (?1, ?2)",
            params![key, member],
        )?;
        Ok(())
    }

    fn set_remove(&mut self, key: &str, member: &str) -> MemoResult<()> {
        self.purge_expired()?;
        if !self.expect_kind(key, KIND_SET)? {
            return Ok(());
        }
        self.conn.execute(
            "DELETE FROM memo_set_members WHERE key = ?1 AND member = ?2",
            params![key, member],
        )?;
        self.conn.execute(
            "DELETE FROM memo_keys WHERE key = ?1
             AND NOT EXISTS (SELECT 1 FROM memo_set_members WHERE key = ?1)",
            params![key],
        )?;
        Ok(())
    }

    fn set_is_member(&mut self, key: &str, member: &str) -> MemoResult<bool> {
        self.purge_expired()?;
        if !self.expect_kind(key, KIND_SET)? {
            return Ok(false);
        }
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM memo_set_members WHERE key = ?1 AND member = ?2",
                params![key, member],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn set_members(&mut self, key: &str) -> MemoResult<HashSet<String>> {
        self.purge_expired()?;
        if !self.expect_kind(key, KIND_SET)? {
            return Ok(HashSet::new());
        }
        let mut stmt = self
            .conn
            .prepare("SELECT member FROM memo_set_members WHERE key = ?1")?;
        let members = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(members)
    }

    fn set_diff_is_empty(&mut self, left: &str, right: &str) -> MemoResult<bool> {
        self.purge_expired()?;
        self.expect_kind(left, KIND_SET)?;
        self.expect_kind(right, KIND_SET)?;
        let missing: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM memo_set_members l
             WHERE l.key = ?1
             AND NOT EXISTS (
                 SELECT 1 FROM memo_set_members r WHERE r.key = ?2 AND r.member = l.member
             )",
            params![left, right],
            |row| row.get(0),
        )?;
        Ok(missing == 0)
    }

    fn hash_get(&mut self, key: &str, field: &str) -> MemoResult<Option<String>> {
        self.purge_expired()?;
        if !self.expect_kind(key, KIND_HASH)? {
            return Ok(None);
        }
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM memo_hash_fields WHERE key = ?1 AND field = ?2",
                params![key, field],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn hash_set(
        &mut self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> MemoResult<()> {
        self.purge_expired()?;
        self.touch_key(key, KIND_HASH, ttl)?;
        self.conn.execute(
            "INSERT INTO memo_hash_fields (key, field, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(key, field) DO UPDATE SET value = excluded.value",
            params![key, field, value],
        )?;
        Ok(())
    }

    fn hash_incr(
        &mut self,
        key: &str,
        field: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> MemoResult<i64> {
        self.purge_expired()?;
        self.touch_key(key, KIND_HASH, ttl)?;

        let tx = self.conn.transaction()?;
        let current: Option<String> = tx
            .query_row(
                "SELECT value FROM memo_hash_fields WHERE key = ?1 AND field = ?2",
                params![key, field],
                |row| row.get(0),
            )
            .optional()?;
        let current = match current {
            None => 0,
            Some(raw) => raw.parse::<i64>().map_err(|_| MemoError::NotAnInteger {
                key: key.to_string(),
                field: field.to_string(),
            })?,
        };
        let next = current + delta;
        tx.execute(
            "INSERT INTO memo_hash_fields (key, field, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(key, field) DO UPDATE SET value = excluded.value",
            params![key, field, next.to_string()],
        )?;
        tx.commit()?;

        Ok(next)
    }

    fn delete_prefix(&mut self, prefix: &str) -> MemoResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM memo_keys WHERE substr(key, 1, length(?1)) = ?1",
            params![prefix],
        )?;
        Ok(deleted)
    }
}
