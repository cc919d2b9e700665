//! Memo backend trait and error types

use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur inside a memo backend
#[derive(Debug, Error)]
pub enum MemoError {
    #[error("Memo backend error: {0}")]
    Backend(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Key '{key}' holds a {actual}, not a {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        actual: String,
    },

    #[error("Hash field '{field}' of '{key}' is not an integer")]
    NotAnInteger { key: String, field: String },
}

/// Result type for memo operations
pub type MemoResult<T> = Result<T, MemoError>;

/// Trait for memo storage backends
///
/// Keys are fully qualified (namespace included) by the caller. A `ttl`
/// passed to a write applies to the whole key and replaces any previous
/// expiry; `None` leaves an existing expiry untouched.
pub trait MemoBackend: Send {
    // ===== Sets =====

    /// Adds a member to the set at `key`
    fn set_add(&mut self, key: &str, member: &str, ttl: Option<Duration>) -> MemoResult<()>;

    /// Removes a member from the set at `key`
    fn set_remove(&mut self, key: &str, member: &str) -> MemoResult<()>;

    /// Checks whether `member` belongs to the set at `key`
    fn set_is_member(&mut self, key: &str, member: &str) -> MemoResult<bool>;

    /// Returns every member of the set at `key`
    fn set_members(&mut self, key: &str) -> MemoResult<HashSet<String>>;

    /// Returns true if every member of `left` also belongs to `right`
    fn set_diff_is_empty(&mut self, left: &str, right: &str) -> MemoResult<bool>;

    // ===== Hashes =====

    /// Reads one field of the hash at `key`
    fn hash_get(&mut self, key: &str, field: &str) -> MemoResult<Option<String>>;

    /// Writes one field of the hash at `key`
    fn hash_set(
        &mut self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> MemoResult<()>;

    /// Adds `delta` to an integer field (missing fields count as 0) and
    /// returns the new value
    fn hash_incr(
        &mut self,
        key: &str,
        field: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> MemoResult<i64>;

    // ===== Maintenance =====

    /// Deletes every key starting with `prefix`, returning how many went away
    fn delete_prefix(&mut self, prefix: &str) -> MemoResult<usize>;
}
