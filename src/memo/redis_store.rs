//! Redis memo backend
//!
//! The networked store shared by every crawler process that points at the
//! same server. Sets and hashes map onto native Redis types, and expiry is
//! applied with `EXPIRE` after each write.

use crate::memo::traits::{MemoBackend, MemoError, MemoResult};
use redis::{Client, Connection};
use std::collections::HashSet;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns true for connection strings this backend understands
pub fn is_redis_url(connection: &str) -> bool {
    let connection = connection.trim();
    connection.starts_with("redis://") || connection.starts_with("rediss://")
}

/// Escapes glob metacharacters so `prefix` matches literally in `SCAN MATCH`
fn match_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

/// Whole seconds for `EXPIRE`, never zero
fn expire_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Redis memo backend
pub struct RedisMemoBackend {
    conn: Connection,
}

impl RedisMemoBackend {
    /// Connects to the server named by a `redis://` or `rediss://` URL
    ///
    /// The connection is checked with `PING` so an unreachable server is
    /// reported here rather than on the first write.
    pub fn connect(url: &str) -> MemoResult<Self> {
        let client = Client::open(url.trim())?;
        let mut conn = client.get_connection_with_timeout(CONNECT_TIMEOUT)?;
        redis::cmd("PING").query::<String>(&mut conn)?;
        Ok(Self { conn })
    }

    fn expire(&mut self, key: &str, ttl: Option<Duration>) -> MemoResult<()> {
        if let Some(ttl) = ttl {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(expire_seconds(ttl))
                .query::<()>(&mut self.conn)?;
        }
        Ok(())
    }
}

impl MemoBackend for RedisMemoBackend {
    fn set_add(&mut self, key: &str, member: &str, ttl: Option<Duration>) -> MemoResult<()> {
        redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query::<()>(&mut self.conn)?;
        self.expire(key, ttl)
    }

    fn set_remove(&mut self, key: &str, member: &str) -> MemoResult<()> {
        redis::cmd("SREM")
            .arg(key)
            .arg(member)
            .query::<()>(&mut self.conn)?;
        Ok(())
    }

    fn set_is_member(&mut self, key: &str, member: &str) -> MemoResult<bool> {
        Ok(redis::cmd("SISMEMBER")
            .arg(key)
            .arg(member)
            .query(&mut self.conn)?)
    }

    fn set_members(&mut self, key: &str) -> MemoResult<HashSet<String>> {
        Ok(redis::cmd("SMEMBERS").arg(key).query(&mut self.conn)?)
    }

    fn set_diff_is_empty(&mut self, left: &str, right: &str) -> MemoResult<bool> {
        let missing: Vec<String> = redis::cmd("SDIFF")
            .arg(left)
            .arg(right)
            .query(&mut self.conn)?;
        Ok(missing.is_empty())
    }

    fn hash_get(&mut self, key: &str, field: &str) -> MemoResult<Option<String>> {
        Ok(redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query(&mut self.conn)?)
    }

    fn hash_set(
        &mut self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> MemoResult<()> {
        redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query::<()>(&mut self.conn)?;
        self.expire(key, ttl)
    }

    fn hash_incr(
        &mut self,
        key: &str,
        field: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> MemoResult<i64> {
        let value: i64 = redis::cmd("HINCRBY")
            .arg(key)
            .arg(field)
            .arg(delta)
            .query(&mut self.conn)?;
        self.expire(key, ttl)?;
        Ok(value)
    }

    fn delete_prefix(&mut self, prefix: &str) -> MemoResult<usize> {
        if prefix.is_empty() {
            return Err(MemoError::Backend(
                "refusing to delete every key on a shared server".to_string(),
            ));
        }

        let keys: Vec<String> = {
            let mut scan = redis::cmd("SCAN");
            scan.cursor_arg(0)
                .arg("MATCH")
                .arg(match_pattern(prefix))
                .arg("COUNT")
                .arg(500);
            let iter = scan.iter::<String>(&mut self.conn)?;
            iter.collect::<HashSet<_>>().into_iter().collect()
        };

        let mut deleted = 0;
        for chunk in keys.chunks(500) {
            let removed: usize = redis::cmd("DEL").arg(chunk).query(&mut self.conn)?;
            deleted += removed;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_redis_url() {
        assert!(is_redis_url("redis://localhost:6379/0"));
        assert!(is_redis_url("rediss://user:pw@cache.internal:6380"));
        assert!(!is_redis_url("sqlite:///var/lib/crawl/memo.db"));
        assert!(!is_redis_url("/var/lib/crawl/memo.db"));
    }

    #[test]
    fn test_match_pattern_escapes_globs() {
        assert_eq!(match_pattern("crawl_catalog:"), "crawl_catalog:*");
        assert_eq!(match_pattern("ns[1]*:"), "ns\\[1\\]\\*:*");
    }

    #[test]
    fn test_expire_seconds_never_zero() {
        assert_eq!(expire_seconds(Duration::from_millis(200)), 1);
        assert_eq!(expire_seconds(Duration::from_secs(86_400)), 86_400);
    }

    #[test]
    fn test_unreachable_server_is_an_error() {
        // Port 1 is never a Redis server on a test host
        assert!(RedisMemoBackend::connect("redis://127.0.0.1:1/").is_err());
    }
}
