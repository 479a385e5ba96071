//! Database connection pool.
//!
//! A single Mutex-protected connection. Sieve is a local tool with one writer
//! at a time, so this is all the pooling it needs.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, StorageError};
use crate::schema::run_migrations;

/// Thread-safe database connection pool.
#[derive(Clone)]
pub struct ConnectionPool {
    conn: Arc<Mutex<Connection>>,
}

impl ConnectionPool {
    /// Create a new connection pool with a file-based database.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::setup_connection(&conn)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new connection pool with an in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::setup_connection(&conn)?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get a connection from the pool.
    ///
    /// A panic while the connection was held poisons it for good; every later
    /// call reports [`StorageError::Unavailable`].
    pub fn get(&self) -> Result<PooledConnection<'_>> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| StorageError::Unavailable("Connection pool poisoned".to_string()))?;

        Ok(PooledConnection { guard })
    }

    /// Setup connection pragmas.
    fn setup_connection(conn: &Connection) -> Result<()> {
        // Cross-ref rows must point at live subscriptions and rules
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA cache_size = -2000;")?;

        Ok(())
    }
}

/// A connection borrowed from the pool.
pub struct PooledConnection<'a> {
    guard: MutexGuard<'a, Connection>,
}

impl std::ops::Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_pool() {
        let pool = ConnectionPool::in_memory().unwrap();
        let conn = pool.get().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM rule_subscriptions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let pool = ConnectionPool::in_memory().unwrap();
        let conn = pool.get().unwrap();

        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_poisoned_pool_is_unavailable() {
        let pool = ConnectionPool::in_memory().unwrap();
        let clone = pool.clone();

        let _ = std::thread::spawn(move || {
            let _conn = clone.get().unwrap();
            panic!("poison the connection");
        })
        .join();

        assert!(matches!(pool.get(), Err(StorageError::Unavailable(_))));
    }

    #[test]
    fn test_file_pool_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sieve.db");

        {
            let pool = ConnectionPool::new(&path).unwrap();
            let conn = pool.get().unwrap();
            conn.execute("INSERT INTO config (key, value) VALUES ('k', '1')", [])
                .unwrap();
        }

        let pool = ConnectionPool::new(&path).unwrap();
        let conn = pool.get().unwrap();
        let value: String = conn
            .query_row("SELECT value FROM config WHERE key = 'k'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(value, "1");
    }
}
