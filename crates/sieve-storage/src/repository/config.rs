//! Settings key/value repository.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::Config;

/// Repository for the `config` table. Values are stored as JSON text.
pub struct ConfigRepo;

impl ConfigRepo {
    /// Get a configuration value.
    pub fn get(conn: &Connection, key: &str) -> Result<Option<Config>> {
        let raw: Option<(String, String)> = conn
            .query_row(
                "SELECT key, value FROM config WHERE key = ?1",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        raw.map(|(key, value)| -> Result<Config> {
            Ok(Config {
                key,
                value: serde_json::from_str(&value)?,
            })
        })
        .transpose()
    }

    /// Set a configuration value (insert or update).
    pub fn set(conn: &Connection, key: &str, value: &serde_json::Value) -> Result<()> {
        let value_json = serde_json::to_string(value)?;

        conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value_json],
        )?;

        Ok(())
    }

    /// Delete a configuration value.
    pub fn delete(conn: &Connection, key: &str) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM config WHERE key = ?1", [key])?;
        Ok(deleted > 0)
    }

    /// Get a typed configuration value, falling back to `default` when the
    /// key is missing or holds something that does not deserialize as `T`.
    pub fn get_or_default<T: serde::de::DeserializeOwned>(
        conn: &Connection,
        key: &str,
        default: T,
    ) -> Result<T> {
        match Self::get(conn, key)? {
            Some(config) => Ok(serde_json::from_value(config.value).unwrap_or(default)),
            None => Ok(default),
        }
    }
}
