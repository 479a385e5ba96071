//! Database schema and migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StorageError};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StorageError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current_version, SCHEMA_VERSION
        )));
    }

    if current_version < SCHEMA_VERSION {
        info!(
            "Running migrations from version {} to {}",
            current_version, SCHEMA_VERSION
        );

        if current_version < 1 {
            migrate_v1(conn)?;
        }

        if current_version < 2 {
            migrate_v2(conn)?;
        }

        set_schema_version(conn, SCHEMA_VERSION)?;
        info!("Migrations complete");
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration to version 1: Initial schema.
fn migrate_v1(conn: &Connection) -> Result<()> {
    info!("Applying migration v1: Initial schema");

    // Subscriptions - one row per remote config
    conn.execute(
        "CREATE TABLE IF NOT EXISTS rule_subscriptions (
            subscription_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            mode TEXT NOT NULL,
            enable INTEGER NOT NULL DEFAULT 1,
            priority INTEGER NOT NULL DEFAULT 0,
            create_time TEXT NOT NULL,
            update_time TEXT NOT NULL,
            last_sync_time TEXT NOT NULL,
            last_sync_status TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 0,
            extra TEXT NOT NULL DEFAULT '',
            file_path TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    // Rules - shared between subscriptions, unique by identity
    conn.execute(
        "CREATE TABLE IF NOT EXISTS rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rule_type TEXT NOT NULL,
            rule_value TEXT NOT NULL,
            UNIQUE (rule_type, rule_value)
        )",
        [],
    )?;

    // Which subscription references which rule
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subscription_rule_cross_ref (
            subscription_id INTEGER NOT NULL
                REFERENCES rule_subscriptions (subscription_id) ON DELETE CASCADE,
            rule_id INTEGER NOT NULL
                REFERENCES rules (id),
            position INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (subscription_id, rule_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cross_ref_rule_id
         ON subscription_rule_cross_ref (rule_id)",
        [],
    )?;

    // Config table - key-value configuration
    conn.execute(
        "CREATE TABLE IF NOT EXISTS config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Migration to version 2: Index for per-mode listing.
fn migrate_v2(conn: &Connection) -> Result<()> {
    info!("Applying migration v2: Subscription mode index");

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_mode_priority
         ON rule_subscriptions (mode, enable, priority)",
        [],
    )?;

    Ok(())
}
