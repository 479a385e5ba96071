//! Subscriptions repository.

use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use sieve_core::{RuleMode, RuleSubscription, SyncStatus};

use super::parse_datetime;
use crate::error::{Result, StorageError};

const COLUMNS: &str = "subscription_id, name, url, mode, enable, priority, create_time,
     update_time, last_sync_time, last_sync_status, version, extra, file_path";

/// Repository for subscription rows.
pub struct SubscriptionsRepo;

impl SubscriptionsRepo {
    /// Insert a new subscription. The id on `subscription` is ignored.
    pub fn insert(conn: &Connection, subscription: &RuleSubscription) -> Result<i64> {
        conn.execute(
            "INSERT INTO rule_subscriptions (name, url, mode, enable, priority, create_time,
             update_time, last_sync_time, last_sync_status, version, extra, file_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                subscription.name,
                subscription.url,
                subscription.mode.as_str(),
                subscription.enable as i32,
                subscription.priority,
                subscription.create_time.to_rfc3339(),
                subscription.update_time.to_rfc3339(),
                subscription.last_sync_time.to_rfc3339(),
                subscription.last_sync_status.as_str(),
                subscription.version,
                subscription.extra,
                subscription.file_path,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Update an existing subscription row.
    pub fn update(conn: &Connection, subscription: &RuleSubscription) -> Result<()> {
        let updated = conn.execute(
            "UPDATE rule_subscriptions SET name = ?1, url = ?2, mode = ?3, enable = ?4,
             priority = ?5, create_time = ?6, update_time = ?7, last_sync_time = ?8,
             last_sync_status = ?9, version = ?10, extra = ?11, file_path = ?12
             WHERE subscription_id = ?13",
            params![
                subscription.name,
                subscription.url,
                subscription.mode.as_str(),
                subscription.enable as i32,
                subscription.priority,
                subscription.create_time.to_rfc3339(),
                subscription.update_time.to_rfc3339(),
                subscription.last_sync_time.to_rfc3339(),
                subscription.last_sync_status.as_str(),
                subscription.version,
                subscription.extra,
                subscription.file_path,
                subscription.subscription_id,
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::NotFound(format!(
                "Subscription with id {}",
                subscription.subscription_id
            )));
        }

        Ok(())
    }

    /// Get a subscription by ID.
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<RuleSubscription>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM rule_subscriptions WHERE subscription_id = ?1"
        ))?;

        let mut rows = stmt.query_map([id], Self::from_row)?;
        Ok(rows.next().transpose()?)
    }

    /// Get all subscriptions, ordered by priority.
    pub fn get_all(conn: &Connection) -> Result<Vec<RuleSubscription>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM rule_subscriptions ORDER BY priority ASC, subscription_id ASC"
        ))?;

        let subscriptions = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subscriptions)
    }

    /// Get the subscriptions of one mode, optionally only the enabled ones.
    pub fn get_by_mode(
        conn: &Connection,
        mode: RuleMode,
        active_only: bool,
    ) -> Result<Vec<RuleSubscription>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM rule_subscriptions
             WHERE mode = ?1 AND (enable = 1 OR ?2 = 0)
             ORDER BY priority ASC, subscription_id ASC"
        ))?;

        let subscriptions = stmt
            .query_map(params![mode.as_str(), active_only as i32], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subscriptions)
    }

    /// Get every enabled subscription regardless of mode.
    pub fn get_active(conn: &Connection) -> Result<Vec<RuleSubscription>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM rule_subscriptions WHERE enable = 1
             ORDER BY priority ASC, subscription_id ASC"
        ))?;

        let subscriptions = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subscriptions)
    }

    /// Ids of subscriptions whose downloaded config lives at `file_path`.
    pub fn ids_by_file_path(conn: &Connection, file_path: &str) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT subscription_id FROM rule_subscriptions WHERE file_path = ?1
             ORDER BY subscription_id ASC",
        )?;

        let ids = stmt
            .query_map([file_path], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Delete a subscription row.
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        let deleted = conn.execute(
            "DELETE FROM rule_subscriptions WHERE subscription_id = ?1",
            [id],
        )?;

        if deleted == 0 {
            return Err(StorageError::NotFound(format!("Subscription with id {}", id)));
        }

        Ok(())
    }

    /// Count total subscriptions.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM rule_subscriptions", [], |row| row.get(0))?;
        Ok(count)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<RuleSubscription> {
        let mode: String = row.get(3)?;
        let status: String = row.get(9)?;

        Ok(RuleSubscription {
            subscription_id: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            mode: RuleMode::parse(&mode).ok_or_else(|| invalid_text(3, "mode", &mode))?,
            enable: row.get::<_, i32>(4)? != 0,
            priority: row.get(5)?,
            create_time: parse_datetime(&row.get::<_, String>(6)?),
            update_time: parse_datetime(&row.get::<_, String>(7)?),
            last_sync_time: parse_datetime(&row.get::<_, String>(8)?),
            last_sync_status: SyncStatus::parse(&status)
                .ok_or_else(|| invalid_text(9, "sync status", &status))?,
            version: row.get(10)?,
            extra: row.get(11)?,
            file_path: row.get(12)?,
        })
    }
}

fn invalid_text(column: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        format!("unknown {what}: {value}").into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;
    use chrono::Utc;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn subscription(name: &str, mode: RuleMode, priority: i32) -> RuleSubscription {
        let now = Utc::now();
        RuleSubscription {
            subscription_id: 0,
            name: name.to_string(),
            url: format!("https://example.com/{name}"),
            mode,
            enable: true,
            priority,
            create_time: now,
            update_time: now,
            last_sync_time: now,
            last_sync_status: SyncStatus::Success,
            version: 0,
            extra: String::new(),
            file_path: format!("/data/subscriptions/{name}"),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let conn = setup_db();

        let id = SubscriptionsRepo::insert(&conn, &subscription("a.conf", RuleMode::Proxy, 3))
            .unwrap();
        let stored = SubscriptionsRepo::get_by_id(&conn, id).unwrap().unwrap();

        assert_eq!(stored.subscription_id, id);
        assert_eq!(stored.name, "a.conf");
        assert_eq!(stored.mode, RuleMode::Proxy);
        assert_eq!(stored.priority, 3);
        assert!(stored.enable);
        assert!(SubscriptionsRepo::get_by_id(&conn, id + 1).unwrap().is_none());
    }

    #[test]
    fn test_ordering_by_priority_then_id() {
        let conn = setup_db();

        let late = SubscriptionsRepo::insert(&conn, &subscription("late", RuleMode::ByPass, 2))
            .unwrap();
        let first = SubscriptionsRepo::insert(&conn, &subscription("first", RuleMode::ByPass, 0))
            .unwrap();
        let tie = SubscriptionsRepo::insert(&conn, &subscription("tie", RuleMode::ByPass, 0))
            .unwrap();

        let ids: Vec<i64> = SubscriptionsRepo::get_all(&conn)
            .unwrap()
            .iter()
            .map(|s| s.subscription_id)
            .collect();
        assert_eq!(ids, vec![first, tie, late]);
    }

    #[test]
    fn test_get_by_mode() {
        let conn = setup_db();

        SubscriptionsRepo::insert(&conn, &subscription("p", RuleMode::Proxy, 0)).unwrap();
        let mut disabled = subscription("b-off", RuleMode::ByPass, 0);
        disabled.enable = false;
        SubscriptionsRepo::insert(&conn, &disabled).unwrap();
        SubscriptionsRepo::insert(&conn, &subscription("b-on", RuleMode::ByPass, 1)).unwrap();

        let all_bypass = SubscriptionsRepo::get_by_mode(&conn, RuleMode::ByPass, false).unwrap();
        assert_eq!(all_bypass.len(), 2);

        let active = SubscriptionsRepo::get_by_mode(&conn, RuleMode::ByPass, true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "b-on");

        assert_eq!(SubscriptionsRepo::get_active(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_update_keeps_id() {
        let conn = setup_db();

        let id = SubscriptionsRepo::insert(&conn, &subscription("a", RuleMode::Proxy, 0)).unwrap();
        let mut changed = subscription("renamed", RuleMode::Proxy, 4);
        changed.subscription_id = id;
        SubscriptionsRepo::update(&conn, &changed).unwrap();

        assert_eq!(SubscriptionsRepo::count(&conn).unwrap(), 1);
        let stored = SubscriptionsRepo::get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(stored.name, "renamed");
        assert_eq!(stored.priority, 4);
    }

    #[test]
    fn test_ids_by_file_path() {
        let conn = setup_db();

        let mut first = subscription("a", RuleMode::Proxy, 0);
        first.file_path = "/data/subscriptions/rules.conf".to_string();
        let mut second = subscription("b", RuleMode::ByPass, 1);
        second.file_path = "/data/subscriptions/rules-1.conf".to_string();
        let a = SubscriptionsRepo::insert(&conn, &first).unwrap();
        SubscriptionsRepo::insert(&conn, &second).unwrap();

        assert_eq!(
            SubscriptionsRepo::ids_by_file_path(&conn, "/data/subscriptions/rules.conf").unwrap(),
            vec![a]
        );
        assert!(SubscriptionsRepo::ids_by_file_path(&conn, "/data/other.conf")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_update_and_delete_missing() {
        let conn = setup_db();

        let mut missing = subscription("ghost", RuleMode::Proxy, 0);
        missing.subscription_id = 99;
        assert!(matches!(
            SubscriptionsRepo::update(&conn, &missing),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            SubscriptionsRepo::delete(&conn, 99),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_sync_status_round_trip() {
        let conn = setup_db();

        let mut failed = subscription("f", RuleMode::ByPass, 0);
        failed.last_sync_status = SyncStatus::Failed;
        let id = SubscriptionsRepo::insert(&conn, &failed).unwrap();

        let stored = SubscriptionsRepo::get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(stored.last_sync_status, SyncStatus::Failed);
        assert_eq!(
            stored.create_time.timestamp(),
            failed.create_time.timestamp()
        );
    }
}
