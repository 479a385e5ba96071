//! Rules and subscription cross-reference repository.

use rusqlite::{params, Connection, OptionalExtension};
use sieve_core::{Rule, SubscriptionRuleCrossRef};

use crate::error::Result;

/// Repository for rule rows and the subscription/rule join table.
pub struct RulesRepo;

impl RulesRepo {
    /// Look up a rule by identity.
    pub fn find_by_type_and_value(
        conn: &Connection,
        rule_type: &str,
        rule_value: &str,
    ) -> Result<Option<Rule>> {
        let rule = conn
            .query_row(
                "SELECT id, rule_type, rule_value FROM rules
                 WHERE rule_type = ?1 AND rule_value = ?2",
                params![rule_type, rule_value],
                |row| {
                    Ok(Rule {
                        id: row.get(0)?,
                        rule_type: row.get(1)?,
                        rule_value: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(rule)
    }

    /// Return the id of the rule with this identity, inserting it if needed.
    pub fn find_or_insert(conn: &Connection, rule_type: &str, rule_value: &str) -> Result<i64> {
        conn.execute(
            "INSERT OR IGNORE INTO rules (rule_type, rule_value) VALUES (?1, ?2)",
            params![rule_type, rule_value],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM rules WHERE rule_type = ?1 AND rule_value = ?2",
            params![rule_type, rule_value],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Rules referenced by a subscription, in config order.
    pub fn get_for_subscription(conn: &Connection, subscription_id: i64) -> Result<Vec<Rule>> {
        let mut stmt = conn.prepare(
            "SELECT r.id, r.rule_type, r.rule_value
             FROM subscription_rule_cross_ref x
             JOIN rules r ON r.id = x.rule_id
             WHERE x.subscription_id = ?1
             ORDER BY x.position ASC, r.id ASC",
        )?;

        let rules = stmt
            .query_map([subscription_id], |row| {
                Ok(Rule {
                    id: row.get(0)?,
                    rule_type: row.get(1)?,
                    rule_value: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rules)
    }

    /// References currently held by a subscription.
    pub fn cross_refs_for_subscription(
        conn: &Connection,
        subscription_id: i64,
    ) -> Result<Vec<SubscriptionRuleCrossRef>> {
        let mut stmt = conn.prepare(
            "SELECT subscription_id, rule_id FROM subscription_rule_cross_ref
             WHERE subscription_id = ?1",
        )?;

        let refs = stmt
            .query_map([subscription_id], |row| {
                Ok(SubscriptionRuleCrossRef {
                    subscription_id: row.get(0)?,
                    rule_id: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(refs)
    }

    /// Reference a rule from a subscription, or move an existing reference.
    pub fn link(conn: &Connection, subscription_id: i64, rule_id: i64, position: i64) -> Result<()> {
        conn.execute(
            "INSERT INTO subscription_rule_cross_ref (subscription_id, rule_id, position)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(subscription_id, rule_id) DO UPDATE SET position = excluded.position",
            params![subscription_id, rule_id, position],
        )?;
        Ok(())
    }

    /// Drop one reference.
    pub fn unlink(conn: &Connection, subscription_id: i64, rule_id: i64) -> Result<()> {
        conn.execute(
            "DELETE FROM subscription_rule_cross_ref WHERE subscription_id = ?1 AND rule_id = ?2",
            params![subscription_id, rule_id],
        )?;
        Ok(())
    }

    /// Drop every reference held by a subscription.
    pub fn unlink_all(conn: &Connection, subscription_id: i64) -> Result<usize> {
        let removed = conn.execute(
            "DELETE FROM subscription_rule_cross_ref WHERE subscription_id = ?1",
            [subscription_id],
        )?;
        Ok(removed)
    }

    /// Delete rules no subscription references. Returns how many went.
    pub fn delete_orphans(conn: &Connection) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM rules
             WHERE id NOT IN (SELECT rule_id FROM subscription_rule_cross_ref)",
            [],
        )?;
        Ok(deleted)
    }

    /// Count total rules.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM rules", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count total cross-references.
    pub fn count_cross_refs(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM subscription_rule_cross_ref",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn add_subscription(conn: &Connection, name: &str) -> i64 {
        conn.execute(
            "INSERT INTO rule_subscriptions (name, url, mode, create_time, update_time,
             last_sync_time, last_sync_status)
             VALUES (?1, 'https://example.com', 'proxy', '', '', '', 'success')",
            [name],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_find_or_insert_reuses_rule() {
        let conn = setup_db();

        let first = RulesRepo::find_or_insert(&conn, "EXTRA", "com.a").unwrap();
        let again = RulesRepo::find_or_insert(&conn, "EXTRA", "com.a").unwrap();
        let other = RulesRepo::find_or_insert(&conn, "REGEX", "com.a").unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(RulesRepo::count(&conn).unwrap(), 2);

        let rule = RulesRepo::find_by_type_and_value(&conn, "EXTRA", "com.a")
            .unwrap()
            .unwrap();
        assert_eq!(rule.id, first);
        assert!(RulesRepo::find_by_type_and_value(&conn, "EXTRA", "com.b")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_link_orders_by_position() {
        let conn = setup_db();
        let sub = add_subscription(&conn, "s");

        let b = RulesRepo::find_or_insert(&conn, "EXTRA", "com.b").unwrap();
        let a = RulesRepo::find_or_insert(&conn, "EXTRA", "com.a").unwrap();
        RulesRepo::link(&conn, sub, b, 1).unwrap();
        RulesRepo::link(&conn, sub, a, 0).unwrap();
        RulesRepo::link(&conn, sub, a, 0).unwrap();

        let values: Vec<String> = RulesRepo::get_for_subscription(&conn, sub)
            .unwrap()
            .into_iter()
            .map(|r| r.rule_value)
            .collect();
        assert_eq!(values, vec!["com.a", "com.b"]);
        assert_eq!(RulesRepo::count_cross_refs(&conn).unwrap(), 2);
    }

    #[test]
    fn test_delete_orphans_spares_shared_rules() {
        let conn = setup_db();
        let first = add_subscription(&conn, "first");
        let second = add_subscription(&conn, "second");

        let shared = RulesRepo::find_or_insert(&conn, "EXTRA", "com.shared").unwrap();
        let own = RulesRepo::find_or_insert(&conn, "EXTRA", "com.own").unwrap();
        RulesRepo::link(&conn, first, shared, 0).unwrap();
        RulesRepo::link(&conn, first, own, 1).unwrap();
        RulesRepo::link(&conn, second, shared, 0).unwrap();
        assert_eq!(RulesRepo::count_cross_refs(&conn).unwrap(), 3);

        assert_eq!(RulesRepo::unlink_all(&conn, first).unwrap(), 2);
        assert_eq!(RulesRepo::delete_orphans(&conn).unwrap(), 1);

        assert!(RulesRepo::find_by_type_and_value(&conn, "EXTRA", "com.shared")
            .unwrap()
            .is_some());
        assert!(RulesRepo::find_by_type_and_value(&conn, "EXTRA", "com.own")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_link_requires_existing_rows() {
        let conn = setup_db();
        let sub = add_subscription(&conn, "s");
        assert!(RulesRepo::link(&conn, sub, 404, 0).is_err());
    }
}
