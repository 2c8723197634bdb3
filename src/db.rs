//! # Activity Store Module
//!
//! SQLite-backed persistence for user activity and per-period button
//! counters. One table per concern with a fixed schema; the calendar period
//! is a column, not a table name, so no dynamic DDL is ever issued.
//!
//! Every operation commits on its own; there are no multi-statement
//! transactions. The two synthetic counters (`active_users`,
//! `inactive_users`) of the current period are refreshed only when
//! [`ActivityStore::count_by_activity`] runs, so historical snapshots are
//! point-in-time artifacts of the last refresh.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{FixedOffset, Utc};
use log::info;
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

/// Synthetic counter rows kept next to the button counters of each period.
pub const SYNTHETIC_COUNTERS: [&str; 2] = ["active_users", "inactive_users"];

/// Aggregate activity snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityCounts {
    pub active: i64,
    pub inactive: i64,
}

impl ActivityCounts {
    pub fn total(&self) -> i64 {
        self.active + self.inactive
    }
}

/// Handle over the shared SQLite connection. Cheap to clone; all clones
/// serialize on the same connection.
#[derive(Clone)]
pub struct ActivityStore {
    conn: Arc<Mutex<Connection>>,
    buttons: Arc<Vec<String>>,
    offset: FixedOffset,
}

impl ActivityStore {
    /// Open (or create) the database, initialize the schema and seed the
    /// current period's counter rows.
    pub fn open(path: &Path, buttons: Vec<String>, offset: FixedOffset) -> Result<Self> {
        info!("Opening activity store at: {}", path.display());

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                is_active INTEGER NOT NULL DEFAULT 1
            )",
            [],
        )
        .context("failed to create users table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS period_stats (
                period TEXT NOT NULL,
                button TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (period, button)
            )",
            [],
        )
        .context("failed to create period_stats table")?;

        let buttons = Arc::new(buttons);
        let period = Utc::now().with_timezone(&offset).format("%Y-%m").to_string();
        Self::seed_period(&conn, &buttons, &period)?;

        info!("Activity store ready, current period: {period}");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            buttons,
            offset,
        })
    }

    /// Key of the calendar period the configured clock is currently in,
    /// formatted `YYYY-MM` so lexicographic order is chronological.
    pub fn current_period(&self) -> String {
        Utc::now()
            .with_timezone(&self.offset)
            .format("%Y-%m")
            .to_string()
    }

    /// Register a user on first contact, or flip an existing one back to
    /// active.
    pub async fn add_or_reactivate(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO users (user_id) VALUES (?1)
             ON CONFLICT(user_id) DO UPDATE SET is_active = 1",
            params![user_id],
        )
        .context("failed to upsert user")?;
        Ok(())
    }

    /// Flip a user's activity flag.
    pub async fn set_active(&self, user_id: &str, active: bool) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE users SET is_active = ?1 WHERE user_id = ?2",
            params![active as i64, user_id],
        )
        .context("failed to update user activity")?;
        Ok(())
    }

    /// Identifiers of every currently active user.
    pub async fn list_active(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT user_id FROM users WHERE is_active = 1")
            .context("failed to prepare active-user query")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to read active users")?;
        Ok(ids)
    }

    /// Count users by activity and refresh the current period's synthetic
    /// counter rows with the result.
    pub async fn count_by_activity(&self) -> Result<ActivityCounts> {
        let period = self.current_period();
        let conn = self.conn.lock().await;
        Self::seed_period(&conn, &self.buttons, &period)?;

        let count_for = |active: i64| -> Result<i64> {
            conn.query_row(
                "SELECT COUNT(*) FROM users WHERE is_active = ?1",
                params![active],
                |row| row.get(0),
            )
            .context("failed to count users")
        };
        let counts = ActivityCounts {
            active: count_for(1)?,
            inactive: count_for(0)?,
        };

        for (button, value) in [
            ("active_users", counts.active),
            ("inactive_users", counts.inactive),
        ] {
            conn.execute(
                "UPDATE period_stats SET count = ?1 WHERE period = ?2 AND button = ?3",
                params![value, period, button],
            )
            .context("failed to refresh synthetic counter")?;
        }

        Ok(counts)
    }

    /// Seed a period's counter rows if it has not been touched yet.
    pub async fn ensure_period(&self, period: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        Self::seed_period(&conn, &self.buttons, period)
    }

    /// Increment a button counter in the current period. Untracked buttons
    /// have no row and the update is a no-op.
    pub async fn increment_button(&self, button: &str) -> Result<()> {
        let period = self.current_period();
        let conn = self.conn.lock().await;
        Self::seed_period(&conn, &self.buttons, &period)?;
        conn.execute(
            "UPDATE period_stats SET count = count + 1 WHERE period = ?1 AND button = ?2",
            params![period, button],
        )
        .context("failed to increment button counter")?;
        Ok(())
    }

    /// Overwrite a single counter value.
    pub async fn write_counter(&self, period: &str, button: &str, value: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        Self::seed_period(&conn, &self.buttons, period)?;
        conn.execute(
            "UPDATE period_stats SET count = ?1 WHERE period = ?2 AND button = ?3",
            params![value, period, button],
        )
        .context("failed to write counter")?;
        Ok(())
    }

    /// All counter rows of a period, in seeding order (authored buttons
    /// first, synthetic rows last).
    pub async fn read_period(&self, period: &str) -> Result<Vec<(String, i64)>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT button, count FROM period_stats WHERE period = ?1 ORDER BY rowid")
            .context("failed to prepare period query")?;
        let rows = stmt
            .query_map(params![period], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to read period counters")?;
        Ok(rows)
    }

    /// Every period present in storage, chronologically ascending.
    pub async fn list_periods(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT DISTINCT period FROM period_stats ORDER BY period")
            .context("failed to prepare period listing")?;
        let periods = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to list periods")?;
        Ok(periods)
    }

    fn seed_period(conn: &Connection, buttons: &[String], period: &str) -> Result<()> {
        let mut stmt = conn
            .prepare("INSERT OR IGNORE INTO period_stats (period, button) VALUES (?1, ?2)")
            .context("failed to prepare period seeding")?;
        for button in buttons.iter().map(String::as_str).chain(SYNTHETIC_COUNTERS) {
            stmt.execute(params![period, button])
                .context("failed to seed counter row")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn setup_test_store() -> Result<(ActivityStore, NamedTempFile)> {
        let temp_file = NamedTempFile::new()?;
        let store = ActivityStore::open(
            temp_file.path(),
            vec!["about".to_string(), "services".to_string()],
            FixedOffset::east_opt(8 * 3600).unwrap(),
        )?;
        Ok((store, temp_file))
    }

    #[tokio::test]
    async fn test_add_and_list_active() -> Result<()> {
        let (store, _temp_file) = setup_test_store()?;

        store.add_or_reactivate("100").await?;
        store.add_or_reactivate("200").await?;

        let active = store.list_active().await?;
        assert_eq!(active, vec!["100".to_string(), "200".to_string()]);

        Ok(())
    }

    #[tokio::test]
    async fn test_deactivated_user_leaves_active_list() -> Result<()> {
        let (store, _temp_file) = setup_test_store()?;

        store.add_or_reactivate("100").await?;
        store.add_or_reactivate("200").await?;
        store.set_active("100", false).await?;

        let active = store.list_active().await?;
        assert_eq!(active, vec!["200".to_string()]);

        Ok(())
    }

    #[tokio::test]
    async fn test_reactivation_on_repeat_contact() -> Result<()> {
        let (store, _temp_file) = setup_test_store()?;

        store.add_or_reactivate("100").await?;
        store.set_active("100", false).await?;
        store.add_or_reactivate("100").await?;

        let active = store.list_active().await?;
        assert_eq!(active, vec!["100".to_string()]);

        Ok(())
    }

    #[tokio::test]
    async fn test_count_refreshes_synthetic_rows() -> Result<()> {
        let (store, _temp_file) = setup_test_store()?;

        store.add_or_reactivate("100").await?;
        store.add_or_reactivate("200").await?;
        store.add_or_reactivate("300").await?;
        store.set_active("300", false).await?;

        let counts = store.count_by_activity().await?;
        assert_eq!(
            counts,
            ActivityCounts {
                active: 2,
                inactive: 1
            }
        );
        assert_eq!(counts.total(), 3);

        let period = store.current_period();
        let rows = store.read_period(&period).await?;
        assert!(rows.contains(&("active_users".to_string(), 2)));
        assert!(rows.contains(&("inactive_users".to_string(), 1)));

        Ok(())
    }

    #[tokio::test]
    async fn test_increment_tracked_button() -> Result<()> {
        let (store, _temp_file) = setup_test_store()?;

        store.increment_button("about").await?;
        store.increment_button("about").await?;
        store.increment_button("untracked").await?;

        let period = store.current_period();
        let rows = store.read_period(&period).await?;
        assert!(rows.contains(&("about".to_string(), 2)));
        assert!(!rows.iter().any(|(button, _)| button == "untracked"));

        Ok(())
    }

    #[tokio::test]
    async fn test_period_rows_keep_seed_order() -> Result<()> {
        let (store, _temp_file) = setup_test_store()?;

        let period = store.current_period();
        let rows = store.read_period(&period).await?;
        let buttons: Vec<&str> = rows.iter().map(|(button, _)| button.as_str()).collect();
        assert_eq!(
            buttons,
            vec!["about", "services", "active_users", "inactive_users"]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_periods_are_isolated_and_sorted() -> Result<()> {
        let (store, _temp_file) = setup_test_store()?;

        store.ensure_period("2025-03").await?;
        store.ensure_period("2025-01").await?;
        store.write_counter("2025-01", "about", 7).await?;

        let rows_march = store.read_period("2025-03").await?;
        assert!(rows_march.contains(&("about".to_string(), 0)));

        let rows_january = store.read_period("2025-01").await?;
        assert!(rows_january.contains(&("about".to_string(), 7)));

        let periods = store.list_periods().await?;
        let current = store.current_period();
        assert_eq!(
            periods,
            vec!["2025-01".to_string(), "2025-03".to_string(), current]
        );

        Ok(())
    }
}
