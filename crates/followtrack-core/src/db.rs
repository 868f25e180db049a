//! SQLite persistence for tracked accounts, daily stats and notifications.

use crate::store::{HistoryStore, Observation};
use crate::{Result, TrackerError};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use followtrack_types::{
    DailyStatsRecord, MetricDeltas, Metrics, NotificationRecord, Snapshot, TrackedAccount,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str = "id, user_id, provider_id, handle, display_name, avatar_url, bio, \
     is_verified, is_private, follower_count, following_count, post_count, engagement_count, \
     added_at, last_updated_at";

const DAILY_COLUMNS: &str = "account_id, recorded_on, follower_count, following_count, post_count, \
     engagement_count, follower_change, post_change, engagement_change, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "id, user_id, account_id, message, is_read, created_at";

const DATE_FORMAT: &str = "%Y-%m-%d";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based history store.
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        // A server and a CLI run may share the file.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| TrackerError::StoreUnavailable)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tracked_accounts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider_id TEXT NOT NULL,
                handle TEXT NOT NULL,
                display_name TEXT NOT NULL DEFAULT '',
                avatar_url TEXT,
                bio TEXT NOT NULL DEFAULT '',
                is_verified INTEGER NOT NULL DEFAULT 0,
                is_private INTEGER NOT NULL DEFAULT 0,
                follower_count INTEGER NOT NULL DEFAULT 0,
                following_count INTEGER NOT NULL DEFAULT 0,
                post_count INTEGER NOT NULL DEFAULT 0,
                engagement_count INTEGER NOT NULL DEFAULT 0,
                added_at TEXT NOT NULL,
                last_updated_at TEXT NOT NULL,
                UNIQUE (user_id, provider_id)
            );

            CREATE INDEX IF NOT EXISTS idx_tracked_accounts_user ON tracked_accounts(user_id);

            CREATE TABLE IF NOT EXISTS daily_stats (
                account_id TEXT NOT NULL REFERENCES tracked_accounts(id) ON DELETE CASCADE,
                recorded_on TEXT NOT NULL,
                follower_count INTEGER NOT NULL DEFAULT 0,
                following_count INTEGER NOT NULL DEFAULT 0,
                post_count INTEGER NOT NULL DEFAULT 0,
                engagement_count INTEGER NOT NULL DEFAULT 0,
                follower_change INTEGER NOT NULL DEFAULT 0,
                post_change INTEGER NOT NULL DEFAULT 0,
                engagement_change INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (account_id, recorded_on)
            );

            CREATE INDEX IF NOT EXISTS idx_daily_stats_recorded_on ON daily_stats(recorded_on);

            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                account_id TEXT NOT NULL REFERENCES tracked_accounts(id) ON DELETE CASCADE,
                message TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read);

            CREATE TABLE IF NOT EXISTS cycle_lock (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                owner TEXT NOT NULL,
                heartbeat_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Insert a new account together with its first day bucket.
    pub fn insert_account(
        &self,
        account: &TrackedAccount,
        first_record: &DailyStatsRecord,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO tracked_accounts ({ACCOUNT_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                account.id.to_string(),
                account.user_id.to_string(),
                account.provider_id,
                account.handle,
                account.display_name,
                account.avatar_url,
                account.bio,
                account.verified,
                account.private,
                account.metrics.follower_count,
                account.metrics.following_count,
                account.metrics.post_count,
                account.metrics.engagement_count,
                timestamp(&account.added_at),
                timestamp(&account.last_updated_at),
            ],
        )?;
        insert_daily(&tx, first_record)?;
        tx.commit()?;
        Ok(())
    }

    /// Find the account a user tracks for a given provider identity.
    pub fn find_by_provider_id(
        &self,
        user_id: Uuid,
        provider_id: &str,
    ) -> Result<Option<TrackedAccount>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM tracked_accounts \
                     WHERE user_id = ?1 AND provider_id = ?2"
                ),
                params![user_id.to_string(), provider_id],
                row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    /// Get an account owned by `user_id`.
    pub fn account(&self, user_id: Uuid, account_id: Uuid) -> Result<Option<TrackedAccount>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM tracked_accounts WHERE id = ?1 AND user_id = ?2"),
                params![account_id.to_string(), user_id.to_string()],
                row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    /// List a user's accounts, most recently added first.
    pub fn list_accounts(&self, user_id: Uuid) -> Result<Vec<TrackedAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM tracked_accounts WHERE user_id = ?1 \
             ORDER BY added_at DESC, rowid DESC"
        ))?;
        let accounts = stmt
            .query_map(params![user_id.to_string()], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Most recent `limit` buckets for an account, newest first.
    pub fn recent_history(&self, account_id: Uuid, limit: usize) -> Result<Vec<DailyStatsRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DAILY_COLUMNS} FROM daily_stats WHERE account_id = ?1 \
             ORDER BY recorded_on DESC LIMIT ?2"
        ))?;
        let records = stmt
            .query_map(params![account_id.to_string(), limit as i64], row_to_daily)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Delete an account; history and notifications cascade.
    /// Returns `false` when the user owns no such account.
    pub fn delete_account(&self, user_id: Uuid, account_id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "DELETE FROM tracked_accounts WHERE id = ?1 AND user_id = ?2",
            params![account_id.to_string(), user_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// A user's notifications, newest first.
    pub fn notifications(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<NotificationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0) \
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let notifications = stmt
            .query_map(params![user_id.to_string(), unread_only], row_to_notification)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(notifications)
    }

    /// Returns `false` when the user owns no such notification.
    pub fn mark_notification_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
            params![notification_id.to_string(), user_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Mark every unread notification of a user as read. Returns the count.
    pub fn mark_all_read(&self, user_id: Uuid) -> Result<usize> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
            params![user_id.to_string()],
        )?;
        Ok(affected)
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn tracked_accounts(&self) -> Result<Vec<TrackedAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM tracked_accounts ORDER BY added_at ASC, rowid ASC"
        ))?;
        let accounts = stmt
            .query_map([], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    fn current_metrics(&self, account_id: Uuid) -> Result<Option<Metrics>> {
        let conn = self.conn()?;
        let metrics = conn
            .query_row(
                "SELECT follower_count, following_count, post_count, engagement_count \
                 FROM tracked_accounts WHERE id = ?1",
                params![account_id.to_string()],
                |row| {
                    Ok(Metrics {
                        follower_count: row.get(0)?,
                        following_count: row.get(1)?,
                        post_count: row.get(2)?,
                        engagement_count: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(metrics)
    }

    fn daily_record(&self, account_id: Uuid, date: NaiveDate) -> Result<Option<DailyStatsRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {DAILY_COLUMNS} FROM daily_stats WHERE account_id = ?1 AND recorded_on = ?2"),
                params![account_id.to_string(), date.format(DATE_FORMAT).to_string()],
                row_to_daily,
            )
            .optional()?;
        Ok(record)
    }

    fn upsert_daily_record(&self, record: &DailyStatsRecord, is_new_day: bool) -> Result<()> {
        let conn = self.conn()?;
        write_daily(&conn, record, is_new_day)
    }

    fn update_current_metrics(
        &self,
        account_id: Uuid,
        snapshot: &Snapshot,
        observed_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn()?;
        write_current(&conn, account_id, snapshot, observed_at)
    }

    fn insert_notification(&self, notification: &NotificationRecord) -> Result<()> {
        let conn = self.conn()?;
        write_notification(&conn, notification)
    }

    fn ordered_history(&self, account_id: Uuid) -> Result<Vec<DailyStatsRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DAILY_COLUMNS} FROM daily_stats WHERE account_id = ?1 ORDER BY recorded_on ASC"
        ))?;
        let records = stmt
            .query_map(params![account_id.to_string()], row_to_daily)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn apply_observation(&self, observation: &Observation<'_>) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        write_current(
            &tx,
            observation.account_id,
            observation.snapshot,
            observation.observed_at,
        )?;
        write_daily(&tx, observation.record, observation.is_new_day)?;
        if let Some(notification) = observation.notification {
            write_notification(&tx, notification)?;
        }
        tx.commit()?;
        debug!(
            target: "followtrack::store",
            "Applied observation for {} on {} (new day: {})",
            observation.account_id,
            observation.record.date,
            observation.is_new_day
        );
        Ok(())
    }

    fn claim_cycle_lock(
        &self,
        owner: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn()?;
        // Single statement, so the claim is atomic across connections.
        let claimed = conn.execute(
            "INSERT INTO cycle_lock (id, owner, heartbeat_at) VALUES (1, ?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET owner = excluded.owner, heartbeat_at = excluded.heartbeat_at \
             WHERE cycle_lock.owner = excluded.owner OR cycle_lock.heartbeat_at < ?3",
            params![owner.to_string(), timestamp(&now), timestamp(&stale_before)],
        )?;
        Ok(claimed > 0)
    }

    fn release_cycle_lock(&self, owner: Uuid) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM cycle_lock WHERE id = 1 AND owner = ?1",
            params![owner.to_string()],
        )?;
        Ok(())
    }

    fn replace_change_series(&self, account_id: Uuid, records: &[DailyStatsRecord]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE daily_stats SET follower_change = ?1, post_change = ?2, engagement_change = ?3 \
                 WHERE account_id = ?4 AND recorded_on = ?5",
            )?;
            for record in records {
                let affected = stmt.execute(params![
                    record.changes.follower_change,
                    record.changes.post_change,
                    record.changes.engagement_change,
                    account_id.to_string(),
                    record.date.format(DATE_FORMAT).to_string(),
                ])?;
                if affected == 0 {
                    return Err(TrackerError::DailyRecordNotFound {
                        account_id,
                        date: record.date,
                    });
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn write_current(
    conn: &Connection,
    account_id: Uuid,
    snapshot: &Snapshot,
    observed_at: DateTime<Utc>,
) -> Result<()> {
    let affected = conn.execute(
        r#"
        UPDATE tracked_accounts SET
            handle = ?1,
            display_name = ?2,
            avatar_url = ?3,
            bio = ?4,
            is_verified = ?5,
            is_private = ?6,
            follower_count = ?7,
            following_count = ?8,
            post_count = ?9,
            engagement_count = ?10,
            last_updated_at = ?11
        WHERE id = ?12
        "#,
        params![
            snapshot.handle,
            snapshot.display_name,
            snapshot.avatar_url,
            snapshot.bio,
            snapshot.verified,
            snapshot.private,
            snapshot.metrics.follower_count,
            snapshot.metrics.following_count,
            snapshot.metrics.post_count,
            snapshot.metrics.engagement_count,
            timestamp(&observed_at),
            account_id.to_string(),
        ],
    )?;
    if affected == 0 {
        return Err(TrackerError::AccountNotFound(account_id));
    }
    Ok(())
}

fn write_daily(conn: &Connection, record: &DailyStatsRecord, is_new_day: bool) -> Result<()> {
    if is_new_day {
        return insert_daily(conn, record);
    }

    // Same-day rerun: totals move, the day's changes stay as first recorded.
    let affected = conn.execute(
        r#"
        UPDATE daily_stats SET
            follower_count = ?1,
            following_count = ?2,
            post_count = ?3,
            engagement_count = ?4,
            updated_at = ?5
        WHERE account_id = ?6 AND recorded_on = ?7
        "#,
        params![
            record.metrics.follower_count,
            record.metrics.following_count,
            record.metrics.post_count,
            record.metrics.engagement_count,
            timestamp(&record.updated_at),
            record.account_id.to_string(),
            record.date.format(DATE_FORMAT).to_string(),
        ],
    )?;
    if affected == 0 {
        return Err(TrackerError::DailyRecordNotFound {
            account_id: record.account_id,
            date: record.date,
        });
    }
    Ok(())
}

fn insert_daily(conn: &Connection, record: &DailyStatsRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO daily_stats ({DAILY_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            record.account_id.to_string(),
            record.date.format(DATE_FORMAT).to_string(),
            record.metrics.follower_count,
            record.metrics.following_count,
            record.metrics.post_count,
            record.metrics.engagement_count,
            record.changes.follower_change,
            record.changes.post_change,
            record.changes.engagement_change,
            timestamp(&record.created_at),
            timestamp(&record.updated_at),
        ],
    )?;
    Ok(())
}

fn write_notification(conn: &Connection, notification: &NotificationRecord) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO notifications ({NOTIFICATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            notification.id.to_string(),
            notification.user_id.to_string(),
            notification.account_id.to_string(),
            notification.message,
            notification.is_read,
            timestamp(&notification.created_at),
        ],
    )?;
    Ok(())
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn uuid_column(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn time_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn date_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn row_to_account(row: &Row) -> rusqlite::Result<TrackedAccount> {
    Ok(TrackedAccount {
        id: uuid_column(row, 0)?,
        user_id: uuid_column(row, 1)?,
        provider_id: row.get(2)?,
        handle: row.get(3)?,
        display_name: row.get(4)?,
        avatar_url: row.get(5)?,
        bio: row.get(6)?,
        verified: row.get(7)?,
        private: row.get(8)?,
        metrics: Metrics {
            follower_count: row.get(9)?,
            following_count: row.get(10)?,
            post_count: row.get(11)?,
            engagement_count: row.get(12)?,
        },
        added_at: time_column(row, 13)?,
        last_updated_at: time_column(row, 14)?,
    })
}

fn row_to_daily(row: &Row) -> rusqlite::Result<DailyStatsRecord> {
    Ok(DailyStatsRecord {
        account_id: uuid_column(row, 0)?,
        date: date_column(row, 1)?,
        metrics: Metrics {
            follower_count: row.get(2)?,
            following_count: row.get(3)?,
            post_count: row.get(4)?,
            engagement_count: row.get(5)?,
        },
        changes: MetricDeltas {
            follower_change: row.get(6)?,
            post_change: row.get(7)?,
            engagement_change: row.get(8)?,
        },
        created_at: time_column(row, 9)?,
        updated_at: time_column(row, 10)?,
    })
}

fn row_to_notification(row: &Row) -> rusqlite::Result<NotificationRecord> {
    Ok(NotificationRecord {
        id: uuid_column(row, 0)?,
        user_id: uuid_column(row, 1)?,
        account_id: uuid_column(row, 2)?,
        message: row.get(3)?,
        is_read: row.get(4)?,
        created_at: time_column(row, 5)?,
    })
}
