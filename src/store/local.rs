//! SQLite-backed account store
//!
//! Keeps account records and feedback in a local database so metering
//! survives between CLI invocations when no remote store is configured.
//! Queries run on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{lock_recover, parse_last_used, AccountStore, StoreError};
use crate::billing::{AccountRecord, FeedbackEntry, PlanTier};
use crate::identity::AccountKey;

/// SQLite account store
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    /// Create or open the account database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open a throwaway database that lives in memory
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                account_key TEXT PRIMARY KEY NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0,
                plan_tier TEXT NOT NULL DEFAULT 'free',
                last_used_at TEXT
            );

            CREATE TABLE IF NOT EXISTS feedback (
                id TEXT PRIMARY KEY NOT NULL,
                account_key TEXT NOT NULL,
                rating INTEGER NOT NULL,
                input TEXT NOT NULL,
                response TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_feedback_account
                ON feedback(account_key, created_at);
        "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Default database location: `<config_dir>/anuncia/accounts.db`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("anuncia").join("accounts.db"))
    }

    /// Feedback recorded for one account, oldest first
    pub fn feedback_for(&self, key: &AccountKey) -> Result<Vec<FeedbackEntry>, StoreError> {
        let conn = lock_recover(&*self.conn);
        let mut stmt = conn.prepare(
            "SELECT rating, input, response, created_at FROM feedback
             WHERE account_key = ?1 ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![key.as_str()], |row| {
            Ok((
                row.get::<_, u8>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (rating, input, response, created_at) = row?;
            entries.push(FeedbackEntry {
                account_key: key.clone(),
                rating,
                input,
                response,
                timestamp: parse_timestamp(&created_at)?,
            });
        }
        Ok(entries)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(StoreError::decode)
}

fn parse_tier(key: &AccountKey, raw: &str) -> PlanTier {
    raw.parse().unwrap_or_else(|e| {
        warn!(account = %key, error = %e, "Unknown stored plan tier, treating as free");
        PlanTier::Free
    })
}

/// Row values as stored, before any domain decoding
type RawAccountRow = (rusqlite::types::Value, String, Option<String>);

fn decode_account(key: &AccountKey, row: RawAccountRow) -> Result<AccountRecord, StoreError> {
    use rusqlite::types::Value;

    let (usage, tier, last_used_at) = row;
    let usage_count = match usage {
        Value::Null => 0,
        Value::Integer(n) => u32::try_from(n)
            .map_err(|_| StoreError::decode(format!("usage_count out of range: {}", n)))?,
        other => {
            return Err(StoreError::decode(format!(
                "usage_count is not an integer: {:?}",
                other
            )))
        }
    };

    Ok(AccountRecord {
        usage_count,
        plan_tier: parse_tier(key, &tier),
        last_used_at: last_used_at.as_deref().and_then(|raw| parse_last_used(key, raw)),
    })
}

impl LocalStore {
    /// Run `op` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock_recover(&*conn);
            op(&*guard)
        })
        .await?
    }
}

#[async_trait]
impl AccountStore for LocalStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get_account(&self, key: &AccountKey) -> Result<Option<AccountRecord>, StoreError> {
        let lookup = key.clone();
        let row = self
            .with_conn(move |conn| {
                let row: Option<RawAccountRow> = conn
                    .query_row(
                        "SELECT usage_count, plan_tier, last_used_at FROM accounts WHERE account_key = ?1",
                        params![lookup.as_str()],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        row.map(|row| decode_account(key, row)).transpose()
    }

    async fn put_account(&self, key: &AccountKey, record: &AccountRecord) -> Result<(), StoreError> {
        let owned_key = key.clone();
        let owned = record.clone();

        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO accounts (account_key, usage_count, plan_tier, last_used_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(account_key) DO UPDATE SET
                    usage_count = excluded.usage_count,
                    plan_tier = excluded.plan_tier,
                    last_used_at = excluded.last_used_at
                "#,
                params![
                    owned_key.as_str(),
                    owned.usage_count,
                    owned.plan_tier.as_str(),
                    owned.last_used_at.map(|ts| ts.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
        .await?;

        debug!(
            account = %key,
            usage = record.usage_count,
            tier = %record.plan_tier,
            "Stored account record"
        );
        Ok(())
    }

    async fn append_feedback(&self, entry: &FeedbackEntry) -> Result<(), StoreError> {
        let entry = entry.clone();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO feedback (id, account_key, rating, input, response, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    entry.account_key.as_str(),
                    entry.rating,
                    entry.input,
                    entry.response,
                    entry.timestamp.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }
}
