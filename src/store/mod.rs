//! Account storage backends
//!
//! Every backend implements [`AccountStore`]. The metering service never
//! talks to a backend directly: it goes through [`FailoverStore`], which
//! drops to an in-memory store for the rest of the process once the
//! primary fails.

mod error;
mod failover;
mod firestore;
mod local;
mod memory;

pub use error::StoreError;
pub use failover::FailoverStore;
pub use firestore::{FirestoreConfig, RemoteStore};
pub use local::LocalStore;
pub use memory::InMemoryStore;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::billing::{AccountRecord, FeedbackEntry};
use crate::identity::AccountKey;

/// Collection holding one document per account key
pub const ACCOUNTS_COLLECTION: &str = "accounts";

/// Append-only collection of ratings
pub const FEEDBACK_COLLECTION: &str = "feedback";

/// Read/write access to account records and the feedback log.
///
/// Implementations must be thread-safe (`Send + Sync`). Writes are
/// merge-by-key and last-write-wins; no backend offers compare-and-swap.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Short name used in logs and status output.
    fn backend_name(&self) -> &'static str;

    /// Read one account record, `Ok(None)` when absent.
    async fn get_account(&self, key: &AccountKey) -> Result<Option<AccountRecord>, StoreError>;

    /// Create or overwrite the record for `key`.
    async fn put_account(&self, key: &AccountKey, record: &AccountRecord) -> Result<(), StoreError>;

    /// Append one feedback entry.
    async fn append_feedback(&self, entry: &FeedbackEntry) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: AccountStore + ?Sized> AccountStore for Arc<S> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    async fn get_account(&self, key: &AccountKey) -> Result<Option<AccountRecord>, StoreError> {
        (**self).get_account(key).await
    }

    async fn put_account(&self, key: &AccountKey, record: &AccountRecord) -> Result<(), StoreError> {
        (**self).put_account(key, record).await
    }

    async fn append_feedback(&self, entry: &FeedbackEntry) -> Result<(), StoreError> {
        (**self).append_feedback(entry).await
    }
}

/// Acquire a mutex, recovering the inner value if a previous holder panicked
pub(crate) fn lock_recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned: PoisonError<MutexGuard<'_, T>>| {
        warn!("Mutex was poisoned, recovering inner value");
        poisoned.into_inner()
    })
}

/// Decode a stored `last_used_at`. The field is advisory, so an unreadable
/// value is dropped rather than failing the whole record.
pub(crate) fn parse_last_used(key: &AccountKey, raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            warn!(account = %key, value = raw, error = %e, "Ignoring unreadable last_used_at");
            None
        }
    }
}
