//! Primary store with in-memory fallback
//!
//! The first outage of the primary flips the store into simulated mode for
//! the rest of the process. Callers never see outages. A single unreadable
//! record is reported to the caller and leaves the primary in service.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, warn};

use super::{AccountStore, InMemoryStore, StoreError};
use crate::billing::{AccountRecord, FeedbackEntry};
use crate::identity::AccountKey;

/// Account store that degrades to memory instead of failing
pub struct FailoverStore {
    primary: Option<Box<dyn AccountStore>>,
    fallback: InMemoryStore,
    simulated: AtomicBool,
}

impl FailoverStore {
    /// Wrap a primary backend
    pub fn new(primary: Box<dyn AccountStore>) -> Self {
        info!(backend = primary.backend_name(), "Account store ready");
        Self {
            primary: Some(primary),
            fallback: InMemoryStore::new(),
            simulated: AtomicBool::new(false),
        }
    }

    /// Store with no primary: everything stays in memory
    pub fn simulated() -> Self {
        info!("No account store configured, metering is simulated");
        Self {
            primary: None,
            fallback: InMemoryStore::new(),
            simulated: AtomicBool::new(true),
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated.load(Ordering::SeqCst)
    }

    /// Name of the backend currently serving requests
    pub fn backend_name(&self) -> &'static str {
        match self.active_primary() {
            Some(primary) => primary.backend_name(),
            None => self.fallback.backend_name(),
        }
    }

    fn active_primary(&self) -> Option<&dyn AccountStore> {
        if self.is_simulated() {
            return None;
        }
        self.primary.as_deref()
    }

    /// Handle a primary failure. Returns `true` when the store switched
    /// (or had already switched) to memory.
    fn degrade(&self, operation: &str, err: &StoreError) -> bool {
        if !err.is_unavailable() {
            return false;
        }
        if !self.simulated.swap(true, Ordering::SeqCst) {
            warn!(
                backend = self.primary.as_ref().map(|p| p.backend_name()).unwrap_or("none"),
                operation,
                error = %err,
                "Account store failed, switching to simulated metering for this session"
            );
        }
        true
    }

    /// Read one record
    ///
    /// Fails only when the primary is up but the record cannot be decoded.
    pub async fn get(&self, key: &AccountKey) -> Result<Option<AccountRecord>, StoreError> {
        if let Some(primary) = self.active_primary() {
            match primary.get_account(key).await {
                Ok(record) => return Ok(record),
                Err(e) if self.degrade("get_account", &e) => {}
                Err(e) => {
                    error!(account = %key, error = %e, "Unreadable account record");
                    return Err(e);
                }
            }
        }
        Ok(self.fallback.get(key))
    }

    pub async fn put(&self, key: &AccountKey, record: &AccountRecord) {
        if let Some(primary) = self.active_primary() {
            match primary.put_account(key, record).await {
                Ok(()) => return,
                Err(e) if self.degrade("put_account", &e) => {}
                Err(e) => {
                    error!(account = %key, error = %e, "Account record rejected by store");
                    return;
                }
            }
        }
        self.fallback.put(key, record);
    }

    pub async fn append_feedback(&self, entry: &FeedbackEntry) {
        if let Some(primary) = self.active_primary() {
            match primary.append_feedback(entry).await {
                Ok(()) => return,
                Err(e) if self.degrade("append_feedback", &e) => {}
                Err(e) => {
                    error!(account = %entry.account_key, error = %e, "Feedback rejected by store");
                    return;
                }
            }
        }
        self.fallback.push_feedback(entry);
    }

    /// The in-memory side, for inspection in simulated mode
    pub fn fallback(&self) -> &InMemoryStore {
        &self.fallback
    }
}
