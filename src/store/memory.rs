//! In-memory account store.
//!
//! Backs the simulated metering mode: state lives only as long as the
//! process.

use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{lock_recover, AccountStore, StoreError};
use crate::billing::{AccountRecord, FeedbackEntry};
use crate::identity::AccountKey;

/// Process-local account store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    accounts: DashMap<AccountKey, AccountRecord>,
    feedback: Mutex<Vec<FeedbackEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &AccountKey) -> Option<AccountRecord> {
        self.accounts.get(key).map(|entry| entry.value().clone())
    }

    pub fn put(&self, key: &AccountKey, record: &AccountRecord) {
        self.accounts.insert(key.clone(), record.clone());
    }

    pub fn push_feedback(&self, entry: &FeedbackEntry) {
        lock_recover(&self.feedback).push(entry.clone());
    }

    /// Feedback recorded for one account, oldest first
    pub fn feedback_for(&self, key: &AccountKey) -> Vec<FeedbackEntry> {
        lock_recover(&self.feedback)
            .iter()
            .filter(|entry| &entry.account_key == key)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_account(&self, key: &AccountKey) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self.get(key))
    }

    async fn put_account(&self, key: &AccountKey, record: &AccountRecord) -> Result<(), StoreError> {
        self.put(key, record);
        Ok(())
    }

    async fn append_feedback(&self, entry: &FeedbackEntry) -> Result<(), StoreError> {
        self.push_feedback(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::PlanTier;
    use chrono::Utc;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryStore::new();
        let key = AccountKey::from_email("a@b.com").unwrap();

        assert!(store.get_account(&key).await.unwrap().is_none());

        let record = AccountRecord {
            usage_count: 2,
            plan_tier: PlanTier::Essential,
            last_used_at: None,
        };
        store.put_account(&key, &record).await.unwrap();

        assert_eq!(store.get_account(&key).await.unwrap(), Some(record));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_feedback_filtered_by_account() {
        let store = InMemoryStore::new();
        let alice = AccountKey::from_email("alice@x.com").unwrap();
        let bob = AccountKey::from_email("bob@x.com").unwrap();

        for (key, rating) in [(&alice, 5), (&bob, 2), (&alice, 4)] {
            store
                .append_feedback(&FeedbackEntry {
                    account_key: key.clone(),
                    rating,
                    input: "input".to_string(),
                    response: "response".to_string(),
                    timestamp: Utc::now(),
                })
                .await
                .unwrap();
        }

        let ratings: Vec<u8> = store.feedback_for(&alice).iter().map(|f| f.rating).collect();
        assert_eq!(ratings, vec![5, 4]);
        assert_eq!(store.feedback_for(&bob).len(), 1);
    }
}
