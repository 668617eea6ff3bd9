//! Entitlement resolution and usage metering
//!
//! One [`MeteringService`] is built per session and passed by reference to
//! whatever needs it. Increments are read-then-write: two concurrent
//! generations for the same account can race and lose a count.

use chrono::Utc;
use tracing::{debug, error, info};

use super::types::{Account, AccountRecord, FeedbackEntry, MeteringError, PlanTier};
use crate::identity::{AccountKey, OperatorPolicy};
use crate::store::FailoverStore;

/// Resolves plan tiers and counts free-tier generations
pub struct MeteringService {
    pub(super) store: FailoverStore,
    pub(super) operator: OperatorPolicy,
}

impl MeteringService {
    pub fn new(store: FailoverStore, operator: OperatorPolicy) -> Self {
        Self { store, operator }
    }

    pub fn is_operator(&self, key: &AccountKey) -> bool {
        self.operator.is_operator(key)
    }

    /// True once metering runs against process memory only
    pub fn is_simulated(&self) -> bool {
        self.store.is_simulated()
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn store(&self) -> &FailoverStore {
        &self.store
    }

    /// Resolve the entitlement for an account key
    ///
    /// The operator bypass is checked before the store is touched. An
    /// account seen for the first time is persisted as free with zero usage.
    /// An unreadable record is an error, never a fresh free account.
    pub async fn get_account(&self, key: &AccountKey) -> Result<Account, MeteringError> {
        if self.operator.is_operator(key) {
            debug!(account = %key, "Operator bypass");
            return Ok(Account::operator(key.clone()));
        }

        let stored = self
            .store
            .get(key)
            .await
            .map_err(|e| MeteringError::CorruptRecord {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        match stored {
            Some(record) => Ok(Account::from_record(key.clone(), record)),
            None => {
                let record = AccountRecord::default();
                self.store.put(key, &record).await;
                info!(account = %key, "Created free account");
                Ok(Account::from_record(key.clone(), record))
            }
        }
    }

    /// Count one generation against a free-tier account
    ///
    /// Returns the new usage count, or `None` when the tier is not metered
    /// (paid plans and the operator) or the record cannot be read.
    pub async fn increment_usage(&self, key: &AccountKey, plan_tier: PlanTier) -> Option<u32> {
        if !plan_tier.is_metered() {
            return None;
        }

        let account = match self.get_account(key).await {
            Ok(account) => account,
            Err(e) => {
                error!(account = %key, error = %e, "Usage not recorded");
                return None;
            }
        };
        if !account.plan_tier.is_metered() {
            debug!(account = %key, tier = %account.plan_tier, "Stored tier is not metered, skipping increment");
            return None;
        }

        let new_count = account.usage_count.saturating_add(1);
        let record = AccountRecord {
            usage_count: new_count,
            plan_tier: account.plan_tier,
            last_used_at: Some(Utc::now()),
        };
        self.store.put(key, &record).await;

        debug!(account = %key, usage = new_count, "Incremented usage");
        Some(new_count)
    }

    /// Append a rating for a generated ad
    pub async fn record_feedback(&self, entry: &FeedbackEntry) {
        self.store.append_feedback(entry).await;
        debug!(account = %entry.account_key, rating = entry.rating, "Recorded feedback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccountStore, InMemoryStore, StoreError};
    use async_trait::async_trait;
    use std::sync::Arc;

    fn key(email: &str) -> AccountKey {
        AccountKey::from_email(email).unwrap()
    }

    fn service_with(primary: Arc<InMemoryStore>, operator: Option<&str>) -> MeteringService {
        MeteringService::new(
            FailoverStore::new(Box::new(primary)),
            OperatorPolicy::new(operator),
        )
    }

    #[tokio::test]
    async fn test_new_account_defaults_and_persists() {
        let primary = Arc::new(InMemoryStore::new());
        let service = service_with(primary.clone(), None);
        let k = key("new@test.com");

        let account = service.get_account(&k).await.unwrap();
        assert_eq!(account.plan_tier, PlanTier::Free);
        assert_eq!(account.usage_count, 0);
        assert!(!account.operator);
        assert_eq!(primary.get(&k), Some(AccountRecord::default()));
    }

    #[tokio::test]
    async fn test_operator_ignores_stored_state() {
        let primary = Arc::new(InMemoryStore::new());
        let k = key("owner@anuncia.app");
        primary.put(
            &k,
            &AccountRecord {
                usage_count: 99,
                plan_tier: PlanTier::Free,
                last_used_at: None,
            },
        );

        let service = service_with(primary.clone(), Some("Owner@AnuncIA.app"));
        let account = service.get_account(&k).await.unwrap();

        assert_eq!(account.plan_tier, PlanTier::Premium);
        assert_eq!(account.usage_count, 0);
        assert!(account.operator);
        assert_eq!(service.increment_usage(&k, PlanTier::Free).await, None);
        assert_eq!(primary.get(&k).map(|r| r.usage_count), Some(99));
    }

    #[tokio::test]
    async fn test_increment_free_adds_exactly_one() {
        let service = service_with(Arc::new(InMemoryStore::new()), None);
        let k = key("counter@test.com");

        for expected in 1..=4 {
            assert_eq!(service.increment_usage(&k, PlanTier::Free).await, Some(expected));
        }
        let account = service.get_account(&k).await.unwrap();
        assert_eq!(account.usage_count, 4);
        assert!(account.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_increment_paid_is_noop() {
        let primary = Arc::new(InMemoryStore::new());
        let k = key("paid@test.com");
        primary.put(
            &k,
            &AccountRecord {
                usage_count: 1,
                plan_tier: PlanTier::Essential,
                last_used_at: None,
            },
        );
        let service = service_with(primary.clone(), None);

        assert_eq!(service.increment_usage(&k, PlanTier::Essential).await, None);
        assert_eq!(service.increment_usage(&k, PlanTier::Premium).await, None);
        // Caller passed a stale free tier; the stored tier wins
        assert_eq!(service.increment_usage(&k, PlanTier::Free).await, None);
        assert_eq!(primary.get(&k).map(|r| r.usage_count), Some(1));
    }

    #[tokio::test]
    async fn test_simulated_mode_meters_in_memory() {
        let service = MeteringService::new(FailoverStore::simulated(), OperatorPolicy::disabled());
        let k = key("sim@test.com");

        assert!(service.is_simulated());
        assert_eq!(service.increment_usage(&k, PlanTier::Free).await, Some(1));
        assert_eq!(service.get_account(&k).await.unwrap().usage_count, 1);
    }

    /// Reads succeed, every write fails as if the backend went away
    struct WriteOutageStore {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl AccountStore for WriteOutageStore {
        fn backend_name(&self) -> &'static str {
            "write-outage"
        }

        async fn get_account(&self, key: &AccountKey) -> Result<Option<AccountRecord>, StoreError> {
            self.inner.get_account(key).await
        }

        async fn put_account(&self, _key: &AccountKey, _record: &AccountRecord) -> Result<(), StoreError> {
            Err(StoreError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        }

        async fn append_feedback(&self, _entry: &FeedbackEntry) -> Result<(), StoreError> {
            Err(StoreError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_write_outage_mid_increment_lands_in_memory() {
        let k = key("mid@test.com");
        let inner = InMemoryStore::new();
        inner.put(&k, &AccountRecord { usage_count: 2, ..Default::default() });
        let service = MeteringService::new(
            FailoverStore::new(Box::new(WriteOutageStore { inner })),
            OperatorPolicy::disabled(),
        );

        assert_eq!(service.get_account(&k).await.unwrap().usage_count, 2);
        assert!(!service.is_simulated());

        assert_eq!(service.increment_usage(&k, PlanTier::Free).await, Some(3));
        assert!(service.is_simulated());
        assert_eq!(service.get_account(&k).await.unwrap().usage_count, 3);
    }

    /// Backend whose only record cannot be decoded
    struct UnreadableStore;

    #[async_trait]
    impl AccountStore for UnreadableStore {
        fn backend_name(&self) -> &'static str {
            "unreadable"
        }

        async fn get_account(&self, _key: &AccountKey) -> Result<Option<AccountRecord>, StoreError> {
            Err(StoreError::decode("usage_count is not an integer"))
        }

        async fn put_account(&self, _key: &AccountKey, _record: &AccountRecord) -> Result<(), StoreError> {
            panic!("an unreadable record must not be overwritten");
        }

        async fn append_feedback(&self, _entry: &FeedbackEntry) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unreadable_record_is_not_reset() {
        let service = MeteringService::new(
            FailoverStore::new(Box::new(UnreadableStore)),
            OperatorPolicy::disabled(),
        );
        let k = key("broken@test.com");

        assert!(matches!(
            service.get_account(&k).await,
            Err(MeteringError::CorruptRecord { .. })
        ));
        assert_eq!(service.increment_usage(&k, PlanTier::Free).await, None);
        assert!(!service.is_simulated());
    }
}
