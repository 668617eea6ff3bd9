//! Administrative plan changes
//!
//! Setting a plan overwrites the tier and resets usage to zero, whatever
//! the previous tier was.

use tracing::{info, warn};

use super::types::{Account, AccountRecord, MeteringError, PlanTier};
use super::usage::MeteringService;
use crate::identity::AccountKey;

impl MeteringService {
    /// Set the plan tier for an existing account and reset its usage
    ///
    /// Fails with [`MeteringError::AccountNotFound`] when the store has no
    /// record for `key`; nothing is written in that case. An unreadable
    /// record counts as existing and is replaced.
    pub async fn set_plan(&self, key: &AccountKey, tier: PlanTier) -> Result<Account, MeteringError> {
        let (previous, last_used_at) = match self.store.get(key).await {
            Ok(Some(existing)) => (existing.plan_tier.to_string(), existing.last_used_at),
            Ok(None) => return Err(MeteringError::AccountNotFound(key.clone())),
            Err(e) => {
                warn!(account = %key, error = %e, "Replacing unreadable account record");
                ("unreadable".to_string(), None)
            }
        };

        let record = AccountRecord {
            usage_count: 0,
            plan_tier: tier,
            last_used_at,
        };
        self.store.put(key, &record).await;

        info!(
            account = %key,
            from = %previous,
            to = %tier,
            "Plan changed, usage reset"
        );

        Ok(Account::from_record(key.clone(), record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::OperatorPolicy;
    use crate::store::{FailoverStore, InMemoryStore};
    use std::sync::Arc;

    fn service() -> (Arc<InMemoryStore>, MeteringService) {
        let primary = Arc::new(InMemoryStore::new());
        let service = MeteringService::new(
            FailoverStore::new(Box::new(primary.clone())),
            OperatorPolicy::new(Some("owner@anuncia.app")),
        );
        (primary, service)
    }

    #[tokio::test]
    async fn test_upgrade_resets_usage() {
        let (_, service) = service();
        let k = AccountKey::from_email("buyer@test.com").unwrap();

        service.increment_usage(&k, PlanTier::Free).await;
        service.increment_usage(&k, PlanTier::Free).await;

        let account = service.set_plan(&k, PlanTier::Premium).await.unwrap();
        assert_eq!(account.plan_tier, PlanTier::Premium);
        assert_eq!(account.usage_count, 0);

        let reread = service.get_account(&k).await.unwrap();
        assert_eq!(reread.plan_tier, PlanTier::Premium);
        assert_eq!(reread.usage_count, 0);
    }

    #[tokio::test]
    async fn test_downgrade_also_resets_usage() {
        let (primary, service) = service();
        let k = AccountKey::from_email("churn@test.com").unwrap();
        primary.put(
            &k,
            &AccountRecord {
                usage_count: 2,
                plan_tier: PlanTier::Essential,
                last_used_at: None,
            },
        );

        let account = service.set_plan(&k, PlanTier::Free).await.unwrap();
        assert_eq!(account.plan_tier, PlanTier::Free);
        assert_eq!(account.usage_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_account_fails_without_writing() {
        let (primary, service) = service();
        let k = AccountKey::from_email("ghost@test.com").unwrap();

        let err = service.set_plan(&k, PlanTier::Essential).await.unwrap_err();
        assert!(matches!(err, MeteringError::AccountNotFound(ref missing) if missing == &k));
        assert!(primary.get(&k).is_none());
    }
}
