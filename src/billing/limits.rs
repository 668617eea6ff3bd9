//! Limit enforcement for ad generation
//!
//! Compares an account's usage against the free-tier cap before the
//! generation API is called.

use super::types::{Account, LimitCheckResult, LimitDenialReason, PlanTier};

/// Limit enforcement service
pub struct LimitEnforcer {
    free_limit: u32,
}

impl LimitEnforcer {
    /// Create a new limit enforcer with the configured free-tier cap
    pub fn new(free_limit: u32) -> Self {
        Self { free_limit }
    }

    pub fn free_limit(&self) -> u32 {
        self.free_limit
    }

    /// Check if a generation is allowed for this account
    ///
    /// Paid and operator accounts are never capped.
    pub fn check_generation(&self, account: &Account) -> LimitCheckResult {
        if !account.plan_tier.is_metered() {
            return LimitCheckResult::Allowed { remaining: None };
        }

        let used = account.usage_count;
        if used >= self.free_limit {
            return LimitCheckResult::Denied {
                reason: LimitDenialReason::FreeLimitReached {
                    used,
                    limit: self.free_limit,
                },
                upgrade_hint: Some(Self::upgrade_hint()),
            };
        }

        LimitCheckResult::Allowed {
            remaining: Some(self.free_limit - used),
        }
    }

    /// Remaining free generations, `None` when unmetered
    pub fn remaining(&self, account: &Account) -> Option<u32> {
        if account.plan_tier.is_metered() {
            Some(self.free_limit.saturating_sub(account.usage_count))
        } else {
            None
        }
    }

    fn upgrade_hint() -> String {
        format!(
            "Upgrade to the {} or {} plan to keep generating ads",
            PlanTier::Essential,
            PlanTier::Premium
        )
    }
}

impl Default for LimitEnforcer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FREE_LIMIT)
    }
}
