//! Commands for account status and plan management

use serde::Serialize;
use tracing::{info, warn};

use crate::billing::{Account, LimitCheckResult, MeteringError, PlanFeatures, PlanTier};
use crate::error::AppError;
use crate::identity::AccountKey;
use crate::state::AppState;

/// What the UI shows about the signed-in account
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    pub account: Account,
    pub features: PlanFeatures,
    pub free_limit: u32,
    /// `None` for unmetered tiers
    pub remaining: Option<u32>,
    /// Metering is in-memory only for this session
    pub simulated: bool,
    pub store_backend: &'static str,
}

/// Normalize an email into an account key, rejecting input without `@`
pub fn account_key_for(email: &str) -> Result<AccountKey, AppError> {
    AccountKey::from_email(email)
        .ok_or_else(|| MeteringError::InvalidEmail(email.trim().to_string()).into())
}

/// Load tier and usage for an email
pub async fn get_account_status(state: &AppState, email: &str) -> Result<AccountStatus, AppError> {
    let key = account_key_for(email)?;
    let metering = &state.billing.metering;
    let account = metering.get_account(&key).await?;

    Ok(AccountStatus {
        features: account.features(),
        free_limit: state.billing.limit_enforcer.free_limit(),
        remaining: state.billing.limit_enforcer.remaining(&account),
        simulated: metering.is_simulated(),
        store_backend: metering.store_backend(),
        account,
    })
}

/// Check if a generation would be allowed for an email
pub async fn check_generation_limit(
    state: &AppState,
    email: &str,
) -> Result<LimitCheckResult, AppError> {
    let key = account_key_for(email)?;
    let account = state.billing.metering.get_account(&key).await?;
    Ok(state.billing.limit_enforcer.check_generation(&account))
}

/// Change the plan of `target_email`; only the operator may do this
pub async fn set_plan(
    state: &AppState,
    operator_email: &str,
    target_email: &str,
    tier: PlanTier,
) -> Result<Account, AppError> {
    let caller = account_key_for(operator_email)?;
    if !state.billing.metering.is_operator(&caller) {
        warn!(caller = %caller, "Rejected plan change from non-operator");
        return Err(AppError::Unauthorized);
    }

    let target = account_key_for(target_email)?;
    let account = state.billing.metering.set_plan(&target, tier).await?;
    info!(operator = %caller, account = %target, tier = %tier, "Operator set plan");
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::store::FailoverStore;

    fn state() -> AppState {
        let config = AppConfig {
            operator_email: Some("Dono+admin@AnuncIA.app".to_string()),
            ..Default::default()
        };
        AppState::new(config, FailoverStore::simulated(), None)
    }

    #[test]
    fn test_account_key_requires_at() {
        assert!(matches!(
            account_key_for("not-an-email"),
            Err(AppError::Metering(MeteringError::InvalidEmail(_)))
        ));
        assert_eq!(account_key_for(" A+b@X.com ").unwrap().as_str(), "a@x.com");
    }

    #[tokio::test]
    async fn test_status_for_new_account() {
        let state = state();
        let status = get_account_status(&state, "nova@loja.com").await.unwrap();

        assert_eq!(status.account.plan_tier, PlanTier::Free);
        assert_eq!(status.account.usage_count, 0);
        assert_eq!(status.remaining, Some(3));
        assert_eq!(status.free_limit, 3);
        assert!(status.simulated);
        assert_eq!(status.store_backend, "memory");
    }

    #[tokio::test]
    async fn test_operator_status_is_unlimited_premium() {
        let state = state();
        let status = get_account_status(&state, "dono@anuncia.app").await.unwrap();
        assert!(status.account.operator);
        assert_eq!(status.account.plan_tier, PlanTier::Premium);
        assert_eq!(status.remaining, None);
        assert!(status.features.video_script);
    }

    #[tokio::test]
    async fn test_non_operator_cannot_set_plan() {
        let state = state();
        get_account_status(&state, "cliente@loja.com").await.unwrap();

        let err = set_plan(&state, "cliente@loja.com", "cliente@loja.com", PlanTier::Premium)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let status = get_account_status(&state, "cliente@loja.com").await.unwrap();
        assert_eq!(status.account.plan_tier, PlanTier::Free);
    }

    #[tokio::test]
    async fn test_operator_sets_plan_on_known_account() {
        let state = state();
        get_account_status(&state, "cliente@loja.com").await.unwrap();

        let account = set_plan(&state, "dono@anuncia.app", "Cliente+x@loja.com", PlanTier::Essential)
            .await
            .unwrap();
        assert_eq!(account.plan_tier, PlanTier::Essential);

        let check = check_generation_limit(&state, "cliente@loja.com").await.unwrap();
        assert_eq!(check, LimitCheckResult::Allowed { remaining: None });
    }

    #[tokio::test]
    async fn test_operator_set_plan_on_unknown_account() {
        let state = state();
        let err = set_plan(&state, "dono@anuncia.app", "ninguem@loja.com", PlanTier::Premium)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Metering(MeteringError::AccountNotFound(_))));
    }
}
