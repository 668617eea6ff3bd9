//! Commands for ad generation and API key management

use serde::Serialize;
use tracing::{info, warn};

use super::billing::account_key_for;
use crate::ai::{CopyRequest, CredentialManager, GeneratedCopy, OPENAI_PROVIDER};
use crate::billing::{Account, LimitCheckResult};
use crate::error::AppError;
use crate::state::AppState;

/// A generated ad plus the usage it consumed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub copy: GeneratedCopy,
    pub account: Account,
    /// `None` for unmetered tiers
    pub remaining: Option<u32>,
}

/// API key status
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub provider: String,
    pub configured: bool,
}

/// Generate one ad for `email`
///
/// Usage is only counted after the generation succeeded; a denied,
/// unavailable or failed generation leaves the counter untouched.
pub async fn generate_ad(
    state: &AppState,
    email: &str,
    request: CopyRequest,
) -> Result<GenerationOutcome, AppError> {
    let key = account_key_for(email)?;
    request.validate()?;

    let metering = &state.billing.metering;
    let account = metering.get_account(&key).await?;

    if let LimitCheckResult::Denied { reason, .. } =
        state.billing.limit_enforcer.check_generation(&account)
    {
        info!(account = %key, %reason, "Generation blocked");
        return Err(AppError::LimitReached(reason));
    }

    let generator = state.generator()?;
    let copy = generator.generate(&request, account.features()).await?;

    let account = match metering.increment_usage(&key, account.plan_tier).await {
        Some(usage_count) => Account {
            usage_count,
            ..account
        },
        None => account,
    };
    let remaining = state.billing.limit_enforcer.remaining(&account);

    info!(
        account = %key,
        tier = %account.plan_tier,
        usage = account.usage_count,
        "Generated ad"
    );

    Ok(GenerationOutcome {
        copy,
        account,
        remaining,
    })
}

/// Store the generation API key in the keychain
pub fn set_api_key(api_key: &str) -> Result<(), AppError> {
    CredentialManager::store_api_key(OPENAI_PROVIDER, api_key).map_err(|e| {
        warn!(error = %e, "Failed to store API key");
        AppError::Credentials(e)
    })
}

/// Delete the stored generation API key
pub fn delete_api_key() -> Result<(), AppError> {
    CredentialManager::delete_api_key(OPENAI_PROVIDER).map_err(AppError::Credentials)
}

/// Whether a generation API key is available from env or keychain
pub fn api_key_status(state: &AppState) -> ProviderStatus {
    ProviderStatus {
        provider: OPENAI_PROVIDER.to_string(),
        configured: state.config.openai_api_key.is_some(),
    }
}
