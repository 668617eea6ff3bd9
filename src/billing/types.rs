//! Billing data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::AccountKey;

/// Subscription plan tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Essential,
    Premium,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Essential => "essential",
            Self::Premium => "premium",
        }
    }

    /// Only the free tier is counted against the usage cap
    pub fn is_metered(&self) -> bool {
        matches!(self, Self::Free)
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "essential" => Ok(Self::Essential),
            "premium" => Ok(Self::Premium),
            other => Err(format!(
                "unknown plan tier '{}' (expected free, essential or premium)",
                other
            )),
        }
    }
}

/// Features unlocked by a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFeatures {
    /// Generations count against the free limit
    pub metered: bool,
    /// Response includes suggested audiences
    pub audience_suggestions: bool,
    /// Response includes a short video script
    pub video_script: bool,
}

impl PlanFeatures {
    /// Get features for a given tier
    pub fn for_tier(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Free => Self {
                metered: true,
                audience_suggestions: false,
                video_script: false,
            },
            PlanTier::Essential => Self {
                metered: false,
                audience_suggestions: true,
                video_script: false,
            },
            PlanTier::Premium => Self {
                metered: false,
                audience_suggestions: true,
                video_script: true,
            },
        }
    }
}

/// Persisted account state, as kept by every store backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountRecord {
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub plan_tier: PlanTier,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Resolved entitlement for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_key: AccountKey,
    pub plan_tier: PlanTier,
    pub usage_count: u32,
    /// Advisory only
    pub last_used_at: Option<DateTime<Utc>>,
    /// Resolved through the operator bypass rather than the store
    #[serde(default)]
    pub operator: bool,
}

impl Account {
    pub fn from_record(account_key: AccountKey, record: AccountRecord) -> Self {
        Self {
            account_key,
            plan_tier: record.plan_tier,
            usage_count: record.usage_count,
            last_used_at: record.last_used_at,
            operator: false,
        }
    }

    /// Synthetic premium account for the configured operator
    pub fn operator(account_key: AccountKey) -> Self {
        Self {
            account_key,
            plan_tier: PlanTier::Premium,
            usage_count: 0,
            last_used_at: None,
            operator: true,
        }
    }

    pub fn features(&self) -> PlanFeatures {
        PlanFeatures::for_tier(self.plan_tier)
    }
}

/// Optional rating left by a user on a generated ad
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FeedbackEntry {
    pub account_key: AccountKey,
    pub rating: u8,
    pub input: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of a limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "type")]
pub enum LimitCheckResult {
    /// `remaining` is `None` for unmetered tiers
    #[serde(rename = "allowed")]
    Allowed { remaining: Option<u32> },
    #[serde(rename = "denied")]
    Denied {
        reason: LimitDenialReason,
        upgrade_hint: Option<String>,
    },
}

impl LimitCheckResult {
    /// Check if the request is allowed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Get the denial reason if denied
    pub fn denial_reason(&self) -> Option<&LimitDenialReason> {
        match self {
            Self::Denied { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Reason for denying a generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "type")]
pub enum LimitDenialReason {
    #[serde(rename = "freeLimitReached")]
    FreeLimitReached { used: u32, limit: u32 },
}

impl std::fmt::Display for LimitDenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FreeLimitReached { used, limit } => {
                write!(f, "Free limit reached: {}/{} ads used", used, limit)
            }
        }
    }
}

/// Errors from metering operations
#[derive(Debug, thiserror::Error)]
pub enum MeteringError {
    #[error("account not found: {0}")]
    AccountNotFound(AccountKey),

    #[error("invalid email address: '{0}'")]
    InvalidEmail(String),

    /// The store is up but this account's record cannot be read
    #[error("account record for {key} is unreadable: {reason}")]
    CorruptRecord { key: AccountKey, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parse_and_display() {
        assert_eq!("free".parse::<PlanTier>().unwrap(), PlanTier::Free);
        assert_eq!(" Essential ".parse::<PlanTier>().unwrap(), PlanTier::Essential);
        assert_eq!("PREMIUM".parse::<PlanTier>().unwrap(), PlanTier::Premium);
        assert!("gold".parse::<PlanTier>().is_err());
        assert_eq!(PlanTier::Essential.to_string(), "essential");
    }

    #[test]
    fn test_only_free_is_metered() {
        assert!(PlanTier::Free.is_metered());
        assert!(!PlanTier::Essential.is_metered());
        assert!(!PlanTier::Premium.is_metered());
        assert!(PlanFeatures::for_tier(PlanTier::Free).metered);
        assert!(PlanFeatures::for_tier(PlanTier::Premium).video_script);
        assert!(!PlanFeatures::for_tier(PlanTier::Essential).video_script);
    }

    #[test]
    fn test_record_missing_fields_default() {
        let record: AccountRecord = serde_json::from_str(r#"{"usage_count": 2}"#).unwrap();
        assert_eq!(record.plan_tier, PlanTier::Free);
        assert_eq!(record.usage_count, 2);
        assert!(record.last_used_at.is_none());
    }

    #[test]
    fn test_limit_result_serialization() {
        let denied = LimitCheckResult::Denied {
            reason: LimitDenialReason::FreeLimitReached { used: 3, limit: 3 },
            upgrade_hint: None,
        };
        let json = serde_json::to_value(&denied).unwrap();
        assert_eq!(json["type"], "denied");
        assert_eq!(json["reason"]["type"], "freeLimitReached");
        assert_eq!(json["reason"]["used"], 3);
    }
}
