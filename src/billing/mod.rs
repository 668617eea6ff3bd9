//! Billing module for plan tiers and usage metering
//!
//! This module handles:
//! - Plan tier resolution (Free/Essential/Premium) with the operator bypass
//! - Free-tier generation counting
//! - Limit enforcement before generation calls
//! - Administrative plan changes

mod limits;
mod subscription;
mod types;
mod usage;

pub use limits::LimitEnforcer;
pub use types::{
    Account, AccountRecord, FeedbackEntry, LimitCheckResult, LimitDenialReason, MeteringError,
    PlanFeatures, PlanTier,
};
pub use usage::MeteringService;

use crate::identity::OperatorPolicy;
use crate::store::FailoverStore;

/// Billing state for one session
pub struct BillingState {
    pub metering: MeteringService,
    pub limit_enforcer: LimitEnforcer,
}

impl BillingState {
    /// Create a new billing state
    pub fn new(store: FailoverStore, operator: OperatorPolicy, free_limit: u32) -> Self {
        Self {
            metering: MeteringService::new(store, operator),
            limit_enforcer: LimitEnforcer::new(free_limit),
        }
    }
}
