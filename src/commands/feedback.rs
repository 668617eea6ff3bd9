//! Feedback on generated ads

use chrono::Utc;

use super::billing::account_key_for;
use crate::billing::FeedbackEntry;
use crate::error::AppError;
use crate::state::AppState;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Record a 1-5 rating for a generated ad
pub async fn submit_feedback(
    state: &AppState,
    email: &str,
    rating: u8,
    input: &str,
    response: &str,
) -> Result<FeedbackEntry, AppError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::InvalidInput(format!(
            "rating must be between {} and {}, got {}",
            MIN_RATING, MAX_RATING, rating
        )));
    }

    let entry = FeedbackEntry {
        account_key: account_key_for(email)?,
        rating,
        input: input.to_string(),
        response: response.to_string(),
        timestamp: Utc::now(),
    };
    state.billing.metering.record_feedback(&entry).await;
    Ok(entry)
}
