use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReviewStatus;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Deposit {
    pub id: String,
    pub user_id: String,
    pub amount_in_cents: i64,
    pub transaction_id: String,
    #[serde(skip_serializing)]
    pub screenshot: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewDeposit {
    pub amount_in_cents: Option<i64>,
    pub transaction_id: Option<String>,
    /// Screenshot of the transfer as a `data:` URL.
    pub screenshot: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DepositReview {
    pub deposit_id: String,
    pub status: ReviewStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct DepositReviewOutcome {
    pub deposit: Deposit,
    pub referral_bonus_paid_to: Option<String>,
}
