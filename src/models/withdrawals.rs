use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReviewStatus;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Withdrawal {
    pub id: String,
    pub user_id: String,
    pub amount_in_cents: i64,
    pub destination: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewWithdrawal {
    pub amount_in_cents: i64,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WithdrawalReview {
    pub withdrawal_id: String,
    pub status: ReviewStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct WithdrawalReviewOutcome {
    pub withdrawal: Withdrawal,
    pub cancelled_purchases: Vec<String>,
}
