use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReviewStatus;

#[derive(Clone, Debug, Default, Serialize)]
pub struct Stats {
    pub total_users: i64,
    pub pending_deposits: i64,
    pub pending_withdrawals: i64,
    pub total_deposits_in_cents: i64,
    pub total_withdrawals_in_cents: i64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct DepositOverview {
    pub id: String,
    pub amount_in_cents: i64,
    pub transaction_id: String,
    pub screenshot: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub user_balance_in_cents: i64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct WithdrawalOverview {
    pub id: String,
    pub amount_in_cents: i64,
    pub destination: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub user_balance_in_cents: i64,
    pub user_deposit_link: Option<String>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct UserOverview {
    pub id: String,
    pub email: String,
    pub name: String,
    pub balance_in_cents: i64,
    pub deposit_link: Option<String>,
    pub referral_code: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub deposit_count: i64,
    pub withdrawal_count: i64,
    pub purchase_count: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserUpdate {
    pub user_id: String,
    pub balance_in_cents: Option<i64>,
    pub deposit_link: Option<String>,
    pub name: Option<String>,
}
