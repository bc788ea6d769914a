use serde::{Deserialize, Serialize};

pub mod admin;
pub mod deposits;
pub mod ledger;
pub mod packages;
pub mod referrals;
pub mod tasks;
pub mod users;
pub mod withdrawals;

/// Moderation state shared by deposits and withdrawals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "review_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}
