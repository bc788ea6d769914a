use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "ledger_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Deposit,
    Withdrawal,
    TaskReward,
    TaskCommission,
    ReferralBonus,
    PackageReturn,
    Adjustment,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    /// Signed: credits are positive, debits negative.
    pub amount_in_cents: i64,
    pub kind: LedgerKind,
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
