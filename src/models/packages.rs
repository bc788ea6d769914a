use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "purchase_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct InvestmentPackage {
    pub id: String,
    pub name: String,
    pub price_in_cents: i64,
    pub daily_return_in_cents: i64,
    pub total_days: i32,
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct PackagePurchase {
    pub id: String,
    pub user_id: String,
    pub package_id: String,
    pub amount_paid_in_cents: i64,
    pub daily_return_in_cents: i64,
    pub total_days: i32,
    pub days_completed: i32,
    pub total_earned_in_cents: i64,
    pub status: PurchaseStatus,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A purchase joined with the name of its catalog package.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct PurchaseDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub purchase: PackagePurchase,
    pub package_name: String,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct DailyEarning {
    pub id: String,
    pub user_id: String,
    pub purchase_id: String,
    pub amount_in_cents: i64,
    pub day: i32,
    pub claim_date: NaiveDate,
    pub claimed_at: DateTime<Utc>,
    pub package_name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PurchaseRequest {
    pub package_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PurchaseAction {
    pub purchase_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClaimOutcome {
    pub earned_in_cents: i64,
    pub day: i32,
    pub remaining_days: i32,
}
