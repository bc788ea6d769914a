use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "commission_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommissionKind {
    SignupBonus,
    TaskCommission,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReferralSummary {
    pub referral_code: String,
    pub referral_count: i64,
    pub referral_earnings_in_cents: i64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub email: String,
    pub joined_at: DateTime<Utc>,
    pub is_active: bool,
    pub total_earnings_in_cents: i64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TeamStats {
    pub total_referrals: usize,
    pub active_referrals: usize,
    pub total_earnings_in_cents: i64,
    pub today_earnings_in_cents: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Team {
    pub referral_code: String,
    pub stats: TeamStats,
    pub team_members: Vec<TeamMember>,
    pub daily_commissions: BTreeMap<NaiveDate, i64>,
}
