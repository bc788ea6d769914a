use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub reward_in_cents: i64,
    pub kind: String,
    pub icon: String,
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct TaskWithStatus {
    #[serde(flatten)]
    pub task: Task,
    pub completed: bool,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct TaskHistoryEntry {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub kind: String,
    pub icon: String,
    pub earned_in_cents: i64,
    pub completed_on: NaiveDate,
    pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TaskCompletion {
    pub task_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskReward {
    pub earned_in_cents: i64,
    pub daily_limit_in_cents: i64,
    pub today_earnings_in_cents: i64,
    pub remaining_today_in_cents: i64,
    pub commissions_paid: usize,
}
