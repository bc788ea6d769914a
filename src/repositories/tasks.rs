use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use super::{is_unique_violation, ledger, referrals, RepositoryError};
use crate::models::ledger::LedgerKind;
use crate::models::referrals::CommissionKind;
use crate::models::tasks::{Task, TaskHistoryEntry, TaskReward, TaskWithStatus};
use crate::models::ReviewStatus;
use crate::rules::{self, RuleViolation, HISTORY_LIMIT};
use crate::utils::new_id;

const DEFAULT_TASKS: [(&str, &str, i64, &str, &str); 6] = [
    ("Watch Video Ad", "Watch a 30 second advertisement", 50, "video", "🎬"),
    ("Complete Survey", "Answer a short survey (5 questions)", 100, "survey", "📋"),
    ("Daily Check-in", "Login daily to claim your reward", 25, "daily", "📅"),
    ("Share on Social", "Share our app on social media", 75, "social", "📱"),
    ("Invite a Friend", "Invite someone using your referral code", 200, "referral", "👥"),
    ("App Review", "Rate our app on store", 150, "review", "⭐"),
];

#[derive(Clone)]
pub struct TaskRepository {
    conn: PgPool,
}

impl TaskRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    pub async fn get_tasks(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<TaskWithStatus>, RepositoryError> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE is_active = true ORDER BY reward_in_cents DESC",
        )
        .fetch_all(&self.conn)
        .await?;

        let completed: Vec<String> = sqlx::query_scalar(
            "SELECT task_id FROM task_history WHERE user_id = $1 AND completed_on = $2",
        )
        .bind(user_id)
        .bind(today)
        .fetch_all(&self.conn)
        .await?;

        let tasks = tasks
            .into_iter()
            .map(|task| {
                let completed = completed.contains(&task.id);
                TaskWithStatus { task, completed }
            })
            .collect();

        Ok(tasks)
    }

    pub async fn get_history(&self, user_id: &str) -> Result<Vec<TaskHistoryEntry>, RepositoryError> {
        let history = sqlx::query_as::<_, TaskHistoryEntry>(
            r#"
            SELECT h.id, h.task_id, t.title, t.kind, t.icon, h.earned_in_cents,
                   h.completed_on, h.completed_at
            FROM task_history h
            JOIN tasks t ON t.id = h.task_id
            WHERE h.user_id = $1
            ORDER BY h.completed_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(HISTORY_LIMIT)
        .fetch_all(&self.conn)
        .await?;

        Ok(history)
    }

    /// Credits the (possibly capped) task reward and pays the referral chain.
    /// The user row is locked for the whole transaction so concurrent
    /// completions cannot both pass the daily limit check.
    pub async fn complete_task(
        &self,
        user_id: &str,
        task_id: &str,
        today: NaiveDate,
    ) -> Result<TaskReward, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        let locked: Option<String> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(RepositoryError::NotFound("User not found".into()));
        }

        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1 AND is_active = true")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("Task not found".into()))?;

        let already_completed: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM task_history
                WHERE user_id = $1 AND task_id = $2 AND completed_on = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(task_id)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;
        if already_completed {
            return Err(RuleViolation::TaskAlreadyCompleted.into());
        }

        let approved_deposits: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_in_cents), 0)::BIGINT FROM deposits
            WHERE user_id = $1 AND status = $2
            "#,
        )
        .bind(user_id)
        .bind(ReviewStatus::Approved)
        .fetch_one(&mut *tx)
        .await?;

        let earned_today: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(earned_in_cents), 0)::BIGINT FROM task_history
            WHERE user_id = $1 AND completed_on = $2
            "#,
        )
        .bind(user_id)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;

        let daily_limit = rules::daily_earning_limit(approved_deposits);
        let earned = rules::task_reward(daily_limit, earned_today, task.reward_in_cents)?;

        let history_id = new_id();
        sqlx::query(
            r#"
            INSERT INTO task_history (id, user_id, task_id, earned_in_cents, completed_on)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&history_id)
        .bind(user_id)
        .bind(task_id)
        .bind(earned)
        .bind(today)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RuleViolation::TaskAlreadyCompleted.into()
            } else {
                RepositoryError::from(e)
            }
        })?;

        ledger::credit(&mut tx, user_id, earned, LedgerKind::TaskReward, Some(&history_id)).await?;
        let commissions_paid =
            pay_commissions(&mut tx, user_id, earned, &task.title, &history_id).await?;

        tx.commit().await?;

        let today_earnings = earned_today + earned;

        Ok(TaskReward {
            earned_in_cents: earned,
            daily_limit_in_cents: daily_limit,
            today_earnings_in_cents: today_earnings,
            remaining_today_in_cents: daily_limit - today_earnings,
            commissions_paid,
        })
    }

    pub async fn seed_tasks(&self) -> Result<u64, RepositoryError> {
        let mut created = 0;

        for (title, description, reward, kind, icon) in DEFAULT_TASKS {
            let result = sqlx::query(
                r#"
                INSERT INTO tasks (id, title, description, reward_in_cents, kind, icon)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (title) DO NOTHING
                "#,
            )
            .bind(new_id())
            .bind(title)
            .bind(description)
            .bind(reward)
            .bind(kind)
            .bind(icon)
            .execute(&self.conn)
            .await?;

            created += result.rows_affected();
        }

        Ok(created)
    }
}

/// Walks up to three referrers above `user_id`, crediting each its share of
/// `reward_in_cents`. Stops at the top of the chain or when the chain loops.
async fn pay_commissions(
    conn: &mut PgConnection,
    user_id: &str,
    reward_in_cents: i64,
    task_title: &str,
    reference_id: &str,
) -> Result<usize, RepositoryError> {
    let mut visited = vec![user_id.to_string()];
    let mut paid = 0;

    for level in 0..rules::COMMISSION_RATES_BPS.len() {
        let current = visited.last().cloned().unwrap_or_default();
        let referrer: Option<Option<String>> =
            sqlx::query_scalar("SELECT referred_by FROM users WHERE id = $1")
                .bind(&current)
                .fetch_optional(&mut *conn)
                .await?;

        let Some(Some(referrer_id)) = referrer else {
            break;
        };
        if visited.contains(&referrer_id) {
            log::warn!("Referral chain of {} loops at {}.", user_id, referrer_id);
            break;
        }

        let amount = rules::commission(reward_in_cents, level).unwrap_or(0);
        if amount > 0 {
            ledger::credit(
                &mut *conn,
                &referrer_id,
                amount,
                LedgerKind::TaskCommission,
                Some(reference_id),
            )
            .await?;

            referrals::record_commission(
                &mut *conn,
                &referrer_id,
                user_id,
                amount,
                CommissionKind::TaskCommission,
                &format!("{} commission from: {}", rules::commission_label(level), task_title),
            )
            .await?;

            paid += 1;
        }

        visited.push(referrer_id);
    }

    Ok(paid)
}
