use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveTime};
use sqlx::{PgConnection, PgPool};

use super::RepositoryError;
use crate::models::referrals::{CommissionKind, ReferralSummary, Team, TeamMember, TeamStats};
use crate::utils::{mask_email, new_id};

const TEAM_HISTORY_DAYS: i64 = 7;

pub async fn record_commission(
    conn: &mut PgConnection,
    receiver_id: &str,
    generator_id: &str,
    amount_in_cents: i64,
    kind: CommissionKind,
    description: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO referral_commissions (id, receiver_id, generator_id, amount_in_cents, kind, description)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(new_id())
    .bind(receiver_id)
    .bind(generator_id)
    .bind(amount_in_cents)
    .bind(kind)
    .bind(description)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct ReferralRepository {
    conn: PgPool,
}

impl ReferralRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    async fn get_referral_code(&self, user_id: &str) -> Result<String, RepositoryError> {
        let code: Option<String> =
            sqlx::query_scalar("SELECT referral_code FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.conn)
                .await?;

        code.ok_or_else(|| RepositoryError::NotFound("User not found".into()))
    }

    async fn get_commission_total(&self, user_id: &str) -> Result<i64, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_in_cents), 0)::BIGINT FROM referral_commissions WHERE receiver_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.conn)
        .await?;

        Ok(total)
    }

    pub async fn get_summary(&self, user_id: &str) -> Result<ReferralSummary, RepositoryError> {
        let referral_code = self.get_referral_code(user_id).await?;

        let referral_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE referred_by = $1")
                .bind(user_id)
                .fetch_one(&self.conn)
                .await?;

        let referral_earnings_in_cents = self.get_commission_total(user_id).await?;

        Ok(ReferralSummary {
            referral_code,
            referral_count,
            referral_earnings_in_cents,
        })
    }

    pub async fn get_team(&self, user_id: &str, today: NaiveDate) -> Result<Team, RepositoryError> {
        let referral_code = self.get_referral_code(user_id).await?;

        let mut team_members = sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT
                u.id, u.name, u.email, u.created_at AS joined_at, u.is_verified AS is_active,
                COALESCE((
                    SELECT SUM(c.amount_in_cents) FROM referral_commissions c
                    WHERE c.receiver_id = $1 AND c.generator_id = u.id
                ), 0)::BIGINT AS total_earnings_in_cents
            FROM users u
            WHERE u.referred_by = $1
            ORDER BY u.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        for member in team_members.iter_mut() {
            member.email = mask_email(&member.email);
        }

        let start_of_today = today.and_time(NaiveTime::MIN).and_utc();
        let window_start = start_of_today - Duration::days(TEAM_HISTORY_DAYS - 1);

        let daily: Vec<(NaiveDate, i64)> = sqlx::query_as(
            r#"
            SELECT (created_at AT TIME ZONE 'UTC')::DATE AS day,
                   SUM(amount_in_cents)::BIGINT AS total
            FROM referral_commissions
            WHERE receiver_id = $1 AND created_at >= $2
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(user_id)
        .bind(window_start)
        .fetch_all(&self.conn)
        .await?;

        let mut daily_commissions: BTreeMap<NaiveDate, i64> = (0..TEAM_HISTORY_DAYS)
            .map(|offset| (today - Duration::days(offset), 0))
            .collect();
        daily_commissions.extend(daily);

        let stats = TeamStats {
            total_referrals: team_members.len(),
            active_referrals: team_members.iter().filter(|m| m.is_active).count(),
            total_earnings_in_cents: self.get_commission_total(user_id).await?,
            today_earnings_in_cents: daily_commissions.get(&today).copied().unwrap_or(0),
        };

        Ok(Team {
            referral_code,
            stats,
            team_members,
            daily_commissions,
        })
    }
}
