use sqlx::PgPool;

use super::{ledger, RepositoryError};
use crate::models::admin::{DepositOverview, Stats, UserOverview, UserUpdate, WithdrawalOverview};
use crate::models::ledger::LedgerEntry;
use crate::models::users::User;
use crate::models::ReviewStatus;

#[derive(Clone)]
pub struct AdminRepository {
    conn: PgPool,
}

impl AdminRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    async fn count_by_status(&self, table: &str, status: ReviewStatus) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {} WHERE status = $1", table))
            .bind(status)
            .fetch_one(&self.conn)
            .await
    }

    async fn sum_approved(&self, table: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(amount_in_cents), 0)::BIGINT FROM {} WHERE status = $1",
            table
        ))
        .bind(ReviewStatus::Approved)
        .fetch_one(&self.conn)
        .await
    }

    pub async fn get_stats(&self) -> Result<Stats, RepositoryError> {
        let total_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM users WHERE is_admin = false")
            .fetch_one(&self.conn);

        let (
            total_users,
            pending_deposits,
            pending_withdrawals,
            total_deposits_in_cents,
            total_withdrawals_in_cents,
        ) = futures_util::try_join!(
            total_users,
            self.count_by_status("deposits", ReviewStatus::Pending),
            self.count_by_status("withdrawals", ReviewStatus::Pending),
            self.sum_approved("deposits"),
            self.sum_approved("withdrawals"),
        )?;

        Ok(Stats {
            total_users,
            pending_deposits,
            pending_withdrawals,
            total_deposits_in_cents,
            total_withdrawals_in_cents,
        })
    }

    pub async fn get_deposits(&self) -> Result<Vec<DepositOverview>, RepositoryError> {
        let deposits = sqlx::query_as::<_, DepositOverview>(
            r#"
            SELECT d.id, d.amount_in_cents, d.transaction_id, d.screenshot, d.status, d.created_at,
                   u.id AS user_id, u.email AS user_email, u.name AS user_name,
                   u.balance_in_cents AS user_balance_in_cents
            FROM deposits d
            JOIN users u ON u.id = d.user_id
            ORDER BY d.created_at DESC
            "#,
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(deposits)
    }

    pub async fn get_withdrawals(&self) -> Result<Vec<WithdrawalOverview>, RepositoryError> {
        let withdrawals = sqlx::query_as::<_, WithdrawalOverview>(
            r#"
            SELECT w.id, w.amount_in_cents, w.destination, w.status, w.created_at,
                   u.id AS user_id, u.email AS user_email, u.name AS user_name,
                   u.balance_in_cents AS user_balance_in_cents,
                   u.deposit_link AS user_deposit_link
            FROM withdrawals w
            JOIN users u ON u.id = w.user_id
            ORDER BY w.created_at DESC
            "#,
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(withdrawals)
    }

    pub async fn get_users(&self) -> Result<Vec<UserOverview>, RepositoryError> {
        let users = sqlx::query_as::<_, UserOverview>(
            r#"
            SELECT u.id, u.email, u.name, u.balance_in_cents, u.deposit_link, u.referral_code,
                   u.is_verified, u.created_at,
                   (SELECT COUNT(1) FROM deposits d WHERE d.user_id = u.id) AS deposit_count,
                   (SELECT COUNT(1) FROM withdrawals w WHERE w.user_id = u.id) AS withdrawal_count,
                   (SELECT COUNT(1) FROM package_purchases p WHERE p.user_id = u.id) AS purchase_count
            FROM users u
            WHERE u.is_admin = false
            ORDER BY u.created_at DESC
            "#,
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(users)
    }

    /// A balance override is booked as a ledger adjustment of the difference.
    pub async fn update_user(&self, update: &UserUpdate) -> Result<User, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(&update.user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("User not found".into()))?;

        if let Some(balance) = update.balance_in_cents {
            ledger::adjust_to(&mut tx, &user.id, balance).await?;
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                deposit_link = COALESCE($2, deposit_link),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(update.name.as_deref())
        .bind(update.deposit_link.as_deref())
        .bind(&user.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(user)
    }

    pub async fn get_ledger(&self, user_id: &str) -> Result<Vec<LedgerEntry>, RepositoryError> {
        ledger::entries_for_user(&self.conn, user_id).await
    }
}
