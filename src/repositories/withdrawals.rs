use sqlx::PgPool;

use super::{ledger, RepositoryError};
use crate::models::ledger::LedgerKind;
use crate::models::users::User;
use crate::models::withdrawals::{Withdrawal, WithdrawalReviewOutcome};
use crate::models::ReviewStatus;
use crate::rules;
use crate::utils::new_id;

#[derive(Clone)]
pub struct WithdrawalRepository {
    conn: PgPool,
}

impl WithdrawalRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    /// The balance is only checked here; it is debited on approval.
    pub async fn new_withdrawal(
        &self,
        user_id: &str,
        amount_in_cents: i64,
    ) -> Result<Withdrawal, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("User not found".into()))?;

        rules::validate_withdrawal(
            amount_in_cents,
            user.balance_in_cents,
            user.deposit_link.as_deref(),
        )?;

        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"
            INSERT INTO withdrawals (id, user_id, amount_in_cents, destination, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(user_id)
        .bind(amount_in_cents)
        .bind(user.deposit_link.as_deref().unwrap_or_default())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(withdrawal)
    }

    pub async fn get_withdrawals(&self, user_id: &str) -> Result<Vec<Withdrawal>, RepositoryError> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            "SELECT * FROM withdrawals WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(withdrawals)
    }

    /// Approval debits the balance and then cancels the newest active
    /// purchases until what stays invested is covered by the new balance.
    pub async fn review_withdrawal(
        &self,
        withdrawal_id: &str,
        status: ReviewStatus,
    ) -> Result<WithdrawalReviewOutcome, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        let withdrawal =
            sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1 FOR UPDATE")
                .bind(withdrawal_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| RepositoryError::NotFound("Withdrawal not found".into()))?;

        rules::validate_review(withdrawal.status, status)?;

        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"
            UPDATE withdrawals SET status = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(withdrawal_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut cancelled_purchases = Vec::new();

        if status == ReviewStatus::Approved {
            let balance = ledger::debit(
                &mut tx,
                &withdrawal.user_id,
                withdrawal.amount_in_cents,
                LedgerKind::Withdrawal,
                Some(&withdrawal.id),
            )
            .await?;

            let active: Vec<(String, i64)> = sqlx::query_as(
                r#"
                SELECT id, amount_paid_in_cents FROM package_purchases
                WHERE user_id = $1 AND status = 'active'
                ORDER BY purchased_at DESC
                FOR UPDATE
                "#,
            )
            .bind(&withdrawal.user_id)
            .fetch_all(&mut *tx)
            .await?;

            cancelled_purchases = rules::purchases_to_cancel(balance, &active);

            if !cancelled_purchases.is_empty() {
                sqlx::query("UPDATE package_purchases SET status = 'cancelled' WHERE id = ANY($1)")
                    .bind(&cancelled_purchases)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(WithdrawalReviewOutcome {
            withdrawal,
            cancelled_purchases,
        })
    }
}
