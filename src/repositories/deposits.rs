use sqlx::PgPool;

use super::{ledger, referrals, RepositoryError};
use crate::models::deposits::{Deposit, DepositReviewOutcome};
use crate::models::ledger::LedgerKind;
use crate::models::referrals::CommissionKind;
use crate::models::ReviewStatus;
use crate::rules::{self, REFERRAL_BONUS_IN_CENTS};
use crate::utils::new_id;

#[derive(Clone)]
pub struct DepositRepository {
    conn: PgPool,
}

impl DepositRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    pub async fn new_deposit(
        &self,
        user_id: &str,
        amount_in_cents: i64,
        transaction_id: &str,
        screenshot: &str,
    ) -> Result<Deposit, RepositoryError> {
        rules::validate_deposit_amount(amount_in_cents)?;

        let deposit = sqlx::query_as::<_, Deposit>(
            r#"
            INSERT INTO deposits (id, user_id, amount_in_cents, transaction_id, screenshot, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(user_id)
        .bind(amount_in_cents)
        .bind(transaction_id)
        .bind(screenshot)
        .fetch_one(&self.conn)
        .await?;

        Ok(deposit)
    }

    pub async fn get_deposits(&self, user_id: &str) -> Result<Vec<Deposit>, RepositoryError> {
        let deposits = sqlx::query_as::<_, Deposit>(
            "SELECT * FROM deposits WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(deposits)
    }

    /// Approving credits the depositor and, on the referred user's first
    /// approval, pays the referrer's bonus. The bonus flag is flipped with a
    /// conditional update so the bonus can only ever be paid once.
    pub async fn review_deposit(
        &self,
        deposit_id: &str,
        status: ReviewStatus,
    ) -> Result<DepositReviewOutcome, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        let deposit =
            sqlx::query_as::<_, Deposit>("SELECT * FROM deposits WHERE id = $1 FOR UPDATE")
                .bind(deposit_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| RepositoryError::NotFound("Deposit not found".into()))?;

        rules::validate_review(deposit.status, status)?;

        let deposit = sqlx::query_as::<_, Deposit>(
            r#"
            UPDATE deposits SET status = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(deposit_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut referral_bonus_paid_to = None;

        if status == ReviewStatus::Approved {
            ledger::credit(
                &mut tx,
                &deposit.user_id,
                deposit.amount_in_cents,
                LedgerKind::Deposit,
                Some(&deposit.id),
            )
            .await?;

            let referrer: Option<Option<String>> = sqlx::query_scalar(
                r#"
                UPDATE users SET referral_bonus_paid = true, updated_at = CURRENT_TIMESTAMP
                WHERE id = $1 AND referral_bonus_paid = false AND referred_by IS NOT NULL
                RETURNING referred_by
                "#,
            )
            .bind(&deposit.user_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(Some(referrer_id)) = referrer {
                ledger::credit(
                    &mut tx,
                    &referrer_id,
                    REFERRAL_BONUS_IN_CENTS,
                    LedgerKind::ReferralBonus,
                    Some(&deposit.id),
                )
                .await?;

                referrals::record_commission(
                    &mut tx,
                    &referrer_id,
                    &deposit.user_id,
                    REFERRAL_BONUS_IN_CENTS,
                    CommissionKind::SignupBonus,
                    "Referral bonus for first approved deposit",
                )
                .await?;

                referral_bonus_paid_to = Some(referrer_id);
            }
        }

        tx.commit().await?;

        Ok(DepositReviewOutcome {
            deposit,
            referral_bonus_paid_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;
    use crate::repositories::testing::{balance, ledger_total, new_user, SCREENSHOT};
    use crate::rules::RuleViolation;

    #[sqlx::test]
    async fn deposits_below_the_minimum_are_refused(pool: PgPool) {
        let repository = DepositRepository::new(pool.clone());
        let user = new_user(&pool, "alice@example.com", None).await;

        let result = repository
            .new_deposit(&user.id, 2_999, "TX-1", SCREENSHOT)
            .await;
        assert!(matches!(
            result,
            Err(RepositoryError::Rule(RuleViolation::DepositBelowMinimum))
        ));
        assert!(repository.get_deposits(&user.id).await.unwrap().is_empty());
    }

    #[sqlx::test]
    async fn a_deposit_is_reviewed_once(pool: PgPool) {
        let repository = DepositRepository::new(pool.clone());
        let user = new_user(&pool, "bob@example.com", None).await;
        let deposit = repository
            .new_deposit(&user.id, 3_000, "TX-1", SCREENSHOT)
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            repository.review_deposit(&deposit.id, ReviewStatus::Approved),
            repository.review_deposit(&deposit.id, ReviewStatus::Approved),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|o| matches!(
            o,
            Err(RepositoryError::Rule(RuleViolation::AlreadyReviewed("approved")))
        )));

        assert_eq!(balance(&pool, &user.id).await, 3_000);
        assert_eq!(ledger_total(&pool, &user.id).await, 3_000);
    }

    #[sqlx::test]
    async fn rejected_deposits_credit_nothing(pool: PgPool) {
        let repository = DepositRepository::new(pool.clone());
        let user = new_user(&pool, "carol@example.com", None).await;
        let deposit = repository
            .new_deposit(&user.id, 5_000, "TX-1", SCREENSHOT)
            .await
            .unwrap();

        let outcome = repository
            .review_deposit(&deposit.id, ReviewStatus::Rejected)
            .await
            .unwrap();

        assert_eq!(outcome.deposit.status, ReviewStatus::Rejected);
        assert_eq!(outcome.referral_bonus_paid_to, None);
        assert_eq!(balance(&pool, &user.id).await, 0);
        assert_eq!(ledger_total(&pool, &user.id).await, 0);
    }

    #[sqlx::test]
    async fn referral_bonus_is_paid_once(pool: PgPool) {
        let repository = DepositRepository::new(pool.clone());
        let referrer = new_user(&pool, "rita@example.com", None).await;
        let referred = new_user(&pool, "sam@example.com", Some(&referrer.referral_code)).await;
        assert_eq!(referred.referred_by.as_deref(), Some(referrer.id.as_str()));

        let first = repository
            .new_deposit(&referred.id, 3_000, "TX-1", SCREENSHOT)
            .await
            .unwrap();
        let second = repository
            .new_deposit(&referred.id, 5_000, "TX-2", SCREENSHOT)
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            repository.review_deposit(&first.id, ReviewStatus::Approved),
            repository.review_deposit(&second.id, ReviewStatus::Approved),
        );
        let paid_to: Vec<String> = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter_map(|outcome| outcome.referral_bonus_paid_to)
            .collect();
        assert_eq!(paid_to, vec![referrer.id.clone()]);

        let bonuses: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM referral_commissions WHERE receiver_id = $1 AND kind = $2",
        )
        .bind(&referrer.id)
        .bind(CommissionKind::SignupBonus)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(bonuses, 1);

        assert_eq!(balance(&pool, &referrer.id).await, REFERRAL_BONUS_IN_CENTS);
        assert_eq!(ledger_total(&pool, &referrer.id).await, REFERRAL_BONUS_IN_CENTS);
        assert_eq!(balance(&pool, &referred.id).await, 8_000);
        assert_eq!(ledger_total(&pool, &referred.id).await, 8_000);
    }
}
