use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use super::{is_unique_violation, ledger, RepositoryError};
use crate::models::ledger::LedgerKind;
use crate::models::packages::{
    ClaimOutcome, DailyEarning, InvestmentPackage, PackagePurchase, PurchaseDetails,
    PurchaseStatus,
};
use crate::rules::{self, RuleViolation, HISTORY_LIMIT};
use crate::utils::new_id;

const DEFAULT_PACKAGES: [(&str, i64, i64, i32); 5] = [
    ("Starter", 1_000, 25, 30),
    ("Silver", 5_000, 125, 30),
    ("Gold", 10_000, 275, 30),
    ("VIP Elite", 50_000, 1_200, 30),
    ("Diamond", 100_000, 2_800, 30),
];

#[derive(Clone)]
pub struct PackageRepository {
    conn: PgPool,
}

impl PackageRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    pub async fn get_packages(&self) -> Result<Vec<InvestmentPackage>, RepositoryError> {
        let packages = sqlx::query_as::<_, InvestmentPackage>(
            "SELECT * FROM investment_packages WHERE is_active = true ORDER BY price_in_cents ASC",
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(packages)
    }

    /// Purchasing does not debit the balance. It only has to keep the total
    /// active investment within the balance, checked under the user row lock.
    pub async fn purchase(
        &self,
        user_id: &str,
        package_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PackagePurchase, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        let package = sqlx::query_as::<_, InvestmentPackage>(
            "SELECT * FROM investment_packages WHERE id = $1 AND is_active = true",
        )
        .bind(package_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("Package not found".into()))?;

        let balance = ledger::lock_balance(&mut tx, user_id).await?;

        let invested: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_paid_in_cents), 0)::BIGINT FROM package_purchases
            WHERE user_id = $1 AND status = $2
            "#,
        )
        .bind(user_id)
        .bind(PurchaseStatus::Active)
        .fetch_one(&mut *tx)
        .await?;

        rules::check_purchase(balance, invested, package.price_in_cents)?;

        let purchase = sqlx::query_as::<_, PackagePurchase>(
            r#"
            INSERT INTO package_purchases
            (id, user_id, package_id, amount_paid_in_cents, daily_return_in_cents, total_days,
             purchased_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(user_id)
        .bind(&package.id)
        .bind(package.price_in_cents)
        .bind(package.daily_return_in_cents)
        .bind(package.total_days)
        .bind(now)
        .bind(now + Duration::days(i64::from(package.total_days)))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(purchase)
    }

    pub async fn get_purchases(&self, user_id: &str) -> Result<Vec<PurchaseDetails>, RepositoryError> {
        let purchases = sqlx::query_as::<_, PurchaseDetails>(
            r#"
            SELECT p.*, k.name AS package_name
            FROM package_purchases p
            JOIN investment_packages k ON k.id = p.package_id
            WHERE p.user_id = $1
            ORDER BY p.purchased_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(purchases)
    }

    async fn lock_owned_purchase(
        tx: &mut sqlx::PgConnection,
        user_id: &str,
        purchase_id: &str,
    ) -> Result<PurchaseDetails, RepositoryError> {
        let purchase = sqlx::query_as::<_, PurchaseDetails>(
            r#"
            SELECT p.*, k.name AS package_name
            FROM package_purchases p
            JOIN investment_packages k ON k.id = p.package_id
            WHERE p.id = $1
            FOR UPDATE OF p
            "#,
        )
        .bind(purchase_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("Purchase not found".into()))?;

        if purchase.purchase.user_id != user_id {
            return Err(RepositoryError::Forbidden("Unauthorized".into()));
        }

        Ok(purchase)
    }

    /// Pays one day of returns per UTC day. The purchase row lock plus the
    /// unique `(purchase_id, claim_date)` index keep a day from being paid
    /// twice. The user row is locked before the purchase, the same order a
    /// withdrawal approval takes them in.
    pub async fn claim(
        &self,
        user_id: &str,
        purchase_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, RepositoryError> {
        let today = now.date_naive();
        let mut tx = self.conn.begin().await?;

        ledger::lock_balance(&mut tx, user_id).await?;
        let details = Self::lock_owned_purchase(&mut tx, user_id, purchase_id).await?;
        let purchase = details.purchase;

        if purchase.status != PurchaseStatus::Active {
            return Err(RuleViolation::PurchaseInactive.into());
        }

        let claimed_today: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM daily_earnings WHERE purchase_id = $1 AND claim_date = $2)",
        )
        .bind(purchase_id)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;
        if claimed_today {
            return Err(RuleViolation::AlreadyClaimed.into());
        }

        if purchase.days_completed >= purchase.total_days {
            sqlx::query("UPDATE package_purchases SET status = $1 WHERE id = $2")
                .bind(PurchaseStatus::Completed)
                .bind(purchase_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            return Err(RuleViolation::AllDaysClaimed.into());
        }

        let day = purchase.days_completed + 1;
        let earned = purchase.daily_return_in_cents;
        let earning_id = new_id();

        sqlx::query(
            r#"
            INSERT INTO daily_earnings (id, user_id, purchase_id, amount_in_cents, day, claim_date, claimed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&earning_id)
        .bind(user_id)
        .bind(purchase_id)
        .bind(earned)
        .bind(day)
        .bind(today)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RuleViolation::AlreadyClaimed.into()
            } else {
                RepositoryError::from(e)
            }
        })?;

        let status = if day >= purchase.total_days {
            PurchaseStatus::Completed
        } else {
            PurchaseStatus::Active
        };

        sqlx::query(
            r#"
            UPDATE package_purchases
            SET days_completed = days_completed + 1,
                total_earned_in_cents = total_earned_in_cents + $1,
                status = $2
            WHERE id = $3
            "#,
        )
        .bind(earned)
        .bind(status)
        .bind(purchase_id)
        .execute(&mut *tx)
        .await?;

        ledger::credit(&mut tx, user_id, earned, LedgerKind::PackageReturn, Some(&earning_id)).await?;

        tx.commit().await?;

        Ok(ClaimOutcome {
            earned_in_cents: earned,
            day,
            remaining_days: purchase.total_days - day,
        })
    }

    /// Returns the name of the cancelled package.
    pub async fn cancel(&self, user_id: &str, purchase_id: &str) -> Result<String, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        ledger::lock_balance(&mut tx, user_id).await?;
        let details = Self::lock_owned_purchase(&mut tx, user_id, purchase_id).await?;
        if details.purchase.status != PurchaseStatus::Active {
            return Err(RuleViolation::CancelInactive.into());
        }

        sqlx::query("UPDATE package_purchases SET status = $1 WHERE id = $2")
            .bind(PurchaseStatus::Cancelled)
            .bind(purchase_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(details.package_name)
    }

    pub async fn get_earnings(&self, user_id: &str) -> Result<Vec<DailyEarning>, RepositoryError> {
        let earnings = sqlx::query_as::<_, DailyEarning>(
            r#"
            SELECT e.*, k.name AS package_name
            FROM daily_earnings e
            JOIN package_purchases p ON p.id = e.purchase_id
            JOIN investment_packages k ON k.id = p.package_id
            WHERE e.user_id = $1
            ORDER BY e.claimed_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(HISTORY_LIMIT)
        .fetch_all(&self.conn)
        .await?;

        Ok(earnings)
    }

    pub async fn seed_packages(&self) -> Result<u64, RepositoryError> {
        let mut created = 0;

        for (name, price, daily_return, total_days) in DEFAULT_PACKAGES {
            let result = sqlx::query(
                r#"
                INSERT INTO investment_packages (id, name, price_in_cents, daily_return_in_cents, total_days)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(new_id())
            .bind(name)
            .bind(price)
            .bind(daily_return)
            .bind(total_days)
            .execute(&self.conn)
            .await?;

            created += result.rows_affected();
        }

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    use super::*;
    use crate::models::ReviewStatus;
    use crate::repositories::testing::{balance, fund, ledger_total, new_user, set_deposit_link};
    use crate::repositories::withdrawals::WithdrawalRepository;

    async fn package_id(repository: &PackageRepository, name: &str) -> String {
        repository
            .get_packages()
            .await
            .unwrap()
            .into_iter()
            .find(|package| package.name == name)
            .unwrap()
            .id
    }

    #[sqlx::test]
    async fn seeds_the_catalog_once(pool: PgPool) {
        let repository = PackageRepository::new(pool);

        assert_eq!(repository.seed_packages().await.unwrap(), 5);
        assert_eq!(repository.seed_packages().await.unwrap(), 0);

        let packages = repository.get_packages().await.unwrap();
        let catalog: Vec<(&str, i64, i64)> = packages
            .iter()
            .map(|p| (p.name.as_str(), p.price_in_cents, p.daily_return_in_cents))
            .collect();
        assert_eq!(
            catalog,
            [
                ("Starter", 1_000, 25),
                ("Silver", 5_000, 125),
                ("Gold", 10_000, 275),
                ("VIP Elite", 50_000, 1_200),
                ("Diamond", 100_000, 2_800),
            ]
        );
        assert!(packages.iter().all(|p| p.total_days == 30));
    }

    #[sqlx::test]
    async fn a_purchase_pays_once_per_day(pool: PgPool) {
        let repository = PackageRepository::new(pool.clone());
        repository.seed_packages().await.unwrap();
        let user = new_user(&pool, "alice@example.com", None).await;
        fund(&pool, &user.id, 3_000).await;

        let now = Utc::now();
        let starter = package_id(&repository, "Starter").await;
        let purchase = repository.purchase(&user.id, &starter, now).await.unwrap();

        let (first, second) = tokio::join!(
            repository.claim(&user.id, &purchase.id, now),
            repository.claim(&user.id, &purchase.id, now),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|o| matches!(
            o,
            Err(RepositoryError::Rule(RuleViolation::AlreadyClaimed))
        )));

        let next_day = repository
            .claim(&user.id, &purchase.id, now + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(
            next_day,
            ClaimOutcome {
                earned_in_cents: 25,
                day: 2,
                remaining_days: 28,
            }
        );

        assert_eq!(repository.get_earnings(&user.id).await.unwrap().len(), 2);
        assert_eq!(balance(&pool, &user.id).await, 3_050);
        assert_eq!(ledger_total(&pool, &user.id).await, 3_050);
    }

    #[sqlx::test]
    async fn purchases_stay_within_the_balance(pool: PgPool) {
        let repository = PackageRepository::new(pool.clone());
        repository.seed_packages().await.unwrap();
        let user = new_user(&pool, "carol@example.com", None).await;
        fund(&pool, &user.id, 6_000).await;

        let silver = package_id(&repository, "Silver").await;
        let gold = package_id(&repository, "Gold").await;
        let now = Utc::now();

        let result = repository.purchase(&user.id, &gold, now).await;
        assert!(matches!(
            result,
            Err(RepositoryError::Rule(RuleViolation::BalanceBelowPrice))
        ));

        repository.purchase(&user.id, &silver, now).await.unwrap();
        let result = repository.purchase(&user.id, &silver, now).await;
        assert!(matches!(
            result,
            Err(RepositoryError::Rule(RuleViolation::FullyInvested { .. }))
        ));

        assert_eq!(balance(&pool, &user.id).await, 6_000);
    }

    #[sqlx::test]
    async fn claims_belong_to_the_purchase_owner(pool: PgPool) {
        let repository = PackageRepository::new(pool.clone());
        repository.seed_packages().await.unwrap();
        let owner = new_user(&pool, "dave@example.com", None).await;
        let other = new_user(&pool, "erin@example.com", None).await;
        fund(&pool, &owner.id, 3_000).await;

        let starter = package_id(&repository, "Starter").await;
        let purchase = repository
            .purchase(&owner.id, &starter, Utc::now())
            .await
            .unwrap();

        let result = repository.claim(&other.id, &purchase.id, Utc::now()).await;
        assert!(matches!(result, Err(RepositoryError::Forbidden(_))));

        assert_eq!(
            repository.cancel(&owner.id, &purchase.id).await.unwrap(),
            "Starter"
        );
        let result = repository.claim(&owner.id, &purchase.id, Utc::now()).await;
        assert!(matches!(
            result,
            Err(RepositoryError::Rule(RuleViolation::PurchaseInactive))
        ));
    }

    #[sqlx::test]
    async fn claims_and_withdrawal_approvals_do_not_deadlock(pool: PgPool) {
        let packages = PackageRepository::new(pool.clone());
        let withdrawals = WithdrawalRepository::new(pool.clone());
        packages.seed_packages().await.unwrap();
        let starter = package_id(&packages, "Starter").await;

        let user = new_user(&pool, "frank@example.com", None).await;
        set_deposit_link(&pool, &user.id).await;
        fund(&pool, &user.id, 20_000).await;
        let now = Utc::now();

        for _ in 0..10 {
            let purchase = packages.purchase(&user.id, &starter, now).await.unwrap();
            let withdrawal = withdrawals.new_withdrawal(&user.id, 100).await.unwrap();

            let (claim, review) = tokio::join!(
                packages.claim(&user.id, &purchase.id, now),
                withdrawals.review_withdrawal(&withdrawal.id, ReviewStatus::Approved),
            );

            assert_eq!(claim.unwrap().earned_in_cents, 25);
            assert!(review.unwrap().cancelled_purchases.is_empty());
        }

        assert_eq!(balance(&pool, &user.id).await, 19_250);
        assert_eq!(ledger_total(&pool, &user.id).await, 19_250);
    }
}
