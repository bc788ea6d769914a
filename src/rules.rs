//! Balance rules shared by the repositories. Everything here is pure so the
//! limits can be checked without a database.

use std::fmt;

use crate::models::ReviewStatus;

pub const MIN_DEPOSIT_IN_CENTS: i64 = 30 * 100;
pub const MIN_WITHDRAWAL_IN_CENTS: i64 = 100;
pub const REFERRAL_BONUS_IN_CENTS: i64 = 2 * 100;

/// Approved deposits are expected to pay back over this many days of tasks.
pub const DEPOSIT_PAYBACK_DAYS: i64 = 30;

/// Task commission per referral level, in basis points.
pub const COMMISSION_RATES_BPS: [i64; 3] = [1000, 500, 200];

pub const HISTORY_LIMIT: i64 = 50;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Dollar amount formatted from cents, e.g. `$12.05`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cents(pub i64);

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("Password must be at least {} characters", MIN_PASSWORD_LENGTH)]
    PasswordTooShort,
    #[error("Minimum deposit is {}", Cents(MIN_DEPOSIT_IN_CENTS))]
    DepositBelowMinimum,
    #[error("Invalid amount")]
    InvalidAmount,
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Please set your deposit link first")]
    MissingDepositLink,
    #[error("Please make a deposit first to start earning. Minimum deposit: {}", Cents(MIN_DEPOSIT_IN_CENTS))]
    NoApprovedDeposits,
    #[error("Daily earning limit reached ({limit}). Come back tomorrow!")]
    DailyLimitReached { limit: Cents },
    #[error("Task already completed today")]
    TaskAlreadyCompleted,
    #[error("Insufficient balance. Please deposit first.")]
    BalanceBelowPrice,
    #[error("You cannot buy more packages. Your balance ({balance}) is fully invested ({invested}).")]
    FullyInvested { balance: Cents, invested: Cents },
    #[error("This package is no longer active")]
    PurchaseInactive,
    #[error("Package is not active")]
    CancelInactive,
    #[error("Already claimed today. Come back tomorrow!")]
    AlreadyClaimed,
    #[error("All earnings have been claimed for this package")]
    AllDaysClaimed,
    #[error("Status must be approved or rejected")]
    InvalidReviewStatus,
    #[error("Request has already been {0}")]
    AlreadyReviewed(&'static str),
    #[error("Balance cannot be negative")]
    NegativeBalance,
}

pub fn validate_credentials(email: &str, password: &str) -> Result<(), RuleViolation> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(RuleViolation::MissingCredentials);
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(RuleViolation::PasswordTooShort);
    }

    Ok(())
}

pub fn validate_deposit_amount(amount_in_cents: i64) -> Result<(), RuleViolation> {
    if amount_in_cents < MIN_DEPOSIT_IN_CENTS {
        return Err(RuleViolation::DepositBelowMinimum);
    }

    Ok(())
}

pub fn validate_withdrawal(
    amount_in_cents: i64,
    balance_in_cents: i64,
    deposit_link: Option<&str>,
) -> Result<(), RuleViolation> {
    match deposit_link {
        Some(link) if !link.trim().is_empty() => {}
        _ => return Err(RuleViolation::MissingDepositLink),
    }

    if amount_in_cents < MIN_WITHDRAWAL_IN_CENTS {
        return Err(RuleViolation::InvalidAmount);
    }

    if amount_in_cents > balance_in_cents {
        return Err(RuleViolation::InsufficientBalance);
    }

    Ok(())
}

/// Moderation only ever moves a request out of `pending`.
pub fn validate_review(current: ReviewStatus, next: ReviewStatus) -> Result<(), RuleViolation> {
    if next == ReviewStatus::Pending {
        return Err(RuleViolation::InvalidReviewStatus);
    }

    match current {
        ReviewStatus::Pending => Ok(()),
        ReviewStatus::Approved => Err(RuleViolation::AlreadyReviewed("approved")),
        ReviewStatus::Rejected => Err(RuleViolation::AlreadyReviewed("rejected")),
    }
}

pub fn daily_earning_limit(approved_deposits_in_cents: i64) -> i64 {
    approved_deposits_in_cents / DEPOSIT_PAYBACK_DAYS
}

/// Reward actually paid for a task, capped to what is left of today's limit.
pub fn task_reward(
    daily_limit_in_cents: i64,
    earned_today_in_cents: i64,
    reward_in_cents: i64,
) -> Result<i64, RuleViolation> {
    if daily_limit_in_cents <= 0 {
        return Err(RuleViolation::NoApprovedDeposits);
    }

    if earned_today_in_cents >= daily_limit_in_cents {
        return Err(RuleViolation::DailyLimitReached {
            limit: Cents(daily_limit_in_cents),
        });
    }

    Ok(reward_in_cents.min(daily_limit_in_cents - earned_today_in_cents))
}

/// Commission owed to the referrer `level` hops up the chain (0 is the direct
/// referrer). `None` past the last level.
pub fn commission(reward_in_cents: i64, level: usize) -> Option<i64> {
    COMMISSION_RATES_BPS
        .get(level)
        .map(|rate| reward_in_cents * rate / 10_000)
}

pub fn commission_label(level: usize) -> String {
    let rate = COMMISSION_RATES_BPS.get(level).copied().unwrap_or(0);
    format!("{}%", rate / 100)
}

/// Packages are not paid for; a purchase only has to stay covered by the
/// balance together with every other active purchase.
pub fn check_purchase(
    balance_in_cents: i64,
    invested_in_cents: i64,
    price_in_cents: i64,
) -> Result<(), RuleViolation> {
    if balance_in_cents < price_in_cents {
        return Err(RuleViolation::BalanceBelowPrice);
    }

    if invested_in_cents + price_in_cents > balance_in_cents {
        return Err(RuleViolation::FullyInvested {
            balance: Cents(balance_in_cents),
            invested: Cents(invested_in_cents),
        });
    }

    Ok(())
}

/// Purchases to cancel after the balance dropped to `balance_in_cents`.
/// `active` must be ordered newest first; those are dropped first until the
/// remaining investment fits in the balance.
pub fn purchases_to_cancel(balance_in_cents: i64, active: &[(String, i64)]) -> Vec<String> {
    let mut invested: i64 = active.iter().map(|(_, amount)| amount).sum();
    let mut cancelled = Vec::new();

    for (id, amount) in active {
        if invested <= balance_in_cents {
            break;
        }

        invested -= amount;
        cancelled.push(id.clone());
    }

    cancelled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_cents_as_dollars() {
        assert_eq!(Cents(1205).to_string(), "$12.05");
        assert_eq!(Cents(7).to_string(), "$0.07");
        assert_eq!(Cents(-250).to_string(), "-$2.50");
    }

    #[test]
    fn signup_needs_email_and_a_long_enough_password() {
        assert_eq!(
            validate_credentials(" ", "secret1"),
            Err(RuleViolation::MissingCredentials)
        );
        assert_eq!(
            validate_credentials("a@b.co", ""),
            Err(RuleViolation::MissingCredentials)
        );
        assert_eq!(
            validate_credentials("a@b.co", "12345"),
            Err(RuleViolation::PasswordTooShort)
        );
        assert_eq!(validate_credentials("a@b.co", "123456"), Ok(()));
    }

    #[test]
    fn deposit_must_reach_minimum() {
        assert_eq!(
            validate_deposit_amount(2999),
            Err(RuleViolation::DepositBelowMinimum)
        );
        assert!(validate_deposit_amount(3000).is_ok());
        assert_eq!(
            RuleViolation::DepositBelowMinimum.to_string(),
            "Minimum deposit is $30.00"
        );
    }

    #[test]
    fn withdrawal_requires_link_and_funds() {
        assert_eq!(
            validate_withdrawal(500, 1000, None),
            Err(RuleViolation::MissingDepositLink)
        );
        assert_eq!(
            validate_withdrawal(500, 1000, Some("  ")),
            Err(RuleViolation::MissingDepositLink)
        );
        assert_eq!(
            validate_withdrawal(0, 1000, Some("wallet")),
            Err(RuleViolation::InvalidAmount)
        );
        assert_eq!(
            validate_withdrawal(1001, 1000, Some("wallet")),
            Err(RuleViolation::InsufficientBalance)
        );
        assert!(validate_withdrawal(1000, 1000, Some("wallet")).is_ok());
    }

    #[test]
    fn review_only_leaves_pending() {
        assert!(validate_review(ReviewStatus::Pending, ReviewStatus::Approved).is_ok());
        assert!(validate_review(ReviewStatus::Pending, ReviewStatus::Rejected).is_ok());
        assert_eq!(
            validate_review(ReviewStatus::Pending, ReviewStatus::Pending),
            Err(RuleViolation::InvalidReviewStatus)
        );
        assert_eq!(
            validate_review(ReviewStatus::Approved, ReviewStatus::Approved),
            Err(RuleViolation::AlreadyReviewed("approved"))
        );
        assert_eq!(
            validate_review(ReviewStatus::Rejected, ReviewStatus::Approved),
            Err(RuleViolation::AlreadyReviewed("rejected"))
        );
    }

    #[test]
    fn daily_limit_is_a_thirtieth_of_deposits() {
        assert_eq!(daily_earning_limit(0), 0);
        assert_eq!(daily_earning_limit(3000), 100);
        assert_eq!(daily_earning_limit(10_000), 333);
    }

    #[test]
    fn task_reward_is_capped_by_remaining_limit() {
        assert_eq!(task_reward(0, 0, 50), Err(RuleViolation::NoApprovedDeposits));
        assert_eq!(task_reward(100, 0, 50), Ok(50));
        assert_eq!(task_reward(100, 75, 50), Ok(25));
        assert_eq!(
            task_reward(100, 100, 50),
            Err(RuleViolation::DailyLimitReached { limit: Cents(100) })
        );
        assert_eq!(
            RuleViolation::DailyLimitReached { limit: Cents(100) }.to_string(),
            "Daily earning limit reached ($1.00). Come back tomorrow!"
        );
    }

    #[test]
    fn commissions_cover_three_levels() {
        assert_eq!(commission(200, 0), Some(20));
        assert_eq!(commission(200, 1), Some(10));
        assert_eq!(commission(200, 2), Some(4));
        assert_eq!(commission(200, 3), None);
        assert_eq!(commission(5, 2), Some(0));
        assert_eq!(commission_label(0), "10%");
        assert_eq!(commission_label(2), "2%");
    }

    #[test]
    fn purchase_must_stay_within_balance() {
        assert_eq!(
            check_purchase(2000, 0, 3000),
            Err(RuleViolation::BalanceBelowPrice)
        );
        assert!(check_purchase(6000, 3000, 3000).is_ok());
        assert_eq!(
            check_purchase(6000, 6000, 3000),
            Err(RuleViolation::FullyInvested {
                balance: Cents(6000),
                invested: Cents(6000),
            })
        );
        assert_eq!(
            check_purchase(10_000, 8000, 3000).unwrap_err().to_string(),
            "You cannot buy more packages. Your balance ($100.00) is fully invested ($80.00)."
        );
    }

    #[test]
    fn over_invested_purchases_are_cancelled_newest_first() {
        let active = vec![
            ("newest".to_string(), 3000),
            ("middle".to_string(), 5000),
            ("oldest".to_string(), 2000),
        ];

        assert!(purchases_to_cancel(10_000, &active).is_empty());
        assert_eq!(purchases_to_cancel(7000, &active), vec!["newest"]);
        assert_eq!(purchases_to_cancel(6999, &active), vec!["newest", "middle"]);
        assert_eq!(
            purchases_to_cancel(0, &active),
            vec!["newest", "middle", "oldest"]
        );
    }
}
