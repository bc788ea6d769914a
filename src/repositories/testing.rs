//! Fixtures for the `#[sqlx::test]` repository tests.

use sqlx::PgPool;

use super::deposits::DepositRepository;
use super::users::UserRepository;
use crate::models::users::User;
use crate::models::ReviewStatus;

pub const SCREENSHOT: &str = "data:image/png;base64,AAAA";

pub async fn new_user(pool: &PgPool, email: &str, referral_code: Option<&str>) -> User {
    UserRepository::new(pool.clone())
        .insert_user(email, "$argon2id$unused", "Tester", referral_code)
        .await
        .unwrap()
}

/// Credits the user through an approved deposit, as an admin would.
pub async fn fund(pool: &PgPool, user_id: &str, amount_in_cents: i64) {
    let deposits = DepositRepository::new(pool.clone());
    let deposit = deposits
        .new_deposit(user_id, amount_in_cents, "TX-FUND", SCREENSHOT)
        .await
        .unwrap();

    deposits
        .review_deposit(&deposit.id, ReviewStatus::Approved)
        .await
        .unwrap();
}

pub async fn set_deposit_link(pool: &PgPool, user_id: &str) {
    UserRepository::new(pool.clone())
        .update_profile(user_id, None, Some("https://pay.example.com/tester"), false)
        .await
        .unwrap();
}

pub async fn balance(pool: &PgPool, user_id: &str) -> i64 {
    sqlx::query_scalar("SELECT balance_in_cents FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn ledger_total(pool: &PgPool, user_id: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount_in_cents), 0)::BIGINT FROM ledger_entries WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .unwrap()
}
