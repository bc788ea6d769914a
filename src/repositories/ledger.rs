//! Every balance mutation goes through here so that the balance column always
//! equals the sum of the user's ledger entries. Callers pass the connection of
//! an open transaction.

use sqlx::{PgConnection, PgPool};

use super::RepositoryError;
use crate::models::ledger::{LedgerEntry, LedgerKind};
use crate::rules::RuleViolation;
use crate::utils::new_id;

async fn record(
    conn: &mut PgConnection,
    user_id: &str,
    amount_in_cents: i64,
    kind: LedgerKind,
    reference_id: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO ledger_entries (id, user_id, amount_in_cents, kind, reference_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(new_id())
    .bind(user_id)
    .bind(amount_in_cents)
    .bind(kind)
    .bind(reference_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Locks the user row and returns its balance. Transactions that touch a
/// user's purchases take this lock first.
pub async fn lock_balance(conn: &mut PgConnection, user_id: &str) -> Result<i64, RepositoryError> {
    let balance: Option<i64> =
        sqlx::query_scalar("SELECT balance_in_cents FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

    balance.ok_or_else(|| RepositoryError::NotFound("User not found".into()))
}

/// Adds `amount_in_cents` to the balance and returns the new balance.
pub async fn credit(
    conn: &mut PgConnection,
    user_id: &str,
    amount_in_cents: i64,
    kind: LedgerKind,
    reference_id: Option<&str>,
) -> Result<i64, RepositoryError> {
    let balance: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE users
        SET balance_in_cents = balance_in_cents + $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2
        RETURNING balance_in_cents
        "#,
    )
    .bind(amount_in_cents)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    let balance = balance.ok_or_else(|| RepositoryError::NotFound("User not found".into()))?;
    record(conn, user_id, amount_in_cents, kind, reference_id).await?;

    Ok(balance)
}

/// Subtracts `amount_in_cents` only if the balance covers it.
pub async fn debit(
    conn: &mut PgConnection,
    user_id: &str,
    amount_in_cents: i64,
    kind: LedgerKind,
    reference_id: Option<&str>,
) -> Result<i64, RepositoryError> {
    let balance: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE users
        SET balance_in_cents = balance_in_cents - $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND balance_in_cents >= $1
        RETURNING balance_in_cents
        "#,
    )
    .bind(amount_in_cents)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    let balance = balance.ok_or(RuleViolation::InsufficientBalance)?;
    record(conn, user_id, -amount_in_cents, kind, reference_id).await?;

    Ok(balance)
}

/// Sets the balance to `balance_in_cents`, booking the difference as an
/// adjustment.
pub async fn adjust_to(
    conn: &mut PgConnection,
    user_id: &str,
    balance_in_cents: i64,
) -> Result<i64, RepositoryError> {
    if balance_in_cents < 0 {
        return Err(RuleViolation::NegativeBalance.into());
    }

    let current = lock_balance(conn, user_id).await?;
    let delta = balance_in_cents - current;

    if delta == 0 {
        return Ok(current);
    }

    sqlx::query(
        "UPDATE users SET balance_in_cents = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
    )
    .bind(balance_in_cents)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    record(conn, user_id, delta, LedgerKind::Adjustment, None).await?;

    Ok(balance_in_cents)
}

pub async fn entries_for_user(
    conn: &PgPool,
    user_id: &str,
) -> Result<Vec<LedgerEntry>, RepositoryError> {
    let entries = sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM ledger_entries WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;

    Ok(entries)
}
