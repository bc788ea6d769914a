use crate::rules::RuleViolation;

pub mod admin;
pub mod deposits;
pub mod ledger;
pub mod packages;
pub mod referrals;
pub mod tasks;
pub mod users;
pub mod withdrawals;

#[cfg(test)]
mod testing;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Rule(#[from] RuleViolation),
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}
