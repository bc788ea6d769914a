use async_trait::async_trait;
use sqlx::PgPool;

use super::{Reply, RequestHandler, Service, ServiceError};
use crate::models::deposits::{Deposit, DepositReview, DepositReviewOutcome, NewDeposit};
use crate::repositories::deposits::DepositRepository;

pub enum DepositRequest {
    CreateDeposit {
        user_id: String,
        deposit: NewDeposit,
        response: Reply<Deposit>,
    },
    ListDeposits {
        user_id: String,
        response: Reply<Vec<Deposit>>,
    },
    ReviewDeposit {
        review: DepositReview,
        response: Reply<DepositReviewOutcome>,
    },
}

#[derive(Clone)]
pub struct DepositRequestHandler {
    repository: DepositRepository,
}

impl DepositRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = DepositRepository::new(sql_conn);

        Self { repository }
    }

    async fn create_deposit(
        &self,
        user_id: &str,
        deposit: NewDeposit,
    ) -> Result<Deposit, ServiceError> {
        let transaction_id = deposit.transaction_id.as_deref().map(str::trim);
        let screenshot = deposit.screenshot.as_deref().map(str::trim);

        let (Some(amount_in_cents), Some(transaction_id), Some(screenshot)) =
            (deposit.amount_in_cents, transaction_id, screenshot)
        else {
            return Err(ServiceError::BadRequest("All fields are required".into()));
        };
        if transaction_id.is_empty() || screenshot.is_empty() {
            return Err(ServiceError::BadRequest("All fields are required".into()));
        }

        let deposit = self
            .repository
            .new_deposit(user_id, amount_in_cents, transaction_id, screenshot)
            .await?;

        log::info!(
            "Deposit {} of {} cents submitted by {}.",
            deposit.id,
            deposit.amount_in_cents,
            user_id
        );

        Ok(deposit)
    }

    async fn list_deposits(&self, user_id: &str) -> Result<Vec<Deposit>, ServiceError> {
        Ok(self.repository.get_deposits(user_id).await?)
    }

    async fn review_deposit(
        &self,
        review: DepositReview,
    ) -> Result<DepositReviewOutcome, ServiceError> {
        let outcome = self
            .repository
            .review_deposit(&review.deposit_id, review.status)
            .await?;

        log::info!("Deposit {} {:?}.", review.deposit_id, review.status);
        if let Some(referrer) = &outcome.referral_bonus_paid_to {
            log::info!(
                "Referral bonus paid to {} for user {}.",
                referrer,
                outcome.deposit.user_id
            );
        }

        Ok(outcome)
    }
}

#[async_trait]
impl RequestHandler<DepositRequest> for DepositRequestHandler {
    async fn handle_request(&self, request: DepositRequest) {
        match request {
            DepositRequest::CreateDeposit {
                user_id,
                deposit,
                response,
            } => {
                let deposit = self.create_deposit(&user_id, deposit).await;
                let _ = response.send(deposit);
            }
            DepositRequest::ListDeposits { user_id, response } => {
                let deposits = self.list_deposits(&user_id).await;
                let _ = response.send(deposits);
            }
            DepositRequest::ReviewDeposit { review, response } => {
                let outcome = self.review_deposit(review).await;
                let _ = response.send(outcome);
            }
        }
    }
}

pub struct DepositService;

impl DepositService {
    pub fn new() -> Self {
        DepositService {}
    }
}

#[async_trait]
impl Service<DepositRequest, DepositRequestHandler> for DepositService {}
