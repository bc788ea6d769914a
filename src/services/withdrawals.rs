use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc;

use super::users::UserRequest;
use super::{call, Reply, RequestHandler, Service, ServiceError};
use crate::models::withdrawals::{
    NewWithdrawal, Withdrawal, WithdrawalReview, WithdrawalReviewOutcome,
};
use crate::repositories::withdrawals::WithdrawalRepository;

pub enum WithdrawalRequest {
    RequestWithdrawal {
        user_id: String,
        withdrawal: NewWithdrawal,
        response: Reply<Withdrawal>,
    },
    ListWithdrawals {
        user_id: String,
        response: Reply<Vec<Withdrawal>>,
    },
    ReviewWithdrawal {
        review: WithdrawalReview,
        response: Reply<WithdrawalReviewOutcome>,
    },
}

#[derive(Clone)]
pub struct WithdrawalRequestHandler {
    repository: WithdrawalRepository,
    user_channel: mpsc::Sender<UserRequest>,
}

impl WithdrawalRequestHandler {
    pub fn new(sql_conn: PgPool, user_channel: mpsc::Sender<UserRequest>) -> Self {
        let repository = WithdrawalRepository::new(sql_conn);

        Self {
            repository,
            user_channel,
        }
    }

    async fn request_withdrawal(
        &self,
        user_id: String,
        withdrawal: NewWithdrawal,
    ) -> Result<Withdrawal, ServiceError> {
        call("Users", &self.user_channel, |response| {
            UserRequest::CheckPassword {
                user_id: user_id.clone(),
                password: withdrawal.password,
                response,
            }
        })
        .await?;

        let withdrawal = self
            .repository
            .new_withdrawal(&user_id, withdrawal.amount_in_cents)
            .await?;

        log::info!(
            "Withdrawal {} of {} cents requested by {}.",
            withdrawal.id,
            withdrawal.amount_in_cents,
            user_id
        );

        Ok(withdrawal)
    }

    async fn list_withdrawals(&self, user_id: &str) -> Result<Vec<Withdrawal>, ServiceError> {
        Ok(self.repository.get_withdrawals(user_id).await?)
    }

    async fn review_withdrawal(
        &self,
        review: WithdrawalReview,
    ) -> Result<WithdrawalReviewOutcome, ServiceError> {
        let outcome = self
            .repository
            .review_withdrawal(&review.withdrawal_id, review.status)
            .await?;

        log::info!("Withdrawal {} {:?}.", review.withdrawal_id, review.status);
        if !outcome.cancelled_purchases.is_empty() {
            log::info!(
                "Cancelled purchases {:?} of user {} after withdrawal.",
                outcome.cancelled_purchases,
                outcome.withdrawal.user_id
            );
        }

        Ok(outcome)
    }
}

#[async_trait]
impl RequestHandler<WithdrawalRequest> for WithdrawalRequestHandler {
    async fn handle_request(&self, request: WithdrawalRequest) {
        match request {
            WithdrawalRequest::RequestWithdrawal {
                user_id,
                withdrawal,
                response,
            } => {
                let withdrawal = self.request_withdrawal(user_id, withdrawal).await;
                let _ = response.send(withdrawal);
            }
            WithdrawalRequest::ListWithdrawals { user_id, response } => {
                let withdrawals = self.list_withdrawals(&user_id).await;
                let _ = response.send(withdrawals);
            }
            WithdrawalRequest::ReviewWithdrawal { review, response } => {
                let outcome = self.review_withdrawal(review).await;
                let _ = response.send(outcome);
            }
        }
    }
}

pub struct WithdrawalService;

impl WithdrawalService {
    pub fn new() -> Self {
        WithdrawalService {}
    }
}

#[async_trait]
impl Service<WithdrawalRequest, WithdrawalRequestHandler> for WithdrawalService {}
