use async_trait::async_trait;
use sqlx::PgPool;

use super::{Reply, RequestHandler, Service, ServiceError};
use crate::models::admin::{DepositOverview, Stats, UserOverview, UserUpdate, WithdrawalOverview};
use crate::models::ledger::LedgerEntry;
use crate::models::users::User;
use crate::repositories::admin::AdminRepository;

/// Read models and user edits for the admin panel. Reviews go through the
/// deposit and withdrawal services.
pub enum AdminRequest {
    GetStats {
        response: Reply<Stats>,
    },
    ListDeposits {
        response: Reply<Vec<DepositOverview>>,
    },
    ListWithdrawals {
        response: Reply<Vec<WithdrawalOverview>>,
    },
    ListUsers {
        response: Reply<Vec<UserOverview>>,
    },
    UpdateUser {
        update: UserUpdate,
        response: Reply<User>,
    },
    GetLedger {
        user_id: String,
        response: Reply<Vec<LedgerEntry>>,
    },
}

#[derive(Clone)]
pub struct AdminRequestHandler {
    repository: AdminRepository,
}

impl AdminRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = AdminRepository::new(sql_conn);

        Self { repository }
    }

    async fn update_user(&self, update: UserUpdate) -> Result<User, ServiceError> {
        let user = self.repository.update_user(&update).await?;

        log::info!(
            "Admin updated user {} (balance override: {:?}).",
            user.id,
            update.balance_in_cents
        );

        Ok(user)
    }
}

#[async_trait]
impl RequestHandler<AdminRequest> for AdminRequestHandler {
    async fn handle_request(&self, request: AdminRequest) {
        match request {
            AdminRequest::GetStats { response } => {
                let stats = self.repository.get_stats().await.map_err(ServiceError::from);
                let _ = response.send(stats);
            }
            AdminRequest::ListDeposits { response } => {
                let deposits = self.repository.get_deposits().await.map_err(ServiceError::from);
                let _ = response.send(deposits);
            }
            AdminRequest::ListWithdrawals { response } => {
                let withdrawals = self
                    .repository
                    .get_withdrawals()
                    .await
                    .map_err(ServiceError::from);
                let _ = response.send(withdrawals);
            }
            AdminRequest::ListUsers { response } => {
                let users = self.repository.get_users().await.map_err(ServiceError::from);
                let _ = response.send(users);
            }
            AdminRequest::UpdateUser { update, response } => {
                let user = self.update_user(update).await;
                let _ = response.send(user);
            }
            AdminRequest::GetLedger { user_id, response } => {
                let entries = self
                    .repository
                    .get_ledger(&user_id)
                    .await
                    .map_err(ServiceError::from);
                let _ = response.send(entries);
            }
        }
    }
}

pub struct AdminService;

impl AdminService {
    pub fn new() -> Self {
        AdminService {}
    }
}

#[async_trait]
impl Service<AdminRequest, AdminRequestHandler> for AdminService {}
