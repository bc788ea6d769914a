use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::{Reply, RequestHandler, Service, ServiceError};
use crate::models::referrals::{ReferralSummary, Team};
use crate::repositories::referrals::ReferralRepository;

pub enum ReferralRequest {
    GetSummary {
        user_id: String,
        response: Reply<ReferralSummary>,
    },
    GetTeam {
        user_id: String,
        response: Reply<Team>,
    },
}

#[derive(Clone)]
pub struct ReferralRequestHandler {
    repository: ReferralRepository,
}

impl ReferralRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = ReferralRepository::new(sql_conn);

        Self { repository }
    }

    async fn get_summary(&self, user_id: &str) -> Result<ReferralSummary, ServiceError> {
        Ok(self.repository.get_summary(user_id).await?)
    }

    async fn get_team(&self, user_id: &str) -> Result<Team, ServiceError> {
        let today = Utc::now().date_naive();

        Ok(self.repository.get_team(user_id, today).await?)
    }
}

#[async_trait]
impl RequestHandler<ReferralRequest> for ReferralRequestHandler {
    async fn handle_request(&self, request: ReferralRequest) {
        match request {
            ReferralRequest::GetSummary { user_id, response } => {
                let summary = self.get_summary(&user_id).await;
                let _ = response.send(summary);
            }
            ReferralRequest::GetTeam { user_id, response } => {
                let team = self.get_team(&user_id).await;
                let _ = response.send(team);
            }
        }
    }
}

pub struct ReferralService;

impl ReferralService {
    pub fn new() -> Self {
        ReferralService {}
    }
}

#[async_trait]
impl Service<ReferralRequest, ReferralRequestHandler> for ReferralService {}
