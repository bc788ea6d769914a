use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::{Reply, RequestHandler, Service, ServiceError};
use crate::models::packages::{
    ClaimOutcome, DailyEarning, InvestmentPackage, PackagePurchase, PurchaseDetails,
};
use crate::repositories::packages::PackageRepository;

pub enum PackageRequest {
    ListPackages {
        response: Reply<Vec<InvestmentPackage>>,
    },
    Purchase {
        user_id: String,
        package_id: String,
        response: Reply<PackagePurchase>,
    },
    ListPurchases {
        user_id: String,
        response: Reply<Vec<PurchaseDetails>>,
    },
    Claim {
        user_id: String,
        purchase_id: String,
        response: Reply<ClaimOutcome>,
    },
    Cancel {
        user_id: String,
        purchase_id: String,
        response: Reply<String>,
    },
    ListEarnings {
        user_id: String,
        response: Reply<Vec<DailyEarning>>,
    },
}

#[derive(Clone)]
pub struct PackageRequestHandler {
    repository: PackageRepository,
}

impl PackageRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = PackageRepository::new(sql_conn);

        Self { repository }
    }

    async fn list_packages(&self) -> Result<Vec<InvestmentPackage>, ServiceError> {
        Ok(self.repository.get_packages().await?)
    }

    async fn purchase(
        &self,
        user_id: &str,
        package_id: &str,
    ) -> Result<PackagePurchase, ServiceError> {
        let purchase = self
            .repository
            .purchase(user_id, package_id, Utc::now())
            .await?;

        log::info!(
            "User {} bought package {} as purchase {}.",
            user_id,
            package_id,
            purchase.id
        );

        Ok(purchase)
    }

    async fn list_purchases(&self, user_id: &str) -> Result<Vec<PurchaseDetails>, ServiceError> {
        Ok(self.repository.get_purchases(user_id).await?)
    }

    async fn claim(&self, user_id: &str, purchase_id: &str) -> Result<ClaimOutcome, ServiceError> {
        let outcome = self
            .repository
            .claim(user_id, purchase_id, Utc::now())
            .await?;

        log::info!(
            "Purchase {} paid day {} ({} cents).",
            purchase_id,
            outcome.day,
            outcome.earned_in_cents
        );

        Ok(outcome)
    }

    async fn cancel(&self, user_id: &str, purchase_id: &str) -> Result<String, ServiceError> {
        let package_name = self.repository.cancel(user_id, purchase_id).await?;
        log::info!("User {} cancelled purchase {}.", user_id, purchase_id);

        Ok(package_name)
    }

    async fn list_earnings(&self, user_id: &str) -> Result<Vec<DailyEarning>, ServiceError> {
        Ok(self.repository.get_earnings(user_id).await?)
    }
}

#[async_trait]
impl RequestHandler<PackageRequest> for PackageRequestHandler {
    async fn handle_request(&self, request: PackageRequest) {
        match request {
            PackageRequest::ListPackages { response } => {
                let packages = self.list_packages().await;
                let _ = response.send(packages);
            }
            PackageRequest::Purchase {
                user_id,
                package_id,
                response,
            } => {
                let purchase = self.purchase(&user_id, &package_id).await;
                let _ = response.send(purchase);
            }
            PackageRequest::ListPurchases { user_id, response } => {
                let purchases = self.list_purchases(&user_id).await;
                let _ = response.send(purchases);
            }
            PackageRequest::Claim {
                user_id,
                purchase_id,
                response,
            } => {
                let outcome = self.claim(&user_id, &purchase_id).await;
                let _ = response.send(outcome);
            }
            PackageRequest::Cancel {
                user_id,
                purchase_id,
                response,
            } => {
                let package_name = self.cancel(&user_id, &purchase_id).await;
                let _ = response.send(package_name);
            }
            PackageRequest::ListEarnings { user_id, response } => {
                let earnings = self.list_earnings(&user_id).await;
                let _ = response.send(earnings);
            }
        }
    }
}

pub struct PackageService;

impl PackageService {
    pub fn new() -> Self {
        PackageService {}
    }
}

#[async_trait]
impl Service<PackageRequest, PackageRequestHandler> for PackageService {}
