use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::{mpsc, oneshot};

use crate::repositories::RepositoryError;
use crate::rules::RuleViolation;
use crate::settings::Settings;

pub mod admin;
pub mod deposits;
pub mod http;
pub mod packages;
pub mod referrals;
pub mod tasks;
pub mod users;
pub mod withdrawals;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

impl From<RepositoryError> for ServiceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Rule(rule) => ServiceError::BadRequest(rule.to_string()),
            RepositoryError::Rejected(message) => ServiceError::BadRequest(message),
            RepositoryError::NotFound(message) => ServiceError::NotFound(message),
            RepositoryError::Forbidden(message) => ServiceError::Unauthorized(message),
            RepositoryError::Database(e) => ServiceError::Database(e.to_string()),
        }
    }
}

impl From<RuleViolation> for ServiceError {
    fn from(rule: RuleViolation) -> Self {
        ServiceError::BadRequest(rule.to_string())
    }
}

pub type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Sends a request built around a fresh reply channel and waits for the
/// answer.
pub async fn call<R, T>(
    service: &'static str,
    channel: &mpsc::Sender<R>,
    request: impl FnOnce(Reply<T>) -> R,
) -> Result<T, ServiceError> {
    let (reply_tx, reply_rx) = oneshot::channel();

    channel
        .send(request(reply_tx))
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    reply_rx
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?
}

fn spawn_service<T, H, S>(mut service: S, handler: H, mut receiver: mpsc::Receiver<T>)
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
    S: Service<T, H>,
{
    tokio::spawn(async move {
        service.run(handler, &mut receiver).await;
    });
}

/// Creates the admin user and the task and package catalogs when missing.
pub async fn seed(pool: &PgPool, settings: &Settings) -> Result<(), anyhow::Error> {
    let users = crate::repositories::users::UserRepository::new(pool.clone());
    let password_hash = crate::utils::hash_password(&settings.seed.admin_password)
        .map_err(|e| anyhow::anyhow!("Could not hash admin password: {}", e))?;
    let email = crate::utils::normalize_email(&settings.seed.admin_email);
    if users.seed_admin(&email, &password_hash).await? {
        log::info!("Admin user {} created.", email);
    }

    let tasks = crate::repositories::tasks::TaskRepository::new(pool.clone())
        .seed_tasks()
        .await?;
    let packages = crate::repositories::packages::PackageRepository::new(pool.clone())
        .seed_packages()
        .await?;
    log::info!("Seeded {} tasks and {} packages.", tasks, packages);

    Ok(())
}

pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let (user_tx, user_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (deposit_tx, deposit_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (withdrawal_tx, withdrawal_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (task_tx, task_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (package_tx, package_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (referral_tx, referral_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (admin_tx, admin_rx) = mpsc::channel(CHANNEL_CAPACITY);

    log::info!("Starting user service.");
    let user_handler = users::UserRequestHandler::new(pool.clone(), settings.auth.clone());
    user_handler.start_cleanup_task().await;
    spawn_service(users::UserService::new(), user_handler, user_rx);

    log::info!("Starting deposit service.");
    spawn_service(
        deposits::DepositService::new(),
        deposits::DepositRequestHandler::new(pool.clone()),
        deposit_rx,
    );

    log::info!("Starting withdrawal service.");
    spawn_service(
        withdrawals::WithdrawalService::new(),
        withdrawals::WithdrawalRequestHandler::new(pool.clone(), user_tx.clone()),
        withdrawal_rx,
    );

    log::info!("Starting task service.");
    spawn_service(
        tasks::TaskService::new(),
        tasks::TaskRequestHandler::new(pool.clone()),
        task_rx,
    );

    log::info!("Starting package service.");
    spawn_service(
        packages::PackageService::new(),
        packages::PackageRequestHandler::new(pool.clone()),
        package_rx,
    );

    log::info!("Starting referral service.");
    spawn_service(
        referrals::ReferralService::new(),
        referrals::ReferralRequestHandler::new(pool.clone()),
        referral_rx,
    );

    log::info!("Starting admin service.");
    spawn_service(
        admin::AdminService::new(),
        admin::AdminRequestHandler::new(pool.clone()),
        admin_rx,
    );

    let state = http::AppState {
        user_channel: user_tx,
        deposit_channel: deposit_tx,
        withdrawal_channel: withdrawal_tx,
        task_channel: task_tx,
        package_channel: package_tx,
        referral_channel: referral_tx,
        admin_channel: admin_tx,
    };

    log::info!("Starting HTTP server.");
    http::start_http_server(state, &settings.http.listen).await
}
