use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal::{self, ctrl_c};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use super::{
    admin::AdminRequest, deposits::DepositRequest, packages::PackageRequest,
    referrals::ReferralRequest, tasks::TaskRequest, users::UserRequest,
    withdrawals::WithdrawalRequest, ServiceError,
};

mod admin;
mod auth;
mod deposits;
mod packages;
mod referrals;
mod tasks;
mod users;
mod withdrawals;

#[derive(Clone)]
pub struct AppState {
    pub user_channel: mpsc::Sender<UserRequest>,
    pub deposit_channel: mpsc::Sender<DepositRequest>,
    pub withdrawal_channel: mpsc::Sender<WithdrawalRequest>,
    pub task_channel: mpsc::Sender<TaskRequest>,
    pub package_channel: mpsc::Sender<PackageRequest>,
    pub referral_channel: mpsc::Sender<ReferralRequest>,
    pub admin_channel: mpsc::Sender<AdminRequest>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServiceError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ServiceError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ServiceError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            error => {
                log::error!("Request failed: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::BadRequest(rejection.body_text())
    }
}

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let package_routes = Router::new()
        .route("/", get(packages::list_packages))
        .route("/purchase", post(packages::purchase))
        .route("/my-purchases", get(packages::my_purchases))
        .route("/claim", post(packages::claim))
        .route("/cancel", post(packages::cancel))
        .route("/earnings", get(packages::earnings));

    let admin_routes = Router::new()
        .route("/stats", get(admin::stats))
        .route(
            "/deposits",
            get(admin::list_deposits).put(admin::review_deposit),
        )
        .route(
            "/withdrawals",
            get(admin::list_withdrawals).put(admin::review_withdrawal),
        )
        .route("/users", get(admin::list_users).put(admin::update_user))
        .route("/users/{user_id}/ledger", get(admin::user_ledger));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .route("/user/update", put(users::update_profile))
        .route(
            "/deposits",
            get(deposits::list_deposits).post(deposits::create_deposit),
        )
        .route(
            "/withdrawals",
            get(withdrawals::list_withdrawals).post(withdrawals::request_withdrawal),
        )
        .route("/tasks", get(tasks::list_tasks))
        .route("/tasks/history", get(tasks::task_history))
        .route("/tasks/complete", post(tasks::complete_task))
        .nest("/packages", package_routes)
        .route("/referral", get(referrals::summary))
        .route("/referral/team", get(referrals::team))
        .nest("/admin", admin_routes);

    Router::new()
        .nest("/api", api)
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(state: AppState, listen: &str) -> Result<(), anyhow::Error> {
    let app = router(state);

    let listener = TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("HTTP server stopped.");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }

        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests;
