use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use serde_json::{json, Value};

use super::{auth::AdminUser, AppState};
use crate::models::admin::{Stats, UserUpdate};
use crate::models::deposits::{DepositReview, DepositReviewOutcome};
use crate::models::users::User;
use crate::models::withdrawals::{WithdrawalReview, WithdrawalReviewOutcome};
use crate::services::{
    admin::AdminRequest, call, deposits::DepositRequest, withdrawals::WithdrawalRequest,
    ServiceError,
};

pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Stats>, ServiceError> {
    let stats = call("Admin", &state.admin_channel, |response| {
        AdminRequest::GetStats { response }
    })
    .await?;

    Ok(Json(stats))
}

pub async fn list_deposits(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Value>, ServiceError> {
    let deposits = call("Admin", &state.admin_channel, |response| {
        AdminRequest::ListDeposits { response }
    })
    .await?;

    Ok(Json(json!({ "deposits": deposits })))
}

pub async fn review_deposit(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<DepositReview>, JsonRejection>,
) -> Result<Json<DepositReviewOutcome>, ServiceError> {
    let Json(review) = payload?;
    log::info!("Admin {} reviewing deposit {}.", admin.id, review.deposit_id);

    let outcome = call("Deposits", &state.deposit_channel, |response| {
        DepositRequest::ReviewDeposit { review, response }
    })
    .await?;

    Ok(Json(outcome))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Value>, ServiceError> {
    let withdrawals = call("Admin", &state.admin_channel, |response| {
        AdminRequest::ListWithdrawals { response }
    })
    .await?;

    Ok(Json(json!({ "withdrawals": withdrawals })))
}

pub async fn review_withdrawal(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<WithdrawalReview>, JsonRejection>,
) -> Result<Json<WithdrawalReviewOutcome>, ServiceError> {
    let Json(review) = payload?;
    log::info!(
        "Admin {} reviewing withdrawal {}.",
        admin.id,
        review.withdrawal_id
    );

    let outcome = call("Withdrawals", &state.withdrawal_channel, |response| {
        WithdrawalRequest::ReviewWithdrawal { review, response }
    })
    .await?;

    Ok(Json(outcome))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Value>, ServiceError> {
    let users = call("Admin", &state.admin_channel, |response| {
        AdminRequest::ListUsers { response }
    })
    .await?;

    Ok(Json(json!({ "users": users })))
}

pub async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    payload: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<User>, ServiceError> {
    let Json(update) = payload?;

    let user = call("Admin", &state.admin_channel, |response| {
        AdminRequest::UpdateUser { update, response }
    })
    .await?;

    Ok(Json(user))
}

pub async fn user_ledger(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    let entries = call("Admin", &state.admin_channel, |response| {
        AdminRequest::GetLedger { user_id, response }
    })
    .await?;

    Ok(Json(json!({ "entries": entries })))
}
