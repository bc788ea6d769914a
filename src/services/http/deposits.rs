use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use super::{auth::CurrentUser, AppState};
use crate::models::deposits::NewDeposit;
use crate::services::{call, deposits::DepositRequest, ServiceError};

pub async fn create_deposit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<NewDeposit>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(deposit) = payload?;

    let deposit = call("Deposits", &state.deposit_channel, |response| {
        DepositRequest::CreateDeposit {
            user_id: user.id,
            deposit,
            response,
        }
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Deposit submitted successfully. Awaiting admin approval.",
            "deposit": deposit,
        })),
    ))
}

pub async fn list_deposits(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ServiceError> {
    let deposits = call("Deposits", &state.deposit_channel, |response| {
        DepositRequest::ListDeposits {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(json!({ "deposits": deposits })))
}
