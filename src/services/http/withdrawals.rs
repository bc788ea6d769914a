use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use super::{auth::CurrentUser, AppState};
use crate::models::withdrawals::NewWithdrawal;
use crate::services::{call, withdrawals::WithdrawalRequest, ServiceError};

pub async fn request_withdrawal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<NewWithdrawal>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(withdrawal) = payload?;

    let withdrawal = call("Withdrawals", &state.withdrawal_channel, |response| {
        WithdrawalRequest::RequestWithdrawal {
            user_id: user.id,
            withdrawal,
            response,
        }
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Withdrawal request submitted. Awaiting admin approval.",
            "withdrawal": withdrawal,
        })),
    ))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ServiceError> {
    let withdrawals = call("Withdrawals", &state.withdrawal_channel, |response| {
        WithdrawalRequest::ListWithdrawals {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(json!({ "withdrawals": withdrawals })))
}
