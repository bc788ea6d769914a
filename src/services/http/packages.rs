use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use super::{auth::CurrentUser, AppState};
use crate::models::packages::{ClaimOutcome, PurchaseAction, PurchaseRequest};
use crate::services::{call, packages::PackageRequest, ServiceError};

fn required_purchase_id(action: PurchaseAction) -> Result<String, ServiceError> {
    action
        .purchase_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ServiceError::BadRequest("Purchase ID is required".into()))
}

pub async fn list_packages(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Value>, ServiceError> {
    let packages = call("Packages", &state.package_channel, |response| {
        PackageRequest::ListPackages { response }
    })
    .await?;

    Ok(Json(json!({ "packages": packages })))
}

pub async fn purchase(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(request) = payload?;

    let purchase = call("Packages", &state.package_channel, |response| {
        PackageRequest::Purchase {
            user_id: user.id,
            package_id: request.package_id,
            response,
        }
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Package purchased successfully",
            "purchase": purchase,
        })),
    ))
}

pub async fn my_purchases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ServiceError> {
    let purchases = call("Packages", &state.package_channel, |response| {
        PackageRequest::ListPurchases {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(json!({ "purchases": purchases })))
}

pub async fn claim(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<PurchaseAction>, JsonRejection>,
) -> Result<Json<ClaimOutcome>, ServiceError> {
    let Json(action) = payload?;
    let purchase_id = required_purchase_id(action)?;

    let outcome = call("Packages", &state.package_channel, |response| {
        PackageRequest::Claim {
            user_id: user.id,
            purchase_id,
            response,
        }
    })
    .await?;

    Ok(Json(outcome))
}

pub async fn cancel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<PurchaseAction>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(action) = payload?;
    let purchase_id = required_purchase_id(action)?;

    let package_name = call("Packages", &state.package_channel, |response| {
        PackageRequest::Cancel {
            user_id: user.id,
            purchase_id,
            response,
        }
    })
    .await?;

    Ok(Json(json!({
        "message": format!("{} package cancelled successfully", package_name),
    })))
}

pub async fn earnings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ServiceError> {
    let earnings = call("Packages", &state.package_channel, |response| {
        PackageRequest::ListEarnings {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(json!({ "earnings": earnings })))
}
