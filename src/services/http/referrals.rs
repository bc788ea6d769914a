use axum::{extract::State, Json};

use super::{auth::CurrentUser, AppState};
use crate::models::referrals::{ReferralSummary, Team};
use crate::services::{call, referrals::ReferralRequest, ServiceError};

pub async fn summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ReferralSummary>, ServiceError> {
    let summary = call("Referrals", &state.referral_channel, |response| {
        ReferralRequest::GetSummary {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(summary))
}

pub async fn team(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Team>, ServiceError> {
    let team = call("Referrals", &state.referral_channel, |response| {
        ReferralRequest::GetTeam {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(team))
}
