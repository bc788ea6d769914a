use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use super::{auth::CurrentUser, AppState};
use crate::models::users::{Profile, ProfileUpdate};
use crate::services::{call, users::UserRequest, ServiceError};

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<Profile>, ServiceError> {
    let Json(update) = payload?;

    let profile = call("Users", &state.user_channel, |response| {
        UserRequest::UpdateProfile {
            user,
            update,
            response,
        }
    })
    .await?;

    Ok(Json(profile))
}
