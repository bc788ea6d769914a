use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use super::AppState;
use crate::models::users::{
    Credentials, LoginSession, NewUser, OtpVerification, PasswordReset, PasswordResetRequest,
    Profile, SessionUser,
};
use crate::services::{call, users::UserRequest, ServiceError};

pub const SESSION_COOKIE: &str = "token";

/// Bearer token first, then the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
        .filter(|token| !token.is_empty())
}

fn session_cookie(session: &LoginSession) -> String {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);

    format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, session.token, max_age
    )
}

/// The signed-in caller.
pub struct CurrentUser(pub SessionUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| ServiceError::Unauthorized("Unauthorized".into()))?;

        let user = call("Users", &state.user_channel, |response| {
            UserRequest::ResolveSession { token, response }
        })
        .await?;

        Ok(CurrentUser(user))
    }
}

/// The signed-in caller, who must be an admin.
pub struct AdminUser(pub SessionUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if !user.is_admin {
            return Err(ServiceError::Unauthorized("Unauthorized".into()));
        }

        Ok(AdminUser(user))
    }
}

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(new_user) = payload?;

    let user_id = call("Users", &state.user_channel, |response| UserRequest::Signup {
        new_user,
        response,
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Signup successful. Please check your email for the OTP.",
            "user_id": user_id,
        })),
    ))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<OtpVerification>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(verification) = payload?;

    call("Users", &state.user_channel, |response| {
        UserRequest::VerifyOtp {
            verification,
            response,
        }
    })
    .await?;

    Ok(Json(json!({ "message": "Email verified successfully" })))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<PasswordResetRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(request) = payload?;

    call("Users", &state.user_channel, |response| {
        UserRequest::ForgotPassword {
            email: request.email,
            response,
        }
    })
    .await?;

    Ok(Json(json!({ "message": "OTP sent to your email" })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<PasswordReset>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(reset) = payload?;

    call("Users", &state.user_channel, |response| {
        UserRequest::ResetPassword { reset, response }
    })
    .await?;

    Ok(Json(json!({ "message": "Password reset successfully" })))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(credentials) = payload?;

    let session = call("Users", &state.user_channel, |response| UserRequest::Login {
        credentials,
        response,
    })
    .await?;

    Ok(([(header::SET_COOKIE, session_cookie(&session))], Json(session)))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(token) = session_token(&headers) {
        call("Users", &state.user_channel, |response| UserRequest::Logout {
            token,
            response,
        })
        .await?;
    }

    let cleared = format!(
        "{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    );

    Ok((
        [(header::SET_COOKIE, cleared)],
        Json(json!({ "message": "Logged out" })),
    ))
}

pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Profile>, ServiceError> {
    let profile = call("Users", &state.user_channel, |response| {
        UserRequest::GetProfile {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_token_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=def"));

        assert_eq!(session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn token_is_read_from_cookie_list() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=def; lang=en"),
        );

        assert_eq!(session_token(&headers).as_deref(), Some("def"));
    }

    #[test]
    fn empty_or_missing_tokens_are_ignored() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        assert_eq!(session_token(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("mytoken=abc"));
        assert_eq!(session_token(&headers), None);
    }
}
