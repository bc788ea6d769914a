use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub balance_in_cents: i64,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub deposit_link: Option<String>,
    pub is_verified: bool,
    pub is_admin: bool,
    pub referral_bonus_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub referral_code: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OtpVerification {
    pub email: String,
    pub code: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PasswordReset {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub deposit_link: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "otp_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OtpKind {
    Signup,
    Reset,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Otp {
    pub id: String,
    pub email: String,
    pub code: String,
    pub kind: OtpKind,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// The caller behind a session token.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct SessionUser {
    pub id: String,
    pub is_admin: bool,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub is_admin: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Profile,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub balance_in_cents: i64,
    pub referral_code: String,
    pub deposit_link: Option<String>,
    pub is_verified: bool,
    pub is_admin: bool,
    pub total_invested_in_cents: i64,
    pub created_at: DateTime<Utc>,
}
