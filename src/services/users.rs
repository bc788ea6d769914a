use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use sqlx::PgPool;

use super::{Reply, RequestHandler, Service, ServiceError};
use crate::models::users::{
    Credentials, LoginSession, NewUser, OtpKind, OtpVerification, PasswordReset, Profile,
    ProfileUpdate, Session, SessionUser,
};
use crate::repositories::users::UserRepository;
use crate::rules;
use crate::settings::Auth;
use crate::utils::{
    generate_otp, generate_session_token, hash_password, normalize_email, verify_password,
};

const CLEANUP_INTERVAL_SECS: u64 = 600;

pub enum UserRequest {
    Signup {
        new_user: NewUser,
        response: Reply<String>,
    },
    VerifyOtp {
        verification: OtpVerification,
        response: Reply<()>,
    },
    ForgotPassword {
        email: String,
        response: Reply<()>,
    },
    ResetPassword {
        reset: PasswordReset,
        response: Reply<()>,
    },
    Login {
        credentials: Credentials,
        response: Reply<LoginSession>,
    },
    Logout {
        token: String,
        response: Reply<()>,
    },
    ResolveSession {
        token: String,
        response: Reply<SessionUser>,
    },
    GetProfile {
        user_id: String,
        response: Reply<Profile>,
    },
    UpdateProfile {
        user: SessionUser,
        update: ProfileUpdate,
        response: Reply<Profile>,
    },
    CheckPassword {
        user_id: String,
        password: String,
        response: Reply<()>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: UserRepository,
    sessions: Arc<DashMap<String, Session>>,
    auth: Auth,
}

impl UserRequestHandler {
    pub fn new(sql_conn: PgPool, auth: Auth) -> Self {
        let repository = UserRepository::new(sql_conn);

        UserRequestHandler {
            repository,
            sessions: Arc::new(DashMap::new()),
            auth,
        }
    }

    /// Periodically drops expired sessions and codes, both from the cache and
    /// from the database.
    pub async fn start_cleanup_task(&self) {
        let handler = self.clone();

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));

            loop {
                interval.tick().await;

                let now = Utc::now();
                handler.sessions.retain(|_, session| session.expires_at > now);

                match handler.repository.delete_expired(now).await {
                    Ok(0) => {}
                    Ok(removed) => log::info!("Removed {} expired sessions and codes.", removed),
                    Err(e) => log::error!("Error removing expired sessions: {}", e),
                }
            }
        });

        log::info!("Session cleanup task started");
    }

    async fn hash(&self, password: String) -> Result<String, ServiceError> {
        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?
            .map_err(|e| ServiceError::Internal(format!("Could not hash password: {}", e)))
    }

    async fn password_matches(&self, password: String, hash: String) -> Result<bool, ServiceError> {
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }

    async fn send_otp(&self, email: &str, kind: OtpKind) -> Result<(), ServiceError> {
        let code = generate_otp();
        let expires_at = Utc::now() + Duration::minutes(self.auth.otp_ttl_minutes);

        self.repository
            .insert_otp(email, &code, kind, expires_at)
            .await?;

        log::info!("{:?} code for {}: {}", kind, email, code);

        Ok(())
    }

    async fn signup(&self, new_user: NewUser) -> Result<String, ServiceError> {
        let email = normalize_email(&new_user.email);
        rules::validate_credentials(&email, &new_user.password)?;

        let name = match new_user.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => email.split('@').next().unwrap_or_default().to_string(),
        };

        let password_hash = self.hash(new_user.password).await?;
        let user = self
            .repository
            .insert_user(&email, &password_hash, &name, new_user.referral_code.as_deref())
            .await?;

        log::info!(
            "User {} signed up (referred by {:?}).",
            user.id,
            user.referred_by
        );

        self.send_otp(&email, OtpKind::Signup).await?;

        Ok(user.id)
    }

    async fn verify_otp(&self, verification: OtpVerification) -> Result<(), ServiceError> {
        let email = normalize_email(&verification.email);

        self.repository
            .find_valid_otp(&email, verification.code.trim(), OtpKind::Signup, Utc::now())
            .await?
            .ok_or_else(|| ServiceError::BadRequest("Invalid or expired OTP".into()))?;

        let user = self.repository.verify_user(&email).await?;
        log::info!("User {} verified.", user.id);

        Ok(())
    }

    async fn forgot_password(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);

        if self.repository.get_user_by_email(&email).await?.is_none() {
            return Err(ServiceError::NotFound("No account found with this email".into()));
        }

        self.send_otp(&email, OtpKind::Reset).await
    }

    async fn reset_password(&self, reset: PasswordReset) -> Result<(), ServiceError> {
        let email = normalize_email(&reset.email);
        rules::validate_credentials(&email, &reset.new_password)?;

        self.repository
            .find_valid_otp(&email, reset.code.trim(), OtpKind::Reset, Utc::now())
            .await?
            .ok_or_else(|| ServiceError::BadRequest("Invalid or expired OTP".into()))?;

        let password_hash = self.hash(reset.new_password).await?;
        let user_id = self.repository.reset_password(&email, &password_hash).await?;

        self.sessions.retain(|_, session| session.user_id != user_id);
        log::info!("Password of user {} was reset.", user_id);

        Ok(())
    }

    async fn login(&self, credentials: Credentials) -> Result<LoginSession, ServiceError> {
        let email = normalize_email(&credentials.email);
        let invalid = || ServiceError::Unauthorized("Invalid credentials".into());

        let user = self
            .repository
            .get_user_by_email(&email)
            .await?
            .ok_or_else(invalid)?;

        if !self
            .password_matches(credentials.password, user.password_hash.clone())
            .await?
        {
            return Err(invalid());
        }

        if !user.is_verified {
            return Err(ServiceError::Unauthorized(
                "Please verify your email first".into(),
            ));
        }

        let token = generate_session_token();
        let expires_at = Utc::now() + Duration::hours(self.auth.session_ttl_hours);

        self.repository
            .insert_session(&token, &user.id, expires_at)
            .await?;
        self.sessions.insert(
            token.clone(),
            Session {
                token: token.clone(),
                user_id: user.id.clone(),
                is_admin: user.is_admin,
                expires_at,
            },
        );

        let profile = self.get_profile(&user.id).await?;

        Ok(LoginSession {
            token,
            expires_at,
            user: profile,
        })
    }

    async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        self.sessions.remove(token);
        self.repository.delete_session(token).await?;

        Ok(())
    }

    async fn resolve_session(&self, token: &str) -> Result<SessionUser, ServiceError> {
        let now = Utc::now();
        let unauthorized = || ServiceError::Unauthorized("Unauthorized".into());

        let cached = self.sessions.get(token).map(|session| session.clone());
        let session = match cached {
            Some(session) if session.expires_at > now => session,
            Some(_) => {
                self.sessions.remove(token);
                return Err(unauthorized());
            }
            None => {
                let session = self
                    .repository
                    .get_session(token, now)
                    .await?
                    .ok_or_else(unauthorized)?;
                self.sessions.insert(token.to_string(), session.clone());
                session
            }
        };

        Ok(SessionUser {
            id: session.user_id,
            is_admin: session.is_admin,
        })
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile, ServiceError> {
        self.repository
            .get_profile(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))
    }

    async fn update_profile(
        &self,
        user: SessionUser,
        update: ProfileUpdate,
    ) -> Result<Profile, ServiceError> {
        self.repository
            .update_profile(
                &user.id,
                update.name.as_deref(),
                update.deposit_link.as_deref(),
                user.is_admin,
            )
            .await?;

        self.get_profile(&user.id).await
    }

    async fn check_password(&self, user_id: &str, password: String) -> Result<(), ServiceError> {
        let user = self
            .repository
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))?;

        if !self.password_matches(password, user.password_hash).await? {
            return Err(ServiceError::Unauthorized("Invalid password".into()));
        }

        Ok(())
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Signup { new_user, response } => {
                let result = self.signup(new_user).await;
                let _ = response.send(result);
            }
            UserRequest::VerifyOtp {
                verification,
                response,
            } => {
                let result = self.verify_otp(verification).await;
                let _ = response.send(result);
            }
            UserRequest::ForgotPassword { email, response } => {
                let result = self.forgot_password(&email).await;
                let _ = response.send(result);
            }
            UserRequest::ResetPassword { reset, response } => {
                let result = self.reset_password(reset).await;
                let _ = response.send(result);
            }
            UserRequest::Login {
                credentials,
                response,
            } => {
                let session = self.login(credentials).await;
                let _ = response.send(session);
            }
            UserRequest::Logout { token, response } => {
                let result = self.logout(&token).await;
                let _ = response.send(result);
            }
            UserRequest::ResolveSession { token, response } => {
                let user = self.resolve_session(&token).await;
                let _ = response.send(user);
            }
            UserRequest::GetProfile { user_id, response } => {
                let profile = self.get_profile(&user_id).await;
                let _ = response.send(profile);
            }
            UserRequest::UpdateProfile {
                user,
                update,
                response,
            } => {
                let profile = self.update_profile(user, update).await;
                let _ = response.send(profile);
            }
            UserRequest::CheckPassword {
                user_id,
                password,
                response,
            } => {
                let result = self.check_password(&user_id, password).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
