use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{is_unique_violation, RepositoryError};
use crate::models::users::{Otp, OtpKind, Profile, Session, User};
use crate::utils::{generate_referral_code, new_id};

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    pub async fn insert_user(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
        referral_code: Option<&str>,
    ) -> Result<User, RepositoryError> {
        if self.get_user_by_email(email).await?.is_some() {
            return Err(RepositoryError::Rejected("Email already registered".into()));
        }

        let mut own_code = generate_referral_code();
        while self.get_user_by_referral_code(&own_code).await?.is_some() {
            own_code = generate_referral_code();
        }

        let referred_by = match referral_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => self
                .get_user_by_referral_code(&code.to_uppercase())
                .await?
                .map(|referrer| referrer.id),
            None => None,
        };

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, name, referral_code, referred_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(&own_code)
        .bind(referred_by)
        .fetch_one(&self.conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Rejected("Email already registered".into())
            } else {
                e.into()
            }
        })?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    async fn get_user_by_referral_code(&self, code: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE referral_code = $1")
            .bind(code)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, RepositoryError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT
                u.id, u.email, u.name, u.balance_in_cents, u.referral_code, u.deposit_link,
                u.is_verified, u.is_admin, u.created_at,
                COALESCE((
                    SELECT SUM(p.amount_paid_in_cents) FROM package_purchases p
                    WHERE p.user_id = u.id AND p.status = 'active'
                ), 0)::BIGINT AS total_invested_in_cents
            FROM users u
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(profile)
    }

    pub async fn verify_user(&self, email: &str) -> Result<User, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET is_verified = true, updated_at = CURRENT_TIMESTAMP
            WHERE email = $1
            RETURNING *
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("User not found".into()))?;

        sqlx::query("DELETE FROM otps WHERE email = $1 AND kind = $2")
            .bind(email)
            .bind(OtpKind::Signup)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(user)
    }

    /// Replaces the password, consumes the reset codes and ends every session.
    pub async fn reset_password(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<String, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        let user_id: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE users SET password_hash = $1, updated_at = CURRENT_TIMESTAMP
            WHERE email = $2
            RETURNING id
            "#,
        )
        .bind(password_hash)
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?;

        let user_id = user_id.ok_or_else(|| RepositoryError::NotFound("User not found".into()))?;

        sqlx::query("DELETE FROM otps WHERE email = $1 AND kind = $2")
            .bind(email)
            .bind(OtpKind::Reset)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(&user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(user_id)
    }

    pub async fn insert_otp(
        &self,
        email: &str,
        code: &str,
        kind: OtpKind,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO otps (id, email, code, kind, expires_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(new_id())
        .bind(email)
        .bind(code)
        .bind(kind)
        .bind(expires_at)
        .execute(&self.conn)
        .await?;

        Ok(())
    }

    pub async fn find_valid_otp(
        &self,
        email: &str,
        code: &str,
        kind: OtpKind,
        now: DateTime<Utc>,
    ) -> Result<Option<Otp>, RepositoryError> {
        let otp = sqlx::query_as::<_, Otp>(
            r#"
            SELECT * FROM otps
            WHERE email = $1 AND code = $2 AND kind = $3 AND expires_at > $4
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(kind)
        .bind(now)
        .fetch_optional(&self.conn)
        .await?;

        Ok(otp)
    }

    pub async fn insert_session(
        &self,
        token: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.conn)
            .await?;

        Ok(())
    }

    pub async fn get_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, RepositoryError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT s.token, s.user_id, u.is_admin, s.expires_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > $2
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.conn)
        .await?;

        Ok(session)
    }

    pub async fn delete_session(&self, token: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.conn)
            .await?;

        Ok(())
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let sessions = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.conn)
            .await?;
        let otps = sqlx::query("DELETE FROM otps WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.conn)
            .await?;

        Ok(sessions.rows_affected() + otps.rows_affected())
    }

    /// Deposit links are write-once for regular users.
    pub async fn update_profile(
        &self,
        user_id: &str,
        name: Option<&str>,
        deposit_link: Option<&str>,
        is_admin: bool,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("User not found".into()))?;

        let name = name.filter(|n| !n.trim().is_empty()).unwrap_or(&user.name);
        let deposit_link = match deposit_link.filter(|l| !l.trim().is_empty()) {
            Some(link) if user.deposit_link.is_none() || is_admin => Some(link),
            _ => user.deposit_link.as_deref(),
        };

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET name = $1, deposit_link = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(deposit_link)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(user)
    }

    pub async fn seed_admin(&self, email: &str, password_hash: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, name, referral_code, is_admin, is_verified)
            VALUES ($1, $2, $3, 'Admin', 'ADMIN001', true, true)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(new_id())
        .bind(email)
        .bind(password_hash)
        .execute(&self.conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
