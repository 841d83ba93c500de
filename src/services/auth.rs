use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    config::Config,
    error::DomainError,
    models::{
        audit::SecurityStatus,
        auth::{Claims, RefreshClaims},
        user::{validate_password, LoginResponse, RefreshToken, User, UserProfile, UserRole},
    },
    services::{
        metrics::LOGINS_COUNTER,
        security::{SecurityLogEntry, SecurityService, BRUTE_FORCE_THRESHOLD, BRUTE_FORCE_WINDOW_SECS},
    },
};

pub const USER_SELECT: &str = "
    SELECT id, username, email, password_hash, first_name, last_name,
           role::TEXT AS role, is_active, last_login, created_at, updated_at
    FROM users";

const PASSWORD_COST: u32 = 12;
const REFRESH_TOKEN_COST: u32 = 8;

/// Token lifetimes and secrets, taken from [`Config`].
#[derive(Clone, Copy)]
pub struct TokenSettings<'a> {
    pub jwt_secret: &'a str,
    pub refresh_secret: &'a str,
    pub access_ttl: u64,
    pub refresh_ttl_days: u64,
}

impl<'a> From<&'a Config> for TokenSettings<'a> {
    fn from(c: &'a Config) -> Self {
        Self {
            jwt_secret: &c.jwt_secret,
            refresh_secret: &c.jwt_refresh_secret,
            access_ttl: c.jwt_expiry_seconds,
            refresh_ttl_days: c.jwt_refresh_expiry_days,
        }
    }
}

/// Where a request came from, for the security log.
#[derive(Debug, Clone)]
pub struct RequestOrigin {
    pub ip: String,
    pub user_agent: String,
}

pub struct AuthService;

impl AuthService {
    /// Username or e-mail login, both matched case-insensitively.
    ///
    /// Every attempt lands in the security log. Five failures from one IP
    /// within five minutes lock that IP out of login until the window passes.
    pub async fn login(
        pool: &PgPool,
        tokens: TokenSettings<'_>,
        origin: &RequestOrigin,
        identifier: &str,
        password: &str,
    ) -> anyhow::Result<LoginResponse> {
        let failures =
            SecurityService::recent_failed_logins(pool, &origin.ip, BRUTE_FORCE_WINDOW_SECS).await?;
        if failures >= BRUTE_FORCE_THRESHOLD {
            tracing::warn!(ip = %origin.ip, failures, "login blocked after repeated failures");
            SecurityService::log(
                pool.clone(),
                SecurityLogEntry::new("Brute Force Attack Detected", SecurityStatus::Suspicious, origin.ip.as_str())
                    .user_agent(origin.user_agent.as_str())
                    .details(json!({ "username": identifier, "failed_attempts": failures })),
            );
            LOGINS_COUNTER.with_label_values(&["blocked"]).inc();
            return Err(DomainError::TooManyAttempts.into());
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "{USER_SELECT} WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($1)
             ORDER BY (LOWER(username) = LOWER($1)) DESC LIMIT 1"
        ))
        .bind(identifier.trim())
        .fetch_optional(pool)
        .await?;

        let reason = match &user {
            None => Some("unknown user"),
            Some(u) if !u.is_active => Some("inactive account"),
            Some(u) if !bcrypt::verify(password, &u.password_hash).unwrap_or(false) => Some("wrong password"),
            Some(_) => None,
        };

        if let Some(reason) = reason {
            SecurityService::log(
                pool.clone(),
                SecurityLogEntry::new("Login", SecurityStatus::Failed, origin.ip.as_str())
                    .user(user.as_ref().map(|u| u.id))
                    .user_agent(origin.user_agent.as_str())
                    .details(json!({ "username": identifier, "reason": reason })),
            );
            LOGINS_COUNTER.with_label_values(&["failed"]).inc();
            return Err(DomainError::InvalidCredentials.into());
        }

        let Some(mut user) = user else {
            return Err(DomainError::InvalidCredentials.into());
        };

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(now)
            .bind(user.id)
            .execute(pool)
            .await?;
        user.last_login = Some(now);

        SecurityService::log(
            pool.clone(),
            SecurityLogEntry::new("Login", SecurityStatus::Success, origin.ip.as_str())
                .user(Some(user.id))
                .user_agent(origin.user_agent.as_str()),
        );
        LOGINS_COUNTER.with_label_values(&["success"]).inc();

        Self::issue_tokens(pool, tokens, user).await
    }

    async fn issue_tokens(pool: &PgPool, tokens: TokenSettings<'_>, user: User) -> anyhow::Result<LoginResponse> {
        let access_token = Self::generate_access_token(&user, tokens.jwt_secret, tokens.access_ttl)?;
        let (refresh_token, jti) =
            Self::generate_refresh_token(&user.id, tokens.refresh_secret, tokens.refresh_ttl_days)?;

        let hash = bcrypt::hash(&refresh_token, REFRESH_TOKEN_COST)?;
        let expires_at = Utc::now() + chrono::Duration::days(tokens.refresh_ttl_days as i64);
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(jti)
        .bind(user.id)
        .bind(hash)
        .bind(expires_at)
        .execute(pool)
        .await?;

        let user = Self::profile(pool, user).await?;

        Ok(LoginResponse { access_token, refresh_token, user })
    }

    pub fn generate_access_token(user: &User, secret: &str, ttl_seconds: u64) -> anyhow::Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role(),
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }

    fn generate_refresh_token(user_id: &Uuid, secret: &str, ttl_days: u64) -> anyhow::Result<(String, Uuid)> {
        let now = Utc::now().timestamp() as usize;
        let jti = Uuid::new_v4();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: jti.to_string(),
            iat: now,
            exp: now + (ttl_days * 86400) as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok((token, jti))
    }

    fn decode_refresh(token: &str, secret: &str) -> anyhow::Result<RefreshClaims> {
        let key = DecodingKey::from_secret(secret.as_bytes());
        let data = decode::<RefreshClaims>(token, &key, &Validation::new(Algorithm::HS256))
            .map_err(|_| DomainError::InvalidCredentials)?;
        Ok(data.claims)
    }

    /// Exchanges a refresh token for a new pair; the presented token is revoked.
    pub async fn refresh(pool: &PgPool, tokens: TokenSettings<'_>, refresh_token: &str) -> anyhow::Result<LoginResponse> {
        let claims = Self::decode_refresh(refresh_token, tokens.refresh_secret)?;
        let jti: Uuid = claims.jti.parse()?;
        let user_id: Uuid = claims.sub.parse()?;

        // Claiming the row and revoking it is one statement, so a token can
        // only ever be exchanged once.
        let claimed: RefreshToken = sqlx::query_as(
            "UPDATE refresh_tokens SET revoked = TRUE
             WHERE id = $1 AND revoked = FALSE
             RETURNING *",
        )
        .bind(jti)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::InvalidCredentials)?;

        if !refresh_claim_valid(claimed.expires_at, Utc::now(), bcrypt::verify(refresh_token, &claimed.token_hash)?) {
            return Err(DomainError::InvalidCredentials.into());
        }

        let user = sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE id = $1 AND is_active = TRUE"))
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::InvalidCredentials)?;

        Self::issue_tokens(pool, tokens, user).await
    }

    /// Revokes the refresh token; an undecodable token is ignored.
    pub async fn logout(pool: &PgPool, refresh_secret: &str, refresh_token: &str) -> anyhow::Result<()> {
        if let Ok(claims) = Self::decode_refresh(refresh_token, refresh_secret) {
            let jti: Uuid = claims.jti.parse()?;
            sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1")
                .bind(jti)
                .execute(pool)
                .await?;
        }
        Ok(())
    }

    pub async fn find_user(pool: &PgPool, user_id: Uuid) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("User"))?;
        Ok(user)
    }

    /// The user profile with the linked staff or CQC member id.
    pub async fn profile(pool: &PgPool, user: User) -> anyhow::Result<UserProfile> {
        let staff_member_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM staff_members WHERE user_id = $1")
                .bind(user.id)
                .fetch_optional(pool)
                .await?;
        let cqc_member_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM cqc_members WHERE user_id = $1")
                .bind(user.id)
                .fetch_optional(pool)
                .await?;

        let mut profile = UserProfile::from(user);
        profile.staff_member_id = staff_member_id;
        profile.cqc_member_id = cqc_member_id;
        Ok(profile)
    }

    pub async fn change_password(
        pool: &PgPool,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> anyhow::Result<()> {
        let password_hash: String =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1 AND is_active = TRUE")
                .bind(user_id)
                .fetch_optional(pool)
                .await?
                .ok_or(DomainError::NotFound("User"))?;

        if !bcrypt::verify(current_password, &password_hash).unwrap_or(false) {
            return Err(DomainError::Validation("Current password is incorrect".into()).into());
        }
        validate_password(new_password).map_err(DomainError::Validation)?;

        Self::set_password(pool, user_id, new_password).await
    }

    /// Replaces the password and revokes every refresh token of the user.
    pub async fn set_password(pool: &PgPool, user_id: Uuid, new_password: &str) -> anyhow::Result<()> {
        let new_hash = bcrypt::hash(new_password, PASSWORD_COST)?;
        let updated = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(&new_hash)
            .bind(user_id)
            .execute(pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(DomainError::NotFound("User").into());
        }

        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Inserts a login account inside the caller's transaction.
    pub async fn create_user(
        tx: &mut Transaction<'_, Postgres>,
        username: &str,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        role: UserRole,
    ) -> anyhow::Result<User> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))")
                .bind(username)
                .fetch_one(&mut **tx)
                .await?;
        if taken {
            return Err(DomainError::Conflict(format!("Username '{username}' is already taken")).into());
        }

        let hash = bcrypt::hash(password, PASSWORD_COST)?;
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash, first_name, last_name, role)
             VALUES ($1, $2, $3, $4, $5, $6::user_role)
             RETURNING id, username, email, password_hash, first_name, last_name,
                       role::TEXT AS role, is_active, last_login, created_at, updated_at",
        )
        .bind(username)
        .bind(email)
        .bind(hash)
        .bind(first_name)
        .bind(last_name)
        .bind(role.to_string())
        .fetch_one(&mut **tx)
        .await?;
        Ok(user)
    }

    /// Checks a witness's password for a controlled-drug administration.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }
}

/// A claimed refresh token still has to match its hash and be unexpired.
fn refresh_claim_valid(expires_at: DateTime<Utc>, now: DateTime<Utc>, hash_matches: bool) -> bool {
    hash_matches && expires_at >= now
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_access_token;

    fn user(role: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: "st000123".into(),
            email: "carer@example.org".into(),
            password_hash: String::new(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            role: role.into(),
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn access_token_carries_username_and_role() {
        let u = user("management");
        let token = AuthService::generate_access_token(&u, "secret", 900).unwrap();
        let decoded = decode_access_token(&token, "secret").unwrap();
        assert_eq!(decoded.user_id, u.id);
        assert_eq!(decoded.username, "st000123");
        assert_eq!(decoded.role, UserRole::Management);
    }

    #[test]
    fn refresh_token_decodes_only_with_refresh_secret() {
        let id = Uuid::new_v4();
        let (token, jti) = AuthService::generate_refresh_token(&id, "refresh", 30).unwrap();
        let claims = AuthService::decode_refresh(&token, "refresh").unwrap();
        assert_eq!(claims.jti, jti.to_string());
        assert_eq!(claims.sub, id.to_string());
        assert!(AuthService::decode_refresh(&token, "access").is_err());
    }

    #[test]
    fn witness_password_check() {
        let hash = bcrypt::hash("Witness123", 4).unwrap();
        assert!(AuthService::verify_password("Witness123", &hash));
        assert!(!AuthService::verify_password("wrong", &hash));
        assert!(!AuthService::verify_password("Witness123", "not-a-hash"));
    }

    #[test]
    fn claimed_refresh_token_must_match_and_be_unexpired() {
        let now = Utc::now();
        let later = now + chrono::Duration::days(1);
        let earlier = now - chrono::Duration::seconds(1);
        assert!(refresh_claim_valid(later, now, true));
        assert!(!refresh_claim_valid(later, now, false));
        assert!(!refresh_claim_valid(earlier, now, true));
    }
}
