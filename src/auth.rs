use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::{AppError, AppResult},
    models::{Role, User},
    repository::RepositoryState,
};

/// Claims
///
/// Payload of every issued token: the identity claim `{user_id, role}` plus the standard
/// issue/expiry timestamps. Tokens are HS256-signed with `AppConfig::jwt_secret`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub role: Role,
    /// Issued At (iat).
    pub iat: usize,
    /// Expiration Time (exp). Requests past this instant must re-authenticate.
    pub exp: usize,
}

/// AuthUser
///
/// The resolved, verified actor of a request. Guard, workflow and visibility rules consume
/// only this struct, never raw headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    /// Current role as stored on the User row (not the possibly stale role in the token).
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            role: user.role,
        }
    }
}

/// issue_token
///
/// Signs a token for `user` valid for `ttl_secs` seconds.
pub fn issue_token(user: &User, secret: &str, ttl_secs: u64) -> AppResult<String> {
    let now = Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        user_id: user.user_id,
        role: user.role,
        iat: now,
        exp: now + ttl_secs as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("failed to sign token: {:?}", e);
        AppError::Internal("token signing failed".to_string())
    })
}

/// decode_token
///
/// Verifies signature and expiry; any failure is `Unauthenticated`.
pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Argon2id hash with a fresh random salt, in PHC string format.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("failed to hash password: {}", e);
            AppError::Internal("password hashing failed".to_string())
        })
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("stored password hash is malformed: {}", e);
            false
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing user is accepted.
/// 2. Bearer token extraction and JWT validation.
/// 3. DB lookup: the user must still exist; the role is re-read from the row so that a
///    promotion (student -> rso_admin) takes effect without re-login.
///
/// Rejection: `AppError::Unauthenticated` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<i64>().ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(AuthUser::from(&user));
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthenticated)?;

        let claims = decode_token(token, &config.jwt_secret)?;

        // The token may outlive the account (deleted or denied users).
        let user = repo
            .get_user(claims.user_id)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        Ok(AuthUser::from(&user))
    }
}
