//! API-token authentication and role checks
//!
//! Tokens are opaque random strings handed out at signup and at each password sign-in; only
//! their SHA-256 digest is stored. Passwords are stored as Argon2id PHC strings. Requests
//! authenticate with `Authorization: Bearer <token>`.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::storage::Database;
use crate::types::User;

/// New random API token
pub fn generate_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Hex SHA-256 digest of a token, as stored
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 6;

/// Argon2id PHC string for a password. CPU heavy; call from a blocking thread.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| Error::internal(format!("Failed to build password salt: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC string. CPU heavy; call from a blocking thread.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Unreadable password hash: {}", e);
            false
        }
    }
}

/// Make sure the configured admin account exists.
///
/// Returns the token when one had to be generated, so it can be shown once.
pub fn seed_admin(database: &Database, config: &AuthConfig) -> Result<Option<String>> {
    let configured = config
        .admin_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let password_hash = match config.admin_password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    if let Some(existing) = database.find_user_by_email(&config.admin_email)? {
        if let Some(token) = configured {
            database.set_user_token_hash(existing.id, &hash_token(token))?;
        }
        if let Some(hash) = &password_hash {
            database.set_user_password_hash(existing.id, hash)?;
        }
        tracing::info!("Admin account {} present", existing.email);
        return Ok(None);
    }

    let (token, generated) = match configured {
        Some(token) => (token.to_string(), false),
        None => (generate_token(), true),
    };

    let admin = User::admin(&config.admin_email, &config.admin_name);
    match &password_hash {
        Some(hash) => database.insert_user_with_password(&admin, &hash_token(&token), hash)?,
        None => database.insert_user(&admin, &hash_token(&token))?,
    }
    tracing::info!("Seeded admin account {}", admin.email);

    if generated {
        tracing::warn!(
            "No ADMIN_TOKEN configured; generated admin token (shown once): {}",
            token
        );
        Ok(Some(token))
    } else {
        Ok(None)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Any authenticated account, whatever its approval status
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(parts)
            .ok_or_else(|| Error::Unauthorized("Authentication required".to_string()))?;

        let user = state
            .database()
            .find_user_by_token_hash(&hash_token(token))?
            .ok_or_else(|| Error::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(Self(user))
    }
}

/// An approved account
#[derive(Debug, Clone)]
pub struct ApprovedUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for ApprovedUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_approved() {
            return Err(Error::Forbidden("Account awaiting approval".to_string()));
        }
        Ok(Self(user))
    }
}

/// An approved administrator
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let ApprovedUser(user) = ApprovedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(Error::Forbidden("Insufficient permissions".to_string()));
        }
        Ok(Self(user))
    }
}
