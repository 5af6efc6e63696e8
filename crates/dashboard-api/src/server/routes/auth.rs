//! Signup, sign-in and current-user endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{
    generate_token, hash_password, hash_token, verify_password, AuthUser, MIN_PASSWORD_LEN,
};
use crate::error::{Error, Result};
use crate::server::extract::ApiJson;
use crate::server::state::AppState;
use crate::types::User;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: String,
    pub user: User,
    /// Shown once; only its digest is stored
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Replaces any token issued before
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

/// POST /api/auth/signup - Register a pending account
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>)> {
    let email = request.email.trim();
    let name = request.name.trim();

    if email.is_empty() || request.password.is_empty() || name.is_empty() {
        return Err(Error::validation("Email, password, and name are required"));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if !looks_like_email(email) {
        return Err(Error::validation("Invalid email address"));
    }

    // Checked again by the insert; this just skips hashing for a known address
    if state.database().find_user_by_email(email)?.is_some() {
        return Err(Error::Conflict("Email already registered".to_string()));
    }

    let user = User::pending(email, name);
    let password = request.password;
    let password_hash = blocking(move || hash_password(&password)).await??;
    let token = generate_token();
    state
        .database()
        .insert_user_with_password(&user, &hash_token(&token), &password_hash)?;

    tracing::info!("New account {} awaiting approval", user.email);

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "Account created. Awaiting admin approval.".to_string(),
            user,
            token,
        }),
    ))
}

/// POST /api/auth/login - Exchange email and password for a fresh token
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(Error::validation("Email and password are required"));
    }

    let invalid = || Error::Unauthorized("Invalid email or password".to_string());
    let (user, stored) = state
        .database()
        .find_credentials(&request.email)?
        .ok_or_else(invalid)?;
    // Token-only accounts (a seeded admin without a password) cannot sign in this way
    let stored = stored.ok_or_else(invalid)?;

    let password = request.password;
    if !blocking(move || verify_password(&password, &stored)).await? {
        tracing::info!("Failed sign-in for {}", user.email);
        return Err(invalid());
    }

    let token = generate_token();
    state.database().set_user_token_hash(user.id, &hash_token(&token))?;
    tracing::info!("{} signed in", user.email);

    Ok(Json(LoginResponse { token, user }))
}

/// GET /api/auth/me - Current account, whatever its status
pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse { user })
}

/// Run password hashing off the async runtime
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::internal(format!("Password task failed: {}", e)))
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}
