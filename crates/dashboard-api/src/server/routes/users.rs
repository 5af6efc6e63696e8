//! Admin user management endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::{Error, Result};
use crate::server::extract::ApiPath;
use crate::server::state::AppState;
use crate::types::{User, UserStats, UserStatus};

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct UserStatsResponse {
    pub stats: UserStats,
}

#[derive(Debug, Serialize)]
pub struct UserUpdateResponse {
    pub message: String,
    pub user: User,
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<UserListResponse>> {
    let users = state.database().list_users(None)?;
    Ok(Json(UserListResponse { users }))
}

/// GET /api/users/pending
pub async fn list_pending(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<UserListResponse>> {
    let users = state.database().list_users(Some(UserStatus::Pending))?;
    Ok(Json(UserListResponse { users }))
}

/// GET /api/users/stats
pub async fn user_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<UserStatsResponse>> {
    let stats = state.database().user_stats()?;
    Ok(Json(UserStatsResponse { stats }))
}

/// PUT /api/users/:id/approve
pub async fn approve_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserUpdateResponse>> {
    let user = set_status(&state, id, UserStatus::Approved)?;
    tracing::info!("{} approved {}", admin.email, user.email);

    Ok(Json(UserUpdateResponse {
        message: "User approved".to_string(),
        user,
    }))
}

/// PUT /api/users/:id/reject
pub async fn reject_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserUpdateResponse>> {
    let user = set_status(&state, id, UserStatus::Rejected)?;
    tracing::info!("{} rejected {}", admin.email, user.email);

    Ok(Json(UserUpdateResponse {
        message: "User rejected".to_string(),
        user,
    }))
}

fn set_status(state: &AppState, id: Uuid, status: UserStatus) -> Result<User> {
    state
        .database()
        .set_user_status(id, status)?
        .ok_or_else(|| Error::not_found("User not found"))
}

/// DELETE /api/users/:id - Remove an account with its documents, files and summaries
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>> {
    if id == admin.id {
        return Err(Error::validation("Cannot delete your own account"));
    }

    let documents = state.database().list_documents_for_user(id)?;
    let paths = state
        .database()
        .delete_user(id)?
        .ok_or_else(|| Error::not_found("User not found"))?;

    for doc in &documents {
        state.job_queue().forget(doc.id);
    }
    for path in &paths {
        state.files().remove(path).await;
    }

    tracing::info!("{} deleted user {} ({} files)", admin.email, id, paths.len());
    Ok(Json(json!({ "message": "User deleted" })))
}
