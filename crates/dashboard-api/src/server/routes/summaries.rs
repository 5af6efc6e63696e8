//! YouTube summary endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::ListQuery;
use crate::auth::{AdminUser, ApprovedUser};
use crate::error::{Error, Result};
use crate::server::extract::{ApiJson, ApiPath, ApiQuery};
use crate::server::state::AppState;
use crate::types::{SummaryStats, User, VideoSummary, WithOwner};
use crate::youtube::SummaryCreated;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    #[serde(default)]
    pub youtube_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryListResponse {
    pub summaries: Vec<WithOwner<VideoSummary>>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: WithOwner<VideoSummary>,
}

#[derive(Debug, Serialize)]
pub struct SummaryStatsResponse {
    pub stats: SummaryStats,
}

/// POST /api/ai/summarize
pub async fn summarize(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    ApiJson(request): ApiJson<SummarizeRequest>,
) -> Result<(StatusCode, Json<SummaryCreated>)> {
    let url = request.youtube_url.unwrap_or_default();
    let created = state.summaries().summarize(&user, &url).await?;

    tracing::info!(
        "Summary {} created for {} ({} left today)",
        created.summary.id,
        user.email,
        created.remaining
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/ai/summaries - The caller's summaries, or all of them for `?all=true` admins
pub async fn list_summaries(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<SummaryListResponse>> {
    let summaries = if user.is_admin() && query.wants_all() {
        state.database().list_all_summaries()?
    } else {
        state
            .database()
            .list_summaries_for_user(user.id)?
            .into_iter()
            .map(WithOwner::bare)
            .collect()
    };

    Ok(Json(SummaryListResponse { summaries }))
}

fn visible_summary(state: &AppState, user: &User, id: Uuid) -> Result<WithOwner<VideoSummary>> {
    match state.database().get_summary(id)? {
        Some(summary) if user.is_admin() => Ok(summary),
        Some(summary) if summary.item.user_id == user.id => Ok(WithOwner::bare(summary.item)),
        _ => Err(Error::not_found("Summary not found")),
    }
}

/// GET /api/ai/summaries/:id
pub async fn get_summary(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<SummaryResponse>> {
    let summary = visible_summary(&state, &user, id)?;
    Ok(Json(SummaryResponse { summary }))
}

/// DELETE /api/ai/summaries/:id
pub async fn delete_summary(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>> {
    visible_summary(&state, &user, id)?;
    if !state.database().delete_summary(id)? {
        return Err(Error::not_found("Summary not found"));
    }
    Ok(Json(json!({ "message": "Summary deleted" })))
}

/// GET /api/ai/stats
pub async fn summary_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<SummaryStatsResponse>> {
    let stats = state.summaries().stats()?;
    Ok(Json(SummaryStatsResponse { stats }))
}
