//! Processing job progress endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::{Error, Result};
use crate::processing::{JobProgress, QueueStats};
use crate::server::extract::ApiPath;
use crate::server::state::AppState;

/// Queue overview
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub stats: QueueStats,
    pub jobs: Vec<JobProgress>,
}

#[derive(Debug, Serialize)]
pub struct JobProgressResponse {
    pub job: JobProgress,
}

/// GET /api/jobs - Queue statistics and the latest job per document
pub async fn list_jobs(State(state): State<AppState>, _admin: AdminUser) -> Json<JobListResponse> {
    Json(JobListResponse {
        stats: state.job_queue().stats(),
        jobs: state.job_queue().list_jobs(),
    })
}

/// GET /api/jobs/:id - Progress of a document's latest job
pub async fn get_job_progress(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(document_id): ApiPath<Uuid>,
) -> Result<Json<JobProgressResponse>> {
    let job = state
        .job_queue()
        .get_progress(document_id)
        .ok_or_else(|| Error::not_found(format!("No job recorded for document {}", document_id)))?;

    Ok(Json(JobProgressResponse { job }))
}
