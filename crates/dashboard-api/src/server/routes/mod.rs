//! API routes for the dashboard server

pub mod auth;
pub mod documents;
pub mod jobs;
pub mod summaries;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::server::state::AppState;

/// Slack on top of the file size limit for multipart framing
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// `?all=true` on listing endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub all: Option<String>,
}

impl ListQuery {
    pub fn wants_all(&self) -> bool {
        self.all.as_deref() == Some("true")
    }
}

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        // Accounts
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // User administration
        .route("/users", get(users::list_users))
        .route("/users/pending", get(users::list_pending))
        .route("/users/stats", get(users::user_stats))
        .route("/users/:id/approve", put(users::approve_user))
        .route("/users/:id/reject", put(users::reject_user))
        .route("/users/:id", delete(users::delete_user))
        // Documents - upload gets a larger body limit
        .route(
            "/documents/upload",
            post(documents::upload_document)
                .layer(DefaultBodyLimit::max(max_upload_size + MULTIPART_OVERHEAD)),
        )
        .route("/documents", get(documents::list_documents))
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/documents/:id/ask", post(documents::ask_question))
        .route("/documents/:id/reprocess", post(documents::reprocess_document))
        // Video summaries
        .route("/ai/summarize", post(summaries::summarize))
        .route("/ai/summaries", get(summaries::list_summaries))
        .route(
            "/ai/summaries/:id",
            get(summaries::get_summary).delete(summaries::delete_summary),
        )
        .route("/ai/stats", get(summaries::summary_stats))
        // Processing jobs
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id", get(jobs::get_job_progress))
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
