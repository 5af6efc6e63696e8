//! Document upload, listing and Q&A endpoints

use axum::{
    extract::{multipart::Field, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::ListQuery;
use crate::auth::ApprovedUser;
use crate::error::{Error, Result};
use crate::processing::{JobTrigger, ProcessingJob};
use crate::retrieval::RelevanceSelector;
use crate::server::extract::{ApiJson, ApiMultipart, ApiPath, ApiQuery};
use crate::server::state::AppState;
use crate::storage::{QuotaDecision, QuotaKind};
use crate::types::{Document, DocumentDetails, DocumentStatus, DocumentType, User, WithOwner};

const ALLOWED_FORMATS: &str = "Allowed formats: PDF, TXT, DOCX, JPG, PNG, WEBP";

#[derive(Debug, Serialize)]
pub struct DocumentResponse<T> {
    pub document: T,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<WithOwner<Document>>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// Anything but a string counts as missing
    #[serde(default)]
    pub question: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    /// Filename of the document asked about
    pub document: String,
}

/// Load a document the caller may see: owners see their own, admins see all (with owner details)
fn visible_document(state: &AppState, user: &User, id: Uuid) -> Result<WithOwner<Document>> {
    let not_found = || Error::not_found("Document not found");

    if user.is_admin() {
        return state.database().get_document_with_owner(id)?.ok_or_else(not_found);
    }

    match state.database().get_document(id)? {
        Some(doc) if doc.user_id == user.id => Ok(WithOwner::bare(doc)),
        _ => Err(not_found()),
    }
}

/// POST /api/documents/upload - Store a file and queue it for processing
pub async fn upload_document(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<(StatusCode, Json<DocumentResponse<Document>>)> {
    let max_size = state.config().server.max_upload_size;
    let too_large = || {
        Error::validation(format!(
            "File too large. Maximum size is {}MB.",
            max_size / (1024 * 1024)
        ))
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            too_large()
        } else {
            Error::validation(e.body_text())
        }
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "upload".to_string());
        let doc_type = declared_type(&field, &filename)
            .ok_or_else(|| Error::validation(ALLOWED_FORMATS))?;

        let data = field.bytes().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                too_large()
            } else {
                Error::validation(e.body_text())
            }
        })?;

        upload = Some((filename, doc_type, data));
        break;
    }

    let (filename, doc_type, data) = upload.ok_or_else(|| Error::validation("No file provided"))?;
    if data.len() > max_size {
        return Err(too_large());
    }

    let path = state.files().save(user.id, &filename, &data).await?;
    let doc = Document::new(user.id, filename, path, doc_type, data.len() as u64);

    if let Err(e) = state.database().insert_document(&doc) {
        state.files().remove(&doc.file_path).await;
        return Err(e);
    }

    tracing::info!(
        "[{}] Uploaded {} ({}, {} bytes) for {}",
        doc.id,
        doc.filename,
        doc.file_type,
        doc.file_size,
        user.email
    );

    // The row stays in `processing` and is picked up again at the next start
    if let Err(e) = state
        .job_queue()
        .submit(ProcessingJob::new(doc.id, JobTrigger::Upload))
        .await
    {
        tracing::warn!("[{}] Could not queue for processing: {}", doc.id, e);
    }

    Ok((StatusCode::CREATED, Json(DocumentResponse { document: doc })))
}

/// Declared type from the part's content type, falling back to the filename extension
fn declared_type(field: &Field<'_>, filename: &str) -> Option<DocumentType> {
    let declared = field
        .content_type()
        .filter(|mime| !mime.starts_with("application/octet-stream"));

    match declared {
        Some(mime) => DocumentType::from_mime(mime),
        None => mime_guess::from_path(filename)
            .first_raw()
            .and_then(DocumentType::from_mime),
    }
}

/// GET /api/documents - The caller's documents, or every document for `?all=true` admins
pub async fn list_documents(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<DocumentListResponse>> {
    let documents = if user.is_admin() && query.wants_all() {
        state.database().list_all_documents()?
    } else {
        state
            .database()
            .list_documents_for_user(user.id)?
            .into_iter()
            .map(WithOwner::bare)
            .collect()
    };

    Ok(Json(DocumentListResponse { documents }))
}

/// GET /api/documents/:id
pub async fn get_document(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DocumentResponse<DocumentDetails>>> {
    let document = visible_document(&state, &user, id)?;
    let chunk_count = state.database().count_chunks(id)?;

    Ok(Json(DocumentResponse {
        document: DocumentDetails {
            document,
            chunk_count,
        },
    }))
}

/// DELETE /api/documents/:id - Remove the record, its chunks and the stored file
pub async fn delete_document(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>> {
    let doc = visible_document(&state, &user, id)?.item;

    // Row first: a failed delete must not leave a record without its file
    state.database().delete_document(id)?;
    state.files().remove(&doc.file_path).await;
    if !state.job_queue().is_active(id) {
        state.job_queue().forget(id);
    }

    tracing::info!("[{}] Deleted {} by {}", id, doc.filename, user.email);
    Ok(Json(json!({ "message": "Document deleted" })))
}

/// POST /api/documents/:id/ask - Answer a question from the document's most relevant chunks
pub async fn ask_question(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<AskRequest>,
) -> Result<Json<AskResponse>> {
    let question = request
        .question
        .as_ref()
        .and_then(Value::as_str)
        .unwrap_or_default();
    if question.trim().is_empty() {
        return Err(Error::validation("Question is required"));
    }

    let max_chars = state.config().retrieval.max_question_chars;
    if question.chars().count() > max_chars {
        return Err(Error::validation(format!(
            "Question too long (max {} characters)",
            max_chars
        )));
    }

    let doc = visible_document(&state, &user, id)?.item;
    match doc.status {
        DocumentStatus::Ready => {}
        DocumentStatus::Processing => {
            return Err(Error::validation(
                "Document is still being processed. Please wait a moment.",
            ))
        }
        DocumentStatus::Error => {
            return Err(Error::validation(
                "Document could not be processed. Please re-upload.",
            ))
        }
    }

    let chunks = state.database().get_chunks(id)?;
    if chunks.is_empty() {
        return Err(Error::validation("No content found in this document"));
    }

    let today = Utc::now().date_naive();
    let limit = state.config().quotas.daily_questions;
    if let Some(limit) = limit {
        let decision = state
            .database()
            .try_consume_quota(user.id, QuotaKind::Question, today, limit)?;
        if decision == QuotaDecision::Exhausted {
            return Err(Error::RateLimited {
                message: format!(
                    "Daily limit reached ({} questions/day). Try again tomorrow.",
                    limit
                ),
                remaining: 0,
            });
        }
    }

    let selected = state.selector().select(chunks, question);
    let context = RelevanceSelector::build_context(&selected);
    tracing::debug!(
        "[{}] Answering from {} chunks ({} context chars)",
        id,
        selected.len(),
        context.len()
    );

    match state.answers().answer(&context, question.trim()).await {
        Ok(answer) => Ok(Json(AskResponse {
            answer,
            document: doc.filename,
        })),
        Err(e) => {
            if limit.is_some() {
                if let Err(release) =
                    state
                        .database()
                        .release_quota(user.id, QuotaKind::Question, today)
                {
                    tracing::error!("Failed to release question quota for {}: {}", user.id, release);
                }
            }
            Err(e)
        }
    }
}

/// POST /api/documents/:id/reprocess - Queue a failed document for another attempt
pub async fn reprocess_document(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<(StatusCode, Json<DocumentResponse<Document>>)> {
    let doc = visible_document(&state, &user, id)?.item;
    let conflict =
        || Error::Conflict("Only documents that failed processing can be reprocessed".to_string());

    if doc.status != DocumentStatus::Error || !state.database().reset_failed_document(id)? {
        return Err(conflict());
    }

    state
        .job_queue()
        .submit(ProcessingJob::new(id, JobTrigger::Retry))
        .await?;
    tracing::info!("[{}] Reprocessing requested by {}", id, user.email);

    let document = state
        .database()
        .get_document(id)?
        .ok_or_else(|| Error::not_found("Document not found"))?;

    Ok((StatusCode::ACCEPTED, Json(DocumentResponse { document })))
}
