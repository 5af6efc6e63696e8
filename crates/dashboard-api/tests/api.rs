//! Router-level tests with stubbed AI providers and an in-memory database

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

use dashboard_api::error::{Error, Result};
use dashboard_api::providers::{ChatProvider, ChatRequest, TextGenerator, VisionProvider};
use dashboard_api::server::state::{AppState, Providers};
use dashboard_api::storage::Database;
use dashboard_api::youtube::{VideoMetadata, VideoSource};
use dashboard_api::{router, DashboardConfig};

const ADMIN_TOKEN: &str = "test-admin-token";
const BOUNDARY: &str = "dashboard-test-boundary";
const PASSWORD: &str = "hunter22";

struct RecordingChat {
    requests: Mutex<Vec<ChatRequest>>,
}

#[async_trait]
impl ChatProvider for RecordingChat {
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>> {
        self.requests.lock().push(request.clone());
        Ok(Some("Revenue grew twelve percent.".to_string()))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// OCR that waits until the test opens the gate
struct GatedVision {
    gate: Arc<Notify>,
}

#[async_trait]
impl VisionProvider for GatedVision {
    async fn extract_text(&self, _image: &[u8], _mime_type: &str, _instruction: &str) -> Result<String> {
        self.gate.notified().await;
        Ok("Invoice total due: 42 dollars".to_string())
    }
}

struct NotesGenerator;

#[async_trait]
impl TextGenerator for NotesGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok("## 📝 Key Takeaways\n- Caching matters".to_string())
    }
}

struct StubVideos;

#[async_trait]
impl VideoSource for StubVideos {
    async fn metadata(&self, video_id: &str) -> VideoMetadata {
        VideoMetadata::new(video_id, Some("Systems Lecture".to_string()))
    }

    async fn transcript(&self, video_id: &str) -> Result<String> {
        if video_id == "noCaptions1" {
            return Err(Error::Unprocessable("No captions".to_string()));
        }
        Ok("today we talk about caches".to_string())
    }
}

struct TestApp {
    router: Router,
    dir: TempDir,
    gate: Arc<Notify>,
    chat: Arc<RecordingChat>,
}

async fn spawn_app(configure: impl FnOnce(&mut DashboardConfig)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();

    let mut config = DashboardConfig::default();
    config.storage.upload_dir = dir.path().join("uploads");
    config.storage.database_path = dir.path().join("dashboard.db");
    config.auth.admin_token = Some(ADMIN_TOKEN.to_string());
    config.processing.workers = Some(2);
    configure(&mut config);

    let gate = Arc::new(Notify::new());
    let chat = Arc::new(RecordingChat {
        requests: Mutex::new(Vec::new()),
    });
    let providers = Providers {
        chat: chat.clone(),
        vision: Arc::new(GatedVision { gate: gate.clone() }),
        generator: Arc::new(NotesGenerator),
        videos: Arc::new(StubVideos),
    };

    let database = Arc::new(Database::in_memory().unwrap());
    let state = AppState::from_parts(config, database, providers).await.unwrap();

    TestApp {
        router: router(state),
        dir,
        gate,
        chat,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Request with a verbatim body and optional content type
    async fn raw(&self, method: Method, uri: &str, token: &str, content_type: Option<&str>, body: &str) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token));
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    async fn upload(&self, token: &str, filename: &str, mime: &str, content: &[u8]) -> (StatusCode, Value) {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {mime}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/documents/upload")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Sign up and return (user id, token) without approval
    async fn signup(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "email": email, "password": PASSWORD, "name": "Test User" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["user"]["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    /// Sign up and have the admin approve the account
    async fn approved_user(&self, email: &str) -> (String, String) {
        let (id, token) = self.signup(email).await;
        let (status, _) = self
            .call(
                Method::PUT,
                &format!("/api/users/{id}/approve"),
                Some(ADMIN_TOKEN),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        (id, token)
    }

    async fn wait_for_status(&self, token: &str, document_id: &str, expected: &str) -> Value {
        for _ in 0..250 {
            let (status, body) = self.get(&format!("/api/documents/{document_id}"), token).await;
            assert_eq!(status, StatusCode::OK, "{body}");
            if body["document"]["status"] == expected {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("document {document_id} never reached {expected}");
    }
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = spawn_app(|_| {}).await;

    let (status, body) = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());

    let (status, _) = app.call(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_authentication_and_roles() {
    let app = spawn_app(|_| {}).await;

    let (status, body) = app.call(Method::GET, "/api/documents", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");

    let (status, body) = app.get("/api/documents", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");

    let (_, pending) = app.signup("pending@example.com").await;
    let (status, body) = app.get("/api/auth/me", &pending).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["status"], "pending");

    let (status, body) = app.get("/api/documents", &pending).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Account awaiting approval");

    let (_, user) = app.approved_user("member@example.com").await;
    let (status, body) = app.get("/api/users", &user).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Insufficient permissions");

    let (status, _) = app.get("/api/users", ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_signup_rejects_duplicates_and_bad_input() {
    let app = spawn_app(|_| {}).await;
    app.signup("dup@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "email": "DUP@example.com", "password": PASSWORD, "name": "Again" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already registered");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "email": "", "password": PASSWORD, "name": "Nobody" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email, password, and name are required");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "email": "short@example.com", "password": "12345", "name": "Short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password must be at least 6 characters");
}

#[tokio::test]
async fn test_password_login_issues_a_fresh_token() {
    let app = spawn_app(|_| {}).await;
    let (_, signup_token) = app.signup("login@example.com").await;
    let login = |email: &str, password: &str| {
        app.call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
    };

    let (status, body) = login("login@example.com", "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password");

    let (status, body) = login("nobody@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password");

    let (status, body) = login("", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email and password are required");

    // Pending accounts may sign in; approval gates everything past /me
    let (status, body) = login("LOGIN@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "login@example.com");
    assert_eq!(body["user"]["status"], "pending");
    let token = body["token"].as_str().unwrap().to_string();
    assert_ne!(token, signup_token);

    let (status, body) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "login@example.com");

    let (status, _) = app.get("/api/auth/me", &signup_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The seeded admin has no password here
    let (status, _) = login("admin@dashboard.com", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_requests_get_json_errors() {
    let app = spawn_app(|_| {}).await;
    let (_, token) = app.approved_user("sloppy@example.com").await;
    let uri = format!("/api/documents/{}/ask", uuid::Uuid::new_v4());

    let (status, body) = app
        .call(Method::POST, &uri, Some(token.as_str()), Some(json!({ "question": 42 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Question is required");

    let (status, body) = app
        .raw(Method::POST, &uri, &token, Some("application/json"), "not json")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app
        .raw(Method::POST, &uri, &token, None, r#"{"question":"hi"}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app
        .raw(
            Method::POST,
            "/api/ai/summarize",
            &token,
            Some("application/json"),
            r#"{"youtubeUrl": ["not", "a", "string"]}"#,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.get("/api/documents/not-a-uuid", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("UUID"));

    let (status, body) = app
        .raw(Method::POST, "/api/documents/upload", &token, Some("text/plain"), "hello")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.get("/api/nowhere", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");
}

#[tokio::test]
async fn test_admin_user_management() {
    let app = spawn_app(|_| {}).await;
    let (pending_id, _) = app.signup("new@example.com").await;
    let (other_id, _) = app.signup("other@example.com").await;

    let (status, body) = app.get("/api/users/pending", ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/users/{pending_id}/approve"),
            Some(ADMIN_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User approved");
    assert_eq!(body["user"]["status"], "approved");

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/users/{other_id}/reject"),
            Some(ADMIN_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User rejected");

    let (_, body) = app.get("/api/users/stats", ADMIN_TOKEN).await;
    assert_eq!(
        body["stats"],
        json!({ "total": 3, "pending": 0, "approved": 2, "rejected": 1 })
    );

    let (_, me) = app.get("/api/auth/me", ADMIN_TOKEN).await;
    let admin_id = me["user"]["id"].as_str().unwrap().to_string();
    let (status, body) = app
        .call(Method::DELETE, &format!("/api/users/{admin_id}"), Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot delete your own account");

    let missing = uuid::Uuid::new_v4();
    let (status, body) = app
        .call(Method::PUT, &format!("/api/users/{missing}/approve"), Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
}

#[tokio::test]
async fn test_short_upload_becomes_one_ready_chunk_and_answers() {
    const TEXT: &str = "The quarterly revenue grew twelve percent in 2024.";
    assert_eq!(TEXT.chars().count(), 50);

    let app = spawn_app(|_| {}).await;
    let (_, token) = app.approved_user("reader@example.com").await;

    let (status, body) = app.upload(&token, "report.txt", "text/plain", TEXT.as_bytes()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["document"]["status"], "processing");
    assert_eq!(body["document"]["file_type"], "txt");
    assert_eq!(body["document"]["file_size"], 50);
    let id = body["document"]["id"].as_str().unwrap().to_string();

    let ready = app.wait_for_status(&token, &id, "ready").await;
    assert_eq!(ready["document"]["chunk_count"], 1);

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/documents/{id}/ask"),
            Some(token.as_str()),
            Some(json!({ "question": "  How much did revenue grow?  " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["answer"], "Revenue grew twelve percent.");
    assert_eq!(body["document"], "report.txt");

    let requests = app.chat.requests.lock();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].user.contains(TEXT));
    assert!(requests[0].user.contains("Question: How much did revenue grow?\n"));
}

#[tokio::test]
async fn test_question_while_processing_is_rejected() {
    let app = spawn_app(|_| {}).await;
    let (_, token) = app.approved_user("scanner@example.com").await;

    let (status, body) = app.upload(&token, "scan.png", "image/png", b"\x89PNG fake image").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["document"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/documents/{id}/ask");
    let ask = || {
        app.call(
            Method::POST,
            &uri,
            Some(token.as_str()),
            Some(json!({ "question": "What is the total?" })),
        )
    };

    let (status, body) = ask().await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Document is still being processed. Please wait a moment."
    );

    app.gate.notify_one();
    app.wait_for_status(&token, &id, "ready").await;

    let (status, _) = ask().await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_question_validation() {
    let app = spawn_app(|_| {}).await;
    let (_, token) = app.approved_user("asker@example.com").await;
    let missing = uuid::Uuid::new_v4();
    let uri = format!("/api/documents/{missing}/ask");

    let (status, body) = app
        .call(Method::POST, &uri, Some(token.as_str()), Some(json!({ "question": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Question is required");

    let (status, body) = app
        .call(Method::POST, &uri, Some(token.as_str()), Some(json!({ "question": "a".repeat(501) })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Question too long (max 500 characters)");

    let (status, body) = app
        .call(Method::POST, &uri, Some(token.as_str()), Some(json!({ "question": "ok?" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Document not found");
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = spawn_app(|config| config.server.max_upload_size = 2 * 1024 * 1024).await;
    let (_, token) = app.approved_user("uploader@example.com").await;

    let (status, body) = app.upload(&token, "archive.zip", "application/zip", b"PK").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Allowed formats: PDF, TXT, DOCX, JPG, PNG, WEBP");

    let big = vec![b'a'; 2 * 1024 * 1024 + 10];
    let (status, body) = app.upload(&token, "big.txt", "text/plain", &big).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File too large. Maximum size is 2MB.");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/documents/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(format!("--{BOUNDARY}--\r\n")))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");

    let (_, body) = app.get("/api/documents", &token).await;
    assert!(body["documents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_document_fails_and_can_be_reprocessed() {
    let app = spawn_app(|_| {}).await;
    let (_, token) = app.approved_user("blank@example.com").await;

    let (_, body) = app.upload(&token, "blank.txt", "text/plain", b"   \n\t ").await;
    let id = body["document"]["id"].as_str().unwrap().to_string();
    let failed = app.wait_for_status(&token, &id, "error").await;
    assert_eq!(failed["document"]["chunk_count"], 0);

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/documents/{id}/ask"),
            Some(token.as_str()),
            Some(json!({ "question": "Anything?" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Document could not be processed. Please re-upload.");

    let (status, body) = app
        .call(Method::POST, &format!("/api/documents/{id}/reprocess"), Some(token.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    assert_eq!(body["document"]["status"], "processing");

    app.wait_for_status(&token, &id, "error").await;

    let (_, jobs) = app.get("/api/jobs", ADMIN_TOKEN).await;
    let job = jobs["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .find(|j| j["document_id"] == id.as_str())
        .unwrap();
    assert_eq!(job["trigger"], "retry");
    assert_eq!(job["attempts"], 2);
}

#[tokio::test]
async fn test_reprocessing_a_ready_document_conflicts() {
    let app = spawn_app(|_| {}).await;
    let (_, token) = app.approved_user("ready@example.com").await;

    let (_, body) = app.upload(&token, "notes.txt", "text/plain", b"some notes").await;
    let id = body["document"]["id"].as_str().unwrap().to_string();
    app.wait_for_status(&token, &id, "ready").await;

    let (status, _) = app
        .call(Method::POST, &format!("/api/documents/{id}/reprocess"), Some(token.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_documents_are_private_to_owner_except_for_admins() {
    let app = spawn_app(|_| {}).await;
    let (_, owner) = app.approved_user("owner@example.com").await;
    let (_, stranger) = app.approved_user("stranger@example.com").await;

    let (_, body) = app.upload(&owner, "private.txt", "text/plain", b"secret plans").await;
    let id = body["document"]["id"].as_str().unwrap().to_string();

    let (status, _) = app.get(&format!("/api/documents/{id}"), &stranger).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get(&format!("/api/documents/{id}"), &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["document"].get("user_email").is_none());

    let (status, body) = app.get(&format!("/api/documents/{id}"), ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["document"]["user_email"], "owner@example.com");

    let (_, body) = app.get("/api/documents?all=true", &stranger).await;
    assert!(body["documents"].as_array().unwrap().is_empty());

    let (_, body) = app.get("/api/documents?all=true", ADMIN_TOKEN).await;
    assert_eq!(body["documents"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/documents/{id}"), Some(stranger.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/documents/{id}"), Some(owner.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Document deleted");

    let (status, _) = app.get(&format!("/api/documents/{id}"), &owner).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_a_document_removes_row_and_file() {
    let app = spawn_app(|_| {}).await;
    let (user_id, token) = app.approved_user("tidy@example.com").await;
    let user_dir = app.dir.path().join("uploads").join(&user_id);

    let (_, body) = app.upload(&token, "first.txt", "text/plain", b"first file").await;
    let first = body["document"]["id"].as_str().unwrap().to_string();
    let (_, body) = app.upload(&token, "second.txt", "text/plain", b"second file").await;
    let second = body["document"]["id"].as_str().unwrap().to_string();
    app.wait_for_status(&token, &first, "ready").await;
    app.wait_for_status(&token, &second, "ready").await;
    assert_eq!(std::fs::read_dir(&user_dir).unwrap().count(), 2);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/documents/{first}"), Some(token.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(std::fs::read_dir(&user_dir).unwrap().count(), 1);

    // A file already gone from disk does not block removing the record
    for entry in std::fs::read_dir(&user_dir).unwrap() {
        std::fs::remove_file(entry.unwrap().path()).unwrap();
    }
    let (status, _) = app
        .call(Method::DELETE, &format!("/api/documents/{second}"), Some(token.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/documents", &token).await;
    assert!(body["documents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_a_user_removes_their_files() {
    let app = spawn_app(|_| {}).await;
    let (user_id, token) = app.approved_user("leaving@example.com").await;

    let (_, body) = app.upload(&token, "mine.txt", "text/plain", b"my content").await;
    let id = body["document"]["id"].as_str().unwrap().to_string();
    app.wait_for_status(&token, &id, "ready").await;

    let user_dir = app.dir.path().join("uploads").join(&user_id);
    assert_eq!(std::fs::read_dir(&user_dir).unwrap().count(), 1);

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/users/{user_id}"), Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User deleted");
    assert_eq!(std::fs::read_dir(&user_dir).unwrap().count(), 0);

    let (status, _) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/users/{user_id}"), Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_summaries_respect_daily_quota() {
    let app = spawn_app(|config| config.quotas.daily_summaries = 2).await;
    let (_, token) = app.approved_user("student@example.com").await;
    let summarize = |url: &'static str| {
        app.call(
            Method::POST,
            "/api/ai/summarize",
            Some(token.as_str()),
            Some(json!({ "youtubeUrl": url })),
        )
    };

    let (status, body) = summarize("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["remaining"], 1);
    assert_eq!(body["summary"]["video_id"], "dQw4w9WgXcQ");
    assert_eq!(body["summary"]["video_title"], "Systems Lecture");
    assert_eq!(
        body["summary"]["thumbnail_url"],
        "https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
    );
    assert!(body["summary"]["summary_text"]
        .as_str()
        .unwrap()
        .starts_with("### Title: Systems Lecture\n\n"));

    let (status, body) = summarize("https://youtu.be/noCaptions1").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (status, body) = summarize("not a url").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Invalid YouTube URL. Please provide a valid youtube.com or youtu.be link."
    );

    let (status, body) = summarize("https://youtu.be/dQw4w9WgXcQ").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["remaining"], 0);

    let (status, body) = summarize("https://youtu.be/dQw4w9WgXcQ").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["remaining"], 0);
    assert_eq!(
        body["error"],
        "Daily limit reached (2 summaries/day). Try again tomorrow."
    );
}

#[tokio::test]
async fn test_summary_listing_and_deletion() {
    let app = spawn_app(|_| {}).await;
    let (_, token) = app.approved_user("viewer@example.com").await;
    let (_, stranger) = app.approved_user("nosy@example.com").await;

    let (_, body) = app
        .call(
            Method::POST,
            "/api/ai/summarize",
            Some(token.as_str()),
            Some(json!({ "youtubeUrl": "https://youtu.be/dQw4w9WgXcQ" })),
        )
        .await;
    let id = body["summary"]["id"].as_str().unwrap().to_string();

    let (_, body) = app.get("/api/ai/summaries", &token).await;
    assert_eq!(body["summaries"].as_array().unwrap().len(), 1);

    let (status, body) = app.get(&format!("/api/ai/summaries/{id}"), &stranger).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Summary not found");

    let (_, body) = app.get("/api/ai/stats", ADMIN_TOKEN).await;
    assert_eq!(body["stats"]["totalSummaries"], 1);
    assert_eq!(body["stats"]["todaySummaries"], 1);
    assert_eq!(body["stats"]["topUsers"][0]["email"], "viewer@example.com");

    let (status, _) = app.get("/api/ai/stats", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/ai/summaries/{id}"), Some(token.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Summary deleted");

    let (status, _) = app.get(&format!("/api/ai/summaries/{id}"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
