//! SQLite database for users, documents, chunks, summaries and usage counters
//!
//! Every public method takes the connection lock for its own duration, so each call is
//! one unit of work from the point of view of other callers.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    Chunk, Document, DocumentStatus, DocumentType, Role, SummaryStats, TopUser, User,
    UserStats, UserStatus, VideoSummary, WithOwner,
};

/// Kind of metered action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    Summary,
    Question,
}

impl QuotaKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Question => "question",
        }
    }
}

/// Outcome of a quota reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Reservation recorded; `remaining` uses left today
    Granted { remaining: u32 },
    /// Limit already reached
    Exhausted,
}

/// SQLite-backed store
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (tests and ephemeral runs)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            "#,
        )?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                status TEXT NOT NULL DEFAULT 'pending',
                token_hash TEXT NOT NULL UNIQUE,
                password_hash TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_status ON users(status);

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'processing',
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_documents_user_id ON documents(user_id);
            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);

            CREATE TABLE IF NOT EXISTS document_chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE,
                UNIQUE(document_id, chunk_index)
            );

            CREATE INDEX IF NOT EXISTS idx_document_chunks_document_id ON document_chunks(document_id);

            CREATE TABLE IF NOT EXISTS video_summaries (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                youtube_url TEXT NOT NULL,
                video_id TEXT NOT NULL,
                video_title TEXT NOT NULL,
                thumbnail_url TEXT NOT NULL,
                summary_text TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_video_summaries_user_id ON video_summaries(user_id);
            CREATE INDEX IF NOT EXISTS idx_video_summaries_created_at ON video_summaries(created_at);

            CREATE TABLE IF NOT EXISTS daily_usage (
                user_id TEXT NOT NULL,
                usage_day TEXT NOT NULL,
                kind TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, usage_day, kind),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            "#,
        )?;

        // Databases created before password login lack the column
        let has_password: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info('users') WHERE name = 'password_hash'",
            [],
            |row| row.get(0),
        )?;
        if has_password == 0 {
            conn.execute("ALTER TABLE users ADD COLUMN password_hash TEXT", [])?;
        }

        tracing::info!("Database migrations complete");
        Ok(())
    }

    // ==================== User Operations ====================

    /// Insert a user with the hash of its API token
    pub fn insert_user(&self, user: &User, token_hash: &str) -> Result<()> {
        self.insert_account(user, token_hash, None)
    }

    /// Insert a user that can also sign in with a password
    pub fn insert_user_with_password(
        &self,
        user: &User,
        token_hash: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.insert_account(user, token_hash, Some(password_hash))
    }

    fn insert_account(&self, user: &User, token_hash: &str, password_hash: Option<&str>) -> Result<()> {
        let conn = self.conn.lock();

        let inserted = conn.execute(
            r#"
            INSERT INTO users (id, email, name, role, status, token_hash, password_hash, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                user.id.to_string(),
                user.email,
                user.name,
                user.role.as_str(),
                user.status.as_str(),
                token_hash,
                password_hash,
                timestamp(&user.created_at),
                timestamp(&user.updated_at),
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(Error::Conflict("Email already registered".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve an API token hash to its user
    pub fn find_user_by_token_hash(&self, token_hash: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE token_hash = ?1", USER_COLUMNS),
                params![token_hash],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Get a user by ID
    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id.to_string()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Get a user by (case-insensitive) email
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email.trim().to_lowercase()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// A user and their password hash, if they have one, for sign-in
    pub fn find_credentials(&self, email: &str) -> Result<Option<(User, Option<String>)>> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                &format!(
                    "SELECT {}, password_hash FROM users WHERE email = ?1",
                    USER_COLUMNS
                ),
                params![email.trim().to_lowercase()],
                |row| Ok((row_to_user(row)?, row.get::<_, Option<String>>(7)?)),
            )
            .optional()?;
        Ok(found)
    }

    /// List users, newest first, optionally filtered by status
    pub fn list_users(&self, status: Option<UserStatus>) -> Result<Vec<User>> {
        let conn = self.conn.lock();

        let users = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM users WHERE status = ?1 ORDER BY created_at DESC",
                    USER_COLUMNS
                ))?;
                let rows = stmt.query_map(params![status.as_str()], row_to_user)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM users ORDER BY created_at DESC",
                    USER_COLUMNS
                ))?;
                let rows = stmt.query_map([], row_to_user)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        Ok(users)
    }

    /// Change a user's approval status
    pub fn set_user_status(&self, id: Uuid, status: UserStatus) -> Result<Option<User>> {
        {
            let conn = self.conn.lock();
            let updated = conn.execute(
                "UPDATE users SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), timestamp(&Utc::now()), id.to_string()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
        }
        self.get_user(id)
    }

    /// Replace a user's API token hash
    pub fn set_user_token_hash(&self, id: Uuid, token_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE users SET token_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![token_hash, timestamp(&Utc::now()), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// Replace a user's password hash
    pub fn set_user_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![password_hash, timestamp(&Utc::now()), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// Delete a user and everything they own.
    ///
    /// Returns the stored file paths of the user's documents so the caller can remove them,
    /// or `None` when the user does not exist.
    pub fn delete_user(&self, id: Uuid) -> Result<Option<Vec<PathBuf>>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let paths = {
            let mut stmt = tx.prepare("SELECT file_path FROM documents WHERE user_id = ?1")?;
            let rows = stmt.query_map(params![id.to_string()], |row| row.get::<_, String>(0))?;
            rows.map(|r| r.map(PathBuf::from))
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let deleted = tx.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;

        Ok((deleted > 0).then_some(paths))
    }

    /// Account counts by status
    pub fn user_stats(&self) -> Result<UserStats> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM users GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = UserStats::default();
        for row in rows {
            let (status, count) = row?;
            let count = count as usize;
            stats.total += count;
            match UserStatus::parse(&status) {
                Some(UserStatus::Pending) => stats.pending += count,
                Some(UserStatus::Approved) => stats.approved += count,
                Some(UserStatus::Rejected) => stats.rejected += count,
                None => tracing::warn!("Unknown user status in database: {}", status),
            }
        }

        Ok(stats)
    }

    // ==================== Document Operations ====================

    /// Insert a document row
    pub fn insert_document(&self, doc: &Document) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO documents (id, user_id, filename, file_path, file_type, file_size, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                doc.id.to_string(),
                doc.user_id.to_string(),
                doc.filename,
                doc.file_path.to_string_lossy(),
                doc.file_type.as_str(),
                doc.file_size as i64,
                doc.status.as_str(),
                timestamp(&doc.created_at),
            ],
        )?;

        Ok(())
    }

    /// Get a document by ID
    pub fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let doc = conn
            .query_row(
                &format!("SELECT {} FROM documents d WHERE d.id = ?1", DOCUMENT_COLUMNS),
                params![id.to_string()],
                row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    /// Get a document joined with its owner
    pub fn get_document_with_owner(&self, id: Uuid) -> Result<Option<WithOwner<Document>>> {
        let conn = self.conn.lock();
        let doc = conn
            .query_row(
                &format!(
                    "SELECT {}, u.name, u.email FROM documents d JOIN users u ON d.user_id = u.id WHERE d.id = ?1",
                    DOCUMENT_COLUMNS
                ),
                params![id.to_string()],
                |row| row_to_owned(row, row_to_document, 8),
            )
            .optional()?;
        Ok(doc)
    }

    /// A user's documents, newest first
    pub fn list_documents_for_user(&self, user_id: Uuid) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents d WHERE d.user_id = ?1 ORDER BY d.created_at DESC",
            DOCUMENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id.to_string()], row_to_document)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All documents with owner details, newest first
    pub fn list_all_documents(&self) -> Result<Vec<WithOwner<Document>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, u.name, u.email FROM documents d JOIN users u ON d.user_id = u.id ORDER BY d.created_at DESC",
            DOCUMENT_COLUMNS
        ))?;
        let rows = stmt.query_map([], |row| row_to_owned(row, row_to_document, 8))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Documents currently in a given status, oldest first
    pub fn list_documents_by_status(&self, status: DocumentStatus) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents d WHERE d.status = ?1 ORDER BY d.created_at ASC",
            DOCUMENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![status.as_str()], row_to_document)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Set a document's status. Returns false when the document no longer exists.
    pub fn update_document_status(&self, id: Uuid, status: DocumentStatus) -> Result<bool> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE documents SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// Move a processing document to `error`. Terminal documents are left alone.
    pub fn mark_document_failed(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE documents SET status = 'error' WHERE id = ?1 AND status = 'processing'",
            params![id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// Move a document from `error` back to `processing` for a manual retry
    pub fn reset_failed_document(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE documents SET status = 'processing' WHERE id = ?1 AND status = 'error'",
            params![id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// Delete a document and its chunks in one transaction
    pub fn delete_document(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM document_chunks WHERE document_id = ?1",
            params![id.to_string()],
        )?;
        let deleted = tx.execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;

        Ok(deleted > 0)
    }

    // ==================== Chunk Operations ====================

    /// Replace a processing document's chunks and mark it ready, atomically.
    ///
    /// Returns false without writing anything when the document is gone or is no longer
    /// `processing`, which makes repeated deliveries of the same job harmless.
    pub fn store_chunks_and_mark_ready(&self, document_id: Uuid, chunks: &[Chunk]) -> Result<bool> {
        if chunks.is_empty() {
            return Err(Error::internal("refusing to mark a document ready without chunks"));
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM documents WHERE id = ?1",
                params![document_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        if status.as_deref() != Some(DocumentStatus::Processing.as_str()) {
            return Ok(false);
        }

        tx.execute(
            "DELETE FROM document_chunks WHERE document_id = ?1",
            params![document_id.to_string()],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO document_chunks (id, document_id, chunk_index, content) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.id.to_string(),
                    document_id.to_string(),
                    chunk.chunk_index as i64,
                    chunk.content,
                ])?;
            }
        }

        tx.execute(
            "UPDATE documents SET status = 'ready' WHERE id = ?1",
            params![document_id.to_string()],
        )?;
        tx.commit()?;

        Ok(true)
    }

    /// All chunks of a document in document order
    pub fn get_chunks(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, document_id, chunk_index, content FROM document_chunks WHERE document_id = ?1 ORDER BY chunk_index",
        )?;
        let rows = stmt.query_map(params![document_id.to_string()], |row| {
            let id: String = row.get(0)?;
            let document_id: String = row.get(1)?;
            Ok(Chunk {
                id: parse_uuid(0, &id)?,
                document_id: parse_uuid(1, &document_id)?,
                chunk_index: row.get::<_, i64>(2)? as u32,
                content: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Number of chunks stored for a document
    pub fn count_chunks(&self, document_id: Uuid) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM document_chunks WHERE document_id = ?1",
            params![document_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ==================== Summary Operations ====================

    /// Insert a video summary
    pub fn insert_summary(&self, summary: &VideoSummary) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO video_summaries (id, user_id, youtube_url, video_id, video_title, thumbnail_url, summary_text, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                summary.id.to_string(),
                summary.user_id.to_string(),
                summary.youtube_url,
                summary.video_id,
                summary.video_title,
                summary.thumbnail_url,
                summary.summary_text,
                timestamp(&summary.created_at),
            ],
        )?;
        Ok(())
    }

    /// Get a summary joined with its owner
    pub fn get_summary(&self, id: Uuid) -> Result<Option<WithOwner<VideoSummary>>> {
        let conn = self.conn.lock();
        let summary = conn
            .query_row(
                &format!(
                    "SELECT {}, u.name, u.email FROM video_summaries s JOIN users u ON s.user_id = u.id WHERE s.id = ?1",
                    SUMMARY_COLUMNS
                ),
                params![id.to_string()],
                |row| row_to_owned(row, row_to_summary, 8),
            )
            .optional()?;
        Ok(summary)
    }

    /// A user's summaries, newest first
    pub fn list_summaries_for_user(&self, user_id: Uuid) -> Result<Vec<VideoSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM video_summaries s WHERE s.user_id = ?1 ORDER BY s.created_at DESC",
            SUMMARY_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id.to_string()], row_to_summary)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All summaries with owner details, newest first
    pub fn list_all_summaries(&self) -> Result<Vec<WithOwner<VideoSummary>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, u.name, u.email FROM video_summaries s JOIN users u ON s.user_id = u.id ORDER BY s.created_at DESC",
            SUMMARY_COLUMNS
        ))?;
        let rows = stmt.query_map([], |row| row_to_owned(row, row_to_summary, 8))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a summary
    pub fn delete_summary(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM video_summaries WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    /// Totals for the admin dashboard; "today" starts at `day_start`
    pub fn summary_stats(&self, day_start: DateTime<Utc>) -> Result<SummaryStats> {
        let conn = self.conn.lock();

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM video_summaries", [], |row| row.get(0))?;
        let today: i64 = conn.query_row(
            "SELECT COUNT(*) FROM video_summaries WHERE created_at >= ?1",
            params![timestamp(&day_start)],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            r#"
            SELECT u.name, u.email, COUNT(s.id) AS summary_count
            FROM video_summaries s
            JOIN users u ON s.user_id = u.id
            GROUP BY u.id, u.name, u.email
            ORDER BY summary_count DESC
            LIMIT 5
            "#,
        )?;
        let top_users = stmt
            .query_map([], |row| {
                Ok(TopUser {
                    name: row.get(0)?,
                    email: row.get(1)?,
                    summary_count: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(SummaryStats {
            total_summaries: total as usize,
            today_summaries: today as usize,
            top_users,
        })
    }

    // ==================== Quota Operations ====================

    /// Reserve one use of `kind` for `user_id` on `day`, unless `limit` is already reached.
    ///
    /// Read and increment happen inside one IMMEDIATE transaction, so concurrent callers
    /// cannot both take the last slot.
    pub fn try_consume_quota(
        &self,
        user_id: Uuid,
        kind: QuotaKind,
        day: NaiveDate,
        limit: u32,
    ) -> Result<QuotaDecision> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let used: i64 = tx
            .query_row(
                "SELECT count FROM daily_usage WHERE user_id = ?1 AND usage_day = ?2 AND kind = ?3",
                params![user_id.to_string(), day.to_string(), kind.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);

        if used >= limit as i64 {
            return Ok(QuotaDecision::Exhausted);
        }

        tx.execute(
            r#"
            INSERT INTO daily_usage (user_id, usage_day, kind, count) VALUES (?1, ?2, ?3, 1)
            ON CONFLICT(user_id, usage_day, kind) DO UPDATE SET count = count + 1
            "#,
            params![user_id.to_string(), day.to_string(), kind.as_str()],
        )?;
        tx.commit()?;

        Ok(QuotaDecision::Granted {
            remaining: limit - (used as u32) - 1,
        })
    }

    /// Give back a reservation whose work failed
    pub fn release_quota(&self, user_id: Uuid, kind: QuotaKind, day: NaiveDate) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE daily_usage SET count = MAX(count - 1, 0) WHERE user_id = ?1 AND usage_day = ?2 AND kind = ?3",
            params![user_id.to_string(), day.to_string(), kind.as_str()],
        )?;
        Ok(())
    }

    /// Uses of `kind` recorded for `user_id` on `day`
    pub fn quota_used(&self, user_id: Uuid, kind: QuotaKind, day: NaiveDate) -> Result<u32> {
        let conn = self.conn.lock();
        let used: Option<i64> = conn
            .query_row(
                "SELECT count FROM daily_usage WHERE user_id = ?1 AND usage_day = ?2 AND kind = ?3",
                params![user_id.to_string(), day.to_string(), kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(used.unwrap_or(0) as u32)
    }
}

// ==================== Row Mapping ====================

const USER_COLUMNS: &str = "id, email, name, role, status, created_at, updated_at";

const DOCUMENT_COLUMNS: &str =
    "d.id, d.user_id, d.filename, d.file_path, d.file_type, d.file_size, d.status, d.created_at";

const SUMMARY_COLUMNS: &str = "s.id, s.user_id, s.youtube_url, s.video_id, s.video_title, s.thumbnail_url, s.summary_text, s.created_at";

/// Fixed-width UTC timestamps so text comparison matches time order
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn invalid_value(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    conversion_error(
        idx,
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("invalid {}: {}", what, value),
        ),
    )
}

fn parse_uuid(idx: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| conversion_error(idx, e))
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let role: String = row.get(3)?;
    let status: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(User {
        id: parse_uuid(0, &id)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: Role::parse(&role).ok_or_else(|| invalid_value(3, "role", &role))?,
        status: UserStatus::parse(&status).ok_or_else(|| invalid_value(4, "status", &status))?,
        created_at: parse_timestamp(5, &created_at)?,
        updated_at: parse_timestamp(6, &updated_at)?,
    })
}

fn row_to_document(row: &Row) -> rusqlite::Result<Document> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let file_path: String = row.get(3)?;
    let file_type: String = row.get(4)?;
    let file_size: i64 = row.get(5)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(7)?;

    Ok(Document {
        id: parse_uuid(0, &id)?,
        user_id: parse_uuid(1, &user_id)?,
        filename: row.get(2)?,
        file_path: PathBuf::from(file_path),
        file_type: DocumentType::parse(&file_type)
            .ok_or_else(|| invalid_value(4, "file type", &file_type))?,
        file_size: file_size as u64,
        status: DocumentStatus::parse(&status)
            .ok_or_else(|| invalid_value(6, "status", &status))?,
        created_at: parse_timestamp(7, &created_at)?,
    })
}

fn row_to_summary(row: &Row) -> rusqlite::Result<VideoSummary> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let created_at: String = row.get(7)?;

    Ok(VideoSummary {
        id: parse_uuid(0, &id)?,
        user_id: parse_uuid(1, &user_id)?,
        youtube_url: row.get(2)?,
        video_id: row.get(3)?,
        video_title: row.get(4)?,
        thumbnail_url: row.get(5)?,
        summary_text: row.get(6)?,
        created_at: parse_timestamp(7, &created_at)?,
    })
}

fn row_to_owned<T>(
    row: &Row,
    map: fn(&Row) -> rusqlite::Result<T>,
    owner_offset: usize,
) -> rusqlite::Result<WithOwner<T>> {
    Ok(WithOwner {
        item: map(row)?,
        user_name: row.get(owner_offset)?,
        user_email: row.get(owner_offset + 1)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageFormat;

    fn seeded() -> (Database, User) {
        let db = Database::in_memory().unwrap();
        let user = User::pending("Reader@Example.com", "Reader");
        db.insert_user(&user, "hash-reader").unwrap();
        (db, user)
    }

    fn document_for(user: &User, status: DocumentStatus) -> Document {
        let mut doc = Document::new(
            user.id,
            "notes.txt".to_string(),
            PathBuf::from("/tmp/notes.txt"),
            DocumentType::Txt,
            42,
        );
        doc.status = status;
        doc
    }

    #[test]
    fn test_user_lookup_by_token_and_email() {
        let (db, user) = seeded();

        let by_token = db.find_user_by_token_hash("hash-reader").unwrap().unwrap();
        assert_eq!(by_token.id, user.id);
        assert_eq!(by_token.email, "reader@example.com");

        let by_email = db.find_user_by_email("READER@example.com").unwrap();
        assert!(by_email.is_some());
        assert!(db.find_user_by_token_hash("nope").unwrap().is_none());
    }

    #[test]
    fn test_credentials_lookup() {
        let (db, user) = seeded();
        let (found, password) = db.find_credentials("reader@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(password.is_none());

        assert!(db.set_user_password_hash(user.id, "phc-string").unwrap());
        let (_, password) = db.find_credentials(" READER@example.com").unwrap().unwrap();
        assert_eq!(password.as_deref(), Some("phc-string"));

        let other = User::pending("writer@example.com", "Writer");
        db.insert_user_with_password(&other, "hash-writer", "writer-phc").unwrap();
        let (_, password) = db.find_credentials("writer@example.com").unwrap().unwrap();
        assert_eq!(password.as_deref(), Some("writer-phc"));

        assert!(db.find_credentials("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let (db, _) = seeded();
        let again = User::pending("reader@example.com", "Other");
        let err = db.insert_user(&again, "hash-other").unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_status_changes_and_stats() {
        let (db, user) = seeded();
        let other = User::pending("second@example.com", "Second");
        db.insert_user(&other, "hash-second").unwrap();

        let approved = db.set_user_status(user.id, UserStatus::Approved).unwrap().unwrap();
        assert_eq!(approved.status, UserStatus::Approved);
        assert!(db.set_user_status(Uuid::new_v4(), UserStatus::Approved).unwrap().is_none());

        let stats = db.user_stats().unwrap();
        assert_eq!(stats, UserStats { total: 2, pending: 1, approved: 1, rejected: 0 });

        let pending = db.list_users(Some(UserStatus::Pending)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, other.id);
    }

    #[test]
    fn test_chunks_and_ready_transition_are_atomic() {
        let (db, user) = seeded();
        let doc = document_for(&user, DocumentStatus::Processing);
        db.insert_document(&doc).unwrap();

        let chunks = vec![
            Chunk::new(doc.id, 0, "first".to_string()),
            Chunk::new(doc.id, 1, "second".to_string()),
        ];
        assert!(db.store_chunks_and_mark_ready(doc.id, &chunks).unwrap());

        let stored = db.get_document(doc.id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Ready);
        assert_eq!(db.count_chunks(doc.id).unwrap(), 2);

        let loaded = db.get_chunks(doc.id).unwrap();
        assert_eq!(loaded[0].content, "first");
        assert_eq!(loaded[1].chunk_index, 1);

        // A second delivery of the same job is a no-op
        assert!(!db.store_chunks_and_mark_ready(doc.id, &chunks).unwrap());
        assert_eq!(db.count_chunks(doc.id).unwrap(), 2);
    }

    #[test]
    fn test_delete_document_removes_chunks() {
        let (db, user) = seeded();
        let doc = document_for(&user, DocumentStatus::Processing);
        db.insert_document(&doc).unwrap();
        db.store_chunks_and_mark_ready(doc.id, &[Chunk::new(doc.id, 0, "x".to_string())])
            .unwrap();

        assert!(db.delete_document(doc.id).unwrap());
        assert!(db.get_document(doc.id).unwrap().is_none());
        assert_eq!(db.count_chunks(doc.id).unwrap(), 0);
        assert!(!db.delete_document(doc.id).unwrap());
    }

    #[test]
    fn test_delete_user_cascades_and_returns_paths() {
        let (db, user) = seeded();
        let mut doc = document_for(&user, DocumentStatus::Processing);
        doc.file_type = DocumentType::Image(ImageFormat::Png);
        doc.file_path = PathBuf::from("/tmp/u/scan.png");
        db.insert_document(&doc).unwrap();

        let paths = db.delete_user(user.id).unwrap().unwrap();
        assert_eq!(paths, vec![PathBuf::from("/tmp/u/scan.png")]);
        assert!(db.get_document(doc.id).unwrap().is_none());
        assert!(db.delete_user(user.id).unwrap().is_none());
    }

    #[test]
    fn test_reset_only_applies_to_failed_documents() {
        let (db, user) = seeded();
        let failed = document_for(&user, DocumentStatus::Error);
        let ready = document_for(&user, DocumentStatus::Ready);
        db.insert_document(&failed).unwrap();
        db.insert_document(&ready).unwrap();

        assert!(db.reset_failed_document(failed.id).unwrap());
        assert!(!db.reset_failed_document(ready.id).unwrap());
        assert!(!db.mark_document_failed(ready.id).unwrap());
        assert_eq!(
            db.list_documents_by_status(DocumentStatus::Processing).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_quota_counter_stops_at_limit_and_refunds() {
        let (db, user) = seeded();
        let day = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();

        assert_eq!(
            db.try_consume_quota(user.id, QuotaKind::Summary, day, 2).unwrap(),
            QuotaDecision::Granted { remaining: 1 }
        );
        assert_eq!(
            db.try_consume_quota(user.id, QuotaKind::Summary, day, 2).unwrap(),
            QuotaDecision::Granted { remaining: 0 }
        );
        assert_eq!(
            db.try_consume_quota(user.id, QuotaKind::Summary, day, 2).unwrap(),
            QuotaDecision::Exhausted
        );

        // Other kinds and other days are counted separately
        assert!(matches!(
            db.try_consume_quota(user.id, QuotaKind::Question, day, 2).unwrap(),
            QuotaDecision::Granted { .. }
        ));
        let tomorrow = day.succ_opt().unwrap();
        assert_eq!(db.quota_used(user.id, QuotaKind::Summary, tomorrow).unwrap(), 0);

        db.release_quota(user.id, QuotaKind::Summary, day).unwrap();
        assert_eq!(db.quota_used(user.id, QuotaKind::Summary, day).unwrap(), 1);
    }
}
