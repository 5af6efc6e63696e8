//! On-disk storage for uploaded files

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::Result;

/// Stores uploads under `<root>/<user_id>/<timestamp>-<random>-<sanitized name>`
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an upload and return where it landed
    pub async fn save(&self, user_id: Uuid, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let dir = self.root.join(user_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let suffix = Uuid::new_v4().simple().to_string();
        let stored_name = format!(
            "{}-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            &suffix[..8],
            sanitize_filename(filename)
        );

        let path = dir.join(stored_name);
        tokio::fs::write(&path, data).await?;
        tracing::debug!("Stored upload {} ({} bytes)", path.display(), data.len());

        Ok(path)
    }

    /// Remove a stored file. A file that is already gone only produces a warning.
    pub async fn remove(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Removed upload {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Upload already missing: {}", path.display());
            }
            Err(e) => tracing::warn!("Failed to remove upload {}: {}", path.display(), e),
        }
    }
}

/// Keep ASCII letters, digits, dots, dashes and underscores; replace the rest
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
