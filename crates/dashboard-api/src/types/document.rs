//! Document and chunk types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use super::WithOwner;

/// Image formats accepted for OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// MIME type sent to the vision model
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

/// Declared document type, fixed at upload time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DocumentType {
    /// PDF document
    Pdf,
    /// Plain text file
    Txt,
    /// Microsoft Word document (.docx)
    Docx,
    /// Image, text recovered by OCR
    Image(ImageFormat),
}

impl DocumentType {
    /// Every accepted type
    pub const ALL: [DocumentType; 6] = [
        Self::Pdf,
        Self::Txt,
        Self::Docx,
        Self::Image(ImageFormat::Jpeg),
        Self::Image(ImageFormat::Png),
        Self::Image(ImageFormat::Webp),
    ];

    /// Map an upload MIME type onto the allow-list
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "text/plain" => Some(Self::Txt),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "image/jpeg" | "image/jpg" => Some(Self::Image(ImageFormat::Jpeg)),
            "image/png" => Some(Self::Image(ImageFormat::Png)),
            "image/webp" => Some(Self::Image(ImageFormat::Webp)),
            _ => None,
        }
    }

    /// Parse the persisted type string
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Txt),
            "docx" => Some(Self::Docx),
            "jpeg" | "jpg" => Some(Self::Image(ImageFormat::Jpeg)),
            "png" => Some(Self::Image(ImageFormat::Png)),
            "webp" => Some(Self::Image(ImageFormat::Webp)),
            _ => None,
        }
    }

    /// Persisted type string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Docx => "docx",
            Self::Image(ImageFormat::Jpeg) => "jpeg",
            Self::Image(ImageFormat::Png) => "png",
            Self::Image(ImageFormat::Webp) => "webp",
        }
    }

    /// Check if text comes from OCR
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DocumentType> for String {
    fn from(value: DocumentType) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for DocumentType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown document type: {}", value))
    }
}

/// Document lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Accepted, extraction pending or running
    Processing,
    /// Chunks stored, ready for questions
    Ready,
    /// Extraction failed or produced no text
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "processing" => Some(Self::Processing),
            "ready" => Some(Self::Ready),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// An uploaded document
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Original filename as uploaded
    pub filename: String,
    /// Location of the stored upload
    #[serde(skip_serializing)]
    pub file_path: PathBuf,
    pub file_type: DocumentType,
    pub file_size: u64,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a document in the initial `processing` state
    pub fn new(
        user_id: Uuid,
        filename: String,
        file_path: PathBuf,
        file_type: DocumentType,
        file_size: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            filename,
            file_path,
            file_type,
            file_size,
            status: DocumentStatus::Processing,
            created_at: Utc::now(),
        }
    }
}

/// Single-document view with chunk count
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetails {
    #[serde(flatten)]
    pub document: WithOwner<Document>,
    pub chunk_count: usize,
}

/// A stored segment of a document's extracted text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Zero-based position in the document
    pub chunk_index: u32,
    pub content: String,
}

impl Chunk {
    pub fn new(document_id: Uuid, chunk_index: u32, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            chunk_index,
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_allow_list() {
        assert_eq!(DocumentType::from_mime("application/pdf"), Some(DocumentType::Pdf));
        assert_eq!(
            DocumentType::from_mime("text/plain; charset=utf-8"),
            Some(DocumentType::Txt)
        );
        assert_eq!(
            DocumentType::from_mime("image/webp"),
            Some(DocumentType::Image(ImageFormat::Webp))
        );
        assert_eq!(DocumentType::from_mime("application/zip"), None);
        assert_eq!(DocumentType::from_mime("image/gif"), None);
    }

    #[test]
    fn test_type_string_round_trips_through_storage_form() {
        for doc_type in DocumentType::ALL {
            assert_eq!(DocumentType::parse(doc_type.as_str()), Some(doc_type));
        }
        assert_eq!(DocumentType::parse("jpg"), Some(DocumentType::Image(ImageFormat::Jpeg)));
    }

    #[test]
    fn test_status_serializes_verbatim() {
        let json = serde_json::to_string(&DocumentStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        assert_eq!(DocumentStatus::parse("ready"), Some(DocumentStatus::Ready));
    }

    #[test]
    fn test_document_json_hides_storage_path() {
        let doc = Document::new(
            Uuid::new_v4(),
            "notes.txt".to_string(),
            PathBuf::from("/srv/uploads/u/notes.txt"),
            DocumentType::Txt,
            12,
        );
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("file_path").is_none());
        assert_eq!(json["file_type"], "txt");
        assert_eq!(json["status"], "processing");
    }
}
