//! Text extraction, one extractor per declared document type

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::VisionProvider;
use crate::types::{DocumentType, ImageFormat};

/// Instruction sent with every image
pub const OCR_INSTRUCTION: &str =
    "Extract all text from this image. Return ONLY the text, no conversational filler.";

/// Turns the raw bytes of one document type into plain text
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, data: &[u8]) -> Result<String>;
}

/// Raw bytes read as UTF-8
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, data: &[u8]) -> Result<String> {
        let text = String::from_utf8_lossy(data);
        Ok(text.strip_prefix('\u{feff}').unwrap_or(&text).to_string())
    }
}

/// PDF text via pdf-extract, with a page-by-page lopdf fallback
pub struct PdfExtractor;

impl PdfExtractor {
    fn extract_blocking(data: &[u8]) -> Result<String> {
        match pdf_extract::extract_text_from_mem(data) {
            Ok(text) if !text.trim().is_empty() => Ok(clean_pdf_text(&text)),
            Ok(_) => {
                tracing::warn!("pdf-extract returned no text, trying fallback");
                Self::extract_fallback(data)
            }
            Err(e) => {
                tracing::warn!("pdf-extract failed: {}, trying fallback", e);
                Self::extract_fallback(data)
            }
        }
    }

    fn extract_fallback(data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::extraction(format!("Failed to load PDF: {}", e)))?;

        let mut text = String::new();
        for page_number in doc.get_pages().keys() {
            match doc.extract_text(&[*page_number]) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => tracing::debug!("Could not extract text from page {}: {}", page_number, e),
            }
        }

        Ok(clean_pdf_text(&text))
    }
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, data: &[u8]) -> Result<String> {
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || Self::extract_blocking(&data))
            .await
            .map_err(|e| Error::extraction(format!("PDF extraction task failed: {}", e)))?
    }
}

/// Drop NUL characters and blank lines left behind by PDF text layers
fn clean_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// DOCX paragraphs, one line each
pub struct DocxExtractor;

impl DocxExtractor {
    fn extract_blocking(data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::extraction(format!("Failed to read DOCX: {}", e)))?;

        let mut content = String::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                content.push_str(&t.text);
                            }
                        }
                    }
                }
                content.push('\n');
            }
        }

        Ok(content)
    }
}

#[async_trait]
impl TextExtractor for DocxExtractor {
    async fn extract(&self, data: &[u8]) -> Result<String> {
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || Self::extract_blocking(&data))
            .await
            .map_err(|e| Error::extraction(format!("DOCX extraction task failed: {}", e)))?
    }
}

/// OCR through a multimodal model
pub struct ImageExtractor {
    vision: Arc<dyn VisionProvider>,
    format: ImageFormat,
}

impl ImageExtractor {
    pub fn new(vision: Arc<dyn VisionProvider>, format: ImageFormat) -> Self {
        Self { vision, format }
    }
}

#[async_trait]
impl TextExtractor for ImageExtractor {
    async fn extract(&self, data: &[u8]) -> Result<String> {
        self.vision
            .extract_text(data, self.format.mime_type(), OCR_INSTRUCTION)
            .await
            .map_err(|e| Error::extraction(format!("Image OCR failed: {}", e)))
    }
}

/// Dispatch table from declared type to extractor
pub struct ExtractorRegistry {
    extractors: HashMap<DocumentType, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Registry with the standard extractor for every accepted type
    pub fn new(vision: Arc<dyn VisionProvider>) -> Self {
        let mut registry = Self::empty();
        for doc_type in DocumentType::ALL {
            let extractor: Arc<dyn TextExtractor> = match doc_type {
                DocumentType::Pdf => Arc::new(PdfExtractor),
                DocumentType::Txt => Arc::new(PlainTextExtractor),
                DocumentType::Docx => Arc::new(DocxExtractor),
                DocumentType::Image(format) => {
                    Arc::new(ImageExtractor::new(Arc::clone(&vision), format))
                }
            };
            registry.register(doc_type, extractor);
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register or replace the extractor for a type
    pub fn register(&mut self, doc_type: DocumentType, extractor: Arc<dyn TextExtractor>) {
        self.extractors.insert(doc_type, extractor);
    }

    pub fn get(&self, doc_type: DocumentType) -> Option<&Arc<dyn TextExtractor>> {
        self.extractors.get(&doc_type)
    }

    /// Extract in-memory bytes of a declared type
    pub async fn extract(&self, doc_type: DocumentType, data: &[u8]) -> Result<String> {
        let extractor = self.get(doc_type).ok_or_else(|| {
            Error::extraction(format!("No extractor registered for {}", doc_type))
        })?;

        extractor.extract(data).await.map_err(|e| match e {
            Error::Extraction(_) => e,
            other => Error::extraction(other.to_string()),
        })
    }

    /// Read a stored file and extract its text
    pub async fn extract_file(&self, path: &Path, doc_type: DocumentType) -> Result<String> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            Error::extraction(format!("File not found at path {}: {}", path.display(), e))
        })?;

        self.extract(doc_type, &data).await
    }
}
