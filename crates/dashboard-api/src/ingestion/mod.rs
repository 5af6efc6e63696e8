//! Document ingestion: text extraction and chunking

pub mod chunker;
pub mod extractor;

pub use chunker::TextChunker;
pub use extractor::{
    DocxExtractor, ExtractorRegistry, ImageExtractor, PdfExtractor, PlainTextExtractor,
    TextExtractor, OCR_INSTRUCTION,
};
