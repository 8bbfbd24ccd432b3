//! PDF text extraction
//!
//! Extracts permit text page by page and splits every page into paragraphs,
//! producing the `(text, page, paragraph)` segments used for citations.
//!
//! # Example
//! ```no_run
//! use shared_pdf::{ExtractionError, PdfExtractor};
//!
//! fn load_permit(pdf_bytes: &[u8]) -> Result<(), ExtractionError> {
//!     let document = PdfExtractor::extract(pdf_bytes)?;
//!     println!("Extracted {} segments", document.segments.len());
//!     println!("Total text length: {}", document.full_text.len());
//!     Ok(())
//! }
//! ```

use crate::metadata::PdfMetadata;
use pdf_extract::extract_text_from_mem;
use serde::{Deserialize, Serialize};
use shared_types::{hash_document, TextSegment};
use std::path::Path;
use thiserror::Error;

/// Reasons a permit file could not be read
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    #[error("PDF is password protected")]
    PasswordProtected,

    #[error("Text extraction failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main PDF extraction interface
pub struct PdfExtractor;

impl PdfExtractor {
    /// Extract text, paragraph segments and metadata from PDF bytes.
    ///
    /// Sparse text is not an error here; whether there is enough text to
    /// analyse is decided by the caller.
    ///
    /// # Errors
    /// - `ExtractionError::InvalidPdf` - The PDF is malformed or corrupted
    /// - `ExtractionError::PasswordProtected` - The PDF requires a password
    /// - `ExtractionError::Failed` - Other extraction failures
    pub fn extract(pdf_bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
        let full_text = extract_text_from_mem(pdf_bytes).map_err(|e| {
            let error_msg = e.to_string().to_lowercase();

            if error_msg.contains("encrypted") || error_msg.contains("password") {
                ExtractionError::PasswordProtected
            } else if error_msg.contains("invalid")
                || error_msg.contains("malformed")
                || error_msg.contains("corrupt")
            {
                ExtractionError::InvalidPdf(e.to_string())
            } else {
                ExtractionError::Failed(e.to_string())
            }
        })?;

        let segments = segment_text(&full_text);
        let metadata = PdfMetadata::read(pdf_bytes).unwrap_or_else(|| PdfMetadata {
            page_count: page_count(&segments),
            ..Default::default()
        });

        tracing::debug!(
            pages = metadata.page_count,
            segments = segments.len(),
            "extracted permit text"
        );

        Ok(ExtractedDocument {
            full_text,
            segments,
            metadata,
            content_hash: hash_document(pdf_bytes),
        })
    }

    /// Read and extract a file. `.pdf` files go through [`PdfExtractor::extract`],
    /// anything else is taken as UTF-8 text with form feeds as page breaks.
    pub fn extract_file(path: &Path) -> Result<ExtractedDocument, ExtractionError> {
        let source_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        let mut document = if is_pdf {
            Self::extract(&std::fs::read(path)?)?
        } else {
            Self::from_text(&std::fs::read_to_string(path)?)
        };
        document.metadata.source_name = source_name;
        Ok(document)
    }

    /// Build a document from text that was already extracted elsewhere.
    pub fn from_text(text: &str) -> ExtractedDocument {
        let segments = segment_text(text);
        let metadata = PdfMetadata {
            page_count: page_count(&segments),
            ..Default::default()
        };
        ExtractedDocument {
            full_text: text.to_string(),
            segments,
            metadata,
            content_hash: hash_document(text.as_bytes()),
        }
    }
}

/// A permit's extracted text with locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub full_text: String,

    /// Paragraphs in reading order
    pub segments: Vec<TextSegment>,

    pub metadata: PdfMetadata,

    /// SHA-256 of the source bytes
    pub content_hash: String,
}

impl ExtractedDocument {
    /// Heuristic for image-only scans: almost no non-whitespace text.
    pub fn looks_scanned(&self) -> bool {
        let non_whitespace = self
            .full_text
            .chars()
            .filter(|c| !c.is_whitespace())
            .count();
        non_whitespace < 20
    }
}

/// Split text into pages on form feeds and pages into paragraphs on blank lines.
///
/// Pages keep their physical number even when empty, so citations line up
/// with the PDF viewer.
pub fn segment_text(text: &str) -> Vec<TextSegment> {
    let mut segments = Vec::new();

    for (page_idx, page_text) in text.split('\x0C').enumerate() {
        let page = page_idx as u32 + 1;
        let mut paragraph = 0u32;
        let mut current: Vec<&str> = Vec::new();

        for line in page_text.lines() {
            let line = line.trim();
            if line.is_empty() {
                if !current.is_empty() {
                    paragraph += 1;
                    segments.push(TextSegment::new(current.join(" "), page, paragraph));
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            paragraph += 1;
            segments.push(TextSegment::new(current.join(" "), page, paragraph));
        }
    }

    segments
}

fn page_count(segments: &[TextSegment]) -> usize {
    segments.iter().map(|s| s.page as usize).max().unwrap_or(0)
}
