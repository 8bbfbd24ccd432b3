//! Permit text extraction
//!
//! Turns permit files into the `(text, page, paragraph)` segments the
//! compliance engine cites from, plus whatever document metadata the file
//! carries.

pub mod extract;
pub mod metadata;

pub use extract::{ExtractedDocument, ExtractionError, PdfExtractor};
pub use metadata::PdfMetadata;
