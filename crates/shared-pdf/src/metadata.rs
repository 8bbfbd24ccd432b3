//! Document information dictionary lookup via lopdf.

use lopdf::{Dictionary, Document, Object};
use serde::{Deserialize, Serialize};

/// PDF document metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfMetadata {
    /// Total number of pages in the document
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    /// Raw `Keywords` entry, often a `;` or `,` separated list
    pub keywords: Option<String>,
    /// File name the document was read from, when known
    pub source_name: Option<String>,
}

impl PdfMetadata {
    /// Read the Info dictionary. Returns `None` when lopdf cannot parse the file;
    /// metadata is best-effort and never fails extraction.
    pub fn read(pdf_bytes: &[u8]) -> Option<Self> {
        let document = match Document::load_mem(pdf_bytes) {
            Ok(document) => document,
            Err(e) => {
                tracing::debug!("PDF metadata unavailable: {}", e);
                return None;
            }
        };

        let mut metadata = PdfMetadata {
            page_count: document.get_pages().len(),
            ..Default::default()
        };

        if let Some(info) = info_dictionary(&document) {
            metadata.title = text_entry(info, b"Title");
            metadata.author = text_entry(info, b"Author");
            metadata.subject = text_entry(info, b"Subject");
            metadata.keywords = text_entry(info, b"Keywords");
        }

        Some(metadata)
    }

    /// Keyword list split on `;` and `,`
    pub fn keyword_list(&self) -> Vec<String> {
        self.keywords
            .as_deref()
            .map(|raw| {
                raw.split([';', ','])
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn text_entry(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            let text = decode_pdf_string(bytes);
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

/// PDF text strings are UTF-16BE when they start with a BOM, otherwise
/// (close enough to) Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}
