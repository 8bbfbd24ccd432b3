//! Regulatory catalog entities supplied by the knowledge base.

use serde::{Deserialize, Serialize};

/// Where a piece of regulatory text comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    /// Source document, e.g. "BREF IRPP 2017" or "IED 2010/75/EU".
    pub document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Paragraph or conclusion label ("BAT 12", "Art. 14(1)(a)").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<String>,
}

impl SourceCitation {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            page: None,
            paragraph: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_paragraph(mut self, paragraph: impl Into<String>) -> Self {
        self.paragraph = Some(paragraph.into());
        self
    }

    /// Human readable locator, e.g. `BREF IRPP, p. 12, BAT 3`.
    pub fn label(&self) -> String {
        let mut label = self.document.clone();
        if let Some(page) = self.page {
            label.push_str(&format!(", p. {}", page));
        }
        if let Some(ref paragraph) = self.paragraph {
            label.push_str(&format!(", {}", paragraph));
        }
        label
    }
}

/// A single, independently verifiable requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    /// Unique within its document set.
    pub id: String,
    pub title: String,
    pub full_text: String,
    pub source_citation: SourceCitation,
}

impl Obligation {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        full_text: impl Into<String>,
        source_citation: SourceCitation,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            full_text: full_text.into(),
            source_citation,
        }
    }
}

/// How broadly a document set applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSetKind {
    /// Tied to one industrial sector (poultry/pig rearing, food and milk...).
    #[default]
    Sectoral,
    /// Cross-cutting documents such as energy efficiency or monitoring.
    Horizontal,
    /// A chapter of binding legislation.
    Statutory,
}

impl DocumentSetKind {
    pub fn name(&self) -> &'static str {
        match self {
            DocumentSetKind::Sectoral => "sectoral",
            DocumentSetKind::Horizontal => "horizontal",
            DocumentSetKind::Statutory => "statutory",
        }
    }
}

/// A regulatory reference document treated as one unit for applicability.
///
/// `obligations` is kept in authored order; that order is the canonical
/// numbering used everywhere in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSet {
    pub id: String,
    pub title: String,
    pub sector: String,
    pub scope_description: String,
    #[serde(default)]
    pub kind: DocumentSetKind,
    #[serde(default)]
    pub obligations: Vec<Obligation>,
}

impl DocumentSet {
    pub fn obligation_count(&self) -> usize {
        self.obligations.len()
    }

    /// Position and obligation for an id, if present.
    pub fn find_obligation(&self, obligation_id: &str) -> Option<(usize, &Obligation)> {
        self.obligations
            .iter()
            .enumerate()
            .find(|(_, obligation)| obligation.id == obligation_id)
    }
}
