//! Permit-side entities produced once per run from extracted text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A paragraph of permit text with its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    pub text: String,
    /// 1-indexed page number.
    pub page: u32,
    /// 1-indexed paragraph number within the page.
    pub paragraph: u32,
}

impl TextSegment {
    pub fn new(text: impl Into<String>, page: u32, paragraph: u32) -> Self {
        Self {
            text: text.into(),
            page,
            paragraph,
        }
    }

    /// Short locator used in prompts and citations, e.g. `p.3 ¶2`.
    pub fn locator(&self) -> String {
        format!("p.{} ¶{}", self.page, self.paragraph)
    }
}

/// Kind of permit document, classified from its title or file name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitDocumentType {
    Decision,
    Application,
    Advice,
    EnvironmentalImpactAssessment,
    #[default]
    Other,
}

impl PermitDocumentType {
    pub fn name(&self) -> &'static str {
        match self {
            PermitDocumentType::Decision => "decision",
            PermitDocumentType::Application => "application",
            PermitDocumentType::Advice => "advice",
            PermitDocumentType::EnvironmentalImpactAssessment => "environmental impact assessment",
            PermitDocumentType::Other => "other",
        }
    }
}

/// A capacity figure found in the permit text (e.g. `50 MW`, `2500 plaatsen`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capacity {
    pub value: f64,
    pub unit: String,
    /// The matched text as it appears in the permit.
    pub raw: String,
}

/// Structured view of a permit used for matching and verification.
///
/// Built once per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermitProfile {
    pub permit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub document_type: PermitDocumentType,
    pub declared_activities: BTreeSet<String>,
    pub sector_hints: BTreeSet<String>,
    pub capacities: Vec<Capacity>,
    /// Activity description lines taken from the permit's activity section.
    pub activity_description: String,
    pub raw_text: String,
    pub text_segments: Vec<TextSegment>,
}

impl PermitProfile {
    /// Highest page number referenced by any segment.
    pub fn page_count(&self) -> u32 {
        self.text_segments
            .iter()
            .map(|segment| segment.page)
            .max()
            .unwrap_or(0)
    }

    /// Whether a segment exists at the given location.
    pub fn has_location(&self, page: u32, paragraph: Option<u32>) -> bool {
        self.text_segments.iter().any(|segment| {
            segment.page == page && paragraph.map_or(true, |p| segment.paragraph == p)
        })
    }

    /// Compact description of what the permit covers, for applicability prompts.
    pub fn activity_summary(&self) -> String {
        let mut lines = Vec::new();
        if !self.declared_activities.is_empty() {
            let activities: Vec<&str> =
                self.declared_activities.iter().map(String::as_str).collect();
            lines.push(format!("Declared activities: {}", activities.join("; ")));
        }
        if !self.sector_hints.is_empty() {
            let sectors: Vec<&str> = self.sector_hints.iter().map(String::as_str).collect();
            lines.push(format!("Sector indications: {}", sectors.join(", ")));
        }
        if !self.capacities.is_empty() {
            let capacities: Vec<&str> = self.capacities.iter().map(|c| c.raw.as_str()).collect();
            lines.push(format!("Capacities: {}", capacities.join(", ")));
        }
        lines.push(format!("Document type: {}", self.document_type.name()));
        if !self.activity_description.is_empty() {
            lines.push(format!("Activity description: {}", self.activity_description));
        }
        lines.join("\n")
    }
}
