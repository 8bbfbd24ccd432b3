//! Document Profile Extractor
//!
//! Normalizes extracted permit text into a [`PermitProfile`]. Explicit
//! document metadata wins; without it the activity section and raw-text
//! keyword presence are used, so sparse permits still get a profile.

use crate::error::PipelineError;
use crate::patterns;
use shared_pdf::ExtractedDocument;
use shared_types::{PermitDocumentType, PermitProfile, TextSegment};
use std::collections::BTreeSet;

pub struct ProfileExtractor {
    min_text_len: usize,
}

impl ProfileExtractor {
    pub fn new(min_text_len: usize) -> Self {
        Self {
            min_text_len: min_text_len.max(1),
        }
    }

    /// Build the profile for one run.
    ///
    /// # Errors
    /// `PipelineError::ExtractionEmpty` when the permit has less non-blank
    /// text than the configured minimum.
    pub fn extract(
        &self,
        permit_id: &str,
        document: &ExtractedDocument,
    ) -> Result<PermitProfile, PipelineError> {
        let raw_text = document.full_text.trim();
        let chars = raw_text.chars().count();
        if chars < self.min_text_len {
            return Err(PipelineError::ExtractionEmpty {
                permit_id: permit_id.to_string(),
                chars,
                min: self.min_text_len,
                scanned: document.looks_scanned(),
            });
        }

        let metadata = &document.metadata;
        let activity_lines = patterns::extract_activity_lines(&document.full_text);
        let explicit = metadata.keyword_list();

        let declared_activities: BTreeSet<String> = if !explicit.is_empty() {
            explicit.into_iter().collect()
        } else if !activity_lines.is_empty() {
            activity_lines.iter().cloned().collect()
        } else {
            patterns::matched_keywords(raw_text)
                .into_iter()
                .map(str::to_string)
                .collect()
        };

        let mut sector_hints = patterns::detect_sectors(raw_text);
        for extra in [&metadata.subject, &metadata.keywords].into_iter().flatten() {
            sector_hints.extend(patterns::detect_sectors(extra));
        }

        let document_type = [&metadata.title, &metadata.source_name]
            .into_iter()
            .flatten()
            .map(|name| patterns::classify_document_type(name))
            .find(|kind| *kind != PermitDocumentType::Other)
            .unwrap_or_default();

        let activity_description = if activity_lines.is_empty() {
            metadata.subject.clone().unwrap_or_default()
        } else {
            activity_lines.join("; ")
        };

        let text_segments = if document.segments.is_empty() {
            vec![TextSegment::new(raw_text, 1, 1)]
        } else {
            document.segments.clone()
        };

        let profile = PermitProfile {
            permit_id: permit_id.to_string(),
            title: metadata.title.clone(),
            document_type,
            declared_activities,
            sector_hints,
            capacities: patterns::extract_capacities(raw_text),
            activity_description,
            raw_text: document.full_text.clone(),
            text_segments,
        };

        tracing::debug!(
            permit_id,
            activities = profile.declared_activities.len(),
            sectors = ?profile.sector_hints,
            document_type = profile.document_type.name(),
            "permit profile extracted"
        );

        Ok(profile)
    }
}
