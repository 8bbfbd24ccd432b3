//! Shared fixtures for unit tests.

use shared_types::{
    ApplicabilityClass, ApplicabilityVerdict, DocumentSet, DocumentSetKind, Obligation,
    PermitDocumentType, PermitProfile, SourceCitation, TextSegment,
};

/// Set `id` with obligations `id-1` ..= `id-n`.
pub fn document_set(id: &str, obligations: usize) -> DocumentSet {
    DocumentSet {
        id: id.to_string(),
        title: format!("{} reference document", id),
        sector: "test".to_string(),
        scope_description: format!("Installations covered by {}", id),
        kind: DocumentSetKind::Sectoral,
        obligations: (1..=obligations)
            .map(|n| {
                Obligation::new(
                    format!("{}-{}", id, n),
                    format!("{} obligation {}", id, n),
                    format!("Full text of {} obligation {}", id, n),
                    SourceCitation::new(id).with_page(n as u32),
                )
            })
            .collect(),
    }
}

pub fn applicability(id: &str, classification: ApplicabilityClass) -> ApplicabilityVerdict {
    ApplicabilityVerdict {
        document_set_id: id.to_string(),
        document_set_title: format!("{} reference document", id),
        classification,
        justification: format!("{} decided", classification.label()),
        cited_permit_excerpt: None,
        cited_scope_excerpt: None,
        analysis_error: None,
    }
}

pub fn profile() -> PermitProfile {
    let text = "The installation keeps 300 dairy cows and stores manure in a covered cellar.";
    PermitProfile {
        permit_id: "permit-1".to_string(),
        title: None,
        document_type: PermitDocumentType::Decision,
        declared_activities: ["dairy farming".to_string()].into_iter().collect(),
        sector_hints: ["livestock".to_string()].into_iter().collect(),
        capacities: Vec::new(),
        activity_description: "dairy farming".to_string(),
        raw_text: text.to_string(),
        text_segments: vec![TextSegment::new(text, 1, 1), TextSegment::new(text, 2, 1)],
    }
}
