//! Prompt rendering for chat-style providers.

use super::EvaluationRequest;
use shared_types::{DocumentSet, Obligation, PermitProfile};

pub const SYSTEM_PROMPT: &str = "You are an expert in EU environmental regulation assessing \
industrial permits against reference documents and statutory obligations. \
Answer with a single JSON object and nothing else. Base every statement on the quoted text \
you were given and cite the permit locations you rely on.";

/// Chat messages for one request: `(system, user)`.
pub fn render(request: &EvaluationRequest<'_>) -> (String, String) {
    let user = match *request {
        EvaluationRequest::Applicability {
            profile,
            document_set,
        } => applicability_prompt(profile, document_set),
        EvaluationRequest::ObligationCompliance {
            profile,
            document_set,
            obligation,
        } => compliance_prompt(profile, document_set, obligation),
    };
    (SYSTEM_PROMPT.to_string(), user)
}

/// Permit text with a locator in front of every paragraph.
pub fn cited_permit_text(profile: &PermitProfile) -> String {
    profile
        .text_segments
        .iter()
        .map(|segment| format!("[{}] {}", segment.locator(), segment.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn applicability_prompt(profile: &PermitProfile, set: &DocumentSet) -> String {
    format!(
        r#"Decide whether the regulatory document below applies to the permitted installation.

PERMIT {permit_id}
{summary}

PERMIT TEXT (paragraphs prefixed with [p.PAGE ¶PARAGRAPH])
{permit_text}

REGULATORY DOCUMENT {set_id}: {title}
Kind: {kind} (horizontal documents apply across sectors when the activity falls within their scope)
Sector: {sector}
Scope: {scope}

Respond with JSON:
{{
  "document_set_id": "{set_id}",
  "classification": "Likely Applicable" | "Potentially Applicable" | "Not Applicable",
  "justification": "why, referring to the cited texts",
  "permit_citation": {{"excerpt": "verbatim permit text", "page": PAGE, "paragraph": PARAGRAPH}},
  "scope_citation": "verbatim text from the scope that drove the decision"
}}"#,
        permit_id = profile.permit_id,
        summary = profile.activity_summary(),
        permit_text = cited_permit_text(profile),
        set_id = set.id,
        title = set.title,
        kind = set.kind.name(),
        sector = set.sector,
        scope = set.scope_description,
    )
}

fn compliance_prompt(profile: &PermitProfile, set: &DocumentSet, obligation: &Obligation) -> String {
    format!(
        r#"Assess whether the permit complies with the obligation below.

OBLIGATION {obligation_id}: {title}
Source: {source} ({set_id}: {set_title})
{full_text}

PERMIT {permit_id} (paragraphs prefixed with [p.PAGE ¶PARAGRAPH])
{permit_text}

Status must be one of "Compliant", "Partially Compliant", "Non-Compliant", "Ambiguous".
Use "Ambiguous" when the permit does not contain enough information to decide.
When claiming (partial) compliance, cite the permit paragraphs that show it.
When the status is not "Compliant", list the gaps and recommendations.

Respond with JSON:
{{
  "obligation_id": "{obligation_id}",
  "status": "...",
  "findings": "assessment referring to cited permit locations",
  "gaps": ["..."],
  "recommendations": ["..."],
  "permit_citations": [{{"excerpt": "verbatim permit text", "page": PAGE, "paragraph": PARAGRAPH}}],
  "obligation_excerpt": "verbatim text of the obligation that the assessment relies on"
}}"#,
        obligation_id = obligation.id,
        title = obligation.title,
        source = obligation.source_citation.label(),
        set_id = set.id,
        set_title = set.title,
        full_text = obligation.full_text,
        permit_id = profile.permit_id,
        permit_text = cited_permit_text(profile),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{DocumentSetKind, PermitDocumentType, SourceCitation, TextSegment};

    fn fixtures() -> (PermitProfile, DocumentSet) {
        let profile = PermitProfile {
            permit_id: "permit-7".to_string(),
            title: None,
            document_type: PermitDocumentType::Decision,
            declared_activities: ["Dairy processing".to_string()].into_iter().collect(),
            sector_hints: Default::default(),
            capacities: Vec::new(),
            activity_description: String::new(),
            raw_text: String::new(),
            text_segments: vec![TextSegment::new("Dairy processing", 1, 2)],
        };
        let set = DocumentSet {
            id: "FDM".to_string(),
            title: "Food, Drink and Milk Industries".to_string(),
            sector: "food".to_string(),
            scope_description: "Treatment and processing of milk".to_string(),
            kind: DocumentSetKind::Sectoral,
            obligations: vec![Obligation::new(
                "BAT 5",
                "Water use",
                "Reduce water consumption",
                SourceCitation::new("BREF FDM").with_page(40),
            )],
        };
        (profile, set)
    }

    #[test]
    fn test_applicability_prompt_contents() {
        let (profile, set) = fixtures();
        let (system, user) = render(&EvaluationRequest::Applicability {
            profile: &profile,
            document_set: &set,
        });
        assert!(system.contains("JSON"));
        assert!(user.contains("[p.1 ¶2] Dairy processing"));
        assert!(user.contains("Treatment and processing of milk"));
        assert!(user.contains("\"document_set_id\": \"FDM\""));
    }

    #[test]
    fn test_compliance_prompt_contents() {
        let (profile, set) = fixtures();
        let (_, user) = render(&EvaluationRequest::ObligationCompliance {
            profile: &profile,
            document_set: &set,
            obligation: &set.obligations[0],
        });
        assert!(user.contains("OBLIGATION BAT 5: Water use"));
        assert!(user.contains("BREF FDM, p. 40"));
        assert!(user.contains("\"obligation_id\": \"BAT 5\""));
        assert!(!user.contains("AnalysisError"));
    }
}
