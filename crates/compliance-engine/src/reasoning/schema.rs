//! Structural validation of reasoning responses.
//!
//! Any deviation from the expected shape is a `MalformedResponse`: missing
//! or empty required fields, values outside the closed vocabularies, citations
//! pointing outside the permit, or an answer about a different target.

use crate::error::ReasoningError;
use serde::Deserialize;
use shared_types::{ApplicabilityClass, ComplianceStatus, PermitCitation, PermitProfile};

/// Validated applicability answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicabilityAssessment {
    pub classification: ApplicabilityClass,
    pub justification: String,
    pub permit_citation: PermitCitation,
    pub scope_excerpt: String,
}

/// Validated obligation answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceAssessment {
    pub status: ComplianceStatus,
    pub findings: String,
    pub gaps: Vec<String>,
    pub recommendations: Vec<String>,
    pub permit_citations: Vec<PermitCitation>,
    pub obligation_excerpt: String,
}

#[derive(Debug, Deserialize)]
struct RawCitation {
    excerpt: Option<String>,
    page: Option<i64>,
    paragraph: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawApplicability {
    document_set_id: Option<String>,
    classification: Option<String>,
    justification: Option<String>,
    permit_citation: Option<RawCitation>,
    scope_citation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCompliance {
    obligation_id: Option<String>,
    status: Option<String>,
    findings: Option<String>,
    #[serde(default)]
    gaps: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    permit_citations: Vec<RawCitation>,
    obligation_excerpt: Option<String>,
}

/// The JSON object inside a response: from the first `{` to the last `}`.
/// Providers wrap JSON in prose or code fences often enough to tolerate it.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn decode<'de, T: Deserialize<'de>>(raw: &'de str) -> Result<T, ReasoningError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| ReasoningError::malformed("response contains no JSON object", raw))?;
    serde_json::from_str(json)
        .map_err(|e| ReasoningError::malformed(format!("response is not valid JSON: {}", e), raw))
}

fn required(value: Option<String>, field: &str, raw: &str) -> Result<String, ReasoningError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        Some(_) => Err(ReasoningError::malformed(
            format!("required field `{}` is empty", field),
            raw,
        )),
        None => Err(ReasoningError::malformed(
            format!("missing required field `{}`", field),
            raw,
        )),
    }
}

fn normalize(value: &str) -> String {
    value
        .to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_status(value: &str) -> Option<ComplianceStatus> {
    match normalize(value).as_str() {
        "compliant" => Some(ComplianceStatus::Compliant),
        "partially compliant" | "partiallycompliant" | "partial compliance" => {
            Some(ComplianceStatus::PartiallyCompliant)
        }
        "non compliant" | "noncompliant" | "not compliant" => Some(ComplianceStatus::NonCompliant),
        "ambiguous" | "insufficient information" => Some(ComplianceStatus::Ambiguous),
        // AnalysisError is never a valid answer from the service.
        _ => None,
    }
}

pub fn parse_classification(value: &str) -> Option<ApplicabilityClass> {
    match normalize(value).as_str() {
        "likely applicable" | "likelyapplicable" => Some(ApplicabilityClass::LikelyApplicable),
        "potentially applicable" | "potentiallyapplicable" => {
            Some(ApplicabilityClass::PotentiallyApplicable)
        }
        "not applicable" | "notapplicable" => Some(ApplicabilityClass::NotApplicable),
        _ => None,
    }
}

fn check_target(
    answered: Option<&str>,
    expected: &str,
    field: &str,
    raw: &str,
) -> Result<(), ReasoningError> {
    match answered.map(str::trim) {
        Some(id) if !id.is_empty() && id != expected => Err(ReasoningError::malformed(
            format!("`{}` is `{}`, expected `{}`", field, id, expected),
            raw,
        )),
        _ => Ok(()),
    }
}

fn location_number(
    value: Option<i64>,
    field: &str,
    raw: &str,
) -> Result<Option<u32>, ReasoningError> {
    match value {
        None => Ok(None),
        Some(n) if n >= 1 && n <= i64::from(u32::MAX) => Ok(Some(n as u32)),
        Some(n) => Err(ReasoningError::malformed(
            format!("cited {} {} is not a valid {} number", field, n, field),
            raw,
        )),
    }
}

/// A citation whose location, when given, exists in the permit.
fn citation(
    raw_citation: RawCitation,
    profile: &PermitProfile,
    raw: &str,
) -> Result<PermitCitation, ReasoningError> {
    let excerpt = required(raw_citation.excerpt, "excerpt", raw)?;
    let page = location_number(raw_citation.page, "page", raw)?;
    let paragraph = location_number(raw_citation.paragraph, "paragraph", raw)?;

    match (page, paragraph) {
        (None, Some(paragraph)) => {
            return Err(ReasoningError::malformed(
                format!("cited paragraph {} without a page", paragraph),
                raw,
            ))
        }
        (Some(page), paragraph) if !profile.has_location(page, paragraph) => {
            let location = match paragraph {
                Some(paragraph) => format!("p.{} ¶{}", page, paragraph),
                None => format!("p.{}", page),
            };
            return Err(ReasoningError::malformed(
                format!(
                    "cited location {} not in permit ({} page(s))",
                    location,
                    profile.page_count()
                ),
                raw,
            ));
        }
        _ => {}
    }

    Ok(PermitCitation {
        excerpt,
        page,
        paragraph,
    })
}

/// Like [`citation`], and the citation must name a page.
fn located_citation(
    raw_citation: RawCitation,
    profile: &PermitProfile,
    field: &str,
    raw: &str,
) -> Result<PermitCitation, ReasoningError> {
    let citation = citation(raw_citation, profile, raw)?;
    if citation.page.is_none() {
        return Err(ReasoningError::malformed(
            format!("`{}` has no permit location", field),
            raw,
        ));
    }
    Ok(citation)
}

pub fn parse_applicability(
    raw: &str,
    expected_document_set_id: &str,
    profile: &PermitProfile,
) -> Result<ApplicabilityAssessment, ReasoningError> {
    let response: RawApplicability = decode(raw)?;
    check_target(
        response.document_set_id.as_deref(),
        expected_document_set_id,
        "document_set_id",
        raw,
    )?;

    let label = required(response.classification, "classification", raw)?;
    let classification = parse_classification(&label).ok_or_else(|| {
        ReasoningError::malformed(format!("unknown classification `{}`", label), raw)
    })?;
    let justification = required(response.justification, "justification", raw)?;
    let permit_citation = response
        .permit_citation
        .ok_or_else(|| ReasoningError::malformed("missing required field `permit_citation`", raw))?;
    let permit_citation = located_citation(permit_citation, profile, "permit_citation", raw)?;
    let scope_excerpt = required(response.scope_citation, "scope_citation", raw)?;

    Ok(ApplicabilityAssessment {
        classification,
        justification,
        permit_citation,
        scope_excerpt,
    })
}

pub fn parse_compliance(
    raw: &str,
    expected_obligation_id: &str,
    profile: &PermitProfile,
) -> Result<ComplianceAssessment, ReasoningError> {
    let response: RawCompliance = decode(raw)?;
    check_target(
        response.obligation_id.as_deref(),
        expected_obligation_id,
        "obligation_id",
        raw,
    )?;

    let label = required(response.status, "status", raw)?;
    let status = parse_status(&label).ok_or_else(|| {
        ReasoningError::malformed(format!("status `{}` outside allowed vocabulary", label), raw)
    })?;
    let findings = required(response.findings, "findings", raw)?;
    let obligation_excerpt = required(response.obligation_excerpt, "obligation_excerpt", raw)?;

    let permit_citations = response
        .permit_citations
        .into_iter()
        .map(|c| citation(c, profile, raw))
        .collect::<Result<Vec<_>, _>>()?;

    let gaps = non_empty_items(response.gaps);
    let recommendations = non_empty_items(response.recommendations);

    match status {
        ComplianceStatus::Compliant | ComplianceStatus::PartiallyCompliant
            if !permit_citations.iter().any(|c| c.page.is_some()) =>
        {
            return Err(ReasoningError::malformed(
                format!("`{}` without a cited permit location", status.label()),
                raw,
            ));
        }
        ComplianceStatus::Compliant => {}
        _ if gaps.is_empty() => {
            return Err(ReasoningError::malformed(
                format!("`{}` requires at least one gap", status.label()),
                raw,
            ));
        }
        _ if recommendations.is_empty() => {
            return Err(ReasoningError::malformed(
                format!("`{}` requires at least one recommendation", status.label()),
                raw,
            ));
        }
        _ => {}
    }

    Ok(ComplianceAssessment {
        status,
        findings,
        gaps,
        recommendations,
        permit_citations,
        obligation_excerpt,
    })
}

fn non_empty_items(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
