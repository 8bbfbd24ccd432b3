//! Verdicts produced during a verification run.

use crate::catalog::SourceCitation;
use serde::{Deserialize, Serialize};

/// Three-way applicability classification of a document set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicabilityClass {
    LikelyApplicable,
    PotentiallyApplicable,
    NotApplicable,
}

impl ApplicabilityClass {
    /// Whether obligations of a set with this class get verified.
    pub fn is_applicable(&self) -> bool {
        !matches!(self, ApplicabilityClass::NotApplicable)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApplicabilityClass::LikelyApplicable => "Likely Applicable",
            ApplicabilityClass::PotentiallyApplicable => "Potentially Applicable",
            ApplicabilityClass::NotApplicable => "Not Applicable",
        }
    }
}

/// Pointer into the permit text backing a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitCitation {
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<u32>,
}

impl PermitCitation {
    pub fn new(excerpt: impl Into<String>) -> Self {
        Self {
            excerpt: excerpt.into(),
            page: None,
            paragraph: None,
        }
    }

    pub fn at(mut self, page: u32, paragraph: Option<u32>) -> Self {
        self.page = Some(page);
        self.paragraph = paragraph;
        self
    }
}

/// Pointer into the obligation text backing a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationCitation {
    pub source: SourceCitation,
    pub excerpt: String,
}

/// Outcome of the applicability decision for one document set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicabilityVerdict {
    pub document_set_id: String,
    pub document_set_title: String,
    pub classification: ApplicabilityClass,
    pub justification: String,
    pub cited_permit_excerpt: Option<PermitCitation>,
    pub cited_scope_excerpt: Option<String>,
    /// Set when the reasoning service could not be consulted and the
    /// classification is the conservative fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
}

/// Closed status vocabulary for obligation verdicts.
///
/// `AnalysisError` is internal: the reasoning service is never asked to emit
/// it, it marks calls that failed after all retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    PartiallyCompliant,
    NonCompliant,
    Ambiguous,
    AnalysisError,
}

impl ComplianceStatus {
    pub const ALL: [ComplianceStatus; 5] = [
        ComplianceStatus::Compliant,
        ComplianceStatus::PartiallyCompliant,
        ComplianceStatus::NonCompliant,
        ComplianceStatus::Ambiguous,
        ComplianceStatus::AnalysisError,
    ];

    /// Statuses the reasoning service may return.
    pub const CONTENT: [ComplianceStatus; 4] = [
        ComplianceStatus::Compliant,
        ComplianceStatus::PartiallyCompliant,
        ComplianceStatus::NonCompliant,
        ComplianceStatus::Ambiguous,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "Compliant",
            ComplianceStatus::PartiallyCompliant => "Partially Compliant",
            ComplianceStatus::NonCompliant => "Non-Compliant",
            ComplianceStatus::Ambiguous => "Ambiguous",
            ComplianceStatus::AnalysisError => "Analysis Error",
        }
    }

    pub fn priority(&self) -> Option<Priority> {
        match self {
            ComplianceStatus::Compliant => None,
            ComplianceStatus::NonCompliant | ComplianceStatus::AnalysisError => {
                Some(Priority::High)
            }
            ComplianceStatus::PartiallyCompliant => Some(Priority::Medium),
            ComplianceStatus::Ambiguous => Some(Priority::NeedsInformation),
        }
    }
}

/// Follow-up priority derived from a verdict status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    NeedsInformation,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "high priority",
            Priority::Medium => "medium priority",
            Priority::NeedsInformation => "needs more information",
        }
    }
}

/// Cited assessment of one obligation against the permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub document_set_id: String,
    pub obligation_id: String,
    pub status: ComplianceStatus,
    pub findings: String,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub permit_citations: Vec<PermitCitation>,
    pub obligation_citation: ObligationCitation,
}

impl ComplianceVerdict {
    /// Verdict for an obligation whose analysis could not be completed.
    pub fn analysis_error(
        document_set_id: impl Into<String>,
        obligation_id: impl Into<String>,
        source: SourceCitation,
        findings: impl Into<String>,
    ) -> Self {
        Self {
            document_set_id: document_set_id.into(),
            obligation_id: obligation_id.into(),
            status: ComplianceStatus::AnalysisError,
            findings: findings.into(),
            gaps: Vec::new(),
            recommendations: vec![
                "Re-run the analysis for this obligation or review it manually".to_string(),
            ],
            permit_citations: Vec::new(),
            obligation_citation: ObligationCitation {
                source,
                excerpt: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_priorities() {
        assert_eq!(ComplianceStatus::Compliant.priority(), None);
        assert_eq!(ComplianceStatus::NonCompliant.priority(), Some(Priority::High));
        assert_eq!(ComplianceStatus::AnalysisError.priority(), Some(Priority::High));
        assert_eq!(
            ComplianceStatus::PartiallyCompliant.priority(),
            Some(Priority::Medium)
        );
        assert_eq!(
            ComplianceStatus::Ambiguous.priority(),
            Some(Priority::NeedsInformation)
        );
    }

    #[test]
    fn test_content_statuses_exclude_analysis_error() {
        assert!(!ComplianceStatus::CONTENT.contains(&ComplianceStatus::AnalysisError));
        assert_eq!(ComplianceStatus::ALL.len(), ComplianceStatus::CONTENT.len() + 1);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ComplianceStatus::PartiallyCompliant).unwrap();
        assert_eq!(json, "\"partially_compliant\"");
        let class: ApplicabilityClass = serde_json::from_str("\"not_applicable\"").unwrap();
        assert!(!class.is_applicable());
    }

    #[test]
    fn test_analysis_error_verdict() {
        let verdict = ComplianceVerdict::analysis_error(
            "IRPP",
            "BAT 35",
            SourceCitation::new("BREF IRPP"),
            "Reasoning service unavailable",
        );
        assert_eq!(verdict.status, ComplianceStatus::AnalysisError);
        assert!(verdict.permit_citations.is_empty());
        assert_eq!(verdict.recommendations.len(), 1);
    }
}
