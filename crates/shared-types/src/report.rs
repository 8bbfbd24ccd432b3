//! Terminal artifact of a verification run.

use crate::verdict::{
    ApplicabilityClass, ApplicabilityVerdict, ComplianceStatus, ComplianceVerdict, Priority,
};
use serde::{Deserialize, Serialize};

/// Number of verdicts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub compliant: usize,
    pub partially_compliant: usize,
    pub non_compliant: usize,
    pub ambiguous: usize,
    pub analysis_error: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: ComplianceStatus) {
        *self.slot(status) += 1;
    }

    pub fn get(&self, status: ComplianceStatus) -> usize {
        match status {
            ComplianceStatus::Compliant => self.compliant,
            ComplianceStatus::PartiallyCompliant => self.partially_compliant,
            ComplianceStatus::NonCompliant => self.non_compliant,
            ComplianceStatus::Ambiguous => self.ambiguous,
            ComplianceStatus::AnalysisError => self.analysis_error,
        }
    }

    fn slot(&mut self, status: ComplianceStatus) -> &mut usize {
        match status {
            ComplianceStatus::Compliant => &mut self.compliant,
            ComplianceStatus::PartiallyCompliant => &mut self.partially_compliant,
            ComplianceStatus::NonCompliant => &mut self.non_compliant,
            ComplianceStatus::Ambiguous => &mut self.ambiguous,
            ComplianceStatus::AnalysisError => &mut self.analysis_error,
        }
    }

    pub fn total(&self) -> usize {
        ComplianceStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }

    /// Verdicts that surface as high priority.
    pub fn high_priority(&self) -> usize {
        self.non_compliant + self.analysis_error
    }

    pub fn merge(&mut self, other: &StatusCounts) {
        for status in ComplianceStatus::ALL {
            *self.slot(status) += other.get(status);
        }
    }
}

/// Percentage of verdicts per status, rounded to one decimal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub compliant: f64,
    pub partially_compliant: f64,
    pub non_compliant: f64,
    pub ambiguous: f64,
    pub analysis_error: f64,
}

impl StatusBreakdown {
    pub fn from_counts(counts: &StatusCounts) -> Self {
        let total = counts.total();
        let pct = |n: usize| {
            if total == 0 {
                0.0
            } else {
                (n as f64 * 1000.0 / total as f64).round() / 10.0
            }
        };
        Self {
            compliant: pct(counts.compliant),
            partially_compliant: pct(counts.partially_compliant),
            non_compliant: pct(counts.non_compliant),
            ambiguous: pct(counts.ambiguous),
            analysis_error: pct(counts.analysis_error),
        }
    }
}

/// Per document set roll-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSetSummary {
    pub document_set_id: String,
    pub title: String,
    pub classification: ApplicabilityClass,
    /// Obligations in the set that were in scope for verification.
    pub obligation_count: usize,
    pub counts: StatusCounts,
    pub breakdown: StatusBreakdown,
}

/// One follow-up item derived from a non-compliant verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityItem {
    pub priority: Priority,
    pub document_set_id: String,
    pub obligation_id: String,
    pub obligation_title: String,
    pub status: ComplianceStatus,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallAssessment {
    Compliant,
    IssuesFound,
    SignificantIssues,
    Inconclusive,
}

impl OverallAssessment {
    pub fn description(&self) -> &'static str {
        match self {
            OverallAssessment::Compliant => {
                "The permit appears compliant with all applicable obligations"
            }
            OverallAssessment::IssuesFound => "The permit has a limited number of compliance issues",
            OverallAssessment::SignificantIssues => "The permit has significant compliance issues",
            OverallAssessment::Inconclusive => {
                "No conclusive assessment could be made for this permit"
            }
        }
    }
}

/// Whole-permit roll-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Obligations across all applicable sets.
    pub expected_verdicts: usize,
    pub counts: StatusCounts,
    pub breakdown: StatusBreakdown,
    pub applicable_sets: usize,
    pub not_applicable_sets: usize,
    pub assessment: OverallAssessment,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationRef {
    pub document_set_id: String,
    pub obligation_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteReason {
    QuotaExceeded,
    AuthFailure,
    TimedOut,
}

/// Whether every in-scope obligation received a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunCompletion {
    Complete,
    Incomplete {
        reason: IncompleteReason,
        detail: String,
        /// In-scope obligations left without a verdict, in canonical order.
        unverified: Vec<ObligationRef>,
        /// Selected document sets whose applicability was never decided.
        #[serde(default)]
        undecided: Vec<String>,
    },
}

/// All verdicts of one permit run plus their aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub permit_id: String,
    /// One entry per document set considered, in catalog order.
    pub applicability: Vec<ApplicabilityVerdict>,
    /// Canonical order: document set order, then authored obligation order.
    pub verdicts: Vec<ComplianceVerdict>,
    pub document_sets: Vec<DocumentSetSummary>,
    pub summary: ReportSummary,
    pub priorities: Vec<PriorityItem>,
    pub completion: RunCompletion,
}

impl ComplianceReport {
    pub fn is_complete(&self) -> bool {
        matches!(self.completion, RunCompletion::Complete)
    }

    pub fn verdicts_for<'a>(
        &'a self,
        document_set_id: &'a str,
    ) -> impl Iterator<Item = &'a ComplianceVerdict> + 'a {
        self.verdicts
            .iter()
            .filter(move |v| v.document_set_id == document_set_id)
    }

    pub fn applicability_for(&self, document_set_id: &str) -> Option<&ApplicabilityVerdict> {
        self.applicability
            .iter()
            .find(|a| a.document_set_id == document_set_id)
    }

    /// Plain-text rendering for console output.
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Permit Compliance Report: {}\n", self.permit_id));
        output.push_str(&"=".repeat(60));
        output.push_str("\n\n");

        if let RunCompletion::Incomplete {
            reason,
            detail,
            unverified,
            undecided,
        } = &self.completion
        {
            output.push_str(&format!(
                "INCOMPLETE ({:?}): {} ({} obligations not verified)\n",
                reason,
                detail,
                unverified.len()
            ));
            if !undecided.is_empty() {
                output.push_str(&format!(
                    "Applicability not decided: {}\n",
                    undecided.join(", ")
                ));
            }
            output.push('\n');
        }

        let counts = &self.summary.counts;
        output.push_str(&format!("Assessment: {}\n", self.summary.assessment.description()));
        output.push_str(&format!(
            "Obligations: {} verified of {} in scope\n",
            counts.total(),
            self.summary.expected_verdicts
        ));
        output.push_str(&format!(
            "  {} compliant, {} partially compliant, {} non-compliant, {} ambiguous, {} analysis errors\n\n",
            counts.compliant,
            counts.partially_compliant,
            counts.non_compliant,
            counts.ambiguous,
            counts.analysis_error
        ));

        output.push_str("Document Sets:\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');
        for verdict in &self.applicability {
            output.push_str(&format!(
                "[{}] {} - {}\n",
                verdict.document_set_id,
                verdict.document_set_title,
                verdict.classification.label()
            ));
            if let Some(summary) = self
                .document_sets
                .iter()
                .find(|s| s.document_set_id == verdict.document_set_id)
            {
                output.push_str(&format!(
                    "    {:.1}% compliant across {} obligations\n",
                    summary.breakdown.compliant, summary.obligation_count
                ));
            }
        }

        if !self.priorities.is_empty() {
            output.push_str("\nPriorities:\n");
            output.push_str(&"-".repeat(40));
            output.push('\n');
            for (i, item) in self.priorities.iter().enumerate() {
                output.push_str(&format!(
                    "{}. ({}) [{}] {} {}: {}\n",
                    i + 1,
                    item.priority.label(),
                    item.document_set_id,
                    item.obligation_id,
                    item.obligation_title,
                    item.reason
                ));
            }
        }

        if !self.summary.recommendations.is_empty() {
            output.push_str("\nRecommendations:\n");
            for recommendation in &self.summary.recommendations {
                output.push_str(&format!("- {}\n", recommendation));
            }
        }

        output
    }
}
