//! Verdict Aggregator
//!
//! Collects verdicts keyed by obligation position and turns them into the
//! final report: canonical order, per-set and overall counts, priorities and
//! the completeness check.

use crate::error::CompletenessViolation;
use crate::plan::{ObligationPosition, RunPlan};
use shared_types::{
    ApplicabilityClass, ApplicabilityVerdict, ComplianceReport, ComplianceStatus,
    ComplianceVerdict, DocumentSetSummary, IncompleteReason, ObligationRef, OverallAssessment,
    PriorityItem, ReportSummary, RunCompletion, StatusBreakdown, StatusCounts,
};
use std::collections::BTreeMap;

/// Longest reason text taken from findings for a priority entry.
const PRIORITY_REASON_CHARS: usize = 160;

/// Issues above which the assessment becomes "significant".
const SIGNIFICANT_ISSUE_THRESHOLD: usize = 2;

#[derive(Debug, Clone)]
struct ExpectedObligation {
    document_set_id: String,
    obligation_id: String,
    title: String,
}

#[derive(Debug, Clone)]
struct SetEntry {
    set_index: usize,
    document_set_id: String,
    title: String,
    classification: ApplicabilityClass,
    obligation_count: usize,
}

#[derive(Debug)]
pub struct VerdictAggregator {
    permit_id: String,
    applicability: Vec<ApplicabilityVerdict>,
    not_applicable_sets: usize,
    undecided: Vec<String>,
    sets: Vec<SetEntry>,
    expected: BTreeMap<ObligationPosition, ExpectedObligation>,
    verdicts: BTreeMap<ObligationPosition, ComplianceVerdict>,
}

impl VerdictAggregator {
    pub fn new(permit_id: impl Into<String>, plan: &RunPlan<'_>) -> Self {
        let sets = plan
            .applicable_sets()
            .map(|(set_index, set, verdict)| SetEntry {
                set_index,
                document_set_id: set.id.clone(),
                title: set.title.clone(),
                classification: verdict.classification,
                obligation_count: set.obligation_count(),
            })
            .collect();

        let expected = plan
            .jobs()
            .into_iter()
            .map(|job| {
                (
                    job.position,
                    ExpectedObligation {
                        document_set_id: job.document_set.id.clone(),
                        obligation_id: job.obligation.id.clone(),
                        title: job.obligation.title.clone(),
                    },
                )
            })
            .collect();

        Self {
            permit_id: permit_id.into(),
            applicability: plan.applicability(),
            not_applicable_sets: plan.not_applicable_sets(),
            undecided: plan.undecided().to_vec(),
            sets,
            expected,
            verdicts: BTreeMap::new(),
        }
    }

    pub fn expected(&self) -> usize {
        self.expected.len()
    }

    pub fn recorded(&self) -> usize {
        self.verdicts.len()
    }

    /// Accept the verdict for `position`.
    ///
    /// # Errors
    /// Unknown positions, verdicts naming another obligation, and duplicates.
    pub fn record(
        &mut self,
        position: ObligationPosition,
        verdict: ComplianceVerdict,
    ) -> Result<(), CompletenessViolation> {
        let Some(expected) = self.expected.get(&position) else {
            return Err(self.violation(format!(
                "verdict for {}/{} has no in-scope obligation",
                verdict.document_set_id, verdict.obligation_id
            )));
        };
        if expected.document_set_id != verdict.document_set_id
            || expected.obligation_id != verdict.obligation_id
        {
            return Err(self.violation(format!(
                "verdict for {}/{} recorded at the position of {}/{}",
                verdict.document_set_id,
                verdict.obligation_id,
                expected.document_set_id,
                expected.obligation_id
            )));
        }
        if self.verdicts.contains_key(&position) {
            return Err(self.violation(format!(
                "duplicate verdict for {}/{}",
                verdict.document_set_id, verdict.obligation_id
            )));
        }

        self.verdicts.insert(position, verdict);
        Ok(())
    }

    /// Build the report.
    ///
    /// With `interruption` set the report is marked incomplete and lists the
    /// unverified obligations; otherwise every in-scope obligation must have
    /// exactly one verdict.
    ///
    /// # Errors
    /// `CompletenessViolation` when a complete run is missing verdicts.
    pub fn finish(
        self,
        interruption: Option<(IncompleteReason, String)>,
    ) -> Result<ComplianceReport, CompletenessViolation> {
        let unverified: Vec<ObligationRef> = self
            .expected
            .iter()
            .filter(|(position, _)| !self.verdicts.contains_key(position))
            .map(|(_, expected)| ObligationRef {
                document_set_id: expected.document_set_id.clone(),
                obligation_id: expected.obligation_id.clone(),
            })
            .collect();

        if self.verdicts.len() + unverified.len() != self.expected.len() {
            return Err(self.violation("verdicts outside the in-scope obligations".to_string()));
        }

        let completion = match interruption {
            None if !unverified.is_empty() => {
                let first = &unverified[0];
                return Err(self.violation(format!(
                    "{} obligation(s) without verdict, first {}/{}",
                    unverified.len(),
                    first.document_set_id,
                    first.obligation_id
                )));
            }
            None if !self.undecided.is_empty() => {
                return Err(self.violation(format!(
                    "{} document set(s) without applicability verdict, first {}",
                    self.undecided.len(),
                    self.undecided[0]
                )));
            }
            None => RunCompletion::Complete,
            Some((reason, detail)) => RunCompletion::Incomplete {
                reason,
                detail,
                unverified,
                undecided: self.undecided.clone(),
            },
        };

        let document_sets: Vec<DocumentSetSummary> = self
            .sets
            .iter()
            .map(|set| {
                let mut counts = StatusCounts::default();
                for (_, verdict) in self.verdicts_of_set(set.set_index) {
                    counts.record(verdict.status);
                }
                DocumentSetSummary {
                    document_set_id: set.document_set_id.clone(),
                    title: set.title.clone(),
                    classification: set.classification,
                    obligation_count: set.obligation_count,
                    counts,
                    breakdown: StatusBreakdown::from_counts(&counts),
                }
            })
            .collect();

        let mut counts = StatusCounts::default();
        for summary in &document_sets {
            counts.merge(&summary.counts);
        }

        let priorities = self.priorities();
        let assessment = assess(&counts);
        let recommendations = recommendations(&counts, &completion);

        let summary = ReportSummary {
            expected_verdicts: self.expected.len(),
            counts,
            breakdown: StatusBreakdown::from_counts(&counts),
            applicable_sets: self.sets.len(),
            not_applicable_sets: self.not_applicable_sets,
            assessment,
            recommendations,
        };

        Ok(ComplianceReport {
            permit_id: self.permit_id,
            applicability: self.applicability,
            verdicts: self.verdicts.into_values().collect(),
            document_sets,
            summary,
            priorities,
            completion,
        })
    }

    fn verdicts_of_set(
        &self,
        set_index: usize,
    ) -> impl Iterator<Item = (&ObligationPosition, &ComplianceVerdict)> {
        self.verdicts
            .iter()
            .filter(move |(position, _)| position.set_index == set_index)
    }

    /// Non-compliant verdicts ordered by priority, canonical order within.
    fn priorities(&self) -> Vec<PriorityItem> {
        let mut items: Vec<PriorityItem> = self
            .verdicts
            .iter()
            .filter_map(|(position, verdict)| {
                let priority = verdict.status.priority()?;
                let title = self
                    .expected
                    .get(position)
                    .map(|expected| expected.title.clone())
                    .unwrap_or_default();
                Some(PriorityItem {
                    priority,
                    document_set_id: verdict.document_set_id.clone(),
                    obligation_id: verdict.obligation_id.clone(),
                    obligation_title: title,
                    status: verdict.status,
                    reason: priority_reason(verdict),
                })
            })
            .collect();
        // Stable: canonical order is kept within one priority.
        items.sort_by_key(|item| item.priority);
        items
    }

    fn violation(&self, detail: String) -> CompletenessViolation {
        CompletenessViolation {
            expected: self.expected.len(),
            actual: self.verdicts.len(),
            detail,
        }
    }
}

fn priority_reason(verdict: &ComplianceVerdict) -> String {
    match verdict.gaps.first() {
        Some(gap) => gap.clone(),
        None => truncate(&verdict.findings, PRIORITY_REASON_CHARS),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

fn assess(counts: &StatusCounts) -> OverallAssessment {
    let conclusive = counts.total() - counts.analysis_error - counts.ambiguous;
    if counts.total() == 0 || conclusive == 0 {
        return OverallAssessment::Inconclusive;
    }

    let issues = counts.high_priority() + counts.partially_compliant;
    match issues {
        0 => OverallAssessment::Compliant,
        n if n <= SIGNIFICANT_ISSUE_THRESHOLD => OverallAssessment::IssuesFound,
        _ => OverallAssessment::SignificantIssues,
    }
}

fn recommendations(counts: &StatusCounts, completion: &RunCompletion) -> Vec<String> {
    let mut out = Vec::new();

    if let RunCompletion::Incomplete {
        unverified,
        undecided,
        ..
    } = completion
    {
        out.push(format!(
            "Complete the verification run: {} obligation(s) were not verified",
            unverified.len()
        ));
        if !undecided.is_empty() {
            out.push(format!(
                "Decide applicability of {} document set(s): {}",
                undecided.len(),
                undecided.join(", ")
            ));
        }
    }
    if counts.non_compliant > 0 {
        out.push(format!(
            "Address {} non-compliant obligation(s) before issuing the permit",
            counts.non_compliant
        ));
    }
    if counts.partially_compliant > 0 {
        out.push(format!(
            "Complete the conditions for {} partially compliant obligation(s)",
            counts.partially_compliant
        ));
    }
    if counts.analysis_error > 0 {
        out.push(format!(
            "Review {} obligation(s) manually where automated analysis failed",
            counts.analysis_error
        ));
    }
    if counts.ambiguous > 0 {
        out.push(format!(
            "Request additional information for {} ambiguous obligation(s)",
            counts.ambiguous
        ));
    }
    if out.is_empty() && counts.get(ComplianceStatus::Compliant) > 0 {
        out.push("No action required for the verified obligations".to_string());
    }
    out
}
