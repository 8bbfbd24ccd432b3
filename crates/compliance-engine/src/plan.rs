//! Run plan: which obligations must receive a verdict, in which order.
//!
//! The plan is derived from the catalog and the applicability decisions, never
//! from reasoning output. Every obligation of every applicable set appears
//! exactly once, addressed by its position.

use shared_types::{ApplicabilityVerdict, DocumentSet, Obligation};

/// Canonical address of an obligation within a run.
///
/// Ordering follows document set order, then authored obligation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObligationPosition {
    pub set_index: usize,
    pub obligation_index: usize,
}

/// One obligation to verify.
#[derive(Debug, Clone, Copy)]
pub struct ObligationJob<'a> {
    pub position: ObligationPosition,
    pub document_set: &'a DocumentSet,
    pub obligation: &'a Obligation,
}

/// Decided document sets with their applicability, in catalog order.
#[derive(Debug, Clone)]
pub struct RunPlan<'a> {
    entries: Vec<(&'a DocumentSet, ApplicabilityVerdict)>,
    undecided: Vec<String>,
}

impl<'a> RunPlan<'a> {
    /// Pair each set with its applicability verdict. Sets without a verdict
    /// (matching was interrupted) are left out of the plan and listed as
    /// undecided.
    pub fn new(document_sets: &'a [DocumentSet], applicability: &[ApplicabilityVerdict]) -> Self {
        let mut entries = Vec::new();
        let mut undecided = Vec::new();
        for set in document_sets {
            match applicability
                .iter()
                .find(|verdict| verdict.document_set_id == set.id)
            {
                Some(verdict) => entries.push((set, verdict.clone())),
                None => undecided.push(set.id.clone()),
            }
        }
        Self { entries, undecided }
    }

    /// Selected sets without an applicability verdict, in catalog order.
    pub fn undecided(&self) -> &[String] {
        &self.undecided
    }

    pub fn applicability(&self) -> Vec<ApplicabilityVerdict> {
        self.entries.iter().map(|(_, verdict)| verdict.clone()).collect()
    }

    /// Applicable sets with their plan index.
    pub fn applicable_sets(
        &self,
    ) -> impl Iterator<Item = (usize, &'a DocumentSet, &ApplicabilityVerdict)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, (_, verdict))| verdict.classification.is_applicable())
            .map(|(index, (set, verdict))| (index, *set, verdict))
    }

    pub fn not_applicable_sets(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, verdict)| !verdict.classification.is_applicable())
            .count()
    }

    /// Obligations that must receive a verdict.
    pub fn expected_verdicts(&self) -> usize {
        self.applicable_sets()
            .map(|(_, set, _)| set.obligation_count())
            .sum()
    }

    /// Every in-scope obligation in canonical order.
    pub fn jobs(&self) -> Vec<ObligationJob<'a>> {
        let mut jobs = Vec::with_capacity(self.expected_verdicts());
        for (set_index, document_set, _) in self.applicable_sets() {
            for (obligation_index, obligation) in document_set.obligations.iter().enumerate() {
                jobs.push(ObligationJob {
                    position: ObligationPosition {
                        set_index,
                        obligation_index,
                    },
                    document_set,
                    obligation,
                });
            }
        }
        jobs
    }
}
