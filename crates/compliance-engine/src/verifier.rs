//! Obligation Verifier
//!
//! Drives one reasoning call per in-scope obligation. Dispatch is bounded and
//! completes in any order; every result is handed back with its position so
//! the aggregator can restore canonical order.

use crate::error::{CompletenessViolation, FatalError};
use crate::plan::{ObligationPosition, RunPlan};
use crate::reasoning::{ComplianceAssessment, ReasoningAdapter};
use crate::retry::{with_retry, RetryOutcome, RetryPolicy};
use crate::run::{next_before, RunStop};
use futures::stream::{self, StreamExt};
use shared_types::{
    ComplianceVerdict, DocumentSet, Obligation, ObligationCitation, PermitProfile,
};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

pub struct ObligationVerifier<'a> {
    adapter: &'a ReasoningAdapter,
    retry: RetryPolicy,
    concurrency: usize,
}

impl<'a> ObligationVerifier<'a> {
    pub fn new(adapter: &'a ReasoningAdapter, retry: RetryPolicy, concurrency: usize) -> Self {
        Self {
            adapter,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Verify one obligation.
    ///
    /// Exhausted retries produce an `AnalysisError` verdict instead of an
    /// error, so one bad obligation never takes down the run.
    ///
    /// # Errors
    /// Quota and authentication failures.
    #[instrument(skip_all, fields(document_set_id = %document_set.id, obligation_id = %obligation.id))]
    pub async fn verify_one(
        &self,
        profile: &PermitProfile,
        document_set: &DocumentSet,
        obligation: &Obligation,
    ) -> Result<ComplianceVerdict, FatalError> {
        let label = format!("{}/{}", document_set.id, obligation.id);
        let outcome = with_retry(&self.retry, &label, |_| {
            self.adapter.assess_compliance(profile, document_set, obligation)
        })
        .await;

        match outcome {
            RetryOutcome::Success { value, attempts } => {
                debug!(attempts, status = value.status.label(), "obligation verified");
                Ok(accepted_verdict(document_set, obligation, value))
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                warn!(attempts, "obligation analysis failed: {}", last_error);
                Ok(ComplianceVerdict::analysis_error(
                    &document_set.id,
                    &obligation.id,
                    obligation.source_citation.clone(),
                    format!(
                        "Analysis failed after {} attempt(s): {}",
                        attempts, last_error
                    ),
                ))
            }
            RetryOutcome::Fatal { error, .. } => Err(error),
        }
    }

    /// Verify every obligation of the plan.
    ///
    /// Verdicts are passed to `on_verdict` as they complete, in completion
    /// order. Returns why verification stopped early, if it did; a fatal
    /// error stops dispatch and abandons calls still in flight.
    ///
    /// # Errors
    /// Whatever `on_verdict` rejects.
    pub async fn verify_plan<F>(
        &self,
        profile: &PermitProfile,
        plan: &RunPlan<'_>,
        deadline: Option<Instant>,
        mut on_verdict: F,
    ) -> Result<Option<RunStop>, CompletenessViolation>
    where
        F: FnMut(ObligationPosition, ComplianceVerdict) -> Result<(), CompletenessViolation>,
    {
        let jobs = plan.jobs();
        let results = stream::iter(jobs)
            .map(|job| async move {
                let result = self
                    .verify_one(profile, job.document_set, job.obligation)
                    .await;
                (job, result)
            })
            .buffer_unordered(self.concurrency);
        let mut results = std::pin::pin!(results);

        loop {
            let next = match next_before(&mut results, deadline).await {
                Some(next) => next,
                None => return Ok(Some(RunStop::TimedOut)),
            };

            match next {
                Some((job, Ok(verdict))) => on_verdict(job.position, verdict)?,
                Some((job, Err(error))) => {
                    return Ok(Some(RunStop::fatal(
                        error,
                        &job.document_set.id,
                        Some(&job.obligation.id),
                    )))
                }
                None => return Ok(None),
            }
        }
    }
}

fn accepted_verdict(
    document_set: &DocumentSet,
    obligation: &Obligation,
    assessment: ComplianceAssessment,
) -> ComplianceVerdict {
    ComplianceVerdict {
        document_set_id: document_set.id.clone(),
        obligation_id: obligation.id.clone(),
        status: assessment.status,
        findings: assessment.findings,
        gaps: assessment.gaps,
        recommendations: assessment.recommendations,
        permit_citations: assessment.permit_citations,
        obligation_citation: ObligationCitation {
            source: obligation.source_citation.clone(),
            excerpt: assessment.obligation_excerpt,
        },
    }
}
