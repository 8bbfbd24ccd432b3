//! One permit verification run.
//!
//! A [`VerificationRun`] owns all per-run state: the permit document, the
//! selected document sets, the aggregator and the audit trail. Nothing is
//! shared between runs except the knowledge base and the reasoning adapter.

use crate::aggregator::VerdictAggregator;
use crate::catalog::KnowledgeBase;
use crate::config::PipelineConfig;
use crate::error::{FatalError, PipelineError};
use crate::matcher::ApplicabilityMatcher;
use crate::plan::RunPlan;
use crate::profile::ProfileExtractor;
use crate::reasoning::ReasoningAdapter;
use crate::retry::RetryPolicy;
use crate::verifier::ObligationVerifier;
use futures::{Stream, StreamExt};
use shared_pdf::ExtractedDocument;
use shared_types::{
    ComplianceReport, DocumentSet, IncompleteReason, RunAuditTrail, RunEventKind,
};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

/// Why a phase ended before all its work was done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// Quota or authentication failure.
    Fatal {
        reason: IncompleteReason,
        message: String,
        document_set_id: String,
        obligation_id: Option<String>,
    },
    TimedOut,
}

impl RunStop {
    pub fn fatal(error: FatalError, document_set_id: &str, obligation_id: Option<&str>) -> Self {
        let (reason, message) = match error {
            FatalError::QuotaExceeded(message) => (IncompleteReason::QuotaExceeded, message),
            FatalError::AuthFailure(message) => (IncompleteReason::AuthFailure, message),
        };
        RunStop::Fatal {
            reason,
            message,
            document_set_id: document_set_id.to_string(),
            obligation_id: obligation_id.map(str::to_string),
        }
    }

    pub fn reason(&self) -> IncompleteReason {
        match self {
            RunStop::Fatal { reason, .. } => *reason,
            RunStop::TimedOut => IncompleteReason::TimedOut,
        }
    }

    fn detail(&self) -> String {
        match self {
            RunStop::Fatal {
                message,
                document_set_id,
                obligation_id: Some(obligation_id),
                ..
            } => format!("{} (at {}/{})", message, document_set_id, obligation_id),
            RunStop::Fatal {
                message,
                document_set_id,
                obligation_id: None,
                ..
            } => format!("{} (while matching {})", message, document_set_id),
            RunStop::TimedOut => "run deadline passed".to_string(),
        }
    }
}

/// Next stream item, or `None` once `deadline` has passed.
pub(crate) async fn next_before<S>(stream: &mut S, deadline: Option<Instant>) -> Option<Option<S::Item>>
where
    S: Stream + Unpin,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, stream.next()).await.ok(),
        None => Some(stream.next().await),
    }
}

/// Result of a run plus its audit trail, which exists whether or not the
/// run succeeded.
#[derive(Debug)]
pub struct RunOutcome {
    pub result: Result<ComplianceReport, PipelineError>,
    pub audit: RunAuditTrail,
}

impl RunOutcome {
    pub fn into_result(self) -> Result<ComplianceReport, PipelineError> {
        self.result
    }
}

pub struct VerificationRun {
    permit_id: String,
    document: ExtractedDocument,
    document_set_ids: Option<Vec<String>>,
    knowledge_base: Arc<dyn KnowledgeBase>,
    adapter: Arc<ReasoningAdapter>,
    retry: RetryPolicy,
    pipeline: PipelineConfig,
    audit: RunAuditTrail,
}

impl VerificationRun {
    pub(crate) fn new(
        permit_id: String,
        document: ExtractedDocument,
        document_set_ids: Option<Vec<String>>,
        knowledge_base: Arc<dyn KnowledgeBase>,
        adapter: Arc<ReasoningAdapter>,
        retry: RetryPolicy,
        pipeline: PipelineConfig,
    ) -> Self {
        let audit = RunAuditTrail::new(&permit_id, &document.content_hash);
        Self {
            permit_id,
            document,
            document_set_ids,
            knowledge_base,
            adapter,
            retry,
            pipeline,
            audit,
        }
    }

    /// Run the pipeline to completion, abort or failure.
    #[instrument(skip_all, fields(permit_id = %self.permit_id, run_id = %self.audit.run_id))]
    pub async fn execute(mut self) -> RunOutcome {
        let result = self.run().await;

        match &result {
            Ok(report) => {
                info!(verdicts = report.verdicts.len(), "verification run completed");
                self.audit.record(RunEventKind::RunCompleted {
                    verdicts: report.verdicts.len(),
                });
            }
            Err(err) => {
                error!("verification run stopped: {}", err);
                let kind = match err.partial_report() {
                    Some(partial) => RunEventKind::RunAborted {
                        reason: partial_reason(err),
                        verdicts: partial.verdicts.len(),
                    },
                    None => RunEventKind::RunFailed {
                        error: err.to_string(),
                    },
                };
                self.audit.record(kind);
            }
        }

        RunOutcome {
            result,
            audit: self.audit,
        }
    }

    async fn run(&mut self) -> Result<ComplianceReport, PipelineError> {
        let started = Instant::now();
        let deadline = self.pipeline.run_timeout().map(|timeout| started + timeout);

        let document_sets = self.select_document_sets()?;
        self.audit.record(RunEventKind::RunStarted {
            document_sets: document_sets.len(),
        });
        info!(
            document_sets = document_sets.len(),
            client = self.adapter.client_name(),
            "verification run started"
        );

        let profile =
            ProfileExtractor::new(self.pipeline.min_permit_chars).extract(&self.permit_id, &self.document)?;
        self.audit.record(RunEventKind::ProfileExtracted {
            segments: profile.text_segments.len(),
            sector_hints: profile.sector_hints.iter().cloned().collect(),
        });

        let concurrency = self.pipeline.max_concurrency;
        let matcher = ApplicabilityMatcher::new(&self.adapter, self.retry, concurrency);
        let matched = matcher
            .classify_all(&profile, &document_sets, deadline)
            .await;
        for verdict in &matched.verdicts {
            self.audit.record(RunEventKind::ApplicabilityDecided {
                document_set_id: verdict.document_set_id.clone(),
                classification: verdict.classification,
            });
        }

        let plan = RunPlan::new(&document_sets, &matched.verdicts);
        let mut aggregator = VerdictAggregator::new(&self.permit_id, &plan);
        info!(
            applicable_sets = plan.applicable_sets().count(),
            obligations = aggregator.expected(),
            "verifying obligations"
        );

        let stop = match matched.stop {
            Some(stop) => Some(stop),
            None => {
                let verifier = ObligationVerifier::new(&self.adapter, self.retry, concurrency);
                let audit = &mut self.audit;
                verifier
                    .verify_plan(&profile, &plan, deadline, |position, verdict| {
                        audit.record(RunEventKind::VerdictRecorded {
                            document_set_id: verdict.document_set_id.clone(),
                            obligation_id: verdict.obligation_id.clone(),
                            status: verdict.status,
                        });
                        aggregator.record(position, verdict)
                    })
                    .await
                    .map_err(|source| PipelineError::CompletenessViolation {
                        permit_id: self.permit_id.clone(),
                        source,
                    })?
            }
        };

        if let Some(stop) = &stop {
            warn!(
                recorded = aggregator.recorded(),
                expected = aggregator.expected(),
                "run interrupted: {}",
                stop.detail()
            );
        }

        let interruption = stop.as_ref().map(|stop| (stop.reason(), stop.detail()));
        let report = aggregator
            .finish(interruption)
            .map_err(|source| PipelineError::CompletenessViolation {
                permit_id: self.permit_id.clone(),
                source,
            })?;

        let permit_id = self.permit_id.clone();
        match stop {
            None => Ok(report),
            Some(RunStop::Fatal {
                reason: IncompleteReason::QuotaExceeded,
                message,
                obligation_id,
                ..
            }) => Err(PipelineError::QuotaExceeded {
                permit_id,
                obligation_id,
                message,
                partial: Box::new(report),
            }),
            Some(RunStop::Fatal {
                message,
                obligation_id,
                ..
            }) => Err(PipelineError::AuthFailure {
                permit_id,
                obligation_id,
                message,
                partial: Box::new(report),
            }),
            Some(RunStop::TimedOut) => Err(PipelineError::TimedOut {
                permit_id,
                elapsed: started.elapsed(),
                partial: Box::new(report),
            }),
        }
    }

    /// Catalog sets in scope for this run, in catalog order.
    fn select_document_sets(&self) -> Result<Vec<DocumentSet>, PipelineError> {
        let catalog = self
            .knowledge_base
            .list_document_sets()
            .map_err(|source| PipelineError::Catalog {
                permit_id: self.permit_id.clone(),
                source,
            })?;

        let Some(ids) = &self.document_set_ids else {
            return Ok(catalog);
        };

        if let Some(unknown) = ids.iter().find(|id| !catalog.iter().any(|set| &set.id == *id)) {
            return Err(PipelineError::UnknownDocumentSet {
                permit_id: self.permit_id.clone(),
                document_set_id: unknown.clone(),
            });
        }

        Ok(catalog
            .into_iter()
            .filter(|set| ids.contains(&set.id))
            .collect())
    }
}

fn partial_reason(err: &PipelineError) -> IncompleteReason {
    match err {
        PipelineError::QuotaExceeded { .. } => IncompleteReason::QuotaExceeded,
        PipelineError::TimedOut { .. } => IncompleteReason::TimedOut,
        _ => IncompleteReason::AuthFailure,
    }
}
