//! Applicability Matcher
//!
//! Classifies every document set against the permit profile. Each set gets
//! exactly one verdict: the first schema-valid response accepted by the retry
//! loop. Earlier invalid responses are discarded.

use crate::error::{FatalError, ReasoningError};
use crate::reasoning::{ApplicabilityAssessment, ReasoningAdapter};
use crate::retry::{with_retry, RetryOutcome, RetryPolicy};
use crate::run::{next_before, RunStop};
use futures::stream::{self, StreamExt};
use shared_types::{ApplicabilityClass, ApplicabilityVerdict, DocumentSet, PermitProfile};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Verdicts decided before matching ended, plus why it ended early, if it did.
#[derive(Debug)]
pub struct MatchOutcome {
    /// Catalog order, possibly a prefix when `stop` is set.
    pub verdicts: Vec<ApplicabilityVerdict>,
    pub stop: Option<RunStop>,
}

pub struct ApplicabilityMatcher<'a> {
    adapter: &'a ReasoningAdapter,
    retry: RetryPolicy,
    concurrency: usize,
}

impl<'a> ApplicabilityMatcher<'a> {
    pub fn new(adapter: &'a ReasoningAdapter, retry: RetryPolicy, concurrency: usize) -> Self {
        Self {
            adapter,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Classify one document set.
    ///
    /// Exhausted retries fall back to `PotentiallyApplicable` with the error
    /// recorded, so the set's obligations are still verified.
    ///
    /// # Errors
    /// Quota and authentication failures.
    #[instrument(skip_all, fields(document_set_id = %document_set.id))]
    pub async fn classify(
        &self,
        profile: &PermitProfile,
        document_set: &DocumentSet,
    ) -> Result<ApplicabilityVerdict, FatalError> {
        let outcome = with_retry(&self.retry, &document_set.id, |_| {
            self.adapter.assess_applicability(profile, document_set)
        })
        .await;

        match outcome {
            RetryOutcome::Success { value, attempts } => {
                if attempts > 1 {
                    debug!(
                        attempts,
                        classification = value.classification.label(),
                        "accepted later response, earlier responses discarded"
                    );
                }
                Ok(accepted_verdict(document_set, value))
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                warn!(
                    attempts,
                    "applicability undetermined, treating set as potentially applicable: {}",
                    last_error
                );
                Ok(fallback_verdict(document_set, attempts, &last_error))
            }
            RetryOutcome::Fatal { error, .. } => Err(error),
        }
    }

    /// Classify all sets, keeping catalog order.
    ///
    /// Stops at the first fatal error or when `deadline` passes; verdicts
    /// decided so far are returned either way.
    pub async fn classify_all(
        &self,
        profile: &PermitProfile,
        document_sets: &[DocumentSet],
        deadline: Option<Instant>,
    ) -> MatchOutcome {
        let results = stream::iter(document_sets)
            .map(|document_set| async move {
                (document_set, self.classify(profile, document_set).await)
            })
            .buffered(self.concurrency);
        let mut results = std::pin::pin!(results);

        let mut verdicts = Vec::with_capacity(document_sets.len());
        loop {
            let next = match next_before(&mut results, deadline).await {
                Some(next) => next,
                None => {
                    warn!(decided = verdicts.len(), "run deadline passed during matching");
                    return MatchOutcome {
                        verdicts,
                        stop: Some(RunStop::TimedOut),
                    };
                }
            };

            match next {
                Some((_, Ok(verdict))) => {
                    info!(
                        document_set_id = %verdict.document_set_id,
                        classification = verdict.classification.label(),
                        "applicability decided"
                    );
                    verdicts.push(verdict);
                }
                Some((document_set, Err(error))) => {
                    return MatchOutcome {
                        verdicts,
                        stop: Some(RunStop::fatal(error, &document_set.id, None)),
                    };
                }
                None => {
                    return MatchOutcome {
                        verdicts,
                        stop: None,
                    }
                }
            }
        }
    }
}

fn accepted_verdict(
    document_set: &DocumentSet,
    assessment: ApplicabilityAssessment,
) -> ApplicabilityVerdict {
    ApplicabilityVerdict {
        document_set_id: document_set.id.clone(),
        document_set_title: document_set.title.clone(),
        classification: assessment.classification,
        justification: assessment.justification,
        cited_permit_excerpt: Some(assessment.permit_citation),
        cited_scope_excerpt: Some(assessment.scope_excerpt),
        analysis_error: None,
    }
}

fn fallback_verdict(
    document_set: &DocumentSet,
    attempts: u32,
    error: &ReasoningError,
) -> ApplicabilityVerdict {
    ApplicabilityVerdict {
        document_set_id: document_set.id.clone(),
        document_set_title: document_set.title.clone(),
        classification: ApplicabilityClass::PotentiallyApplicable,
        justification: format!(
            "Applicability could not be determined after {} attempt(s); obligations are verified as a precaution",
            attempts
        ),
        cited_permit_excerpt: None,
        cited_scope_excerpt: None,
        analysis_error: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::mock::responses;
    use crate::reasoning::ScriptedReasoningClient;
    use crate::test_support::{document_set, profile};
    use pretty_assertions::assert_eq;
    use shared_types::IncompleteReason;
    use std::sync::Arc;
    use std::time::Duration;

    fn matcher_for(client: Arc<ScriptedReasoningClient>) -> (ReasoningAdapter, RetryPolicy) {
        (ReasoningAdapter::new(client, 4), RetryPolicy::immediate(3))
    }

    #[tokio::test]
    async fn test_classify_accepts_valid_response() {
        let client = Arc::new(ScriptedReasoningClient::compliant());
        let (adapter, retry) = matcher_for(client.clone());
        let matcher = ApplicabilityMatcher::new(&adapter, retry, 2);

        let verdict = matcher
            .classify(&profile(), &document_set("IRPP", 2))
            .await
            .unwrap();

        assert_eq!(verdict.classification, ApplicabilityClass::LikelyApplicable);
        assert_eq!(verdict.document_set_title, "IRPP reference document");
        assert!(verdict.cited_permit_excerpt.is_some());
        assert!(verdict.cited_scope_excerpt.is_some());
        assert_eq!(verdict.analysis_error, None);
    }

    #[tokio::test]
    async fn test_later_valid_response_wins() {
        let client = Arc::new(ScriptedReasoningClient::compliant().script(
            "IRPP",
            vec![
                Ok("{\"classification\": \"maybe\"}".to_string()),
                Ok(responses::applicability(
                    "IRPP",
                    ApplicabilityClass::NotApplicable,
                )),
            ],
        ));
        let (adapter, retry) = matcher_for(client.clone());
        let matcher = ApplicabilityMatcher::new(&adapter, retry, 1);

        let verdict = matcher
            .classify(&profile(), &document_set("IRPP", 2))
            .await
            .unwrap();

        assert_eq!(verdict.classification, ApplicabilityClass::NotApplicable);
        assert_eq!(client.calls_for("IRPP").await, 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back_to_potentially_applicable() {
        let client = Arc::new(ScriptedReasoningClient::compliant().script(
            "IRPP",
            vec![
                Err(ReasoningError::TransportFailure("reset".to_string())),
                Err(ReasoningError::TransportFailure("reset".to_string())),
                Err(ReasoningError::TransportFailure("reset".to_string())),
            ],
        ));
        let (adapter, retry) = matcher_for(client.clone());
        let matcher = ApplicabilityMatcher::new(&adapter, retry, 1);

        let verdict = matcher
            .classify(&profile(), &document_set("IRPP", 2))
            .await
            .unwrap();

        assert_eq!(
            verdict.classification,
            ApplicabilityClass::PotentiallyApplicable
        );
        assert!(verdict.analysis_error.unwrap().contains("reset"));
        assert_eq!(client.calls_for("IRPP").await, 3);
    }

    #[tokio::test]
    async fn test_classify_all_keeps_catalog_order() {
        let client = Arc::new(ScriptedReasoningClient::compliant().with_latency(|request| {
            match request.document_set().id.as_str() {
                "A" => Duration::from_millis(30),
                "B" => Duration::from_millis(10),
                _ => Duration::ZERO,
            }
        }));
        let (adapter, retry) = matcher_for(client);
        let matcher = ApplicabilityMatcher::new(&adapter, retry, 3);
        let sets = vec![document_set("A", 1), document_set("B", 1), document_set("C", 1)];

        let outcome = matcher.classify_all(&profile(), &sets, None).await;

        assert!(outcome.stop.is_none());
        let ids: Vec<_> = outcome
            .verdicts
            .iter()
            .map(|v| v.document_set_id.as_str())
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_classify_all_stops_on_quota() {
        let client = Arc::new(ScriptedReasoningClient::compliant().script(
            "B",
            vec![Err(ReasoningError::QuotaExceeded("monthly cap".to_string()))],
        ));
        let (adapter, retry) = matcher_for(client.clone());
        let matcher = ApplicabilityMatcher::new(&adapter, retry, 1);
        let sets = vec![document_set("A", 1), document_set("B", 1), document_set("C", 1)];

        let outcome = matcher.classify_all(&profile(), &sets, None).await;

        assert_eq!(outcome.verdicts.len(), 1);
        match outcome.stop {
            Some(RunStop::Fatal {
                reason,
                document_set_id,
                ..
            }) => {
                assert_eq!(reason, IncompleteReason::QuotaExceeded);
                assert_eq!(document_set_id, "B");
            }
            other => panic!("expected fatal stop, got {:?}", other),
        }
        // Quota errors are not retried.
        assert_eq!(client.calls_for("B").await, 1);
    }

    #[tokio::test]
    async fn test_classify_all_honors_deadline() {
        let client = Arc::new(
            ScriptedReasoningClient::compliant().with_latency(|_| Duration::from_millis(200)),
        );
        let (adapter, retry) = matcher_for(client);
        let matcher = ApplicabilityMatcher::new(&adapter, retry, 1);
        let sets = vec![document_set("A", 1), document_set("B", 1)];
        let deadline = Instant::now() + Duration::from_millis(20);

        let outcome = matcher.classify_all(&profile(), &sets, Some(deadline)).await;

        assert!(outcome.verdicts.is_empty());
        assert!(matches!(outcome.stop, Some(RunStop::TimedOut)));
    }
}
