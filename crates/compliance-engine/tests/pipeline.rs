//! End-to-end runs against a scripted reasoning client.

use compliance_engine::config::{EngineConfig, PipelineConfig, RetryConfig};
use compliance_engine::reasoning::mock::responses;
use compliance_engine::reasoning::EvaluationRequest;
use compliance_engine::{
    ComplianceEngine, InMemoryKnowledgeBase, PipelineError, ReasoningError,
    ScriptedReasoningClient,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use shared_pdf::PdfExtractor;
use shared_types::{
    ApplicabilityClass, ComplianceReport, ComplianceStatus, DocumentSet, DocumentSetKind,
    IncompleteReason, Obligation, RunCompletion, SourceCitation,
};
use std::sync::Arc;
use std::time::Duration;

const DAIRY_PERMIT: &str = "Besluit omgevingsvergunning\n\n\
    Activities of the installation\nDairy processing\n\n\
    The installation processes 40 ton raw milk per day into cheese and whey powder.\x0C\
    Voorschrift 1: emissions of dust from the spray dryer shall be monitored yearly.";

fn document_set(id: &str, sector: &str, obligations: usize) -> DocumentSet {
    DocumentSet {
        id: id.to_string(),
        title: format!("{} reference document", id),
        sector: sector.to_string(),
        scope_description: format!("Installations in the {} sector", sector),
        kind: DocumentSetKind::Sectoral,
        obligations: (1..=obligations)
            .map(|n| {
                Obligation::new(
                    format!("{}-{}", id, n),
                    format!("BAT {}", n),
                    format!("Apply technique {} of {}", n, id),
                    SourceCitation::new(format!("BREF {}", id)).with_paragraph(format!("BAT {}", n)),
                )
            })
            .collect(),
    }
}

fn config(max_concurrency: usize) -> EngineConfig {
    EngineConfig {
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 0,
            max_delay_ms: 0,
        },
        pipeline: PipelineConfig {
            max_concurrency,
            run_timeout_secs: 0,
            min_permit_chars: 50,
        },
        ..Default::default()
    }
}

fn engine(
    sets: Vec<DocumentSet>,
    client: Arc<ScriptedReasoningClient>,
    config: &EngineConfig,
) -> ComplianceEngine {
    let kb = InMemoryKnowledgeBase::new(sets).unwrap();
    ComplianceEngine::new(config, Arc::new(kb), client)
}

async fn run(engine: &ComplianceEngine) -> Result<ComplianceReport, PipelineError> {
    engine
        .verify_document("permit-1", PdfExtractor::from_text(DAIRY_PERMIT), None)
        .await
}

/// Applicable when a declared activity mentions one of the set's sector words.
fn scope_aware(request: &EvaluationRequest<'_>) -> Result<String, ReasoningError> {
    let set = request.document_set();
    if let Some(obligation) = request.obligation() {
        return Ok(responses::compliance(&obligation.id, ComplianceStatus::Compliant));
    }
    let covered = request.profile().declared_activities.iter().any(|activity| {
        let activity = activity.to_lowercase();
        set.sector
            .split(',')
            .any(|word| activity.contains(word.trim()))
    });
    let classification = if covered {
        ApplicabilityClass::LikelyApplicable
    } else {
        ApplicabilityClass::NotApplicable
    };
    Ok(responses::applicability(&set.id, classification))
}

fn transport_failures(n: usize) -> Vec<Result<String, ReasoningError>> {
    (0..n)
        .map(|_| Err(ReasoningError::TransportFailure("connection reset".to_string())))
        .collect()
}

#[tokio::test]
async fn test_pig_poultry_set_not_applicable_to_dairy_permit() {
    let client = Arc::new(ScriptedReasoningClient::new(scope_aware));
    let engine = engine(
        vec![
            document_set("IRPP", "pig, poultry", 12),
            document_set("FDM", "dairy, food", 4),
        ],
        client.clone(),
        &config(4),
    );

    let report = run(&engine).await.unwrap();

    let irpp = report.applicability_for("IRPP").unwrap();
    assert_eq!(irpp.classification, ApplicabilityClass::NotApplicable);
    assert!(irpp.cited_permit_excerpt.is_some());
    assert_eq!(report.verdicts_for("IRPP").count(), 0);
    assert_eq!(report.verdicts_for("FDM").count(), 4);
    assert_eq!(report.summary.not_applicable_sets, 1);
    // Obligations of a not applicable set are never sent out.
    assert_eq!(client.calls_for("IRPP/IRPP-1").await, 0);
}

#[tokio::test]
async fn test_transport_failure_on_last_obligation_is_isolated() {
    let client = Arc::new(
        ScriptedReasoningClient::compliant().script("LCP/LCP-35", transport_failures(3)),
    );
    let engine = engine(vec![document_set("LCP", "energy", 35)], client.clone(), &config(4));

    let report = run(&engine).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.verdicts.len(), 35);
    let (content, errors): (Vec<_>, Vec<_>) = report
        .verdicts
        .iter()
        .partition(|v| ComplianceStatus::CONTENT.contains(&v.status));
    assert_eq!(content.len(), 34);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].obligation_id, "LCP-35");
    assert_eq!(report.verdicts[34].status, ComplianceStatus::AnalysisError);
    assert_eq!(client.calls_for("LCP/LCP-35").await, 3);
    assert_eq!(client.calls_for("LCP/LCP-34").await, 1);
    assert_eq!(report.priorities[0].obligation_id, "LCP-35");
}

#[tokio::test]
async fn test_missing_status_is_retried_then_analysis_error() {
    let missing_status = (0..3)
        .map(|_| Ok(responses::compliance_without_status("FDM-2")))
        .collect();
    let client =
        Arc::new(ScriptedReasoningClient::compliant().script("FDM/FDM-2", missing_status));
    let engine = engine(vec![document_set("FDM", "dairy", 3)], client.clone(), &config(2));

    let report = run(&engine).await.unwrap();

    let statuses: Vec<_> = report.verdicts.iter().map(|v| v.status).collect();
    assert_eq!(
        statuses,
        vec![
            ComplianceStatus::Compliant,
            ComplianceStatus::AnalysisError,
            ComplianceStatus::Compliant,
        ]
    );
    assert!(report.verdicts[1].findings.contains("status"));
    assert_eq!(client.calls_for("FDM/FDM-2").await, 3);
}

#[tokio::test]
async fn test_two_applicable_sets_aggregate_consistently() {
    let client = Arc::new(ScriptedReasoningClient::new(|request| {
        Ok(match request.obligation() {
            None => responses::applicability(
                &request.document_set().id,
                ApplicabilityClass::PotentiallyApplicable,
            ),
            Some(obligation) => {
                let n: usize = obligation
                    .id
                    .rsplit('-')
                    .next()
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(0);
                let status = ComplianceStatus::CONTENT[n % 4];
                responses::compliance(&obligation.id, status)
            }
        })
    }));
    let engine = engine(
        vec![document_set("FDM", "dairy", 10), document_set("WI", "waste", 15)],
        client,
        &config(6),
    );

    let report = run(&engine).await.unwrap();

    assert_eq!(report.verdicts.len(), 25);
    assert_eq!(report.summary.expected_verdicts, 25);
    assert_eq!(report.summary.counts.total(), 25);
    assert_eq!(report.document_sets.len(), 2);
    assert_eq!(report.document_sets[0].counts.total(), 10);
    assert_eq!(report.document_sets[1].counts.total(), 15);

    for status in ComplianceStatus::ALL {
        let per_set: usize = report
            .document_sets
            .iter()
            .map(|summary| summary.counts.get(status))
            .sum();
        assert_eq!(per_set, report.summary.counts.get(status));
    }

    let breakdown = report.summary.breakdown;
    let percent_total = breakdown.compliant
        + breakdown.partially_compliant
        + breakdown.non_compliant
        + breakdown.ambiguous
        + breakdown.analysis_error;
    assert!((percent_total - 100.0).abs() < 0.5);
}

#[tokio::test]
async fn test_rerun_yields_identical_report() {
    let client = Arc::new(ScriptedReasoningClient::uniform(
        ApplicabilityClass::LikelyApplicable,
        ComplianceStatus::PartiallyCompliant,
    ));
    let engine = engine(
        vec![document_set("FDM", "dairy", 6), document_set("WT", "waste", 3)],
        client,
        &config(4),
    );

    let first = run(&engine).await.unwrap();
    let second = run(&engine).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_report_order_independent_of_concurrency() {
    let reversed_latency = |request: &EvaluationRequest<'_>| {
        let index = request
            .obligation()
            .and_then(|o| o.id.rsplit('-').next())
            .and_then(|n| n.parse::<u64>().ok())
            .unwrap_or(0);
        Duration::from_millis(2 * (12 - index.min(12)))
    };
    let sets = || vec![document_set("FDM", "dairy", 12), document_set("WT", "waste", 5)];

    let sequential = engine(
        sets(),
        Arc::new(ScriptedReasoningClient::compliant().with_latency(reversed_latency)),
        &config(1),
    );
    let parallel = engine(
        sets(),
        Arc::new(ScriptedReasoningClient::compliant().with_latency(reversed_latency)),
        &config(8),
    );

    let a = run(&sequential).await.unwrap();
    let b = run(&parallel).await.unwrap();

    assert_eq!(a, b);
    let ids: Vec<_> = b.verdicts.iter().map(|v| v.obligation_id.clone()).collect();
    let expected: Vec<_> = (1..=12)
        .map(|n| format!("FDM-{}", n))
        .chain((1..=5).map(|n| format!("WT-{}", n)))
        .collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_quota_exhaustion_returns_partial_report() {
    let client = Arc::new(ScriptedReasoningClient::compliant().script(
        "FDM/FDM-5",
        vec![Err(ReasoningError::QuotaExceeded(
            "insufficient_quota".to_string(),
        ))],
    ));
    let engine = engine(
        vec![document_set("FDM", "dairy", 8), document_set("WT", "waste", 2)],
        client.clone(),
        &config(1),
    );

    let err = run(&engine).await.unwrap_err();

    assert_eq!(err.obligation_id(), Some("FDM-5"));
    let partial = match &err {
        PipelineError::QuotaExceeded { partial, .. } => partial,
        other => panic!("expected quota error, got {:?}", other),
    };
    assert!(!partial.is_complete());
    assert_eq!(partial.verdicts.len(), 4);
    assert_eq!(partial.summary.expected_verdicts, 10);
    match &partial.completion {
        RunCompletion::Incomplete {
            reason, unverified, ..
        } => {
            assert_eq!(*reason, IncompleteReason::QuotaExceeded);
            assert_eq!(unverified.len(), 6);
            assert_eq!(unverified[0].obligation_id, "FDM-5");
        }
        RunCompletion::Complete => panic!("partial report marked complete"),
    }
    // Not retried, and nothing dispatched after the abort.
    assert_eq!(client.calls_for("FDM/FDM-5").await, 1);
    assert_eq!(client.calls_for("WT/WT-1").await, 0);
}

#[tokio::test]
async fn test_auth_failure_during_matching_keeps_decided_sets() {
    let client = Arc::new(ScriptedReasoningClient::compliant().script(
        "WT",
        vec![Err(ReasoningError::AuthFailure("invalid api key".to_string()))],
    ));
    let engine = engine(
        vec![
            document_set("FDM", "dairy", 3),
            document_set("WT", "waste", 2),
            document_set("LCP", "energy", 2),
        ],
        client.clone(),
        &config(1),
    );

    let err = run(&engine).await.unwrap_err();

    assert!(matches!(err, PipelineError::AuthFailure { .. }));
    assert_eq!(err.obligation_id(), None);
    let partial = err.partial_report().unwrap();
    assert_eq!(partial.applicability.len(), 1);
    assert!(partial.verdicts.is_empty());
    assert_eq!(client.total_calls().await, 2);
    match &partial.completion {
        RunCompletion::Incomplete {
            reason,
            unverified,
            undecided,
            ..
        } => {
            assert_eq!(*reason, IncompleteReason::AuthFailure);
            assert_eq!(unverified.len(), 3);
            assert_eq!(undecided, &vec!["WT".to_string(), "LCP".to_string()]);
        }
        RunCompletion::Complete => panic!("expected incomplete report"),
    }
    assert!(partial
        .summary
        .recommendations
        .iter()
        .any(|r| r.contains("WT, LCP")));
    assert!(partial.to_text().contains("Applicability not decided: WT, LCP"));
}

#[tokio::test(start_paused = true)]
async fn test_run_timeout_marks_report_incomplete() {
    let client = Arc::new(ScriptedReasoningClient::compliant().with_latency(|request| {
        if request.obligation().is_some() {
            Duration::from_millis(300)
        } else {
            Duration::ZERO
        }
    }));
    let mut config = config(1);
    config.pipeline.run_timeout_secs = 1;
    let engine = engine(vec![document_set("FDM", "dairy", 10)], client, &config);

    let err = run(&engine).await.unwrap_err();

    let partial = match &err {
        PipelineError::TimedOut { partial, .. } => partial,
        other => panic!("expected timeout, got {:?}", other),
    };
    assert_eq!(partial.verdicts.len(), 3);
    match &partial.completion {
        RunCompletion::Incomplete {
            reason, unverified, ..
        } => {
            assert_eq!(*reason, IncompleteReason::TimedOut);
            assert_eq!(unverified.len(), 7);
        }
        RunCompletion::Complete => panic!("partial report marked complete"),
    }
}

#[tokio::test]
async fn test_verify_reads_permit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("2024-0077.txt");
    std::fs::write(&path, DAIRY_PERMIT).unwrap();

    let client = Arc::new(ScriptedReasoningClient::compliant());
    let engine = engine(vec![document_set("FDM", "dairy", 2)], client, &config(2));

    let report = engine.verify(&path, None).await.unwrap();

    assert_eq!(report.permit_id, "2024-0077");
    assert_eq!(report.verdicts.len(), 2);
    assert!(report.to_text().contains("2024-0077"));
}

#[tokio::test]
async fn test_selected_document_sets_only() {
    let client = Arc::new(ScriptedReasoningClient::compliant());
    let engine = engine(
        vec![document_set("FDM", "dairy", 2), document_set("WT", "waste", 3)],
        client.clone(),
        &config(2),
    );
    let selection = vec!["WT".to_string()];

    let report = engine
        .verify_document(
            "permit-1",
            PdfExtractor::from_text(DAIRY_PERMIT),
            Some(selection.as_slice()),
        )
        .await
        .unwrap();

    assert_eq!(report.applicability.len(), 1);
    assert_eq!(report.verdicts.len(), 3);
    assert_eq!(client.calls_for("FDM").await, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_every_applicable_obligation_gets_one_verdict(
        layout in prop::collection::vec((0usize..6, 0usize..3), 1..5)
    ) {
        let classes = [
            ApplicabilityClass::LikelyApplicable,
            ApplicabilityClass::PotentiallyApplicable,
            ApplicabilityClass::NotApplicable,
        ];
        let sets: Vec<DocumentSet> = layout
            .iter()
            .enumerate()
            .map(|(i, (size, _))| document_set(&format!("S{}", i), "dairy", *size))
            .collect();
        let class_of: Vec<(String, ApplicabilityClass)> = layout
            .iter()
            .enumerate()
            .map(|(i, (_, class))| (format!("S{}", i), classes[*class]))
            .collect();

        let client = Arc::new(ScriptedReasoningClient::new(move |request| {
            Ok(match request.obligation() {
                None => {
                    let id = &request.document_set().id;
                    let class = class_of
                        .iter()
                        .find(|(set_id, _)| set_id == id)
                        .map(|(_, class)| *class)
                        .unwrap_or(ApplicabilityClass::NotApplicable);
                    responses::applicability(id, class)
                }
                Some(obligation) => responses::compliance(&obligation.id, ComplianceStatus::Compliant),
            })
        }));
        let engine = engine(sets.clone(), client, &config(3));

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let report = runtime.block_on(run(&engine)).unwrap();

        let expected: usize = sets
            .iter()
            .zip(&layout)
            .filter(|(_, (_, class))| classes[*class].is_applicable())
            .map(|(set, _)| set.obligation_count())
            .sum();
        prop_assert_eq!(report.verdicts.len(), expected);
        prop_assert!(report.is_complete());

        for (set, (_, class)) in sets.iter().zip(&layout) {
            let count = report.verdicts_for(&set.id).count();
            if classes[*class].is_applicable() {
                prop_assert_eq!(count, set.obligation_count());
            } else {
                prop_assert_eq!(count, 0);
            }
        }
    }
}
