//! Deterministic scripted reasoning client for tests and offline runs.
//!
//! Answers come from per-target scripts first (consumed in order, one per
//! call), then from a fallback responder. Targets are keyed by
//! [`EvaluationRequest::target_key`], so answers do not depend on dispatch
//! order or concurrency.

use super::{EvaluationRequest, ReasoningClient};
use crate::error::ReasoningError;
use async_trait::async_trait;
use shared_types::{ApplicabilityClass, ComplianceStatus};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

type Responder = dyn Fn(&EvaluationRequest<'_>) -> Result<String, ReasoningError> + Send + Sync;
type Latency = dyn Fn(&EvaluationRequest<'_>) -> Duration + Send + Sync;

pub struct ScriptedReasoningClient {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, ReasoningError>>>>,
    responder: Box<Responder>,
    latency: Option<Box<Latency>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedReasoningClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&EvaluationRequest<'_>) -> Result<String, ReasoningError> + Send + Sync + 'static,
    {
        Self {
            scripts: Mutex::new(HashMap::new()),
            responder: Box::new(responder),
            latency: None,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Every set likely applicable, every obligation compliant.
    pub fn compliant() -> Self {
        Self::uniform(ApplicabilityClass::LikelyApplicable, ComplianceStatus::Compliant)
    }

    /// The same classification for every set and status for every obligation.
    pub fn uniform(classification: ApplicabilityClass, status: ComplianceStatus) -> Self {
        Self::new(move |request| {
            Ok(match request.obligation() {
                None => responses::applicability(&request.document_set().id, classification),
                Some(obligation) => responses::compliance(&obligation.id, status),
            })
        })
    }

    /// Queue answers for one target key (`SET` or `SET/OBLIGATION`).
    pub fn script(
        mut self,
        target_key: impl Into<String>,
        outcomes: Vec<Result<String, ReasoningError>>,
    ) -> Self {
        self.scripts
            .get_mut()
            .entry(target_key.into())
            .or_default()
            .extend(outcomes);
        self
    }

    /// Simulated latency per request, e.g. to force out-of-order completion.
    pub fn with_latency<F>(mut self, latency: F) -> Self
    where
        F: Fn(&EvaluationRequest<'_>) -> Duration + Send + Sync + 'static,
    {
        self.latency = Some(Box::new(latency));
        self
    }

    pub async fn calls_for(&self, target_key: &str) -> u32 {
        self.calls.lock().await.get(target_key).copied().unwrap_or(0)
    }

    pub async fn total_calls(&self) -> u32 {
        self.calls.lock().await.values().sum()
    }
}

#[async_trait]
impl ReasoningClient for ScriptedReasoningClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn evaluate(&self, request: &EvaluationRequest<'_>) -> Result<String, ReasoningError> {
        let key = request.target_key();
        *self.calls.lock().await.entry(key.clone()).or_insert(0) += 1;

        if let Some(latency) = &self.latency {
            let delay = latency(request);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let scripted = self
            .scripts
            .lock()
            .await
            .get_mut(&key)
            .and_then(VecDeque::pop_front);

        tracing::trace!(
            target_key = %key,
            kind = request.kind().name(),
            scripted = scripted.is_some(),
            "scripted evaluation"
        );
        match scripted {
            Some(outcome) => outcome,
            None => (self.responder)(request),
        }
    }
}

impl std::fmt::Debug for ScriptedReasoningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedReasoningClient").finish_non_exhaustive()
    }
}

/// Well-formed response bodies.
pub mod responses {
    use serde_json::json;
    use shared_types::{ApplicabilityClass, ComplianceStatus};

    pub fn applicability(document_set_id: &str, classification: ApplicabilityClass) -> String {
        json!({
            "document_set_id": document_set_id,
            "classification": classification.label(),
            "justification": format!("Scripted decision for {}", document_set_id),
            "permit_citation": {"excerpt": "scripted permit excerpt", "page": 1, "paragraph": 1},
            "scope_citation": "scripted scope excerpt",
        })
        .to_string()
    }

    pub fn compliance(obligation_id: &str, status: ComplianceStatus) -> String {
        let (gaps, recommendations) = if status == ComplianceStatus::Compliant {
            (json!([]), json!([]))
        } else {
            (
                json!([format!("Gap for {}", obligation_id)]),
                json!([format!("Recommendation for {}", obligation_id)]),
            )
        };
        json!({
            "obligation_id": obligation_id,
            "status": status.label(),
            "findings": format!("Scripted finding for {}, see p.1 ¶1", obligation_id),
            "gaps": gaps,
            "recommendations": recommendations,
            "permit_citations": [{"excerpt": "scripted permit excerpt", "page": 1, "paragraph": 1}],
            "obligation_excerpt": format!("Text of {}", obligation_id),
        })
        .to_string()
    }

    /// Valid shape with the `status` field left out.
    pub fn compliance_without_status(obligation_id: &str) -> String {
        let mut value: serde_json::Value =
            serde_json::from_str(&compliance(obligation_id, ComplianceStatus::Compliant))
                .unwrap_or_default();
        if let Some(object) = value.as_object_mut() {
            object.remove("status");
        }
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::schema;
    use shared_types::{
        DocumentSet, DocumentSetKind, Obligation, PermitDocumentType, PermitProfile,
        SourceCitation, TextSegment,
    };

    fn fixtures() -> (PermitProfile, DocumentSet) {
        let profile = PermitProfile {
            permit_id: "p".to_string(),
            title: None,
            document_type: PermitDocumentType::Other,
            declared_activities: Default::default(),
            sector_hints: Default::default(),
            capacities: Vec::new(),
            activity_description: String::new(),
            raw_text: "text".to_string(),
            text_segments: vec![TextSegment::new("text", 1, 1)],
        };
        let set = DocumentSet {
            id: "STS".to_string(),
            title: "Surface Treatment using Organic Solvents".to_string(),
            sector: "manufacturing".to_string(),
            scope_description: "solvent use".to_string(),
            kind: DocumentSetKind::Horizontal,
            obligations: vec![Obligation::new(
                "BAT 1",
                "EMS",
                "Implement an EMS",
                SourceCitation::new("BREF STS"),
            )],
        };
        (profile, set)
    }

    #[tokio::test]
    async fn test_script_consumed_before_responder() {
        let (profile, set) = fixtures();
        let client = ScriptedReasoningClient::compliant().script(
            "STS/BAT 1",
            vec![Err(ReasoningError::TransportFailure("timeout".into()))],
        );
        let request = EvaluationRequest::ObligationCompliance {
            profile: &profile,
            document_set: &set,
            obligation: &set.obligations[0],
        };

        assert!(client.evaluate(&request).await.is_err());
        let raw = client.evaluate(&request).await.unwrap();
        assert!(schema::parse_compliance(&raw, "BAT 1", &profile).is_ok());
        assert_eq!(client.calls_for("STS/BAT 1").await, 2);
        assert_eq!(client.total_calls().await, 2);
    }

    #[test]
    fn test_canned_responses_validate() {
        let (profile, _) = fixtures();
        for status in ComplianceStatus::CONTENT {
            let raw = responses::compliance("BAT 9", status);
            let parsed = schema::parse_compliance(&raw, "BAT 9", &profile).unwrap();
            assert_eq!(parsed.status, status);
        }
        let raw = responses::applicability("STS", ApplicabilityClass::NotApplicable);
        assert!(schema::parse_applicability(&raw, "STS", &profile).is_ok());
        let raw = responses::compliance_without_status("BAT 9");
        assert!(schema::parse_compliance(&raw, "BAT 9", &profile).is_err());
    }
}
