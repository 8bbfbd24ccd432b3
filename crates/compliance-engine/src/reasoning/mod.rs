//! Reasoning Client adapter
//!
//! The engine talks to the external reasoning service through
//! [`ReasoningClient::evaluate`] only. Clients render the structured request
//! in whatever shape their provider needs and return the raw answer;
//! [`ReasoningAdapter`] validates that answer against the expected schema and
//! bounds how many calls are in flight.

pub mod http;
pub mod mock;
pub mod prompts;
pub mod schema;

use crate::error::ReasoningError;
use async_trait::async_trait;
use shared_types::{DocumentSet, Obligation, PermitProfile};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub use http::HttpReasoningClient;
pub use mock::ScriptedReasoningClient;
pub use schema::{ApplicabilityAssessment, ComplianceAssessment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Applicability,
    ObligationCompliance,
}

impl PromptKind {
    pub fn name(&self) -> &'static str {
        match self {
            PromptKind::Applicability => "applicability",
            PromptKind::ObligationCompliance => "obligation_compliance",
        }
    }
}

/// Structured input of one evaluation.
#[derive(Debug, Clone, Copy)]
pub enum EvaluationRequest<'a> {
    Applicability {
        profile: &'a PermitProfile,
        document_set: &'a DocumentSet,
    },
    ObligationCompliance {
        profile: &'a PermitProfile,
        document_set: &'a DocumentSet,
        obligation: &'a Obligation,
    },
}

impl<'a> EvaluationRequest<'a> {
    pub fn kind(&self) -> PromptKind {
        match self {
            EvaluationRequest::Applicability { .. } => PromptKind::Applicability,
            EvaluationRequest::ObligationCompliance { .. } => PromptKind::ObligationCompliance,
        }
    }

    pub fn profile(&self) -> &'a PermitProfile {
        match *self {
            EvaluationRequest::Applicability { profile, .. }
            | EvaluationRequest::ObligationCompliance { profile, .. } => profile,
        }
    }

    pub fn document_set(&self) -> &'a DocumentSet {
        match *self {
            EvaluationRequest::Applicability { document_set, .. }
            | EvaluationRequest::ObligationCompliance { document_set, .. } => document_set,
        }
    }

    pub fn obligation(&self) -> Option<&'a Obligation> {
        match *self {
            EvaluationRequest::Applicability { .. } => None,
            EvaluationRequest::ObligationCompliance { obligation, .. } => Some(obligation),
        }
    }

    /// `SET` for applicability, `SET/OBLIGATION` for compliance.
    pub fn target_key(&self) -> String {
        match self.obligation() {
            Some(obligation) => format!("{}/{}", self.document_set().id, obligation.id),
            None => self.document_set().id.clone(),
        }
    }
}

/// The external reasoning capability.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    fn name(&self) -> &str;

    /// Evaluate one request and return the raw response text.
    async fn evaluate(&self, request: &EvaluationRequest<'_>) -> Result<String, ReasoningError>;
}

/// Schema-validating, concurrency-bounded front of a [`ReasoningClient`].
pub struct ReasoningAdapter {
    client: Arc<dyn ReasoningClient>,
    gate: Semaphore,
}

impl ReasoningAdapter {
    pub fn new(client: Arc<dyn ReasoningClient>, max_in_flight: usize) -> Self {
        Self {
            client,
            gate: Semaphore::new(max_in_flight.max(1)),
        }
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    async fn call(&self, request: &EvaluationRequest<'_>) -> Result<String, ReasoningError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| ReasoningError::TransportFailure("reasoning gate closed".to_string()))?;
        self.client.evaluate(request).await
    }

    pub async fn assess_applicability(
        &self,
        profile: &PermitProfile,
        document_set: &DocumentSet,
    ) -> Result<ApplicabilityAssessment, ReasoningError> {
        let request = EvaluationRequest::Applicability {
            profile,
            document_set,
        };
        let raw = self.call(&request).await?;
        schema::parse_applicability(&raw, &document_set.id, profile)
    }

    pub async fn assess_compliance(
        &self,
        profile: &PermitProfile,
        document_set: &DocumentSet,
        obligation: &Obligation,
    ) -> Result<ComplianceAssessment, ReasoningError> {
        let request = EvaluationRequest::ObligationCompliance {
            profile,
            document_set,
            obligation,
        };
        let raw = self.call(&request).await?;
        schema::parse_compliance(&raw, &obligation.id, profile)
    }
}
