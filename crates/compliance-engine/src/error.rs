//! Error taxonomy of a verification run.
//!
//! Obligation-scoped failures ([`ReasoningError::MalformedResponse`],
//! [`ReasoningError::TransportFailure`], [`ReasoningError::RequestRejected`])
//! never leave the verifier; they become `AnalysisError` verdicts. Everything in [`PipelineError`] reaches the caller.

use shared_pdf::ExtractionError;
use shared_types::ComplianceReport;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by the reasoning service boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReasoningError {
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String, raw_excerpt: String },

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// The provider refused this request (4xx other than auth, quota,
    /// rate limit or timeout). Repeating it gives the same answer.
    #[error("request rejected: {0}")]
    RequestRejected(String),
}

impl ReasoningError {
    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        ReasoningError::MalformedResponse {
            reason: reason.into(),
            raw_excerpt: raw.chars().take(200).collect(),
        }
    }

    /// Only transport and format failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReasoningError::MalformedResponse { .. } | ReasoningError::TransportFailure(_) => true,
            ReasoningError::QuotaExceeded(_)
            | ReasoningError::AuthFailure(_)
            | ReasoningError::RequestRejected(_) => false,
        }
    }

    /// Split off the failures that end the run; obligation-scoped ones come
    /// back as `Err`.
    pub fn into_fatal(self) -> Result<FatalError, ReasoningError> {
        match self {
            ReasoningError::QuotaExceeded(message) => Ok(FatalError::QuotaExceeded(message)),
            ReasoningError::AuthFailure(message) => Ok(FatalError::AuthFailure(message)),
            scoped @ (ReasoningError::MalformedResponse { .. }
            | ReasoningError::TransportFailure(_)
            | ReasoningError::RequestRejected(_)) => Err(scoped),
        }
    }
}

/// Reasoning failures that stop the run instead of being retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),
}

/// Problems with the regulatory catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate document set id `{0}`")]
    DuplicateDocumentSet(String),

    #[error("document set `{document_set_id}` has duplicate obligation id `{obligation_id}`")]
    DuplicateObligation {
        document_set_id: String,
        obligation_id: String,
    },

    #[error("document set `{0}` contains an obligation with an empty id")]
    EmptyObligationId(String),

    #[error("knowledge base unavailable: {0}")]
    Unavailable(String),
}

/// Internal invariant failure: verdicts and in-scope obligations disagree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("completeness violation: {detail} (expected {expected} verdicts, have {actual})")]
pub struct CompletenessViolation {
    pub expected: usize,
    pub actual: usize,
    pub detail: String,
}

/// Errors surfaced by `verify`.
///
/// Run-scoped aborts carry the partial report, explicitly marked incomplete.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("permit {permit_id}: extraction failed: {source}")]
    ExtractionFailure {
        permit_id: String,
        #[source]
        source: ExtractionError,
    },

    #[error("permit {permit_id}: extracted text too short ({chars} < {min} characters){}", scan_hint(.scanned))]
    ExtractionEmpty {
        permit_id: String,
        chars: usize,
        min: usize,
        scanned: bool,
    },

    #[error("permit {permit_id}: reasoning quota exceeded{}: {message}", at_obligation(.obligation_id))]
    QuotaExceeded {
        permit_id: String,
        obligation_id: Option<String>,
        message: String,
        partial: Box<ComplianceReport>,
    },

    #[error("permit {permit_id}: reasoning service rejected credentials{}: {message}", at_obligation(.obligation_id))]
    AuthFailure {
        permit_id: String,
        obligation_id: Option<String>,
        message: String,
        partial: Box<ComplianceReport>,
    },

    #[error("permit {permit_id}: run timed out after {elapsed:?}")]
    TimedOut {
        permit_id: String,
        elapsed: Duration,
        partial: Box<ComplianceReport>,
    },

    #[error("permit {permit_id}: {source}")]
    CompletenessViolation {
        permit_id: String,
        #[source]
        source: CompletenessViolation,
    },

    #[error("permit {permit_id}: unknown document set `{document_set_id}`")]
    UnknownDocumentSet {
        permit_id: String,
        document_set_id: String,
    },

    #[error("permit {permit_id}: {source}")]
    Catalog {
        permit_id: String,
        #[source]
        source: CatalogError,
    },
}

fn scan_hint(scanned: &bool) -> &'static str {
    if *scanned {
        ", document looks like a scan without text layer"
    } else {
        ""
    }
}

fn at_obligation(obligation_id: &Option<String>) -> String {
    obligation_id
        .as_ref()
        .map(|id| format!(" at obligation {}", id))
        .unwrap_or_default()
}

impl PipelineError {
    pub fn permit_id(&self) -> &str {
        match self {
            PipelineError::ExtractionFailure { permit_id, .. }
            | PipelineError::ExtractionEmpty { permit_id, .. }
            | PipelineError::QuotaExceeded { permit_id, .. }
            | PipelineError::AuthFailure { permit_id, .. }
            | PipelineError::TimedOut { permit_id, .. }
            | PipelineError::CompletenessViolation { permit_id, .. }
            | PipelineError::UnknownDocumentSet { permit_id, .. }
            | PipelineError::Catalog { permit_id, .. } => permit_id,
        }
    }

    /// The obligation being evaluated when the run aborted, if any.
    pub fn obligation_id(&self) -> Option<&str> {
        match self {
            PipelineError::QuotaExceeded { obligation_id, .. }
            | PipelineError::AuthFailure { obligation_id, .. } => obligation_id.as_deref(),
            _ => None,
        }
    }

    /// Partial report for run-scoped aborts.
    pub fn partial_report(&self) -> Option<&ComplianceReport> {
        match self {
            PipelineError::QuotaExceeded { partial, .. }
            | PipelineError::AuthFailure { partial, .. }
            | PipelineError::TimedOut { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(ReasoningError::malformed("missing status", "{}").is_retryable());
        assert!(ReasoningError::TransportFailure("reset".into()).is_retryable());
        assert!(!ReasoningError::QuotaExceeded("insufficient_quota".into()).is_retryable());
        assert!(!ReasoningError::AuthFailure("401".into()).is_retryable());
    }

    #[test]
    fn test_into_fatal_keeps_quota_and_auth_apart() {
        assert_eq!(
            ReasoningError::QuotaExceeded("cap".into()).into_fatal(),
            Ok(FatalError::QuotaExceeded("cap".into()))
        );
        assert_eq!(
            ReasoningError::AuthFailure("401".into()).into_fatal(),
            Ok(FatalError::AuthFailure("401".into()))
        );
        let transport = ReasoningError::TransportFailure("reset".into());
        assert_eq!(transport.clone().into_fatal(), Err(transport));

        let rejected = ReasoningError::RequestRejected("400 Bad Request".into());
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.clone().into_fatal(), Err(rejected));
    }

    #[test]
    fn test_malformed_truncates_raw_excerpt() {
        let raw = "x".repeat(1000);
        match ReasoningError::malformed("bad", &raw) {
            ReasoningError::MalformedResponse { raw_excerpt, .. } => {
                assert_eq!(raw_excerpt.len(), 200)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_extraction_empty_message() {
        let err = PipelineError::ExtractionEmpty {
            permit_id: "p-1".into(),
            chars: 3,
            min: 200,
            scanned: true,
        };
        let message = err.to_string();
        assert!(message.contains("p-1"));
        assert!(message.contains("scan"));
        assert!(err.partial_report().is_none());
    }
}
