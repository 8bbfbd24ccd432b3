//! Tamper-evident audit trail for verification runs

use crate::report::IncompleteReason;
use crate::verdict::{ApplicabilityClass, ComplianceStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("chain broken at event {index}: expected previous hash {expected:?}, got {actual:?}")]
    ChainBroken {
        index: usize,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("audit trail serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Pipeline milestones worth recording
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunEventKind {
    RunStarted {
        document_sets: usize,
    },
    ProfileExtracted {
        segments: usize,
        sector_hints: Vec<String>,
    },
    ApplicabilityDecided {
        document_set_id: String,
        classification: ApplicabilityClass,
    },
    VerdictRecorded {
        document_set_id: String,
        obligation_id: String,
        status: ComplianceStatus,
    },
    RunCompleted {
        verdicts: usize,
    },
    RunAborted {
        reason: IncompleteReason,
        verdicts: usize,
    },
    RunFailed {
        error: String,
    },
}

/// A single audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub event_id: String,
    pub timestamp: String,
    pub kind: RunEventKind,
    pub permit_hash: String,
    pub previous_hash: Option<String>,
}

impl RunEvent {
    pub fn new(kind: RunEventKind, permit_hash: &str, previous_hash: Option<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            kind,
            permit_hash: permit_hash.to_string(),
            previous_hash,
        }
    }

    /// Hash of this event, used as the next event's `previous_hash`
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.event_id.as_bytes());
        hasher.update(self.timestamp.as_bytes());
        hasher.update(serde_json::to_vec(&self.kind).unwrap_or_default());
        hasher.update(self.permit_hash.as_bytes());
        if let Some(ref prev) = self.previous_hash {
            hasher.update(prev.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Hash-linked events of one run
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RunAuditTrail {
    pub run_id: String,
    pub permit_id: String,
    pub permit_hash: String,
    pub created_at: String,
    pub events: Vec<RunEvent>,
}

impl RunAuditTrail {
    pub fn new(permit_id: &str, permit_hash: &str) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            permit_id: permit_id.to_string(),
            permit_hash: permit_hash.to_string(),
            created_at: Utc::now().to_rfc3339(),
            events: Vec::new(),
        }
    }

    pub fn last_hash(&self) -> Option<String> {
        self.events.last().map(|e| e.compute_hash())
    }

    /// Append an event linked to the previous one
    pub fn record(&mut self, kind: RunEventKind) {
        let previous_hash = self.last_hash();
        self.events
            .push(RunEvent::new(kind, &self.permit_hash, previous_hash));
    }

    pub fn verify(&self) -> Result<(), AuditError> {
        let mut expected_prev: Option<String> = None;

        for (index, event) in self.events.iter().enumerate() {
            if event.previous_hash != expected_prev {
                return Err(AuditError::ChainBroken {
                    index,
                    expected: expected_prev,
                    actual: event.previous_hash.clone(),
                });
            }
            expected_prev = Some(event.compute_hash());
        }

        Ok(())
    }

    pub fn to_json(&self) -> Result<String, AuditError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, AuditError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Number of recorded obligation verdicts
    pub fn verdicts_recorded(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, RunEventKind::VerdictRecorded { .. }))
            .count()
    }
}

/// SHA-256 of permit bytes
pub fn hash_document(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
