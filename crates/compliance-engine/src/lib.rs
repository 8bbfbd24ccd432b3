//! Permit compliance verification engine.
//!
//! Given an extracted permit and a catalog of regulatory document sets, a run
//! decides which sets apply, verifies every obligation of every applicable set
//! through the reasoning service and aggregates the verdicts into a
//! [`ComplianceReport`].
//!
//! ```no_run
//! use compliance_engine::{ComplianceEngine, EngineConfig, HttpReasoningClient, InMemoryKnowledgeBase};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = EngineConfig::from_file("permit-check.toml")?;
//! let catalog = InMemoryKnowledgeBase::from_json_file(Path::new("catalog.json"))?;
//! let client = HttpReasoningClient::from_config(&config.reasoning)?;
//! let engine = ComplianceEngine::new(&config, Arc::new(catalog), Arc::new(client));
//!
//! let report = engine.verify(Path::new("permit.pdf"), None).await?;
//! println!("{}", report.to_text());
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod error;
pub mod matcher;
pub mod patterns;
pub mod plan;
pub mod profile;
pub mod reasoning;
pub mod report;
pub mod retry;
pub mod run;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{InMemoryKnowledgeBase, KnowledgeBase};
pub use config::EngineConfig;
pub use error::{CatalogError, CompletenessViolation, FatalError, PipelineError, ReasoningError};
pub use reasoning::{HttpReasoningClient, ReasoningClient, ScriptedReasoningClient};
pub use report::JsonReporter;
pub use run::{RunOutcome, VerificationRun};

use config::PipelineConfig;
use reasoning::ReasoningAdapter;
use retry::RetryPolicy;
use shared_pdf::{ExtractedDocument, PdfExtractor};
use shared_types::ComplianceReport;
use std::path::Path;
use std::sync::Arc;

/// Entry point: shared collaborators plus settings, one [`VerificationRun`]
/// per permit.
pub struct ComplianceEngine {
    knowledge_base: Arc<dyn KnowledgeBase>,
    adapter: Arc<ReasoningAdapter>,
    retry: RetryPolicy,
    pipeline: PipelineConfig,
}

impl ComplianceEngine {
    pub fn new(
        config: &EngineConfig,
        knowledge_base: Arc<dyn KnowledgeBase>,
        client: Arc<dyn ReasoningClient>,
    ) -> Self {
        Self {
            knowledge_base,
            adapter: Arc::new(ReasoningAdapter::new(
                client,
                config.pipeline.max_concurrency,
            )),
            retry: config.retry.policy(),
            pipeline: config.pipeline.clone(),
        }
    }

    /// Prepare a run without starting it.
    ///
    /// `document_set_ids` restricts the run to those sets; `None` uses the
    /// whole catalog.
    pub fn start_run(
        &self,
        permit_id: impl Into<String>,
        document: ExtractedDocument,
        document_set_ids: Option<&[String]>,
    ) -> VerificationRun {
        VerificationRun::new(
            permit_id.into(),
            document,
            document_set_ids.map(<[String]>::to_vec),
            Arc::clone(&self.knowledge_base),
            Arc::clone(&self.adapter),
            self.retry,
            self.pipeline.clone(),
        )
    }

    /// Verify the permit stored at `permit_file` (PDF or plain text).
    ///
    /// The permit id is the file stem.
    pub async fn verify(
        &self,
        permit_file: &Path,
        document_set_ids: Option<&[String]>,
    ) -> Result<ComplianceReport, PipelineError> {
        let permit_id = permit_id_for(permit_file);
        let document = PdfExtractor::extract_file(permit_file).map_err(|source| {
            PipelineError::ExtractionFailure {
                permit_id: permit_id.clone(),
                source,
            }
        })?;
        self.verify_document(permit_id, document, document_set_ids)
            .await
    }

    /// Verify a permit given as raw PDF bytes.
    pub async fn verify_bytes(
        &self,
        permit_id: impl Into<String>,
        pdf_bytes: &[u8],
        document_set_ids: Option<&[String]>,
    ) -> Result<ComplianceReport, PipelineError> {
        let permit_id = permit_id.into();
        let document = PdfExtractor::extract(pdf_bytes).map_err(|source| {
            PipelineError::ExtractionFailure {
                permit_id: permit_id.clone(),
                source,
            }
        })?;
        self.verify_document(permit_id, document, document_set_ids)
            .await
    }

    /// Verify an already extracted permit.
    pub async fn verify_document(
        &self,
        permit_id: impl Into<String>,
        document: ExtractedDocument,
        document_set_ids: Option<&[String]>,
    ) -> Result<ComplianceReport, PipelineError> {
        let outcome = self
            .start_run(permit_id, document, document_set_ids)
            .execute()
            .await;
        tracing::debug!(
            run_id = %outcome.audit.run_id,
            events = outcome.audit.events.len(),
            head = %outcome.audit.last_hash().unwrap_or_default(),
            "run audit trail"
        );
        outcome.into_result()
    }
}

/// Permit id derived from a file name: its stem, or `permit` without one.
pub fn permit_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "permit".to_string())
}
