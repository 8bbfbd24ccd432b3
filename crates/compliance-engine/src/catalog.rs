//! Knowledge base collaborator: read-only access to regulatory document sets.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use shared_types::DocumentSet;
use std::collections::HashSet;
use std::path::Path;

/// Source of document sets for a run. Implementations must return
/// obligations in authored order.
pub trait KnowledgeBase: Send + Sync {
    fn list_document_sets(&self) -> Result<Vec<DocumentSet>, CatalogError>;
}

/// On-disk catalog layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub document_sets: Vec<DocumentSet>,
}

/// Catalog held in memory, validated on construction.
#[derive(Debug, Clone)]
pub struct InMemoryKnowledgeBase {
    sets: Vec<DocumentSet>,
}

impl InMemoryKnowledgeBase {
    pub fn new(sets: Vec<DocumentSet>) -> Result<Self, CatalogError> {
        validate_catalog(&sets)?;
        Ok(Self { sets })
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let catalog: CatalogFile = serde_json::from_str(json)?;
        Self::new(catalog.document_sets)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let kb = Self::from_json_str(&content)?;
        tracing::info!(
            path = %path.display(),
            document_sets = kb.sets.len(),
            obligations = kb.sets.iter().map(DocumentSet::obligation_count).sum::<usize>(),
            "loaded regulatory catalog"
        );
        Ok(kb)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl KnowledgeBase for InMemoryKnowledgeBase {
    fn list_document_sets(&self) -> Result<Vec<DocumentSet>, CatalogError> {
        Ok(self.sets.clone())
    }
}

/// Ids must be unique: document sets across the catalog, obligations within a set.
pub fn validate_catalog(sets: &[DocumentSet]) -> Result<(), CatalogError> {
    let mut set_ids = HashSet::new();
    for set in sets {
        if !set_ids.insert(set.id.as_str()) {
            return Err(CatalogError::DuplicateDocumentSet(set.id.clone()));
        }

        let mut obligation_ids = HashSet::new();
        for obligation in &set.obligations {
            if obligation.id.trim().is_empty() {
                return Err(CatalogError::EmptyObligationId(set.id.clone()));
            }
            if !obligation_ids.insert(obligation.id.as_str()) {
                return Err(CatalogError::DuplicateObligation {
                    document_set_id: set.id.clone(),
                    obligation_id: obligation.id.clone(),
                });
            }
        }
    }
    Ok(())
}
