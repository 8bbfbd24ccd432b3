//! Shared data model for permit verification runs.
//!
//! Regulatory catalogs ([`DocumentSet`], [`Obligation`]), the permit profile
//! built from extracted text, the verdicts produced during a run and the
//! final [`ComplianceReport`] all live here so that the engine, the PDF
//! extraction crate and front ends agree on one serializable shape.

pub mod audit;
pub mod catalog;
pub mod permit;
pub mod report;
pub mod verdict;

pub use audit::{hash_document, AuditError, RunAuditTrail, RunEvent, RunEventKind};
pub use catalog::{DocumentSet, DocumentSetKind, Obligation, SourceCitation};
pub use permit::{Capacity, PermitDocumentType, PermitProfile, TextSegment};
pub use report::{
    ComplianceReport, DocumentSetSummary, IncompleteReason, ObligationRef, OverallAssessment,
    PriorityItem, ReportSummary, RunCompletion, StatusBreakdown, StatusCounts,
};
pub use verdict::{
    ApplicabilityClass, ApplicabilityVerdict, ComplianceStatus, ComplianceVerdict,
    ObligationCitation, PermitCitation, Priority,
};
