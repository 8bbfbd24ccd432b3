//! Report output formats

use anyhow::{Context, Result};
use shared_types::ComplianceReport;
use std::path::Path;

/// JSON format reporter
pub struct JsonReporter;

impl JsonReporter {
    /// Format a compliance report as JSON
    ///
    /// # Arguments
    ///
    /// * `report` - The report to format
    /// * `pretty` - Whether to pretty-print the JSON
    pub fn format(report: &ComplianceReport, pretty: bool) -> Result<String> {
        let output = if pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(output)
    }

    /// Write the report to `path`, replacing any existing file.
    pub fn write(report: &ComplianceReport, path: &Path, pretty: bool) -> Result<()> {
        let output = Self::format(report, pretty)?;
        std::fs::write(path, output)
            .with_context(|| format!("Failed to write report: {}", path.display()))
    }
}
