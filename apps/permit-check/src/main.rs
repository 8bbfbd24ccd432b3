//! permit-check
//!
//! Command-line front end of the compliance engine. Verifies one permit
//! (PDF or already extracted text) against a catalog of regulatory document
//! sets and writes the JSON compliance report.
//!
//! A run that stops early on quota, credentials or the run deadline still
//! writes its partial report, marked incomplete, and exits non-zero.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use compliance_engine::{
    permit_id_for, ComplianceEngine, EngineConfig, HttpReasoningClient, InMemoryKnowledgeBase,
    JsonReporter,
};
use shared_pdf::PdfExtractor;
use shared_types::{ComplianceReport, RunAuditTrail};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};


/// Command-line arguments for permit-check
#[derive(Parser, Debug)]
#[command(name = "permit-check")]
#[command(about = "Verify a permit against regulatory document sets")]
struct Args {
    /// Permit file (.pdf, or extracted .txt/.md)
    #[arg(short, long)]
    permit: PathBuf,

    /// Catalog of document sets (JSON)
    #[arg(short, long)]
    catalog: PathBuf,

    /// Engine configuration (TOML); defaults apply without it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Permit id used in the report (default: permit file stem)
    #[arg(long)]
    permit_id: Option<String>,

    /// Restrict the run to these document sets (repeatable)
    #[arg(short = 'd', long = "document-set")]
    document_sets: Vec<String>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the run audit trail here
    #[arg(long)]
    audit_out: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Print the plain-text summary to stderr
    #[arg(long)]
    summary: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn selection(&self) -> Option<&[String]> {
        (!self.document_sets.is_empty()).then_some(self.document_sets.as_slice())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // stdout carries the report
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let catalog = InMemoryKnowledgeBase::from_json_file(&args.catalog)
        .with_context(|| format!("Failed to load catalog: {}", args.catalog.display()))?;
    let client = HttpReasoningClient::from_config(&config.reasoning)
        .context("Failed to set up the reasoning client")?;
    let engine = ComplianceEngine::new(&config, Arc::new(catalog), Arc::new(client));

    let permit_id = args
        .permit_id
        .clone()
        .unwrap_or_else(|| permit_id_for(&args.permit));
    let document = PdfExtractor::extract_file(&args.permit)
        .with_context(|| format!("Failed to extract permit: {}", args.permit.display()))?;

    info!(
        permit_id = %permit_id,
        pages = document.metadata.page_count,
        "verifying permit"
    );

    let outcome = engine
        .start_run(permit_id, document, args.selection())
        .execute()
        .await;

    if let Some(path) = &args.audit_out {
        write_audit(&outcome.audit, path)?;
    }

    match outcome.result {
        Ok(report) => {
            emit_report(&report, &args)?;
            info!(
                verdicts = report.verdicts.len(),
                assessment = ?report.summary.assessment,
                "verification complete"
            );
            Ok(())
        }
        Err(err) => {
            if let Some(partial) = err.partial_report() {
                warn!(
                    verdicts = partial.verdicts.len(),
                    expected = partial.summary.expected_verdicts,
                    "writing partial report"
                );
                emit_report(partial, &args)?;
            }
            Err(err.into())
        }
    }
}

fn emit_report(report: &ComplianceReport, args: &Args) -> anyhow::Result<()> {
    match &args.output {
        Some(path) => {
            JsonReporter::write(report, path, args.pretty)?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", JsonReporter::format(report, args.pretty)?),
    }
    if args.summary {
        eprintln!("{}", report.to_text());
    }
    Ok(())
}

fn write_audit(audit: &RunAuditTrail, path: &Path) -> anyhow::Result<()> {
    let json = audit.to_json()?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write audit trail: {}", path.display()))?;
    info!(
        run_id = %audit.run_id,
        events = audit.events.len(),
        "Audit trail written to {}",
        path.display()
    );
    Ok(())
}
