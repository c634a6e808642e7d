use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use futures::StreamExt;
use tracing::{error, info};

use lead_intake::config::IntakeConfig;
use lead_intake::error::PipelineError;
use lead_intake::ledger::{AttemptFilter, AttemptLedger, AttemptStatus};
use lead_intake::pipeline::orchestrator::PipelineOrchestrator;
use lead_intake::pipeline::parser::EmailParser;
use lead_intake::pipeline::types::SourceId;
use lead_intake::store::{LeadStore, LibSqlBackend};

const USAGE: &str = "\
Usage:
  lead-intake ingest <file.eml>...
  lead-intake logs [--status processing|success|failed] [--source NAME]
  lead-intake leads [--source NAME]
  lead-intake stats";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let config = IntakeConfig::from_env()?;
    config.ensure_staging_dir()?;

    // ── Database ─────────────────────────────────────────────────────────
    let db = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    let ledger = AttemptLedger::new(db.clone());

    match command.as_str() {
        "ingest" => ingest(&config, db, ledger, rest).await,
        "logs" => logs(&ledger, rest).await,
        "leads" => leads(db.as_ref(), rest).await,
        "stats" => stats(&ledger).await,
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(2);
        }
    }
}

/// Stage and process every file with bounded concurrency.
async fn ingest(
    config: &IntakeConfig,
    db: Arc<LibSqlBackend>,
    ledger: AttemptLedger,
    files: &[String],
) -> anyhow::Result<()> {
    if files.is_empty() {
        bail!("ingest needs at least one .eml file\n\n{USAGE}");
    }

    let orchestrator = PipelineOrchestrator::new(EmailParser::default(), ledger.clone(), db);

    info!(count = files.len(), "Processing uploaded emails");

    let results: Vec<_> = futures::stream::iter(files)
        .map(|file| {
            let orchestrator = orchestrator.clone();
            async move {
                let path = PathBuf::from(file);
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.clone());
                let content = match tokio::fs::read(&path).await {
                    Ok(content) => content,
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "Failed to read upload");
                        return None;
                    }
                };
                Some(
                    orchestrator
                        .process_upload(&config.staging_dir, &filename, &content)
                        .await,
                )
            }
        })
        .buffer_unordered(config.max_concurrent)
        .collect()
        .await;

    for result in results.into_iter().flatten() {
        match result {
            Ok(entry) => println!(
                "{:<10} {:<16} {}",
                entry.status,
                entry.source,
                entry.filename
            ),
            Err(PipelineError::Upload(e)) => error!(error = %e, "Upload rejected"),
            Err(e) => return Err(e).context("Persistence failure while processing uploads"),
        }
    }

    stats(&ledger).await
}

async fn logs(ledger: &AttemptLedger, args: &[String]) -> anyhow::Result<()> {
    let mut filter = AttemptFilter::default();
    let mut it = args.iter();
    while let Some(flag) = it.next() {
        let value = it
            .next()
            .with_context(|| format!("{flag} needs a value"))?;
        match flag.as_str() {
            "--status" => {
                filter.status = Some(value.parse::<AttemptStatus>().map_err(anyhow::Error::msg)?)
            }
            "--source" => {
                filter.source = Some(value.parse::<SourceId>().map_err(anyhow::Error::msg)?)
            }
            other => bail!("Unknown option: {other}"),
        }
    }

    for entry in ledger.list(&filter).await? {
        let detail = match (&entry.lead_id, &entry.error_message) {
            (Some(lead_id), _) => format!("lead {lead_id}"),
            (None, Some(message)) => message.clone(),
            (None, None) => String::new(),
        };
        println!(
            "{} {:<10} {:<16} {:<24} {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.status,
            entry.source,
            entry.filename,
            detail
        );
    }
    Ok(())
}

async fn leads(store: &dyn LeadStore, args: &[String]) -> anyhow::Result<()> {
    let source = match args {
        [] => None,
        [flag, value] if flag == "--source" => {
            Some(value.parse::<SourceId>().map_err(anyhow::Error::msg)?)
        }
        _ => bail!("Usage: lead-intake leads [--source NAME]"),
    };

    for lead in store.list_leads(source).await? {
        println!(
            "{} {:<16} {:<24} {:<28} {:<18} {}",
            lead.created_at.format("%Y-%m-%d %H:%M:%S"),
            lead.source,
            lead.name,
            lead.email,
            lead.phone,
            lead.product_code
        );
    }
    Ok(())
}

async fn stats(ledger: &AttemptLedger) -> anyhow::Result<()> {
    let stats = ledger.stats().await?;
    println!(
        "total: {}  success: {}  failed: {}  processing: {}",
        stats.total, stats.successful, stats.failed, stats.processing
    );
    let sources = ledger.sources().await?;
    if !sources.is_empty() {
        println!("sources: {}", sources.join(", "));
    }
    Ok(())
}
