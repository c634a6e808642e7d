//! Pipeline orchestrator: one input file in, one terminal ledger entry out.
//!
//! Per attempt:
//! 1. Decode the message (a failure here is recorded, not raised)
//! 2. `begin_attempt()` with the best-effort source
//! 3. Parse and validate through `EmailParser`
//! 4. Create the lead, then `mark_success()`; any parse fault becomes `mark_failed()`
//!
//! Only storage failures escape `process`. Bad input always ends up as a
//! `failed` ledger entry.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{DatabaseError, ParseFailure, PipelineError, UploadError};
use crate::leads::NewLead;
use crate::ledger::{AttemptEntry, AttemptLedger, OpenAttempt};
use crate::pipeline::parser::{EmailParser, decode};
use crate::pipeline::types::SourceId;
use crate::store::traits::LeadStore;
use crate::upload::stage_upload;

/// Hooks called at the start and end of every attempt.
pub trait AttemptObserver: Send + Sync {
    fn attempt_started(&self, _filename: &str, _source: SourceId) {}

    fn attempt_finished(&self, _entry: &AttemptEntry) {}
}

/// Default observer: structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl AttemptObserver for TracingObserver {
    fn attempt_started(&self, filename: &str, source: SourceId) {
        info!(filename = %filename, source = %source, "Processing email");
    }

    fn attempt_finished(&self, entry: &AttemptEntry) {
        if entry.is_success() {
            info!(
                filename = %entry.filename,
                attempt_id = %entry.id,
                lead_id = ?entry.lead_id,
                "Lead created from email"
            );
        } else {
            warn!(
                filename = %entry.filename,
                attempt_id = %entry.id,
                error = entry.error_message.as_deref().unwrap_or_default(),
                "Email processing failed"
            );
        }
    }
}

/// Removes a temporary input file when dropped.
struct TempInput<'a> {
    path: &'a Path,
}

impl Drop for TempInput<'_> {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %e, "Failed to remove temp input");
        }
    }
}

fn require_filename(filename: &str) -> Result<(), UploadError> {
    if filename.trim().is_empty() {
        return Err(UploadError::MissingFilename);
    }
    Ok(())
}

/// Runs attempts end to end against a ledger and a lead store.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    parser: EmailParser,
    ledger: AttemptLedger,
    leads: Arc<dyn LeadStore>,
    observer: Arc<dyn AttemptObserver>,
}

impl PipelineOrchestrator {
    pub fn new(parser: EmailParser, ledger: AttemptLedger, leads: Arc<dyn LeadStore>) -> Self {
        Self {
            parser,
            ledger,
            leads,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn ledger(&self) -> &AttemptLedger {
        &self.ledger
    }

    /// Process one message. Returns the terminal ledger entry.
    ///
    /// A blank `filename` is rejected before any entry is opened.
    pub async fn process(&self, raw: &[u8], filename: &str) -> Result<AttemptEntry, PipelineError> {
        require_filename(filename)?;
        let decoded = decode(raw);
        let source = decoded
            .as_ref()
            .map(|message| self.parser.detect_source(message))
            .unwrap_or(SourceId::Unknown);

        let attempt = self.ledger.begin_attempt(filename, source).await?;
        self.observer.attempt_started(filename, source);

        let parsed = decoded
            .and_then(|message| self.parser.parse(&message))
            .map_err(|kind| ParseFailure::new(filename, kind));

        let entry = match parsed {
            Ok(record) => match self.leads.create_lead(&NewLead::from(&record)).await {
                Ok(lead) => self.ledger.mark_success(attempt, &record, lead.id).await?,
                Err(DatabaseError::Constraint(msg)) => {
                    self.ledger
                        .mark_failed(attempt, &format!("Unexpected error: {msg}"))
                        .await?
                }
                Err(e) => return Err(self.abandon(attempt, e).await),
            },
            Err(failure) => {
                debug!(filename = %filename, kind = failure.kind.label(), "Parse failed");
                self.ledger.mark_failed(attempt, &failure.to_string()).await?
            }
        };

        self.observer.attempt_finished(&entry);
        Ok(entry)
    }

    /// Process a staged temporary file. The file is deleted on every exit path.
    ///
    /// `filename` is the label recorded in the ledger, usually the name the
    /// file was uploaded under.
    pub async fn process_file(
        &self,
        path: &Path,
        filename: &str,
    ) -> Result<AttemptEntry, PipelineError> {
        let _guard = TempInput { path };

        match tokio::fs::read(path).await {
            Ok(raw) => self.process(&raw, filename).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let message = format!("Email file not found: {}", path.display());
                self.record_fault(filename, &message).await
            }
            Err(e) => self.record_fault(filename, &e.to_string()).await,
        }
    }

    /// Accept an upload, stage it under `staging_dir` and process it.
    ///
    /// Rejected uploads never reach the ledger.
    pub async fn process_upload(
        &self,
        staging_dir: &Path,
        filename: &str,
        content: &[u8],
    ) -> Result<AttemptEntry, PipelineError> {
        let staged = stage_upload(staging_dir, filename, content)?;
        self.process_file(&staged.path, &staged.filename).await
    }

    /// Record an attempt that failed before parsing could start.
    async fn record_fault(
        &self,
        filename: &str,
        message: &str,
    ) -> Result<AttemptEntry, PipelineError> {
        require_filename(filename)?;
        let attempt = self.ledger.begin_attempt(filename, SourceId::Unknown).await?;
        self.observer.attempt_started(filename, SourceId::Unknown);
        let entry = self
            .ledger
            .mark_failed(attempt, &format!("Unexpected error: {message}"))
            .await?;
        self.observer.attempt_finished(&entry);
        Ok(entry)
    }

    /// Best-effort close of an attempt whose lead could not be stored.
    async fn abandon(&self, attempt: OpenAttempt, err: DatabaseError) -> PipelineError {
        let attempt_id = attempt.id();
        match self
            .ledger
            .mark_failed(attempt, &format!("Storage failure: {err}"))
            .await
        {
            Ok(entry) => self.observer.attempt_finished(&entry),
            Err(e) => warn!(attempt_id = %attempt_id, error = %e, "Failed to close attempt"),
        }
        PipelineError::Storage(err)
    }
}
