//! Attempt ledger: one audited entry per processed input file.
//!
//! Every attempt starts in `processing` and moves exactly once to
//! `success` or `failed`. The transition functions consume the
//! [`OpenAttempt`] handle returned by [`AttemptLedger::begin_attempt`], so
//! an attempt cannot be completed twice. Entries are never reopened or
//! deleted, and repeated uploads of the same filename get independent
//! entries.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::pipeline::types::{ExtractedRecord, SourceId};
use crate::store::traits::AttemptStore;

/// Lifecycle state of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Parsing has started and no outcome is recorded yet.
    Processing,
    /// A lead was extracted and stored.
    Success,
    /// The attempt ended without a lead.
    Failed,
}

impl AttemptStatus {
    pub const ALL: [AttemptStatus; 3] = [Self::Processing, Self::Success, Self::Failed];

    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: AttemptStatus) -> bool {
        use AttemptStatus::*;

        matches!((self, target), (Processing, Success) | (Processing, Failed))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "processing" => Ok(Self::Processing),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(format!("invalid attempt status: {other}")),
        }
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptCompletion {
    Success {
        /// Serialized [`ExtractedRecord`].
        payload: String,
        lead_id: Uuid,
    },
    Failed {
        error_message: String,
    },
}

impl AttemptCompletion {
    pub fn status(&self) -> AttemptStatus {
        match self {
            Self::Success { .. } => AttemptStatus::Success,
            Self::Failed { .. } => AttemptStatus::Failed,
        }
    }
}

/// A persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptEntry {
    pub id: Uuid,
    pub filename: String,
    pub source: SourceId,
    pub status: AttemptStatus,
    /// JSON payload, present only on success.
    pub extracted_data: Option<String>,
    /// Lead created by this attempt, present only on success.
    pub lead_id: Option<Uuid>,
    /// Failure description, present only on failure.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttemptEntry {
    /// A fresh entry in `processing`.
    pub fn processing(filename: impl Into<String>, source: SourceId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            source,
            status: AttemptStatus::Processing,
            extracted_data: None,
            lead_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a completion to the in-memory entry.
    pub fn complete(&mut self, completion: AttemptCompletion) -> Result<(), String> {
        let target = completion.status();
        if !self.status.can_transition_to(target) {
            return Err(format!(
                "Cannot transition attempt {} from {} to {}",
                self.id, self.status, target
            ));
        }

        match completion {
            AttemptCompletion::Success { payload, lead_id } => {
                self.extracted_data = Some(payload);
                self.lead_id = Some(lead_id);
                self.error_message = None;
            }
            AttemptCompletion::Failed { error_message } => {
                self.extracted_data = None;
                self.lead_id = None;
                self.error_message = Some(error_message);
            }
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Decode the success payload.
    pub fn extracted_record(&self) -> Option<Result<ExtractedRecord, serde_json::Error>> {
        self.extracted_data
            .as_deref()
            .map(ExtractedRecord::from_payload)
    }

    pub fn is_success(&self) -> bool {
        self.status == AttemptStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == AttemptStatus::Failed
    }

    pub fn is_processing(&self) -> bool {
        self.status == AttemptStatus::Processing
    }
}

/// Handle to an attempt still in `processing`.
///
/// Not `Clone`: completing the attempt consumes it.
#[derive(Debug)]
pub struct OpenAttempt {
    entry: AttemptEntry,
}

impl OpenAttempt {
    pub fn id(&self) -> Uuid {
        self.entry.id
    }

    pub fn filename(&self) -> &str {
        &self.entry.filename
    }

    pub fn source(&self) -> SourceId {
        self.entry.source
    }
}

/// Filter for listing ledger entries. Empty filter lists everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptFilter {
    pub status: Option<AttemptStatus>,
    pub source: Option<SourceId>,
    pub limit: Option<usize>,
}

/// Per-status entry counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttemptStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub processing: u64,
}

/// Drives attempt entries through their lifecycle.
#[derive(Clone)]
pub struct AttemptLedger {
    store: Arc<dyn AttemptStore>,
}

impl AttemptLedger {
    pub fn new(store: Arc<dyn AttemptStore>) -> Self {
        Self { store }
    }

    /// Record the start of an attempt. `filename` must not be blank.
    pub async fn begin_attempt(
        &self,
        filename: &str,
        source: SourceId,
    ) -> Result<OpenAttempt, DatabaseError> {
        if filename.trim().is_empty() {
            return Err(DatabaseError::Constraint("filename can't be blank".into()));
        }
        let entry = AttemptEntry::processing(filename, source);
        self.store.insert_attempt(&entry).await?;
        debug!(attempt_id = %entry.id, filename = filename, source = %source, "Attempt opened");
        Ok(OpenAttempt { entry })
    }

    /// Close an attempt as successful.
    pub async fn mark_success(
        &self,
        attempt: OpenAttempt,
        record: &ExtractedRecord,
        lead_id: Uuid,
    ) -> Result<AttemptEntry, DatabaseError> {
        let payload = record
            .to_payload()
            .map_err(|e| DatabaseError::Serialization(format!("extracted record: {e}")))?;
        self.finish(attempt, AttemptCompletion::Success { payload, lead_id })
            .await
    }

    /// Close an attempt as failed.
    pub async fn mark_failed(
        &self,
        attempt: OpenAttempt,
        error_message: &str,
    ) -> Result<AttemptEntry, DatabaseError> {
        self.finish(
            attempt,
            AttemptCompletion::Failed {
                error_message: error_message.to_string(),
            },
        )
        .await
    }

    async fn finish(
        &self,
        attempt: OpenAttempt,
        completion: AttemptCompletion,
    ) -> Result<AttemptEntry, DatabaseError> {
        let mut entry = attempt.entry;
        self.store.complete_attempt(entry.id, &completion).await?;
        // An OpenAttempt is always in processing, so this cannot fail.
        entry
            .complete(completion)
            .map_err(DatabaseError::Constraint)?;
        debug!(attempt_id = %entry.id, status = %entry.status, "Attempt closed");
        Ok(entry)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<AttemptEntry>, DatabaseError> {
        self.store.get_attempt(id).await
    }

    pub async fn list(&self, filter: &AttemptFilter) -> Result<Vec<AttemptEntry>, DatabaseError> {
        self.store.list_attempts(filter).await
    }

    pub async fn stats(&self) -> Result<AttemptStats, DatabaseError> {
        self.store.attempt_stats().await
    }

    /// Source labels that have at least one entry.
    pub async fn sources(&self) -> Result<Vec<String>, DatabaseError> {
        self.store.attempt_sources().await
    }
}
