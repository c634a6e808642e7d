//! Storage traits for the ledger and the lead store.
//!
//! Both are async and backend-agnostic. Each write touches exactly one row,
//! so implementations only need atomic single-row create/update.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::leads::{Lead, NewLead};
use crate::ledger::{AttemptCompletion, AttemptEntry, AttemptFilter, AttemptStats};
use crate::pipeline::types::SourceId;

/// Persistence for attempt ledger entries.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Insert a new entry (always in `processing`).
    async fn insert_attempt(&self, entry: &AttemptEntry) -> Result<(), DatabaseError>;

    /// Move a `processing` entry to its terminal state.
    ///
    /// Returns `NotFound` if no processing entry with this id exists.
    async fn complete_attempt(
        &self,
        id: Uuid,
        completion: &AttemptCompletion,
    ) -> Result<(), DatabaseError>;

    /// Get an entry by ID.
    async fn get_attempt(&self, id: Uuid) -> Result<Option<AttemptEntry>, DatabaseError>;

    /// List entries matching the filter, most recent first.
    async fn list_attempts(
        &self,
        filter: &AttemptFilter,
    ) -> Result<Vec<AttemptEntry>, DatabaseError>;

    /// Count entries per status.
    async fn attempt_stats(&self) -> Result<AttemptStats, DatabaseError>;

    /// Distinct source labels seen in the ledger.
    async fn attempt_sources(&self) -> Result<Vec<String>, DatabaseError>;
}

/// Persistence for customer leads.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Validate and insert a lead.
    ///
    /// Returns `Constraint` when the lead fails validation.
    async fn create_lead(&self, lead: &NewLead) -> Result<Lead, DatabaseError>;

    /// Get a lead by ID.
    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, DatabaseError>;

    /// List leads, optionally for one source, most recent first.
    async fn list_leads(&self, source: Option<SourceId>) -> Result<Vec<Lead>, DatabaseError>;
}
