//! libSQL backend — async `AttemptStore` + `LeadStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::leads::{Lead, NewLead};
use crate::ledger::{AttemptCompletion, AttemptEntry, AttemptFilter, AttemptStats, AttemptStatus};
use crate::pipeline::types::SourceId;
use crate::store::migrations;
use crate::store::traits::{AttemptStore, LeadStore};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(backend.conn()).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(backend.conn()).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_uuid(s: &str) -> Result<Uuid, libsql::Error> {
    Uuid::parse_str(s).map_err(|e| libsql::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Unrecognised labels read back as `Unknown`.
fn parse_source(s: &str) -> SourceId {
    s.parse().unwrap_or(SourceId::Unknown)
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to an AttemptEntry.
///
/// Column order matches ATTEMPT_COLUMNS.
fn row_to_attempt(row: &libsql::Row) -> Result<AttemptEntry, libsql::Error> {
    let id_str: String = row.get(0)?;
    let source_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let lead_id_str: Option<String> = row.get(5).ok();
    let created_str: String = row.get(7)?;
    let updated_str: String = row.get(8)?;

    let status = status_str
        .parse::<AttemptStatus>()
        .map_err(|e| libsql::Error::ToSqlConversionFailure(e.into()))?;

    Ok(AttemptEntry {
        id: parse_uuid(&id_str)?,
        filename: row.get(1)?,
        source: parse_source(&source_str),
        status,
        extracted_data: row.get(4).ok(),
        lead_id: lead_id_str.as_deref().map(parse_uuid).transpose()?,
        error_message: row.get(6).ok(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to a Lead. Column order matches LEAD_COLUMNS.
fn row_to_lead(row: &libsql::Row) -> Result<Lead, libsql::Error> {
    let id_str: String = row.get(0)?;
    let source_str: String = row.get(5)?;
    let created_str: String = row.get(6)?;

    Ok(Lead {
        id: parse_uuid(&id_str)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        product_code: row.get(4)?,
        source: parse_source(&source_str),
        created_at: parse_datetime(&created_str),
    })
}

const ATTEMPT_COLUMNS: &str =
    "id, filename, source, status, extracted_data, lead_id, error_message, created_at, updated_at";

const LEAD_COLUMNS: &str = "id, name, email, phone, product_code, source, created_at";

// ── Attempt store ───────────────────────────────────────────────────

#[async_trait]
impl AttemptStore for LibSqlBackend {
    async fn insert_attempt(&self, entry: &AttemptEntry) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO email_logs (id, filename, source, status, extracted_data, lead_id,
                error_message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.id.to_string(),
                entry.filename.clone(),
                entry.source.label(),
                entry.status.as_str(),
                opt_text_owned(entry.extracted_data.clone()),
                opt_text_owned(entry.lead_id.map(|id| id.to_string())),
                opt_text_owned(entry.error_message.clone()),
                timestamp(&entry.created_at),
                timestamp(&entry.updated_at),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_attempt: {e}")))?;

        debug!(id = %entry.id, filename = %entry.filename, "Attempt inserted into DB");
        Ok(())
    }

    async fn complete_attempt(
        &self,
        id: Uuid,
        completion: &AttemptCompletion,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = timestamp(&Utc::now());
        let (extracted_data, lead_id, error_message) = match completion {
            AttemptCompletion::Success { payload, lead_id } => {
                (Some(payload.clone()), Some(lead_id.to_string()), None)
            }
            AttemptCompletion::Failed { error_message } => {
                (None, None, Some(error_message.clone()))
            }
        };

        let updated = conn
            .execute(
                "UPDATE email_logs
                 SET status = ?1, extracted_data = ?2, lead_id = ?3, error_message = ?4, updated_at = ?5
                 WHERE id = ?6 AND status = 'processing'",
                params![
                    completion.status().as_str(),
                    opt_text_owned(extracted_data),
                    opt_text_owned(lead_id),
                    opt_text_owned(error_message),
                    now,
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("complete_attempt: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "processing attempt".into(),
                id: id.to_string(),
            });
        }

        debug!(id = %id, status = %completion.status(), "Attempt completed in DB");
        Ok(())
    }

    async fn get_attempt(&self, id: Uuid) -> Result<Option<AttemptEntry>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {ATTEMPT_COLUMNS} FROM email_logs WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_attempt: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let entry = row_to_attempt(&row)
                    .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                Ok(Some(entry))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_attempt: {e}"))),
        }
    }

    async fn list_attempts(
        &self,
        filter: &AttemptFilter,
    ) -> Result<Vec<AttemptEntry>, DatabaseError> {
        let conn = self.conn();
        // SQLite treats a negative LIMIT as "no limit".
        let limit = filter.limit.map_or(-1, |l| l as i64);
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ATTEMPT_COLUMNS} FROM email_logs
                     WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR source = ?2)
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?3"
                ),
                params![
                    opt_text_owned(filter.status.map(|s| s.as_str().to_string())),
                    opt_text_owned(filter.source.map(|s| s.label().to_string())),
                    limit,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_attempts: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_attempts: {e}")))?
        {
            entries.push(
                row_to_attempt(&row).map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?,
            );
        }
        Ok(entries)
    }

    async fn attempt_stats(&self) -> Result<AttemptStats, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query("SELECT status, COUNT(*) FROM email_logs GROUP BY status", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("attempt_stats: {e}")))?;

        let mut stats = AttemptStats::default();
        while let Ok(Some(row)) = rows.next().await {
            let status_str: String = row.get(0).unwrap_or_default();
            let count = row.get::<i64>(1).unwrap_or(0).max(0) as u64;
            match status_str.parse::<AttemptStatus>() {
                Ok(AttemptStatus::Success) => stats.successful = count,
                Ok(AttemptStatus::Failed) => stats.failed = count,
                Ok(AttemptStatus::Processing) => stats.processing = count,
                Err(_) => {}
            }
            stats.total += count;
        }
        Ok(stats)
    }

    async fn attempt_sources(&self) -> Result<Vec<String>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query("SELECT DISTINCT source FROM email_logs ORDER BY source", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("attempt_sources: {e}")))?;

        let mut sources = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            if let Ok(source) = row.get::<String>(0) {
                sources.push(source);
            }
        }
        Ok(sources)
    }
}

// ── Lead store ──────────────────────────────────────────────────────

#[async_trait]
impl LeadStore for LibSqlBackend {
    async fn create_lead(&self, lead: &NewLead) -> Result<Lead, DatabaseError> {
        lead.validate()
            .map_err(|problems| DatabaseError::Constraint(problems.join(", ")))?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO leads (id, name, email, phone, product_code, source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id.to_string(),
                lead.name.clone(),
                lead.email.clone(),
                lead.phone.clone(),
                lead.product_code.clone(),
                lead.source.label(),
                timestamp(&now),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("create_lead: {e}")))?;

        debug!(id = %id, source = %lead.source, "Lead inserted into DB");
        Ok(Lead {
            id,
            name: lead.name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            product_code: lead.product_code.clone(),
            source: lead.source,
            created_at: now,
        })
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_lead: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let lead =
                    row_to_lead(&row).map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                Ok(Some(lead))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_lead: {e}"))),
        }
    }

    async fn list_leads(&self, source: Option<SourceId>) -> Result<Vec<Lead>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads
                     WHERE (?1 IS NULL OR source = ?1)
                     ORDER BY created_at DESC, rowid DESC"
                ),
                params![opt_text_owned(source.map(|s| s.label().to_string()))],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_leads: {e}")))?;

        let mut leads = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_leads: {e}")))?
        {
            leads.push(
                row_to_lead(&row).map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?,
            );
        }
        Ok(leads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AttemptEntry;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn make_lead(source: SourceId) -> NewLead {
        NewLead {
            name: "João Silva".into(),
            email: "joao@example.com".into(),
            phone: "(11) 99999-9999".into(),
            product_code: "ABC123".into(),
            source,
        }
    }

    // ── Lead tests ──────────────────────────────────────────────────

    #[tokio::test]
    async fn create_and_get_lead() {
        let db = test_db().await;
        let lead = db.create_lead(&make_lead(SourceId::FornecedorA)).await.unwrap();

        let fetched = db.get_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "João Silva");
        assert_eq!(fetched.email, "joao@example.com");
        assert_eq!(fetched.phone, "(11) 99999-9999");
        assert_eq!(fetched.product_code, "ABC123");
        assert_eq!(fetched.source, SourceId::FornecedorA);
    }

    #[tokio::test]
    async fn get_lead_not_found() {
        let db = test_db().await;
        assert!(db.get_lead(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_lead_rejects_invalid_email() {
        let db = test_db().await;
        let lead = NewLead {
            email: "invalid-email".into(),
            ..make_lead(SourceId::ParceiroB)
        };
        let err = db.create_lead(&lead).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));
        assert!(db.list_leads(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_leads_by_source() {
        let db = test_db().await;
        db.create_lead(&make_lead(SourceId::FornecedorA)).await.unwrap();
        db.create_lead(&make_lead(SourceId::ParceiroB)).await.unwrap();
        db.create_lead(&make_lead(SourceId::ParceiroB)).await.unwrap();

        assert_eq!(db.list_leads(None).await.unwrap().len(), 3);
        let partner_b = db.list_leads(Some(SourceId::ParceiroB)).await.unwrap();
        assert_eq!(partner_b.len(), 2);
        assert!(partner_b.iter().all(|l| l.source == SourceId::ParceiroB));
    }

    #[tokio::test]
    async fn list_leads_most_recent_first() {
        let db = test_db().await;
        let first = db.create_lead(&make_lead(SourceId::FornecedorA)).await.unwrap();
        let second = db.create_lead(&make_lead(SourceId::FornecedorA)).await.unwrap();

        let leads = db.list_leads(None).await.unwrap();
        assert_eq!(leads[0].id, second.id);
        assert_eq!(leads[1].id, first.id);
    }

    // ── Attempt tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn insert_and_get_attempt() {
        let db = test_db().await;
        let entry = AttemptEntry::processing("a.eml", SourceId::ParceiroB);
        db.insert_attempt(&entry).await.unwrap();

        let fetched = db.get_attempt(entry.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, entry.id);
        assert_eq!(fetched.filename, "a.eml");
        assert_eq!(fetched.source, SourceId::ParceiroB);
        assert_eq!(fetched.status, AttemptStatus::Processing);
    }

    #[tokio::test]
    async fn complete_attempt_success() {
        let db = test_db().await;
        let entry = AttemptEntry::processing("a.eml", SourceId::FornecedorA);
        db.insert_attempt(&entry).await.unwrap();
        let lead_id = Uuid::new_v4();

        db.complete_attempt(
            entry.id,
            &AttemptCompletion::Success {
                payload: r#"{"name":"x"}"#.into(),
                lead_id,
            },
        )
        .await
        .unwrap();

        let fetched = db.get_attempt(entry.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, AttemptStatus::Success);
        assert_eq!(fetched.lead_id, Some(lead_id));
        assert_eq!(fetched.extracted_data.as_deref(), Some(r#"{"name":"x"}"#));
        assert!(fetched.error_message.is_none());
    }

    #[tokio::test]
    async fn complete_attempt_only_from_processing() {
        let db = test_db().await;
        let entry = AttemptEntry::processing("a.eml", SourceId::Unknown);
        db.insert_attempt(&entry).await.unwrap();

        let failed = AttemptCompletion::Failed {
            error_message: "boom".into(),
        };
        db.complete_attempt(entry.id, &failed).await.unwrap();

        let err = db.complete_attempt(entry.id, &failed).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn complete_unknown_attempt_not_found() {
        let db = test_db().await;
        let err = db
            .complete_attempt(
                Uuid::new_v4(),
                &AttemptCompletion::Failed {
                    error_message: "x".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_attempts_filters() {
        let db = test_db().await;
        let a = AttemptEntry::processing("a.eml", SourceId::FornecedorA);
        let b = AttemptEntry::processing("b.eml", SourceId::ParceiroB);
        let c = AttemptEntry::processing("c.eml", SourceId::ParceiroB);
        for entry in [&a, &b, &c] {
            db.insert_attempt(entry).await.unwrap();
        }
        db.complete_attempt(
            b.id,
            &AttemptCompletion::Failed {
                error_message: "bad".into(),
            },
        )
        .await
        .unwrap();

        let all = db.list_attempts(&AttemptFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let partner_b = db
            .list_attempts(&AttemptFilter {
                source: Some(SourceId::ParceiroB),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(partner_b.len(), 2);

        let failed_b = db
            .list_attempts(&AttemptFilter {
                status: Some(AttemptStatus::Failed),
                source: Some(SourceId::ParceiroB),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(failed_b.len(), 1);
        assert_eq!(failed_b[0].id, b.id);

        let limited = db
            .list_attempts(&AttemptFilter {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, c.id);
    }

    #[tokio::test]
    async fn stats_and_sources() {
        let db = test_db().await;
        let a = AttemptEntry::processing("a.eml", SourceId::FornecedorA);
        let b = AttemptEntry::processing("b.eml", SourceId::ParceiroB);
        let c = AttemptEntry::processing("c.eml", SourceId::ParceiroB);
        for entry in [&a, &b, &c] {
            db.insert_attempt(entry).await.unwrap();
        }
        db.complete_attempt(
            a.id,
            &AttemptCompletion::Success {
                payload: "{}".into(),
                lead_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap();
        db.complete_attempt(
            b.id,
            &AttemptCompletion::Failed {
                error_message: "bad".into(),
            },
        )
        .await
        .unwrap();

        let stats = db.attempt_stats().await.unwrap();
        assert_eq!(
            stats,
            AttemptStats {
                total: 3,
                successful: 1,
                failed: 1,
                processing: 1,
            }
        );

        let sources = db.attempt_sources().await.unwrap();
        assert_eq!(sources, vec!["Fornecedor A".to_string(), "Parceiro B".to_string()]);
    }

    #[tokio::test]
    async fn new_local_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("leads.db");
        let db = LibSqlBackend::new_local(&db_path).await.unwrap();
        assert!(db_path.exists());
        drop(db);
    }
}
