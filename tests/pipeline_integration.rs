//! End-to-end: staged uploads → orchestrator → ledger + leads on libSQL.

use std::sync::Arc;

use lead_intake::error::UploadError;
use lead_intake::ledger::{AttemptFilter, AttemptLedger, AttemptStatus};
use lead_intake::pipeline::orchestrator::PipelineOrchestrator;
use lead_intake::pipeline::parser::EmailParser;
use lead_intake::pipeline::types::SourceId;
use lead_intake::store::{LeadStore, LibSqlBackend};
use lead_intake::upload::stage_upload;

fn eml(from: &str, body: &str) -> String {
    format!(
        "From: {from}\r\n\
         To: vendas@suaempresa.com\r\n\
         Subject: Lead\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         {body}\r\n"
    )
}

fn fornecedor_a() -> String {
    eml(
        "loja@fornecedorA.com",
        "Nome do cliente: João da Silva\r\nE-mail: joao@example.com\r\nTelefone: (11) 99999-9999\r\nProduto de código: ABC123",
    )
}

fn parceiro_b() -> String {
    eml(
        "contato@parceiroB.com",
        "Nome: Maria Silva\r\nE-mail: maria@example.com\r\nTelefone: (21) 99999-9999\r\nProduto: XYZ789",
    )
}

fn invalid_email() -> String {
    eml(
        "loja@fornecedorA.com",
        "Nome: Maria Silva\r\nE-mail: invalid-email\r\nTelefone: (21) 99999-9999\r\nProduto: XYZ789",
    )
}

async fn setup() -> (PipelineOrchestrator, Arc<LibSqlBackend>) {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let orchestrator = PipelineOrchestrator::new(
        EmailParser::default(),
        AttemptLedger::new(db.clone()),
        db.clone(),
    );
    (orchestrator, db)
}

#[tokio::test]
async fn batch_of_uploads_produces_ledger_and_leads() {
    let (orchestrator, db) = setup().await;
    let staging = tempfile::tempdir().unwrap();

    let uploads = [
        ("email1.eml", fornecedor_a()),
        ("email2.eml", parceiro_b()),
        ("email3.eml", invalid_email()),
    ];

    let mut staged = Vec::new();
    for (name, content) in &uploads {
        staged.push(stage_upload(staging.path(), name, content.as_bytes()).unwrap());
    }

    for upload in &staged {
        orchestrator
            .process_file(&upload.path, &upload.filename)
            .await
            .unwrap();
        assert!(!upload.path.exists(), "staged file should be removed");
    }

    let ledger = orchestrator.ledger();
    let stats = ledger.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.successful, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.processing, 0);

    let failed = ledger
        .list(&AttemptFilter {
            status: Some(AttemptStatus::Failed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].filename, "email3.eml");
    assert_eq!(
        failed[0].error_message.as_deref(),
        Some("Failed to parse email email3.eml: Invalid email format: invalid-email")
    );

    let partner_b_leads = db.list_leads(Some(SourceId::ParceiroB)).await.unwrap();
    assert_eq!(partner_b_leads.len(), 1);
    assert_eq!(partner_b_leads[0].name, "Maria Silva");
    assert_eq!(partner_b_leads[0].product_code, "XYZ789");

    // email3.eml also came from Fornecedor A but produced no lead.
    let supplier_a_leads = db.list_leads(Some(SourceId::FornecedorA)).await.unwrap();
    assert_eq!(supplier_a_leads.len(), 1);
    assert_eq!(supplier_a_leads[0].email, "joao@example.com");

    let sources = ledger.sources().await.unwrap();
    assert_eq!(sources, vec!["Fornecedor A", "Parceiro B"]);
}

#[tokio::test]
async fn success_entry_links_lead_and_payload() {
    let (orchestrator, db) = setup().await;

    let entry = orchestrator
        .process(fornecedor_a().as_bytes(), "email1.eml")
        .await
        .unwrap();

    let stored = orchestrator.ledger().get(entry.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AttemptStatus::Success);
    assert_eq!(stored.source, SourceId::FornecedorA);

    let payload: serde_json::Value =
        serde_json::from_str(stored.extracted_data.as_deref().unwrap()).unwrap();
    assert_eq!(payload["name"], "João da Silva");
    assert_eq!(payload["email"], "joao@example.com");
    assert_eq!(payload["phone"], "(11) 99999-9999");
    assert_eq!(payload["product_code"], "ABC123");

    let lead = db.get_lead(stored.lead_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(lead.name, "João da Silva");
    assert_eq!(lead.source, SourceId::FornecedorA);
}

#[tokio::test]
async fn duplicate_filenames_are_independent_attempts() {
    let (orchestrator, db) = setup().await;

    let first = orchestrator
        .process(parceiro_b().as_bytes(), "dup.eml")
        .await
        .unwrap();
    let second = orchestrator
        .process(parceiro_b().as_bytes(), "dup.eml")
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_ne!(first.lead_id, second.lead_id);
    assert_eq!(db.list_leads(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_sender_uses_generic_rules() {
    let (orchestrator, _db) = setup().await;
    let raw = eml(
        "someone@example.org",
        "Nome: Carlos Souza\r\nE-mail: carlos@example.org\r\nTelefone: 3333-4444\r\nProduto: PRD-42",
    );

    let entry = orchestrator.process(raw.as_bytes(), "generic.eml").await.unwrap();

    assert_eq!(entry.status, AttemptStatus::Success);
    assert_eq!(entry.source, SourceId::Unknown);
    let record = entry.extracted_record().unwrap().unwrap();
    assert_eq!(record.product_code, "PRD-42");
}

#[tokio::test]
async fn concurrent_attempts_all_terminal() {
    let (orchestrator, _db) = setup().await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let orchestrator = orchestrator.clone();
        let raw = if i % 2 == 0 { parceiro_b() } else { invalid_email() };
        handles.push(tokio::spawn(async move {
            orchestrator
                .process(raw.as_bytes(), &format!("lead-{i}.eml"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = orchestrator.ledger().stats().await.unwrap();
    assert_eq!(stats.total, 8);
    assert_eq!(stats.successful, 4);
    assert_eq!(stats.failed, 4);
    assert_eq!(stats.processing, 0);
}

#[test]
fn non_eml_upload_rejected() {
    let staging = tempfile::tempdir().unwrap();
    let err = stage_upload(staging.path(), "lead.pdf", b"%PDF").unwrap_err();
    assert!(matches!(err, UploadError::InvalidExtension { .. }));
}
