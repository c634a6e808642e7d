//! Shared types for the extraction pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Source identifier ───────────────────────────────────────────────

/// Partner that sent an inbound lead email.
///
/// Determined from the sender address only. Anything unrecognised maps to
/// `Unknown`, which is a real value rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceId {
    #[serde(rename = "Fornecedor A")]
    FornecedorA,
    #[serde(rename = "Parceiro B")]
    ParceiroB,
    #[serde(rename = "Unknown Source")]
    Unknown,
}

impl SourceId {
    /// All known values, in declaration order.
    pub const ALL: [SourceId; 3] = [Self::FornecedorA, Self::ParceiroB, Self::Unknown];

    /// Label stored in the ledger and on leads.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FornecedorA => "Fornecedor A",
            Self::ParceiroB => "Parceiro B",
            Self::Unknown => "Unknown Source",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown source label: {s}"))
    }
}

// ── Target fields ───────────────────────────────────────────────────

/// One of the four lead fields pulled out of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Email,
    Phone,
    ProductCode,
}

impl Field {
    /// Fields in the order they are extracted and reported.
    pub const ALL: [Field; 4] = [Self::Name, Self::Email, Self::Phone, Self::ProductCode];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::ProductCode => "product_code",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ── Messages and records ────────────────────────────────────────────

/// A decoded inbound message: who sent it and its plain-text body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    /// First `From:` address, if the message had one.
    pub sender: Option<String>,
    /// Decoded text body. Empty when the message had no readable body.
    pub body: String,
}

impl RawMessage {
    pub fn new(sender: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.map(String::from),
            body: body.into(),
        }
    }
}

/// A complete lead extracted from one message.
///
/// Only built by a successful parse, so every field is non-empty and the
/// email has passed address validation. Serialises to the ledger payload
/// (`name`, `email`, `phone`, `product_code`, `source`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub product_code: String,
    pub source: SourceId,
}

impl ExtractedRecord {
    /// Serialise to the JSON payload stored on a successful ledger entry.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Read a ledger payload back into a record.
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ExtractedRecord {
        ExtractedRecord {
            name: "João da Silva".into(),
            email: "joao@example.com".into(),
            phone: "(11) 99999-9999".into(),
            product_code: "ABC123".into(),
            source: SourceId::FornecedorA,
        }
    }

    #[test]
    fn source_labels() {
        assert_eq!(SourceId::FornecedorA.to_string(), "Fornecedor A");
        assert_eq!(SourceId::ParceiroB.to_string(), "Parceiro B");
        assert_eq!(SourceId::Unknown.to_string(), "Unknown Source");
    }

    #[test]
    fn source_parses_from_label() {
        assert_eq!("Parceiro B".parse::<SourceId>().unwrap(), SourceId::ParceiroB);
        assert_eq!("unknown source".parse::<SourceId>().unwrap(), SourceId::Unknown);
        assert!("Fornecedor Z".parse::<SourceId>().is_err());
    }

    #[test]
    fn field_names_match_payload_keys() {
        let names: Vec<&str> = Field::ALL.iter().map(Field::as_str).collect();
        assert_eq!(names, vec!["name", "email", "phone", "product_code"]);
    }

    #[test]
    fn payload_has_expected_keys() {
        let json: serde_json::Value =
            serde_json::from_str(&sample_record().to_payload().unwrap()).unwrap();
        assert_eq!(json["name"], "João da Silva");
        assert_eq!(json["email"], "joao@example.com");
        assert_eq!(json["phone"], "(11) 99999-9999");
        assert_eq!(json["product_code"], "ABC123");
        assert_eq!(json["source"], "Fornecedor A");
    }

    #[test]
    fn payload_reads_back_to_same_record() {
        let record = sample_record();
        let payload = record.to_payload().unwrap();
        assert_eq!(ExtractedRecord::from_payload(&payload).unwrap(), record);
    }

    #[test]
    fn raw_message_without_sender() {
        let msg = RawMessage::new(None, "");
        assert!(msg.sender.is_none());
        assert!(msg.body.is_empty());
    }
}
