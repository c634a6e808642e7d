//! Customer leads created from successful extractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::types::{ExtractedRecord, SourceId};
use crate::pipeline::validate::is_valid_email;

/// Lead creation request. The store assigns identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub product_code: String,
    pub source: SourceId,
}

impl NewLead {
    /// Check the lead is complete. Returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        for (field, value) in [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("product_code", &self.product_code),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{field} can't be blank"));
            }
        }

        if !self.email.trim().is_empty() && !is_valid_email(&self.email) {
            problems.push("email is invalid".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

impl From<&ExtractedRecord> for NewLead {
    fn from(record: &ExtractedRecord) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            phone: record.phone.clone(),
            product_code: record.product_code.clone(),
            source: record.source,
        }
    }
}

/// A stored lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub product_code: String,
    pub source: SourceId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> NewLead {
        NewLead {
            name: "João Silva".into(),
            email: "joao@example.com".into(),
            phone: "(11) 99999-9999".into(),
            product_code: "ABC123".into(),
            source: SourceId::FornecedorA,
        }
    }

    #[test]
    fn valid_lead_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn blank_fields_rejected() {
        let lead = NewLead {
            name: "".into(),
            phone: "  ".into(),
            ..valid()
        };
        let problems = lead.validate().unwrap_err();
        assert_eq!(
            problems,
            vec!["name can't be blank".to_string(), "phone can't be blank".to_string()]
        );
    }

    #[test]
    fn invalid_email_rejected() {
        let lead = NewLead {
            email: "invalid-email".into(),
            ..valid()
        };
        assert_eq!(lead.validate().unwrap_err(), vec!["email is invalid".to_string()]);
    }

    #[test]
    fn built_from_extracted_record() {
        let record = ExtractedRecord {
            name: "Maria".into(),
            email: "maria@example.com".into(),
            phone: "123".into(),
            product_code: "XYZ789".into(),
            source: SourceId::ParceiroB,
        };
        let lead = NewLead::from(&record);
        assert_eq!(lead.name, "Maria");
        assert_eq!(lead.source, SourceId::ParceiroB);
        assert_eq!(lead.product_code, "XYZ789");
    }
}
