//! Per-partner extraction rules.
//!
//! Each partner gets an ordered pattern chain for every field. Within a
//! chain the more specific labels come first ("nome completo" before
//! "cliente" before a bare "nome:"), because extraction stops at the first
//! pattern that yields a value.
//!
//! The product-code chain is shared by every partner. It prefers explicit
//! labels and only falls back to scanning for a bare `LETTERS-DIGITS` token
//! as a last resort. That catch-all can pick up unrelated tokens (order
//! numbers, ticket ids) when no label is present.

use std::collections::HashMap;

use crate::pipeline::extract::ExtractionRule;
use crate::pipeline::types::{Field, SourceId};

/// Raw pattern lists for one rule set, before compilation.
#[derive(Debug, Clone, Copy)]
pub struct RuleTable {
    pub name: &'static [&'static str],
    pub email: &'static [&'static str],
    pub phone: &'static [&'static str],
    pub product_code: &'static [&'static str],
}

const PHONE_PATTERNS: &[&str] = &[r"telefone[:\s]*([^\n\r]+)"];

const PRODUCT_CODE_PATTERNS: &[&str] = &[
    // Labelled three-letters/three-digits codes
    r"produto[:\s]*de[:\s]*código[:\s]*([A-Z]{3}\d{3})",
    r"código[:\s]*([A-Z]{3}\d{3})",
    r"produto[:\s]*([A-Z]{3}\d{3})",
    r"interesse[:\s]*no[:\s]*produto[:\s]*([A-Z]{3}\d{3})",
    r"solicitação[:\s]*de[:\s]*cotação[:\s]*-\s*produto[:\s]*([A-Z]{3}\d{3})",
    r"pedido[:\s]*de[:\s]*orçamento[:\s]*-\s*produto[:\s]*([A-Z]{3}\d{3})",
    // Labelled dashed codes
    r"produto[:\s]*de[:\s]*interesse[:\s]*([A-Z]+-\d+)",
    r"produto[:\s]*([A-Z]+-\d+)",
    r"código[:\s]*do[:\s]*produto[:\s]*([A-Z]+-\d+)",
    r"interesse[:\s]*no[:\s]*([A-Z]+-\d+)",
    // Any dashed token at all
    r"([A-Z]+-\d+)",
];

/// Rules used for unknown senders.
pub const GENERIC_RULES: RuleTable = RuleTable {
    name: &[r"nome[:\s]*([^\n\r]+)"],
    email: &[r"e-mail[:\s]*([^\n\r]+)"],
    phone: PHONE_PATTERNS,
    product_code: PRODUCT_CODE_PATTERNS,
};

pub const FORNECEDOR_A_RULES: RuleTable = RuleTable {
    name: &[
        r"nome[:\s]*do[:\s]*cliente[:\s]*([^\n\r]+)",
        r"nome[:\s]*([^\n\r]+)",
    ],
    email: &[r"e-mail[:\s]*([^\n\r]+)"],
    phone: PHONE_PATTERNS,
    product_code: PRODUCT_CODE_PATTERNS,
};

pub const PARCEIRO_B_RULES: RuleTable = RuleTable {
    name: &[
        r"nome[:\s]*completo[:\s]*([^\n\r]+)",
        r"cliente[:\s]*([^\n\r]+)",
        r"nome[:\s]*([^\n\r]+)",
    ],
    // `email` also matches inside a value ending in "email", and `[:\s]*`
    // crosses the line break, so "E-mail: invalid-email" captures the next
    // line instead.
    email: &[
        r"e-mail[:\s]*de[:\s]*contato[:\s]*([^\n\r]+)",
        r"email[:\s]*([^\n\r]+)",
        r"e-mail[:\s]*([^\n\r]+)",
    ],
    phone: PHONE_PATTERNS,
    product_code: PRODUCT_CODE_PATTERNS,
};

/// Compiled rules for all four fields.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub name: ExtractionRule,
    pub email: ExtractionRule,
    pub phone: ExtractionRule,
    pub product_code: ExtractionRule,
}

impl RuleSet {
    pub fn compile(table: &RuleTable) -> Result<Self, regex::Error> {
        Ok(Self {
            name: ExtractionRule::new(Field::Name, table.name)?,
            email: ExtractionRule::new(Field::Email, table.email)?,
            phone: ExtractionRule::new(Field::Phone, table.phone)?,
            product_code: ExtractionRule::new(Field::ProductCode, table.product_code)?,
        })
    }

    /// Rule for one field.
    pub fn rule(&self, field: Field) -> &ExtractionRule {
        match field {
            Field::Name => &self.name,
            Field::Email => &self.email,
            Field::Phone => &self.phone,
            Field::ProductCode => &self.product_code,
        }
    }
}

/// Looks up the rule set for a partner, falling back to the generic set.
#[derive(Debug, Clone)]
pub struct RuleSetRegistry {
    sets: HashMap<SourceId, RuleSet>,
    generic: RuleSet,
}

impl RuleSetRegistry {
    /// Registry with the built-in partner tables.
    pub fn default_rules() -> Self {
        let mut registry = Self::with_generic(
            RuleSet::compile(&GENERIC_RULES).expect("generic rule table compiles"),
        );
        registry.insert(
            SourceId::FornecedorA,
            RuleSet::compile(&FORNECEDOR_A_RULES).expect("Fornecedor A rule table compiles"),
        );
        registry.insert(
            SourceId::ParceiroB,
            RuleSet::compile(&PARCEIRO_B_RULES).expect("Parceiro B rule table compiles"),
        );
        registry
    }

    /// Registry with only a fallback set.
    pub fn with_generic(generic: RuleSet) -> Self {
        Self {
            sets: HashMap::new(),
            generic,
        }
    }

    /// Register (or replace) the dedicated set for a partner.
    pub fn insert(&mut self, source: SourceId, set: RuleSet) {
        self.sets.insert(source, set);
    }

    /// Rules to use for `source`.
    pub fn rules_for(&self, source: SourceId) -> &RuleSet {
        self.sets.get(&source).unwrap_or(&self.generic)
    }

    /// Whether `source` has its own rule set.
    pub fn has_dedicated(&self, source: SourceId) -> bool {
        self.sets.contains_key(&source)
    }
}

impl Default for RuleSetRegistry {
    fn default() -> Self {
        Self::default_rules()
    }
}
