//! Source detection from the sender address.
//!
//! Rules are tried in order against the sender; the first match wins and
//! no match (or no sender at all) yields [`SourceId::Unknown`].

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::SourceId;

/// A sender pattern mapped to a partner.
#[derive(Debug, Clone)]
pub struct SourceRule {
    /// Compiled, case-insensitive pattern.
    pub regex: Regex,
    /// Partner reported when the pattern matches.
    pub source: SourceId,
}

/// Maps sender addresses to partners.
#[derive(Debug, Clone)]
pub struct SourceDetector {
    rules: Vec<SourceRule>,
}

impl SourceDetector {
    /// Detector with the known partner markers.
    pub fn default_rules() -> Self {
        let rules = vec![
            SourceRule {
                regex: Regex::new(r"(?i)fornecedora").unwrap(),
                source: SourceId::FornecedorA,
            },
            SourceRule {
                regex: Regex::new(r"(?i)parceirob").unwrap(),
                source: SourceId::ParceiroB,
            },
        ];
        Self { rules }
    }

    /// Detector with no rules (everything is unknown).
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule. Matching is forced case-insensitive.
    pub fn add_rule(&mut self, pattern: &str, source: SourceId) -> Result<(), regex::Error> {
        self.rules.push(SourceRule {
            regex: Regex::new(&format!("(?i){pattern}"))?,
            source,
        });
        Ok(())
    }

    /// Resolve the partner for a sender address.
    pub fn detect(&self, sender: Option<&str>) -> SourceId {
        let Some(sender) = sender.map(str::trim).filter(|s| !s.is_empty()) else {
            return SourceId::Unknown;
        };

        let source = self
            .rules
            .iter()
            .find(|rule| rule.regex.is_match(sender))
            .map_or(SourceId::Unknown, |rule| rule.source);

        debug!(sender = sender, source = %source, "Source detected");
        source
    }
}

impl Default for SourceDetector {
    fn default() -> Self {
        Self::default_rules()
    }
}
