//! Field extraction: ordered patterns in, one cleaned value out.
//!
//! Each pattern is tried against the whole body in order. The first
//! capture group of the first match is trimmed and scrubbed of stray
//! punctuation; the first pattern that leaves something non-empty wins.
//! Absence is the only failure signal.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::types::Field;

/// Characters outside this set are dropped from extracted values.
static DISALLOWED_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\w\s@.\-()àáâãäåæçèéêëìíîïðñòóôõöøùúûüýþÿ]").unwrap()
});

/// Label remnants that a loose `nome:` pattern can drag into a name.
static NAME_LABEL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(do cliente|cliente|nome)\s*").unwrap());

/// Ordered patterns for one target field.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub field: Field,
    patterns: Vec<Regex>,
}

impl ExtractionRule {
    /// Compile a rule. Every pattern is matched case-insensitively and must
    /// have at least one capture group.
    pub fn new(field: Field, patterns: &[&str]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { field, patterns })
    }

    /// Run the chain against `body`.
    pub fn extract(&self, body: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|pattern| extract_with(pattern, body, self.field))
    }
}

/// Try one pattern; `None` if it does not match or cleans down to nothing.
fn extract_with(pattern: &Regex, body: &str, field: Field) -> Option<String> {
    let captured = pattern.captures(body)?.get(1)?.as_str().trim();
    if captured.is_empty() {
        return None;
    }

    let cleaned = clean_value(captured, field);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Normalise a raw captured value for `field`.
pub fn clean_value(raw: &str, field: Field) -> String {
    let cleaned = DISALLOWED_CHARS.replace_all(raw.trim(), "");
    let cleaned = cleaned.trim();

    if field == Field::Name {
        NAME_LABEL_PREFIX.replace(cleaned, "").trim().to_string()
    } else {
        cleaned.to_string()
    }
}

/// Convenience wrapper over [`ExtractionRule::extract`].
pub fn extract(body: &str, rule: &ExtractionRule) -> Option<String> {
    rule.extract(body)
}
