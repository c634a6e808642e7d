//! Email parser. Decodes one message and turns it into a lead record.
//!
//! 1. Decode the MIME message (sender + plain-text body)
//! 2. Detect the partner from the sender
//! 3. Pick that partner's rule set (generic when there is none)
//! 4. Extract the four fields
//! 5. Validate presence and email grammar

use mail_parser::MessageParser;
use tracing::debug;

use crate::error::{ParseErrorKind, ParseFailure};
use crate::pipeline::rules::RuleSetRegistry;
use crate::pipeline::source::SourceDetector;
use crate::pipeline::types::{ExtractedRecord, Field, RawMessage, SourceId};
use crate::pipeline::validate::is_valid_email;

/// Decode raw message bytes into sender + text body.
///
/// A message without a readable text body decodes to an empty body; only
/// input that cannot be read as a message at all is an error.
pub fn decode(raw: &[u8]) -> Result<RawMessage, ParseErrorKind> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| ParseErrorKind::Malformed("unreadable message structure".into()))?;

    let sender = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string());

    let body = parsed
        .body_text(0)
        .map(|text| text.into_owned())
        .unwrap_or_default();

    Ok(RawMessage { sender, body })
}

/// Stateless parser over a source detector and rule registry.
#[derive(Debug, Clone, Default)]
pub struct EmailParser {
    detector: SourceDetector,
    registry: RuleSetRegistry,
}

impl EmailParser {
    pub fn new(detector: SourceDetector, registry: RuleSetRegistry) -> Self {
        Self { detector, registry }
    }

    /// Partner for a decoded message.
    pub fn detect_source(&self, message: &RawMessage) -> SourceId {
        self.detector.detect(message.sender.as_deref())
    }

    /// Extract and validate a lead from a decoded message.
    pub fn parse(&self, message: &RawMessage) -> Result<ExtractedRecord, ParseErrorKind> {
        let source = self.detect_source(message);
        let rules = self.registry.rules_for(source);
        debug!(
            source = %source,
            dedicated = self.registry.has_dedicated(source),
            "Rule set selected"
        );
        let body = message.body.as_str();

        let [name, email, phone, product_code] =
            Field::ALL.map(|field| rules.rule(field).extract(body));

        let missing: Vec<Field> = Field::ALL
            .into_iter()
            .zip([&name, &email, &phone, &product_code])
            .filter(|(_, value)| value.is_none())
            .map(|(field, _)| field)
            .collect();

        let (Some(name), Some(email), Some(phone), Some(product_code)) =
            (name, email, phone, product_code)
        else {
            debug!(source = %source, missing = ?missing, "Required fields missing");
            return Err(ParseErrorKind::MissingFields { fields: missing });
        };

        if !is_valid_email(&email) {
            return Err(ParseErrorKind::InvalidEmailFormat { value: email });
        }

        Ok(ExtractedRecord {
            name,
            email,
            phone,
            product_code,
            source,
        })
    }

    /// Decode and parse in one step, tagging failures with `filename`.
    pub fn parse_bytes(
        &self,
        raw: &[u8],
        filename: &str,
    ) -> Result<ExtractedRecord, ParseFailure> {
        decode(raw)
            .and_then(|message| self.parse(&message))
            .map_err(|kind| ParseFailure::new(filename, kind))
    }
}
