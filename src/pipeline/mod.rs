//! Lead extraction pipeline.
//!
//! Every uploaded email flows through:
//! 1. `parser::decode()` — MIME decode to sender + text body
//! 2. `SourceDetector::detect()` — partner from the sender address
//! 3. `RuleSetRegistry::rules_for()` — that partner's ordered extraction rules
//! 4. `EmailParser::parse()` — extract and validate the four lead fields
//! 5. `PipelineOrchestrator::process()` — lead creation and ledger bookkeeping
//!
//! **Bad input never raises.** Every attempt ends as a ledger entry.

pub mod extract;
pub mod orchestrator;
pub mod parser;
pub mod rules;
pub mod source;
pub mod types;
pub mod validate;
