//! Lead Intake: partner email lead extraction with an audited attempt ledger.

pub mod config;
pub mod error;
pub mod leads;
pub mod ledger;
pub mod pipeline;
pub mod store;
pub mod upload;
