pub mod commands;
pub mod config;
pub mod dates;
pub mod domains;
pub mod error;
pub mod export;
pub mod interactions;
pub mod interfaces;
pub mod ledger;
pub mod stats;
pub mod workflow;

pub use crate::config::Config;
pub use crate::error::{LedgerError, Result};
pub use crate::ledger::EventLedger;
pub use crate::workflow::{DeletionRequest, DeletionWorkflow, WorkflowOutcome};
