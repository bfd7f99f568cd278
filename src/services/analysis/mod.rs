//! Conversational Analysis Services
//!
//! The workflow engine: entity store, message ledger, coverage scorer,
//! phase state machine, retention engine, and the orchestrator that
//! composes them with the LLM collaborator.

pub mod coverage;
pub mod ledger;
pub mod phases;
pub mod retention;
pub mod store;
pub mod workflow;

pub use coverage::{CategoryCoverage, CoverageReport, CoverageScorer};
pub use ledger::MessageLedger;
pub use retention::{PurgeOptions, PurgeSummary, RetentionEngine};
pub use store::{AnalysisStore, StartClaim};
pub use workflow::{AnalysisWorkflow, ProcessedTurn};
