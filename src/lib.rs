//! Epic Cascade - Conversational Requirements Analysis Engine
//!
//! Refines a software requirement through a multi-turn LLM conversation,
//! progressing through analysis phases until a structured requirements
//! artifact is ready. This library provides:
//! - The analysis workflow (start guard, message ledger, coverage scoring,
//!   phase state machine)
//! - The retention engine for purging superseded conversation turns
//! - Storage layer (SQLite, JSON config) and data models

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::{
    Analysis, AnalysisPhase, AnalysisStatus, EngineConfig, Message, MessageRole, MessageType,
    NewMessage, QuestionCategory, RetentionDefaults,
};
pub use services::analysis::{
    AnalysisStore, AnalysisWorkflow, CoverageReport, CoverageScorer, MessageLedger, ProcessedTurn,
    PurgeOptions, PurgeSummary, RetentionEngine, StartClaim,
};
pub use services::llm::{LlmCollaborator, LlmError, LlmReply, LlmResult, PromptContext, PromptTurn};
pub use storage::{ConfigService, Database, DbPool};
pub use utils::error::{AppError, AppResult};
