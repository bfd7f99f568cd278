//! LLM Collaborator Interface
//!
//! Defines the seam between the workflow and whatever model backs it.
//! Prompt construction and response parsing live behind this trait; the
//! engine only sees text, an optional question category, and token counts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::message::{MessageRole, QuestionCategory};
use crate::utils::error::AppError;

/// One prior turn handed to the collaborator as context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTurn {
    pub role: MessageRole,
    pub content: String,
}

/// Everything the collaborator needs to produce the next assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptContext {
    /// Requirement title
    pub title: String,
    /// Requirement description
    pub description: String,
    /// The epic being refined
    pub epic_content: String,
    /// Ordered conversation history, oldest first
    pub history: Vec<PromptTurn>,
}

/// A parsed collaborator reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmReply {
    /// Assistant text for the next turn
    pub text: String,
    /// Requirement aspect the reply's question targets, when parseable
    pub category: Option<QuestionCategory>,
    /// Prompt-side token usage
    pub prompt_tokens: u32,
    /// Completion-side token usage
    pub completion_tokens: u32,
}

/// Errors surfaced by a collaborator implementation
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("empty response from provider")]
    EmptyResponse,
}

/// Result type alias for collaborator calls
pub type LlmResult<T> = Result<T, LlmError>;

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        AppError::llm(err.to_string())
    }
}

/// Trait every LLM collaborator must implement.
#[async_trait]
pub trait LlmCollaborator: Send + Sync {
    /// Produce the next assistant turn for the given context.
    async fn complete(&self, context: PromptContext) -> LlmResult<LlmReply>;
}
