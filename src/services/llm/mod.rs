//! LLM Collaborator Seam
//!
//! No provider implementations ship in this crate; hosts supply one.

pub mod collaborator;

pub use collaborator::{LlmCollaborator, LlmError, LlmReply, LlmResult, PromptContext, PromptTurn};
