//! Analysis Workflow
//!
//! Externally-facing use cases composing the store, ledger, scorer, phase
//! machine, and the LLM collaborator: start a conversation, process user
//! turns, and drive phase transitions.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::analysis::{Analysis, AnalysisPhase, AnalysisStatus};
use crate::models::message::{Message, MessageRole, MessageType, NewMessage};
use crate::services::llm::collaborator::{LlmCollaborator, PromptContext, PromptTurn};
use crate::storage::database::DbPool;
use crate::utils::error::{AppError, AppResult};
use crate::utils::time::now_rfc3339;

use super::coverage::{CoverageReport, CoverageScorer};
use super::ledger::MessageLedger;
use super::phases;
use super::store::AnalysisStore;

/// Result of processing one user turn
#[derive(Debug, Clone)]
pub struct ProcessedTurn {
    /// The appended assistant reply
    pub reply: Message,
    /// Phase after recomputation
    pub phase: AnalysisPhase,
    /// Coverage after recomputation
    pub coverage: CoverageReport,
}

/// The workflow orchestrator
pub struct AnalysisWorkflow {
    store: AnalysisStore,
    ledger: MessageLedger,
    scorer: CoverageScorer,
    collaborator: Arc<dyn LlmCollaborator>,
}

impl AnalysisWorkflow {
    /// Create a workflow over the given pool and collaborator
    pub fn new(pool: DbPool, collaborator: Arc<dyn LlmCollaborator>) -> Self {
        let store = AnalysisStore::new(pool);
        Self {
            ledger: MessageLedger::new(store.clone()),
            scorer: CoverageScorer::new(store.clone()),
            store,
            collaborator,
        }
    }

    /// Create a new analysis in its initial state
    pub fn create_analysis(
        &self,
        title: &str,
        description: &str,
        epic_content: &str,
        user_id: &str,
    ) -> AppResult<Analysis> {
        let now = now_rfc3339();
        let analysis = Analysis {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            epic_content: epic_content.to_string(),
            user_id: user_id.to_string(),
            status: AnalysisStatus::InProgress,
            current_phase: AnalysisPhase::Analysis,
            completeness: 0,
            reopen_reason: None,
            started_at: None,
            created_at: now.clone(),
            updated_at: now,
        };

        self.store.create_analysis(&analysis)?;
        debug!(analysis_id = %analysis.id, "created analysis");

        Ok(analysis)
    }

    /// Create an analysis and kick off its conversation
    pub async fn start_conversation(
        &self,
        user_id: &str,
        title: &str,
        description: &str,
        epic_content: &str,
    ) -> AppResult<Analysis> {
        let analysis = self.create_analysis(title, description, epic_content, user_id)?;
        self.start_analysis(&analysis.id).await
    }

    /// Kick off (or re-request) the first AI turn for an analysis.
    ///
    /// The start guard admits exactly one caller; everyone else gets the
    /// current persisted state back with no collaborator call and no seed
    /// message, which makes client retries and double-submits safe.
    pub async fn start_analysis(&self, analysis_id: &str) -> AppResult<Analysis> {
        let claim = self.store.mark_started_if_not(analysis_id);

        if !claim.acquired {
            debug!(analysis_id, "start already claimed; returning current state");
            return claim
                .analysis
                .ok_or_else(|| AppError::not_found(format!("Analysis not found: {}", analysis_id)));
        }

        let analysis = claim
            .analysis
            .ok_or_else(|| AppError::not_found(format!("Analysis not found: {}", analysis_id)))?;
        info!(analysis_id, "starting conversation");

        // Seed the conversation with the requirement itself
        let seed = format!("{}\n\n{}", analysis.title, analysis.description);
        self.ledger.append(
            analysis_id,
            NewMessage {
                content: seed,
                role: MessageRole::User,
                message_type: MessageType::Answer,
                category: None,
            },
        )?;

        let history = self.ledger.read(analysis_id)?;
        let reply = self
            .collaborator
            .complete(Self::build_context(&analysis, &history))
            .await?;

        self.ledger.append(
            analysis_id,
            NewMessage {
                content: reply.text,
                role: MessageRole::Assistant,
                message_type: MessageType::Question,
                category: reply.category,
            },
        )?;

        if let Err(e) =
            self.store
                .record_usage(analysis_id, "opening_question", reply.prompt_tokens, reply.completion_tokens)
        {
            warn!(analysis_id, error = %e, "failed to record usage");
        }

        self.require_analysis(analysis_id)
    }

    /// Process one user turn: append it, ask the collaborator for the next
    /// question, and fold the new coverage into phase and completeness.
    ///
    /// If the collaborator fails, the user turn stays visible and the
    /// analysis's phase and coverage remain those of the last completed
    /// turn.
    pub async fn process_user_message(
        &self,
        analysis_id: &str,
        content: &str,
    ) -> AppResult<ProcessedTurn> {
        let mut analysis = self.require_analysis(analysis_id)?;

        if analysis.status.is_terminal() {
            return Err(AppError::conflict(format!(
                "Analysis {} is completed; reopen it to continue",
                analysis_id
            )));
        }

        // A user answer addresses the aspect of the question it replies to
        let category = self.ledger.latest_assistant_category(analysis_id)?;
        self.ledger.append(
            analysis_id,
            NewMessage {
                content: content.to_string(),
                role: MessageRole::User,
                message_type: MessageType::Answer,
                category,
            },
        )?;

        let history = self.ledger.read(analysis_id)?;
        let reply = self
            .collaborator
            .complete(Self::build_context(&analysis, &history))
            .await?;

        let assistant_message = self.ledger.append(
            analysis_id,
            NewMessage {
                content: reply.text,
                role: MessageRole::Assistant,
                message_type: MessageType::Question,
                category: reply.category,
            },
        )?;

        if let Err(e) =
            self.store
                .record_usage(analysis_id, "turn", reply.prompt_tokens, reply.completion_tokens)
        {
            warn!(analysis_id, error = %e, "failed to record usage");
        }

        let coverage = self.scorer.score(analysis_id)?;
        phases::refresh_phase(&mut analysis, coverage.overall);
        analysis.updated_at = now_rfc3339();
        self.store.update_analysis(&analysis)?;

        debug!(
            analysis_id,
            completeness = coverage.overall,
            phase = %analysis.current_phase,
            "processed user turn"
        );

        Ok(ProcessedTurn {
            reply: assistant_message,
            phase: analysis.current_phase,
            coverage,
        })
    }

    /// Mark the current phase finished; terminal on the last phase
    pub fn submit_phase(&self, analysis_id: &str) -> AppResult<Analysis> {
        let mut analysis = self.require_analysis(analysis_id)?;
        phases::submit_phase(&mut analysis)?;
        analysis.updated_at = now_rfc3339();
        self.store.update_analysis(&analysis)?;
        info!(analysis_id, status = %analysis.status, "submitted phase");
        Ok(analysis)
    }

    /// Advance exactly one phase
    pub fn advance_to_next_phase(&self, analysis_id: &str) -> AppResult<Analysis> {
        let mut analysis = self.require_analysis(analysis_id)?;
        phases::advance_phase(&mut analysis)?;
        analysis.updated_at = now_rfc3339();
        self.store.update_analysis(&analysis)?;
        info!(analysis_id, phase = %analysis.current_phase, "advanced phase");
        Ok(analysis)
    }

    /// Reopen a submitted or completed analysis
    pub fn reopen_analysis(&self, analysis_id: &str, reason: &str) -> AppResult<Analysis> {
        let mut analysis = self.require_analysis(analysis_id)?;
        phases::reopen(&mut analysis, reason);
        analysis.updated_at = now_rfc3339();
        self.store.update_analysis(&analysis)?;
        Ok(analysis)
    }

    /// Reconciled, ordered conversation history
    pub fn get_messages(&self, analysis_id: &str) -> AppResult<Vec<Message>> {
        self.ledger.read(analysis_id)
    }

    /// Get an analysis by ID
    pub fn get_analysis(&self, analysis_id: &str) -> AppResult<Option<Analysis>> {
        self.store.get_analysis(analysis_id)
    }

    /// List analyses, optionally filtered by owner and/or status
    pub fn list_analyses(
        &self,
        user_id: Option<&str>,
        status: Option<AnalysisStatus>,
    ) -> AppResult<Vec<Analysis>> {
        self.store.list_analyses(user_id, status)
    }

    /// Delete an analysis and its messages
    pub fn delete_analysis(&self, analysis_id: &str) -> AppResult<()> {
        self.store.delete_analysis(analysis_id)
    }

    /// Total (prompt, completion) tokens spent on an analysis
    pub fn usage_totals(&self, analysis_id: &str) -> AppResult<(u64, u64)> {
        self.store.usage_totals(analysis_id)
    }

    fn require_analysis(&self, analysis_id: &str) -> AppResult<Analysis> {
        self.store
            .get_analysis(analysis_id)?
            .ok_or_else(|| AppError::not_found(format!("Analysis not found: {}", analysis_id)))
    }

    fn build_context(analysis: &Analysis, history: &[Message]) -> PromptContext {
        PromptContext {
            title: analysis.title.clone(),
            description: analysis.description.clone(),
            epic_content: analysis.epic_content.clone(),
            history: history
                .iter()
                .map(|m| PromptTurn {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for AnalysisWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisWorkflow").finish()
    }
}
