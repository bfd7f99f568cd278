//! Workflow Integration Tests
//!
//! Covers the full conversation pipeline: start guard, seeded first turn,
//! message ledger dedup, coverage-driven phase derivation, and the
//! submit/advance/reopen transitions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use epic_cascade::services::analysis::phases;
use epic_cascade::{
    AnalysisPhase, AnalysisStatus, AnalysisStore, AnalysisWorkflow, CoverageScorer, Database,
    LlmCollaborator, LlmError, LlmReply, LlmResult, MessageLedger, MessageRole, MessageType,
    NewMessage, PromptContext, QuestionCategory,
};

// ============================================================================
// Helpers
// ============================================================================

struct ScriptedCollaborator {
    replies: Mutex<VecDeque<LlmResult<LlmReply>>>,
}

impl ScriptedCollaborator {
    fn new(replies: Vec<LlmResult<LlmReply>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait]
impl LlmCollaborator for ScriptedCollaborator {
    async fn complete(&self, _context: PromptContext) -> LlmResult<LlmReply> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Provider("script exhausted".to_string())))
    }
}

fn question(text: &str, category: Option<QuestionCategory>) -> LlmResult<LlmReply> {
    Ok(LlmReply {
        text: text.to_string(),
        category,
        prompt_tokens: 50,
        completion_tokens: 10,
    })
}

fn create_workflow(replies: Vec<LlmResult<LlmReply>>) -> AnalysisWorkflow {
    let db = Database::new_in_memory().unwrap();
    AnalysisWorkflow::new(db.pool().clone(), ScriptedCollaborator::new(replies))
}

fn user_answer(content: &str) -> NewMessage {
    NewMessage {
        content: content.to_string(),
        role: MessageRole::User,
        message_type: MessageType::Answer,
        category: None,
    }
}

fn assistant_question(content: &str) -> NewMessage {
    NewMessage {
        content: content.to_string(),
        role: MessageRole::Assistant,
        message_type: MessageType::Question,
        category: None,
    }
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[test]
fn test_end_to_end_scenario_without_llm() {
    let db = Database::new_in_memory().unwrap();
    let store = AnalysisStore::new(db.pool().clone());
    let ledger = MessageLedger::new(store.clone());
    let scorer = CoverageScorer::new(store.clone());

    let workflow = AnalysisWorkflow::new(db.pool().clone(), ScriptedCollaborator::new(vec![]));
    let analysis = workflow
        .create_analysis("Login", "desc", "epic", "u1")
        .unwrap();
    assert_eq!(analysis.status, AnalysisStatus::InProgress);
    assert_eq!(analysis.completeness, 0);

    let claim = store.mark_started_if_not(&analysis.id);
    assert!(claim.acquired);

    ledger.append(&analysis.id, user_answer("desc")).unwrap();
    ledger
        .append(&analysis.id, assistant_question("first question"))
        .unwrap();

    let messages = ledger.read(&analysis.id).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[1].role, MessageRole::Assistant);

    // No categorized user turns yet: coverage is zero
    let coverage = scorer.score(&analysis.id).unwrap();
    assert_eq!(coverage.overall, 0);

    let current = store.get_analysis(&analysis.id).unwrap().unwrap();
    assert_eq!(
        phases::derive_phase(current.status, coverage.overall),
        AnalysisPhase::Analysis
    );
}

// ============================================================================
// Start guard through the workflow
// ============================================================================

#[tokio::test]
async fn test_start_conversation_retry_is_safe() {
    let workflow = create_workflow(vec![
        question("What problem does this solve?", None),
        question("never asked", None),
    ]);

    let analysis = workflow
        .start_conversation("u1", "Login", "Users sign in", "epic")
        .await
        .unwrap();
    let first_started = analysis.started_at.clone().unwrap();

    // Simulated client retries against the same analysis id
    for _ in 0..3 {
        let retried = workflow.start_analysis(&analysis.id).await.unwrap();
        assert_eq!(retried.started_at.as_deref(), Some(first_started.as_str()));
    }

    // One seed turn, one opening question, nothing duplicated
    let messages = workflow.get_messages(&analysis.id).unwrap();
    assert_eq!(messages.len(), 2);
}

// ============================================================================
// Ledger dedup
// ============================================================================

#[test]
fn test_dedup_idempotence() {
    let db = Database::new_in_memory().unwrap();
    let store = AnalysisStore::new(db.pool().clone());
    let ledger = MessageLedger::new(store.clone());

    let workflow = AnalysisWorkflow::new(db.pool().clone(), ScriptedCollaborator::new(vec![]));
    let analysis = workflow
        .create_analysis("Login", "desc", "epic", "u1")
        .unwrap();

    ledger.append(&analysis.id, user_answer("same answer")).unwrap();
    ledger.append(&analysis.id, user_answer("same answer")).unwrap();

    assert_eq!(store.get_messages(&analysis.id).unwrap().len(), 1);

    let first: Vec<String> = ledger
        .read(&analysis.id)
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    let second: Vec<String> = ledger
        .read(&analysis.id)
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(first, second);
}

// ============================================================================
// Coverage bounds
// ============================================================================

#[tokio::test]
async fn test_coverage_stays_within_bounds_over_many_turns() {
    let mut replies = Vec::new();
    let categories = [
        Some(QuestionCategory::FunctionalRequirements),
        Some(QuestionCategory::NonFunctionalRequirements),
        Some(QuestionCategory::BusinessRules),
        Some(QuestionCategory::AcceptanceCriteria),
        Some(QuestionCategory::EdgeCases),
        None,
    ];
    for i in 0..12 {
        replies.push(question(
            &format!("question {}", i),
            categories[i % categories.len()],
        ));
    }
    let workflow = create_workflow(replies);

    let analysis = workflow
        .start_conversation("u1", "Login", "desc", "epic")
        .await
        .unwrap();

    for i in 0..11 {
        let turn = workflow
            .process_user_message(&analysis.id, &format!("answer {}", i))
            .await
            .unwrap();
        assert!(turn.coverage.overall <= 100);
        assert!(turn
            .coverage
            .categories
            .iter()
            .all(|c| (0.0..=100.0).contains(&c.coverage)));
    }
}

// ============================================================================
// Phase monotonicity
// ============================================================================

#[tokio::test]
async fn test_phase_monotonicity_through_advances() {
    let workflow = create_workflow(vec![question("q", None)]);
    let analysis = workflow
        .start_conversation("u1", "Login", "desc", "epic")
        .await
        .unwrap();
    assert_eq!(analysis.current_phase, AnalysisPhase::Analysis);

    let a = workflow.advance_to_next_phase(&analysis.id).unwrap();
    assert_eq!(a.current_phase, AnalysisPhase::Strategy);

    let a = workflow.advance_to_next_phase(&analysis.id).unwrap();
    assert_eq!(a.current_phase, AnalysisPhase::TestPlanning);

    let a = workflow.advance_to_next_phase(&analysis.id).unwrap();
    assert_eq!(a.current_phase, AnalysisPhase::Completed);
    assert_eq!(a.status, AnalysisStatus::Completed);
    assert_eq!(a.completeness, 100);

    // Advancing past the terminal phase is rejected
    assert!(workflow.advance_to_next_phase(&analysis.id).is_err());

    // Only a reopen may move the phase backward
    let reopened = workflow
        .reopen_analysis(&analysis.id, "new requirement surfaced")
        .unwrap();
    assert_eq!(reopened.status, AnalysisStatus::Reopened);
    assert_ne!(reopened.current_phase, AnalysisPhase::Completed);
}

#[tokio::test]
async fn test_submit_twice_then_complete() {
    let workflow = create_workflow(vec![question("q", None)]);
    let analysis = workflow
        .start_conversation("u1", "Login", "desc", "epic")
        .await
        .unwrap();

    let first = workflow.submit_phase(&analysis.id).unwrap();
    let second = workflow.submit_phase(&analysis.id).unwrap();
    assert_eq!(first.status, second.status);
    assert_eq!(first.current_phase, second.current_phase);

    // Advance to the last working phase and submit: terminal
    workflow.advance_to_next_phase(&analysis.id).unwrap();
    workflow.advance_to_next_phase(&analysis.id).unwrap();
    let done = workflow.submit_phase(&analysis.id).unwrap();
    assert_eq!(done.status, AnalysisStatus::Completed);
    assert_eq!(done.current_phase, AnalysisPhase::Completed);
    assert_eq!(done.completeness, 100);
}
