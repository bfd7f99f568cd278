//! Retention Engine Integration Tests
//!
//! Keep-policy correctness, dry-run purity, and per-analysis batch
//! isolation against an in-memory database.

use epic_cascade::{
    Analysis, AnalysisPhase, AnalysisStatus, AnalysisStore, Database, Message, MessageRole,
    MessageType, PurgeOptions, RetentionEngine,
};

// ============================================================================
// Helpers
// ============================================================================

fn create_engine() -> (RetentionEngine, AnalysisStore) {
    let db = Database::new_in_memory().unwrap();
    (
        RetentionEngine::new(db.pool().clone()),
        AnalysisStore::new(db.pool().clone()),
    )
}

fn seed_analysis(store: &AnalysisStore, id: &str, status: AnalysisStatus) {
    let phase = if status == AnalysisStatus::Completed {
        AnalysisPhase::Completed
    } else {
        AnalysisPhase::Analysis
    };
    store
        .create_analysis(&Analysis {
            id: id.to_string(),
            title: "Login".to_string(),
            description: "desc".to_string(),
            epic_content: "epic".to_string(),
            user_id: "u1".to_string(),
            status,
            current_phase: phase,
            completeness: if status == AnalysisStatus::Completed { 100 } else { 0 },
            reopen_reason: None,
            started_at: Some("2024-01-01T00:00:00.000000Z".to_string()),
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000000Z".to_string(),
        })
        .unwrap();
}

fn seed_message(store: &AnalysisStore, analysis_id: &str, id: &str, role: MessageRole, second: u32) {
    store
        .insert_message(&Message {
            id: id.to_string(),
            analysis_id: analysis_id.to_string(),
            content: format!("message {}", id),
            role,
            message_type: match role {
                MessageRole::User => MessageType::Answer,
                MessageRole::Assistant => MessageType::Question,
            },
            category: None,
            created_at: format!("2024-01-01T00:00:{:02}.000000Z", second),
        })
        .unwrap();
}

/// Seeds the canonical [U1, A1, U2, A2] conversation
fn seed_conversation(store: &AnalysisStore, analysis_id: &str) {
    seed_message(store, analysis_id, "u1-msg", MessageRole::User, 1);
    seed_message(store, analysis_id, "a1-msg", MessageRole::Assistant, 2);
    seed_message(store, analysis_id, "u2-msg", MessageRole::User, 3);
    seed_message(store, analysis_id, "a2-msg", MessageRole::Assistant, 4);
}

/// Seeds the canonical [U1, A1, U2, A2] conversation with message ids
/// namespaced by `analysis_id`, so the same shape can be seeded into
/// several analyses without colliding on the global `messages.id` key.
fn seed_conversation_ns(store: &AnalysisStore, analysis_id: &str) {
    seed_message(store, analysis_id, &format!("{}-u1-msg", analysis_id), MessageRole::User, 1);
    seed_message(store, analysis_id, &format!("{}-a1-msg", analysis_id), MessageRole::Assistant, 2);
    seed_message(store, analysis_id, &format!("{}-u2-msg", analysis_id), MessageRole::User, 3);
    seed_message(store, analysis_id, &format!("{}-a2-msg", analysis_id), MessageRole::Assistant, 4);
}

fn execute_options() -> PurgeOptions {
    PurgeOptions {
        dry_run: false,
        keep_last_assistant: true,
        keep_last_user: true,
    }
}

// ============================================================================
// Keep-policy correctness
// ============================================================================

#[test]
fn test_keep_policy_preserves_last_exchange() {
    let (engine, store) = create_engine();
    seed_analysis(&store, "a1", AnalysisStatus::Completed);
    seed_conversation(&store, "a1");

    let summary = engine.purge_one("a1", &execute_options()).unwrap();

    assert!(summary.error.is_none());
    assert_eq!(summary.total_messages, 4);
    assert_eq!(summary.to_delete_count, 2);
    assert_eq!(
        summary.kept_message_ids,
        vec!["u2-msg".to_string(), "a2-msg".to_string()]
    );

    let remaining: Vec<String> = store
        .get_messages("a1")
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(remaining, vec!["u2-msg".to_string(), "a2-msg".to_string()]);
}

#[test]
fn test_full_wipe_when_keep_last_assistant_disabled() {
    let (engine, store) = create_engine();
    seed_analysis(&store, "a1", AnalysisStatus::Completed);
    seed_conversation(&store, "a1");

    let options = PurgeOptions {
        dry_run: false,
        keep_last_assistant: false,
        keep_last_user: true,
    };
    let summary = engine.purge_one("a1", &options).unwrap();

    assert_eq!(summary.to_delete_count, 4);
    assert!(summary.kept_message_ids.is_empty());
    assert!(store.get_messages("a1").unwrap().is_empty());
}

#[test]
fn test_keep_assistant_only() {
    let (engine, store) = create_engine();
    seed_analysis(&store, "a1", AnalysisStatus::Completed);
    seed_conversation(&store, "a1");

    let options = PurgeOptions {
        dry_run: false,
        keep_last_assistant: true,
        keep_last_user: false,
    };
    let summary = engine.purge_one("a1", &options).unwrap();

    assert_eq!(summary.kept_message_ids, vec!["a2-msg".to_string()]);
    assert_eq!(summary.to_delete_count, 3);
}

// ============================================================================
// Dry-run purity
// ============================================================================

#[test]
fn test_dry_run_does_not_mutate() {
    let (engine, store) = create_engine();
    seed_analysis(&store, "a1", AnalysisStatus::Completed);
    seed_conversation(&store, "a1");

    let options = PurgeOptions {
        dry_run: true,
        keep_last_assistant: true,
        keep_last_user: true,
    };

    let first = engine.purge_one("a1", &options).unwrap();
    let second = engine.purge_one("a1", &options).unwrap();

    assert_eq!(first.to_delete_count, second.to_delete_count);
    assert_eq!(first.kept_message_ids, second.kept_message_ids);
    assert_eq!(first.preview_delete_ids, second.preview_delete_ids);

    // Nothing was deleted
    assert_eq!(store.get_messages("a1").unwrap().len(), 4);
}

#[test]
fn test_dry_run_preview_is_capped_at_five() {
    let (engine, store) = create_engine();
    seed_analysis(&store, "a1", AnalysisStatus::Completed);
    for i in 0..10 {
        seed_message(&store, "a1", &format!("u{}-msg", i), MessageRole::User, i);
    }

    let summary = engine
        .purge_one(
            "a1",
            &PurgeOptions {
                dry_run: true,
                keep_last_assistant: true,
                keep_last_user: true,
            },
        )
        .unwrap();

    // No assistant message exists, so everything is a candidate
    assert_eq!(summary.to_delete_count, 10);
    assert_eq!(summary.preview_delete_ids.len(), 5);
}

#[test]
fn test_execute_matches_dry_run_plan() {
    let (engine, store) = create_engine();
    seed_analysis(&store, "a1", AnalysisStatus::Completed);
    seed_conversation(&store, "a1");

    let preview = engine
        .purge_one(
            "a1",
            &PurgeOptions {
                dry_run: true,
                keep_last_assistant: true,
                keep_last_user: true,
            },
        )
        .unwrap();
    let applied = engine.purge_one("a1", &execute_options()).unwrap();

    assert_eq!(preview.to_delete_count, applied.to_delete_count);
    assert_eq!(preview.kept_message_ids, applied.kept_message_ids);

    let remaining: Vec<String> = store
        .get_messages("a1")
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(remaining, applied.kept_message_ids);
}

// ============================================================================
// Error reporting
// ============================================================================

#[test]
fn test_missing_analysis_reports_error_summary() {
    let (engine, _store) = create_engine();

    let summary = engine.purge_one("ghost", &execute_options()).unwrap();

    assert!(summary.error.is_some());
    assert_eq!(summary.total_messages, 0);
    assert_eq!(summary.to_delete_count, 0);
    assert!(summary.kept_message_ids.is_empty());
}

// ============================================================================
// Batch purge
// ============================================================================

#[test]
fn test_batch_targets_only_completed_analyses() {
    let (engine, store) = create_engine();
    seed_analysis(&store, "done-1", AnalysisStatus::Completed);
    seed_analysis(&store, "done-2", AnalysisStatus::Completed);
    seed_analysis(&store, "open-1", AnalysisStatus::InProgress);
    seed_conversation_ns(&store, "done-1");
    seed_conversation_ns(&store, "done-2");
    seed_conversation_ns(&store, "open-1");

    let summaries = engine
        .purge_completed_batch(&PurgeOptions {
            dry_run: false,
            keep_last_assistant: true,
            keep_last_user: true,
        })
        .unwrap();

    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.error.is_none()));

    // Completed analyses are trimmed to the last exchange
    assert_eq!(store.get_messages("done-1").unwrap().len(), 2);
    assert_eq!(store.get_messages("done-2").unwrap().len(), 2);
    // In-progress conversations are untouched
    assert_eq!(store.get_messages("open-1").unwrap().len(), 4);
}

#[test]
fn test_batch_dry_run_mutates_nothing() {
    let (engine, store) = create_engine();
    seed_analysis(&store, "done-1", AnalysisStatus::Completed);
    seed_conversation(&store, "done-1");

    let summaries = engine
        .purge_completed_batch(&PurgeOptions {
            dry_run: true,
            keep_last_assistant: true,
            keep_last_user: false,
        })
        .unwrap();

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].to_delete_count, 3);
    assert_eq!(store.get_messages("done-1").unwrap().len(), 4);
}

#[test]
fn test_batch_always_keeps_last_assistant() {
    let (engine, store) = create_engine();
    seed_analysis(&store, "done-1", AnalysisStatus::Completed);
    seed_conversation(&store, "done-1");

    // Even if a caller asks for a full wipe, the batch keep-policy
    // preserves the most recent assistant message.
    let summaries = engine
        .purge_completed_batch(&PurgeOptions {
            dry_run: false,
            keep_last_assistant: false,
            keep_last_user: false,
        })
        .unwrap();

    assert_eq!(summaries[0].kept_message_ids, vec!["a2-msg".to_string()]);
    assert_eq!(store.get_messages("done-1").unwrap().len(), 1);
}
