//! Message Ledger
//!
//! Appends conversation turns and presents a deduplicated, causally
//! ordered view. Duplicate suppression runs at two independent layers:
//! a pre-insert check on (analysis, role, content), and a read-side
//! reconciliation pass over (role, trimmed content).
//!
//! The pre-insert check is find-then-insert, so two identical concurrent
//! appends can still both land; the read-side pass bounds that window.

use std::collections::HashSet;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::message::{Message, MessageRole, NewMessage, QuestionCategory};
use crate::utils::error::AppResult;
use crate::utils::time::now_rfc3339;

use super::store::AnalysisStore;

/// Ledger over the message store
#[derive(Debug, Clone)]
pub struct MessageLedger {
    store: AnalysisStore,
}

impl MessageLedger {
    /// Create a new ledger over the given store
    pub fn new(store: AnalysisStore) -> Self {
        Self { store }
    }

    /// Append a turn, suppressing exact duplicates.
    ///
    /// If an identical (analysis, role, content) message already exists the
    /// append is a no-op and the existing message is returned. A failing
    /// duplicate check degrades to a best-effort insert rather than silently
    /// dropping the turn.
    pub fn append(&self, analysis_id: &str, new_message: NewMessage) -> AppResult<Message> {
        match self
            .store
            .find_duplicate_message(analysis_id, new_message.role, &new_message.content)
        {
            Ok(Some(existing_id)) => {
                debug!(analysis_id, message_id = %existing_id, "duplicate append suppressed");
                if let Some(existing) = self.store.get_message(&existing_id)? {
                    return Ok(existing);
                }
                // Row vanished between check and fetch; fall through to insert
            }
            Ok(None) => {}
            Err(e) => {
                warn!(analysis_id, error = %e, "duplicate check failed; inserting best-effort");
            }
        }

        let now = now_rfc3339();
        let message = Message {
            id: Uuid::new_v4().to_string(),
            analysis_id: analysis_id.to_string(),
            content: new_message.content,
            role: new_message.role,
            message_type: new_message.message_type,
            category: new_message.category,
            created_at: now.clone(),
        };

        self.store.insert_message(&message)?;
        self.store.touch_analysis(analysis_id, &now)?;

        Ok(message)
    }

    /// Read all turns for an analysis, reconciled and ordered.
    ///
    /// Groups by (role, trimmed content); for duplicates the earliest
    /// created_at survives. The result is ascending by created_at with
    /// insertion order breaking ties.
    pub fn read(&self, analysis_id: &str) -> AppResult<Vec<Message>> {
        let messages = self.store.get_messages(analysis_id)?;

        // Input is already sorted ascending, so keeping the first
        // occurrence per key keeps the earliest.
        let mut seen: HashSet<(MessageRole, String)> = HashSet::new();
        let reconciled = messages
            .into_iter()
            .filter(|m| seen.insert((m.role, m.content.trim().to_string())))
            .collect();

        Ok(reconciled)
    }

    /// Latest assistant message carrying a category, if any.
    ///
    /// A user answer inherits the category of the question it responds to.
    pub fn latest_assistant_category(
        &self,
        analysis_id: &str,
    ) -> AppResult<Option<QuestionCategory>> {
        let messages = self.store.get_messages(analysis_id)?;
        Ok(messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant && m.category.is_some())
            .and_then(|m| m.category))
    }
}
