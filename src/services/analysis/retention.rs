//! Retention Engine
//!
//! Bounds storage growth by deleting superseded turns of completed
//! analyses under a keep-policy, with a mandatory dry-run preview.
//! Execute mode computes and deletes inside one transaction per
//! analysis, so the deleted set is exactly the computed set; a failure
//! in one analysis never aborts the rest of a batch.

use rusqlite::params;
use tracing::{info, warn};

use crate::models::message::MessageRole;
use crate::models::settings::RetentionDefaults;
use crate::storage::database::DbPool;
use crate::utils::error::{AppError, AppResult};

/// How many deletion candidates a summary previews
const PREVIEW_LIMIT: usize = 5;

/// Keep-policy for a purge invocation
#[derive(Debug, Clone)]
pub struct PurgeOptions {
    /// Compute and report without mutating
    pub dry_run: bool,
    /// Keep the most recent assistant message. When false nothing is
    /// kept, regardless of `keep_last_user`.
    pub keep_last_assistant: bool,
    /// Also keep the user message immediately preceding the kept
    /// assistant message
    pub keep_last_user: bool,
}

impl Default for PurgeOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            keep_last_assistant: true,
            keep_last_user: true,
        }
    }
}

impl From<&RetentionDefaults> for PurgeOptions {
    fn from(defaults: &RetentionDefaults) -> Self {
        Self {
            dry_run: defaults.dry_run,
            keep_last_assistant: defaults.keep_last_assistant,
            keep_last_user: defaults.keep_last_user,
        }
    }
}

/// Per-analysis outcome of a purge invocation
#[derive(Debug, Clone)]
pub struct PurgeSummary {
    pub analysis_id: String,
    pub total_messages: usize,
    pub to_delete_count: usize,
    pub kept_message_ids: Vec<String>,
    /// At most five deletion candidates, for preview display
    pub preview_delete_ids: Vec<String>,
    pub error: Option<String>,
}

impl PurgeSummary {
    fn failed(analysis_id: &str, error: String) -> Self {
        Self {
            analysis_id: analysis_id.to_string(),
            total_messages: 0,
            to_delete_count: 0,
            kept_message_ids: Vec::new(),
            preview_delete_ids: Vec::new(),
            error: Some(error),
        }
    }
}

/// Purge engine over the message store
#[derive(Clone)]
pub struct RetentionEngine {
    pool: DbPool,
}

impl RetentionEngine {
    /// Create a new engine over the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Purge every COMPLETED analysis under the batch keep-policy.
    ///
    /// The batch always keeps the most recent assistant message; only
    /// `dry_run` and `keep_last_user` are caller-controlled. Each
    /// analysis runs in its own transaction and a failure is reported in
    /// that analysis's summary instead of aborting the batch.
    pub fn purge_completed_batch(&self, options: &PurgeOptions) -> AppResult<Vec<PurgeSummary>> {
        let effective = PurgeOptions {
            dry_run: options.dry_run,
            keep_last_assistant: true,
            keep_last_user: options.keep_last_user,
        };

        let ids = self.completed_analysis_ids()?;
        let mut summaries = Vec::with_capacity(ids.len());

        for analysis_id in ids {
            let summary = match self.purge_one(&analysis_id, &effective) {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(analysis_id = %analysis_id, error = %e, "purge failed for analysis; continuing batch");
                    PurgeSummary::failed(&analysis_id, e.to_string())
                }
            };
            summaries.push(summary);
        }

        Ok(summaries)
    }

    /// Purge a single analysis under the given keep-policy.
    ///
    /// A missing analysis yields a summary with `error` set and zero
    /// counts rather than an error.
    pub fn purge_one(&self, analysis_id: &str, options: &PurgeOptions) -> AppResult<PurgeSummary> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))?;

        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM analyses WHERE id = ?1",
                params![analysis_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count > 0)?;
        if !exists {
            return Ok(PurgeSummary::failed(
                analysis_id,
                format!("Analysis not found: {}", analysis_id),
            ));
        }

        if options.dry_run {
            let rows = Self::ordered_message_meta(&conn, analysis_id)?;
            let (kept, to_delete) = plan_keep_set(&rows, options);
            return Ok(Self::summarize(analysis_id, rows.len(), kept, to_delete));
        }

        // Compute-then-delete inside one transaction so the deleted set
        // is exactly the computed candidate set.
        let tx = conn.transaction()?;
        let rows = Self::ordered_message_meta(&tx, analysis_id)?;
        let (kept, to_delete) = plan_keep_set(&rows, options);
        for message_id in &to_delete {
            tx.execute("DELETE FROM messages WHERE id = ?1", params![message_id])?;
        }
        tx.commit()?;

        info!(
            analysis_id,
            deleted = to_delete.len(),
            kept = kept.len(),
            "purged analysis messages"
        );

        Ok(Self::summarize(analysis_id, rows.len(), kept, to_delete))
    }

    fn completed_analysis_ids(&self) -> AppResult<Vec<String>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))?;

        let mut stmt = conn.prepare(
            "SELECT id FROM analyses WHERE status = 'completed' ORDER BY updated_at ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(ids)
    }

    fn ordered_message_meta(
        conn: &rusqlite::Connection,
        analysis_id: &str,
    ) -> AppResult<Vec<(String, MessageRole)>> {
        let mut stmt = conn.prepare(
            "SELECT id, role FROM messages WHERE analysis_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![analysis_id], |row| {
                let id: String = row.get(0)?;
                let role: String = row.get(1)?;
                Ok((id, role))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(id, role)| MessageRole::parse(&role).map(|r| (id, r)))
            .collect();

        Ok(rows)
    }

    fn summarize(
        analysis_id: &str,
        total: usize,
        kept: Vec<String>,
        to_delete: Vec<String>,
    ) -> PurgeSummary {
        let preview_delete_ids = to_delete.iter().take(PREVIEW_LIMIT).cloned().collect();
        PurgeSummary {
            analysis_id: analysis_id.to_string(),
            total_messages: total,
            to_delete_count: to_delete.len(),
            kept_message_ids: kept,
            preview_delete_ids,
            error: None,
        }
    }
}

impl std::fmt::Debug for RetentionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionEngine").finish()
    }
}

/// Split an ordered message list into (kept, deletion candidates).
///
/// Keeps the most recent assistant message plus, when requested, the
/// user message immediately preceding it. `keep_last_assistant = false`
/// wipes everything.
fn plan_keep_set(
    rows: &[(String, MessageRole)],
    options: &PurgeOptions,
) -> (Vec<String>, Vec<String>) {
    let mut kept: Vec<String> = Vec::new();

    if options.keep_last_assistant {
        let last_assistant = rows
            .iter()
            .enumerate()
            .rev()
            .find(|(_, (_, role))| *role == MessageRole::Assistant);

        if let Some((assistant_idx, (assistant_id, _))) = last_assistant {
            if options.keep_last_user {
                let preceding_user = rows[..assistant_idx]
                    .iter()
                    .rev()
                    .find(|(_, role)| *role == MessageRole::User);
                if let Some((user_id, _)) = preceding_user {
                    kept.push(user_id.clone());
                }
            }
            kept.push(assistant_id.clone());
        }
    }

    let to_delete = rows
        .iter()
        .map(|(id, _)| id.clone())
        .filter(|id| !kept.contains(id))
        .collect();

    (kept, to_delete)
}
