//! Analysis Entity Store
//!
//! All SQL for analyses, messages, and usage events. Constructed over an
//! injected connection pool so tests can run against an in-memory database.

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::warn;

use crate::models::analysis::{Analysis, AnalysisPhase, AnalysisStatus};
use crate::models::message::{Message, MessageRole, MessageType, QuestionCategory};
use crate::storage::database::DbPool;
use crate::utils::error::{AppError, AppResult};
use crate::utils::time::now_rfc3339;

/// Outcome of the start guard's atomic claim.
///
/// `acquired` is true for exactly one caller per analysis lifetime; every
/// other caller (concurrent or retrying) sees false plus the current row.
#[derive(Debug, Clone)]
pub struct StartClaim {
    pub acquired: bool,
    pub analysis: Option<Analysis>,
}

/// Store for analysis and message rows
#[derive(Clone)]
pub struct AnalysisStore {
    pool: DbPool,
}

impl AnalysisStore {
    /// Create a new store over the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    // ========================================================================
    // Analysis operations
    // ========================================================================

    /// Insert a new analysis row
    pub fn create_analysis(&self, analysis: &Analysis) -> AppResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO analyses (id, title, description, epic_content, user_id, status,
             current_phase, completeness, reopen_reason, started_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                analysis.id,
                analysis.title,
                analysis.description,
                analysis.epic_content,
                analysis.user_id,
                analysis.status.as_str(),
                analysis.current_phase.as_str(),
                analysis.completeness as i64,
                analysis.reopen_reason,
                analysis.started_at,
                analysis.created_at,
                analysis.updated_at,
            ],
        )?;

        Ok(())
    }

    /// Get an analysis by ID
    pub fn get_analysis(&self, id: &str) -> AppResult<Option<Analysis>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            "SELECT id, title, description, epic_content, user_id, status, current_phase,
             completeness, reopen_reason, started_at, created_at, updated_at
             FROM analyses WHERE id = ?1",
            params![id],
            Self::row_to_analysis,
        );

        match result {
            Ok(analysis) => Ok(Some(analysis)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// Update the mutable fields of an existing analysis
    pub fn update_analysis(&self, analysis: &Analysis) -> AppResult<()> {
        let conn = self.conn()?;

        let updated = conn.execute(
            "UPDATE analyses SET title = ?2, description = ?3, epic_content = ?4,
             status = ?5, current_phase = ?6, completeness = ?7, reopen_reason = ?8,
             updated_at = ?9
             WHERE id = ?1",
            params![
                analysis.id,
                analysis.title,
                analysis.description,
                analysis.epic_content,
                analysis.status.as_str(),
                analysis.current_phase.as_str(),
                analysis.completeness as i64,
                analysis.reopen_reason,
                analysis.updated_at,
            ],
        )?;

        if updated == 0 {
            return Err(AppError::not_found(format!("Analysis not found: {}", analysis.id)));
        }

        Ok(())
    }

    /// Bump the parent's updated_at (message appends touch the thread)
    pub fn touch_analysis(&self, id: &str, updated_at: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE analyses SET updated_at = ?2 WHERE id = ?1",
            params![id, updated_at],
        )?;
        Ok(())
    }

    /// List analyses, optionally filtered by owner and/or status,
    /// most recently updated first
    pub fn list_analyses(
        &self,
        user_id: Option<&str>,
        status: Option<AnalysisStatus>,
    ) -> AppResult<Vec<Analysis>> {
        let conn = self.conn()?;

        let mut sql = String::from(
            "SELECT id, title, description, epic_content, user_id, status, current_phase,
             completeness, reopen_reason, started_at, created_at, updated_at
             FROM analyses",
        );
        let mut clauses: Vec<&str> = Vec::new();
        let mut filter_params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(user) = user_id {
            filter_params.push(Box::new(user.to_string()));
            clauses.push("user_id = ?1");
        }
        if let Some(status) = status {
            filter_params.push(Box::new(status.as_str().to_string()));
            clauses.push(if filter_params.len() == 1 {
                "status = ?1"
            } else {
                "status = ?2"
            });
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY updated_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            filter_params.iter().map(|p| p.as_ref()).collect();
        let analyses = stmt
            .query_map(params_refs.as_slice(), Self::row_to_analysis)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(analyses)
    }

    /// Delete an analysis and all its messages
    pub fn delete_analysis(&self, id: &str) -> AppResult<()> {
        let conn = self.conn()?;

        conn.execute("DELETE FROM messages WHERE analysis_id = ?1", params![id])?;
        let deleted = conn.execute("DELETE FROM analyses WHERE id = ?1", params![id])?;

        if deleted == 0 {
            return Err(AppError::not_found(format!("Analysis not found: {}", id)));
        }

        Ok(())
    }

    // ========================================================================
    // Start guard
    // ========================================================================

    /// Claim the one-time start of an analysis.
    ///
    /// A single conditional update ("set started_at where still null") is the
    /// entire mutual-exclusion mechanism: the statement is atomic at the store
    /// level, so exactly one of any number of racing callers observes an
    /// affected row. Never implemented as read-then-write.
    ///
    /// A store failure degrades to non-acquisition so no caller can trigger a
    /// duplicate first AI generation on the back of an error.
    pub fn mark_started_if_not(&self, analysis_id: &str) -> StartClaim {
        let now = now_rfc3339();
        let acquired = match self.try_claim(analysis_id, &now) {
            Ok(affected) => affected == 1,
            Err(e) => {
                warn!(analysis_id, error = %e, "start guard update failed; treating as non-acquisition");
                false
            }
        };

        let analysis = match self.get_analysis(analysis_id) {
            Ok(found) => found,
            Err(e) => {
                warn!(analysis_id, error = %e, "start guard re-read failed");
                None
            }
        };

        StartClaim { acquired, analysis }
    }

    fn try_claim(&self, analysis_id: &str, now: &str) -> AppResult<usize> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE analyses SET started_at = ?2, updated_at = ?2
             WHERE id = ?1 AND started_at IS NULL",
            params![analysis_id, now],
        )?;
        Ok(affected)
    }

    // ========================================================================
    // Message operations
    // ========================================================================

    /// Insert a new message row
    pub fn insert_message(&self, message: &Message) -> AppResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO messages (id, analysis_id, content, role, message_type, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id,
                message.analysis_id,
                message.content,
                message.role.as_str(),
                message.message_type.as_str(),
                message.category.map(|c| c.as_str().to_string()),
                message.created_at,
            ],
        )?;

        Ok(())
    }

    /// Get a message by ID
    pub fn get_message(&self, id: &str) -> AppResult<Option<Message>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            "SELECT id, analysis_id, content, role, message_type, category, created_at
             FROM messages WHERE id = ?1",
            params![id],
            Self::row_to_message,
        );

        match result {
            Ok(message) => Ok(Some(message)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// Find an existing message with identical (analysis, role, content),
    /// returning its ID
    pub fn find_duplicate_message(
        &self,
        analysis_id: &str,
        role: MessageRole,
        content: &str,
    ) -> AppResult<Option<String>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            "SELECT id FROM messages
             WHERE analysis_id = ?1 AND role = ?2 AND content = ?3
             ORDER BY created_at ASC, rowid ASC LIMIT 1",
            params![analysis_id, role.as_str(), content],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// Get all messages for an analysis, oldest first.
    ///
    /// Ties on created_at fall back to rowid, i.e. insertion order.
    pub fn get_messages(&self, analysis_id: &str) -> AppResult<Vec<Message>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, analysis_id, content, role, message_type, category, created_at
             FROM messages WHERE analysis_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let messages = stmt
            .query_map(params![analysis_id], Self::row_to_message)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(messages)
    }

    /// Count all USER messages for an analysis
    pub fn count_user_messages(&self, analysis_id: &str) -> AppResult<u32> {
        let conn = self.conn()?;

        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE analysis_id = ?1 AND role = 'user'",
            params![analysis_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// Count categorized USER messages grouped by category.
    ///
    /// Rows with category strings no enum variant claims are skipped.
    pub fn count_user_messages_by_category(
        &self,
        analysis_id: &str,
    ) -> AppResult<Vec<(QuestionCategory, u32)>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) FROM messages
             WHERE analysis_id = ?1 AND role = 'user' AND category IS NOT NULL
             GROUP BY category",
        )?;

        let counts = stmt
            .query_map(params![analysis_id], |row| {
                let category: String = row.get(0)?;
                let count: u32 = row.get(1)?;
                Ok((category, count))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(category, count)| QuestionCategory::parse(&category).map(|c| (c, count)))
            .collect();

        Ok(counts)
    }

    // ========================================================================
    // Usage accounting
    // ========================================================================

    /// Record token usage for one collaborator call
    pub fn record_usage(
        &self,
        analysis_id: &str,
        event_type: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> AppResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO usage_events (analysis_id, event_type, prompt_tokens, completion_tokens, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                analysis_id,
                event_type,
                prompt_tokens as i64,
                completion_tokens as i64,
                now_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Total (prompt, completion) tokens spent on an analysis
    pub fn usage_totals(&self, analysis_id: &str) -> AppResult<(u64, u64)> {
        let conn = self.conn()?;

        let totals = conn.query_row(
            "SELECT COALESCE(SUM(prompt_tokens), 0), COALESCE(SUM(completion_tokens), 0)
             FROM usage_events WHERE analysis_id = ?1",
            params![analysis_id],
            |row| {
                let prompt: i64 = row.get(0)?;
                let completion: i64 = row.get(1)?;
                Ok((prompt as u64, completion as u64))
            },
        )?;

        Ok(totals)
    }

    // ========================================================================
    // Row mapping
    // ========================================================================

    fn row_to_analysis(row: &rusqlite::Row) -> rusqlite::Result<Analysis> {
        let status_str: String = row.get(5)?;
        let phase_str: String = row.get(6)?;
        let completeness: i64 = row.get(7)?;

        Ok(Analysis {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            epic_content: row.get(3)?,
            user_id: row.get(4)?,
            status: AnalysisStatus::parse(&status_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    format!("unknown status: {}", status_str).into(),
                )
            })?,
            current_phase: AnalysisPhase::parse(&phase_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    6,
                    rusqlite::types::Type::Text,
                    format!("unknown phase: {}", phase_str).into(),
                )
            })?,
            completeness: completeness.clamp(0, 100) as u8,
            reopen_reason: row.get(8)?,
            started_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
        let role_str: String = row.get(3)?;
        let type_str: String = row.get(4)?;
        let category_str: Option<String> = row.get(5)?;

        Ok(Message {
            id: row.get(0)?,
            analysis_id: row.get(1)?,
            content: row.get(2)?,
            role: MessageRole::parse(&role_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    format!("unknown role: {}", role_str).into(),
                )
            })?,
            message_type: MessageType::parse(&type_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    format!("unknown message type: {}", type_str).into(),
                )
            })?,
            category: category_str.and_then(|s| QuestionCategory::parse(&s)),
            created_at: row.get(6)?,
        })
    }
}

impl std::fmt::Debug for AnalysisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisStore").finish()
    }
}
