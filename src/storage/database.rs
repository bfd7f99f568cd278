//! SQLite Database
//!
//! Embedded database for persistent storage using rusqlite with r2d2
//! connection pooling.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::database_path;

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database service for managing SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a database from an existing connection pool.
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create an in-memory database for testing.
    ///
    /// Pool size is pinned to 1 so every statement sees the same
    /// in-memory database.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory().with_init(Self::init_connection);
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Create a new database instance at the default location
    pub fn new() -> AppResult<Self> {
        Self::open(database_path()?)
    }

    /// Open (or create) a database at the given path
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let db_path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(Self::init_connection);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;

        Ok(db)
    }

    /// Per-connection setup.
    ///
    /// Cascade deletes require foreign keys on every pooled connection, and
    /// the busy timeout makes concurrent writers queue instead of failing
    /// with SQLITE_BUSY.
    fn init_connection(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;

        // Analyses: one row per conversation thread
        conn.execute(
            "CREATE TABLE IF NOT EXISTS analyses (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                epic_content TEXT NOT NULL DEFAULT '',
                user_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'in_progress',
                current_phase TEXT NOT NULL DEFAULT 'analysis',
                completeness INTEGER NOT NULL DEFAULT 0,
                reopen_reason TEXT,
                started_at TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        // Messages: conversation turns, exclusively owned by one analysis
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                analysis_id TEXT NOT NULL,
                content TEXT NOT NULL,
                role TEXT NOT NULL,
                message_type TEXT NOT NULL,
                category TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (analysis_id) REFERENCES analyses(id) ON DELETE CASCADE
            )",
            [],
        )?;

        // Usage events: token accounting per collaborator call
        conn.execute(
            "CREATE TABLE IF NOT EXISTS usage_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                analysis_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                prompt_tokens INTEGER NOT NULL DEFAULT 0,
                completion_tokens INTEGER NOT NULL DEFAULT 0,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (analysis_id) REFERENCES analyses(id) ON DELETE CASCADE
            )",
            [],
        )?;

        // Ordered reads and category aggregation
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_analysis_created
             ON messages(analysis_id, created_at)",
            [],
        )?;

        // Duplicate pre-check lookups
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_analysis_role
             ON messages(analysis_id, role)",
            [],
        )?;

        // Batch purge scans over completed analyses
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_analyses_status ON analyses(status)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_usage_events_analysis
             ON usage_events(analysis_id)",
            [],
        )?;

        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Check if the database is reachable
    pub fn is_healthy(&self) -> bool {
        match self.get_connection() {
            Ok(conn) => conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0)).is_ok(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
