//! Engine Configuration Model

use serde::{Deserialize, Serialize};

/// Default keep-policy applied when a purge caller passes no options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionDefaults {
    /// Preview-only unless explicitly disabled
    #[serde(default = "default_true")]
    pub dry_run: bool,
    /// Keep the most recent assistant message
    #[serde(default = "default_true")]
    pub keep_last_assistant: bool,
    /// Keep the user message preceding the kept assistant message
    #[serde(default = "default_true")]
    pub keep_last_user: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RetentionDefaults {
    fn default() -> Self {
        Self {
            dry_run: true,
            keep_last_assistant: true,
            keep_last_user: true,
        }
    }
}

/// Persisted engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Retention defaults
    #[serde(default)]
    pub retention: RetentionDefaults,
}

fn default_pool_size() -> u32 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            retention: RetentionDefaults::default(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration, returning a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.pool_size == 0 {
            return Err("pool_size must be at least 1".to_string());
        }
        if self.pool_size > 64 {
            return Err("pool_size must be at most 64".to_string());
        }
        Ok(())
    }
}
