//! Cross-Platform Path Utilities
//!
//! Functions for resolving the engine's data directories across platforms.

use std::path::PathBuf;

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the Epic Cascade directory (~/.epic-cascade/)
pub fn epic_cascade_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".epic-cascade"))
}

/// Get the config file path (~/.epic-cascade/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(epic_cascade_dir()?.join("config.json"))
}

/// Get the database file path (~/.epic-cascade/data.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(epic_cascade_dir()?.join("data.db"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &PathBuf) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the Epic Cascade directory, creating if it doesn't exist
pub fn ensure_epic_cascade_dir() -> AppResult<PathBuf> {
    let path = epic_cascade_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}
