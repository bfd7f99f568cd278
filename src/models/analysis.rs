//! Analysis Model
//!
//! An analysis is one conversation thread refining a single requirement
//! (an "epic") toward a structured requirements artifact.

use serde::{Deserialize, Serialize};

/// Workflow phase the analysis is currently exploring.
///
/// Phases advance `Analysis -> Strategy -> TestPlanning -> Completed` and
/// never move backward except through an explicit reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    /// Requirement discovery and clarification
    Analysis,
    /// Solution strategy exploration
    Strategy,
    /// Test planning against the agreed strategy
    TestPlanning,
    /// Terminal phase
    Completed,
}

impl AnalysisPhase {
    /// Get the display label for this phase
    pub fn label(&self) -> &str {
        match self {
            Self::Analysis => "Analysis",
            Self::Strategy => "Strategy",
            Self::TestPlanning => "Test Planning",
            Self::Completed => "Completed",
        }
    }

    /// Get the next phase
    pub fn next(&self) -> Self {
        match self {
            Self::Analysis => Self::Strategy,
            Self::Strategy => Self::TestPlanning,
            Self::TestPlanning => Self::Completed,
            Self::Completed => Self::Completed,
        }
    }

    /// Whether this phase is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Get the string form for database storage
    pub fn as_str(&self) -> &str {
        match self {
            Self::Analysis => "analysis",
            Self::Strategy => "strategy",
            Self::TestPlanning => "test_planning",
            Self::Completed => "completed",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "analysis" => Some(Self::Analysis),
            "strategy" => Some(Self::Strategy),
            "test_planning" => Some(Self::TestPlanning),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status, orthogonal to the phase axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Conversation is ongoing
    InProgress,
    /// Current phase submitted and eligible to advance
    ReadyToAdvance,
    /// Phase work handed off for review
    Submitted,
    /// Previously terminal or submitted, reopened for more work
    Reopened,
    /// Terminal status
    Completed,
}

impl AnalysisStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Get the string form for database storage
    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "in_progress",
            Self::ReadyToAdvance => "ready_to_advance",
            Self::Submitted => "submitted",
            Self::Reopened => "reopened",
            Self::Completed => "completed",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "ready_to_advance" => Some(Self::ReadyToAdvance),
            "submitted" => Some(Self::Submitted),
            "reopened" => Some(Self::Reopened),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One requirements-analysis conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Unique analysis ID
    pub id: String,
    /// Short title of the requirement
    pub title: String,
    /// Free-text description
    pub description: String,
    /// The epic being refined
    pub epic_content: String,
    /// Owning user
    pub user_id: String,
    /// Lifecycle status
    pub status: AnalysisStatus,
    /// Current workflow phase (stored; derived from completeness)
    pub current_phase: AnalysisPhase,
    /// Completeness score, 0-100
    pub completeness: u8,
    /// Audit reason from the most recent reopen, if any
    pub reopen_reason: Option<String>,
    /// Set exactly once when the first AI turn is claimed; never cleared
    pub started_at: Option<String>,
    /// Created timestamp (ISO-8601)
    pub created_at: String,
    /// Last updated timestamp (ISO-8601)
    pub updated_at: String,
}
