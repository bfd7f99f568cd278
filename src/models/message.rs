//! Message Model
//!
//! One turn in an analysis conversation. Messages are immutable once
//! created; the only legal mutations are creation and bulk deletion by
//! the retention engine.

use serde::{Deserialize, Serialize};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    /// Get the string form for database storage
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// Kind of content a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// A clarifying question from the assistant
    Question,
    /// A user answer
    Answer,
    /// A clarification from either side
    Clarification,
    /// Structured output of the analysis phase
    AnalysisResult,
    /// Structured output of the strategy phase
    StrategyResult,
    /// Structured output of the test-planning phase
    TestplanResult,
}

impl MessageType {
    /// Get the string form for database storage
    pub fn as_str(&self) -> &str {
        match self {
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Clarification => "clarification",
            Self::AnalysisResult => "analysis_result",
            Self::StrategyResult => "strategy_result",
            Self::TestplanResult => "testplan_result",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "question" => Some(Self::Question),
            "answer" => Some(Self::Answer),
            "clarification" => Some(Self::Clarification),
            "analysis_result" => Some(Self::AnalysisResult),
            "strategy_result" => Some(Self::StrategyResult),
            "testplan_result" => Some(Self::TestplanResult),
            _ => None,
        }
    }
}

/// Requirement aspect a question/answer addresses.
///
/// Four of these carry coverage weight (functional requirements,
/// non-functional requirements, business rules, acceptance criteria);
/// the rest inform the conversation without moving the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    FunctionalRequirements,
    NonFunctionalRequirements,
    BusinessRules,
    AcceptanceCriteria,
    Stakeholders,
    Constraints,
    Dependencies,
    DataRequirements,
    EdgeCases,
    Integrations,
}

impl QuestionCategory {
    /// Get the string form for database storage
    pub fn as_str(&self) -> &str {
        match self {
            Self::FunctionalRequirements => "functional_requirements",
            Self::NonFunctionalRequirements => "non_functional_requirements",
            Self::BusinessRules => "business_rules",
            Self::AcceptanceCriteria => "acceptance_criteria",
            Self::Stakeholders => "stakeholders",
            Self::Constraints => "constraints",
            Self::Dependencies => "dependencies",
            Self::DataRequirements => "data_requirements",
            Self::EdgeCases => "edge_cases",
            Self::Integrations => "integrations",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "functional_requirements" => Some(Self::FunctionalRequirements),
            "non_functional_requirements" => Some(Self::NonFunctionalRequirements),
            "business_rules" => Some(Self::BusinessRules),
            "acceptance_criteria" => Some(Self::AcceptanceCriteria),
            "stakeholders" => Some(Self::Stakeholders),
            "constraints" => Some(Self::Constraints),
            "dependencies" => Some(Self::Dependencies),
            "data_requirements" => Some(Self::DataRequirements),
            "edge_cases" => Some(Self::EdgeCases),
            "integrations" => Some(Self::Integrations),
            _ => None,
        }
    }
}

/// A persisted conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,
    /// Parent analysis ID
    pub analysis_id: String,
    /// Turn text
    pub content: String,
    /// Author role
    pub role: MessageRole,
    /// Content kind
    pub message_type: MessageType,
    /// Requirement aspect, when tagged
    pub category: Option<QuestionCategory>,
    /// Created timestamp (ISO-8601)
    pub created_at: String,
}

/// Payload for appending a new turn; the ledger assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub role: MessageRole,
    pub message_type: MessageType,
    pub category: Option<QuestionCategory>,
}
