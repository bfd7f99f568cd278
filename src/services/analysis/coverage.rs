//! Coverage Scorer
//!
//! Turns the message history into a 0-100 completeness signal. Four
//! weighted categories each contribute a coverage percentage capped at
//! 100, so no single category can inflate the overall score past what a
//! balanced conversation would earn.
//!
//! The query-based path is canonical; `score_messages` is an equivalent
//! computation over an already-loaded history.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::message::{Message, MessageRole, QuestionCategory};
use crate::utils::error::AppResult;

use super::store::AnalysisStore;

/// Categories that carry scoring weight, with their expected share of
/// the conversation.
pub const WEIGHTED_CATEGORIES: [(QuestionCategory, f64); 4] = [
    (QuestionCategory::FunctionalRequirements, 0.30),
    (QuestionCategory::NonFunctionalRequirements, 0.20),
    (QuestionCategory::BusinessRules, 0.25),
    (QuestionCategory::AcceptanceCriteria, 0.25),
];

/// Per-category slice of the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCoverage {
    pub category: QuestionCategory,
    /// Expected share of user turns for this category
    pub weight: f64,
    /// Categorized user turns observed
    pub answered: u32,
    /// Coverage percentage, 0-100
    pub coverage: f64,
}

/// Completeness report for one analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Rounded mean of the four category coverages, 0-100
    pub overall: u8,
    /// All user turns, categorized or not
    pub total_user_messages: u32,
    pub categories: Vec<CategoryCoverage>,
}

/// Scorer over the message store
#[derive(Debug, Clone)]
pub struct CoverageScorer {
    store: AnalysisStore,
}

impl CoverageScorer {
    /// Create a new scorer over the given store
    pub fn new(store: AnalysisStore) -> Self {
        Self { store }
    }

    /// Score an analysis from the store (canonical path).
    ///
    /// Absent data yields zeros; only the store itself can fail.
    pub fn score(&self, analysis_id: &str) -> AppResult<CoverageReport> {
        let total_user = self.store.count_user_messages(analysis_id)?;
        let counts: HashMap<QuestionCategory, u32> = self
            .store
            .count_user_messages_by_category(analysis_id)?
            .into_iter()
            .collect();

        Ok(compute_report(total_user, &counts))
    }

    /// Score an already-loaded history (must match the query path).
    pub fn score_messages(&self, messages: &[Message]) -> CoverageReport {
        score_messages(messages)
    }
}

/// In-memory equivalent of the query-based score
pub fn score_messages(messages: &[Message]) -> CoverageReport {
    let user_messages = messages.iter().filter(|m| m.role == MessageRole::User);

    let mut total_user = 0u32;
    let mut counts: HashMap<QuestionCategory, u32> = HashMap::new();
    for message in user_messages {
        total_user += 1;
        if let Some(category) = message.category {
            *counts.entry(category).or_insert(0) += 1;
        }
    }

    compute_report(total_user, &counts)
}

fn compute_report(total_user: u32, counts: &HashMap<QuestionCategory, u32>) -> CoverageReport {
    let mut categories = Vec::with_capacity(WEIGHTED_CATEGORIES.len());
    let mut sum = 0.0;

    for (category, weight) in WEIGHTED_CATEGORIES {
        let answered = counts.get(&category).copied().unwrap_or(0);
        let coverage = if total_user == 0 {
            0.0
        } else {
            let expected = (total_user as f64 * weight).max(1.0);
            ((answered as f64 / expected) * 100.0).min(100.0)
        };
        sum += coverage;
        categories.push(CategoryCoverage {
            category,
            weight,
            answered,
            coverage,
        });
    }

    let overall = (sum / WEIGHTED_CATEGORIES.len() as f64).round() as u8;

    CoverageReport {
        overall,
        total_user_messages: total_user,
        categories,
    }
}
