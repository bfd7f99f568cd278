//! Phase State Machine
//!
//! Derives the workflow phase from the completeness score and applies the
//! submit/advance/reopen transitions. Phase never moves backward except
//! through an explicit reopen.

use tracing::info;

use crate::models::analysis::{Analysis, AnalysisPhase, AnalysisStatus};
use crate::utils::error::{AppError, AppResult};

/// Completeness at which the strategy phase opens
pub const STRATEGY_THRESHOLD: u8 = 30;
/// Completeness at which the test-planning phase opens
pub const TEST_PLANNING_THRESHOLD: u8 = 70;

/// Phase implied by a completeness score for a non-terminal analysis.
pub fn derive_phase(status: AnalysisStatus, completeness: u8) -> AnalysisPhase {
    if status == AnalysisStatus::Completed {
        return AnalysisPhase::Completed;
    }
    match completeness {
        c if c < STRATEGY_THRESHOLD => AnalysisPhase::Analysis,
        c if c < TEST_PLANNING_THRESHOLD => AnalysisPhase::Strategy,
        _ => AnalysisPhase::TestPlanning,
    }
}

/// Fold a fresh completeness score into the analysis.
///
/// The derived phase only applies when it is ahead of the stored phase;
/// a score dip never drags a conversation back to an earlier phase.
pub fn refresh_phase(analysis: &mut Analysis, completeness: u8) {
    analysis.completeness = completeness.min(100);
    let derived = derive_phase(analysis.status, analysis.completeness);
    if derived > analysis.current_phase {
        analysis.current_phase = derived;
    }
}

/// Mark the current phase's work finished and eligible to advance.
///
/// On the final working phase this completes the analysis outright with
/// completeness forced to 100. Idempotent: submitting an already
/// submitted or completed analysis changes nothing.
pub fn submit_phase(analysis: &mut Analysis) -> AppResult<()> {
    match analysis.status {
        AnalysisStatus::Completed
        | AnalysisStatus::ReadyToAdvance
        | AnalysisStatus::Submitted => Ok(()),
        AnalysisStatus::InProgress | AnalysisStatus::Reopened => {
            if analysis.current_phase == AnalysisPhase::TestPlanning {
                complete(analysis);
            } else {
                analysis.status = AnalysisStatus::ReadyToAdvance;
            }
            Ok(())
        }
    }
}

/// Move the phase forward exactly one step.
///
/// Fails with Conflict once the terminal phase is reached.
pub fn advance_phase(analysis: &mut Analysis) -> AppResult<()> {
    if analysis.current_phase == AnalysisPhase::Completed {
        return Err(AppError::conflict(format!(
            "Analysis {} is already completed",
            analysis.id
        )));
    }

    let next = analysis.current_phase.next();
    if next == AnalysisPhase::Completed {
        complete(analysis);
    } else {
        analysis.current_phase = next;
        analysis.status = AnalysisStatus::InProgress;
    }

    Ok(())
}

/// Reopen a submitted or completed analysis for further work.
///
/// The phase is re-derived from the current score and may regress; this
/// is the only transition allowed to move it backward. The reason is
/// kept on the row for audit.
pub fn reopen(analysis: &mut Analysis, reason: &str) {
    info!(analysis_id = %analysis.id, reason, "reopening analysis");
    analysis.status = AnalysisStatus::Reopened;
    analysis.reopen_reason = Some(reason.to_string());
    analysis.current_phase = derive_phase(analysis.status, analysis.completeness);
}

fn complete(analysis: &mut Analysis) {
    analysis.status = AnalysisStatus::Completed;
    analysis.current_phase = AnalysisPhase::Completed;
    analysis.completeness = 100;
}
