/// Dispatch decision.
///
/// A run ends in one of three states, fixed by whether the fetch succeeded
/// and whether anything was exceeded. The state plus the report mode decide
/// what, if anything, is sent. There is no retry state.

use crate::alert::thresholds::Evaluation;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Send only when something is exceeded.
    ThresholdOnly,
    /// Always send: alerts plus current values, or an all-clear.
    FullReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    FetchFailed,
    NoAlerts,
    AlertsPresent,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchState::FetchFailed => write!(f, "FETCH_FAILED"),
            DispatchState::NoAlerts => write!(f, "NO_ALERTS"),
            DispatchState::AlertsPresent => write!(f, "ALERTS_PRESENT"),
        }
    }
}

impl DispatchState {
    pub fn from_evaluation(evaluation: &Evaluation) -> Self {
        if evaluation.has_alerts() {
            DispatchState::AlertsPresent
        } else {
            DispatchState::NoAlerts
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPlan {
    SendErrorNotice,
    SendReport,
    SendAllClear,
    StaySilent,
}

pub fn plan(state: DispatchState, mode: ReportMode) -> DispatchPlan {
    match (state, mode) {
        (DispatchState::FetchFailed, _) => DispatchPlan::SendErrorNotice,
        (DispatchState::AlertsPresent, _) => DispatchPlan::SendReport,
        (DispatchState::NoAlerts, ReportMode::FullReport) => DispatchPlan::SendAllClear,
        (DispatchState::NoAlerts, ReportMode::ThresholdOnly) => DispatchPlan::StaySilent,
    }
}
