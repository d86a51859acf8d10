use crate::planner::PlannerError;
use crate::telemetry::ErrorPhase;
use thiserror::Error;

const RUN_FALLBACK: &str = "Failed to run planner";
const APPLY_FALLBACK: &str = "Failed to apply changes";

/// Failure of one of the two remote operations, as seen by the review
/// workflow. Every planner failure collapses into one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("{0}")]
    Run(String),
    #[error("{0}")]
    Apply(String),
}

impl ReviewError {
    pub fn run(err: &PlannerError) -> Self {
        Self::Run(err.message().unwrap_or_else(|| RUN_FALLBACK.to_string()))
    }

    pub fn apply(err: &PlannerError) -> Self {
        Self::Apply(err.message().unwrap_or_else(|| APPLY_FALLBACK.to_string()))
    }

    pub fn phase(&self) -> ErrorPhase {
        match self {
            ReviewError::Run(_) => ErrorPhase::Run,
            ReviewError::Apply(_) => ErrorPhase::Apply,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ReviewError::Run(m) | ReviewError::Apply(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_messages_fall_back_per_phase() {
        let blank = PlannerError::rejected("");
        assert_eq!(ReviewError::run(&blank).message(), "Failed to run planner");
        assert_eq!(ReviewError::apply(&blank).message(), "Failed to apply changes");

        let err = ReviewError::run(&PlannerError::rejected("network down"));
        assert_eq!(err.to_string(), "network down");
        assert_eq!(err.phase(), ErrorPhase::Run);
    }
}
