//! Planner service seam.
//!
//! The review controller only knows the `Planner` contract: one call that
//! proposes changes for the captured context, and one that commits a chosen
//! subset. `HttpPlanner` is the production implementation.

mod http;

pub use http::HttpPlanner;

use crate::model::{ApplyResult, ProposedChange, RunResult};
use async_trait::async_trait;
use thiserror::Error;

/// Failures at the planner boundary. The controller collapses all of these
/// into a run or apply failure carrying `message()`.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("{0}")]
    Rejected(String),
    #[error("HTTP {status}")]
    Status { status: u16 },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid planner response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("planner task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PlannerError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Human-readable message, or `None` when the rejection carried nothing useful.
    pub fn message(&self) -> Option<String> {
        let msg = self.to_string();
        let trimmed = msg.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Remote operations driving a review session.
///
/// Implementations are called from spawned tasks, one run and one apply at a
/// time at most; they never see concurrent calls of the same kind.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Propose changes for the context captured at construction.
    async fn run(&self) -> Result<RunResult, PlannerError>;

    /// Commit `changes` for the plan `plan_id` proposed. Changes arrive already
    /// stamped with that id where they had none of their own.
    async fn apply(
        &self,
        plan_id: Option<String>,
        changes: Vec<ProposedChange>,
    ) -> Result<ApplyResult, PlannerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_rejection_has_no_message() {
        assert_eq!(PlannerError::rejected("   ").message(), None);
        assert_eq!(
            PlannerError::rejected("network down").message().as_deref(),
            Some("network down")
        );
        assert_eq!(
            PlannerError::Status { status: 502 }.message().as_deref(),
            Some("HTTP 502")
        );
    }
}
