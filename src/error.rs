// Error taxonomy for the detection and mint pipeline.
//
// Collaborator traits return anyhow::Result like the rest of the crate's
// I/O seams. The core converts those into PipelineError at the boundary so
// callers can tell "wait a bit" apart from "something is actually broken".

use std::time::Duration;

use thiserror::Error;

/// Result type for core pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Which external collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Social,
    Chain,
    Store,
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Collaborator::Social => "social platform",
            Collaborator::Chain => "mint service",
            Collaborator::Store => "store",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The endpoint's budget is spent. Back off for `retry_after`.
    #[error("budget exhausted for {endpoint}, available again in {}s", retry_after.as_secs())]
    BudgetExceeded {
        endpoint: String,
        retry_after: Duration,
    },

    /// A collaborator call failed or timed out.
    #[error("{collaborator} unavailable: {message}")]
    UpstreamUnavailable {
        collaborator: Collaborator,
        message: String,
    },

    /// A mint task for this post already exists.
    #[error("post {0} is already queued or minted")]
    DuplicateTask(String),

    /// The engagement payload for a single post was malformed.
    #[error("invalid metrics for post {post_id}: {reason}")]
    InvalidMetrics { post_id: String, reason: String },

    #[error("post {0} not found")]
    NotFound(String),
}

impl PipelineError {
    pub fn upstream(collaborator: Collaborator, err: impl std::fmt::Display) -> Self {
        PipelineError::UpstreamUnavailable {
            collaborator,
            message: err.to_string(),
        }
    }

    /// True for budget exhaustion, which dashboards show as a pause, not an error.
    pub fn is_budget(&self) -> bool {
        matches!(self, PipelineError::BudgetExceeded { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PipelineError::BudgetExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}
