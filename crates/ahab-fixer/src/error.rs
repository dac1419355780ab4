//! Error types for the fixer engine.

use thiserror::Error;

/// Why a repair attempt did not succeed.
#[derive(Debug, Error)]
pub enum FixError {
    /// The last remedy of an escalation chain failed.
    #[error("remedy {remedy} failed: {source}")]
    RemedyFailed {
        remedy: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("no remedies configured")]
    NoRemedies,

    /// Escalation stopped because the daemon is shutting down.
    #[error("repair cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Terminal errors of a periodic scheduler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("scheduler cancelled")]
    Cancelled,

    #[error("schedule period must be non-zero")]
    InvalidPeriod,
}

/// The first terminal error observed by a [`crate::Supervisor`].
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("task {task} exited: {source}")]
    Task {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("task {task} panicked or was aborted: {source}")]
    Join {
        task: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl SupervisorError {
    /// Whether the error only reports that a task observed cancellation.
    pub fn is_cancellation(&self) -> bool {
        match self {
            SupervisorError::Task { source, .. } => matches!(
                source.downcast_ref::<ScheduleError>(),
                Some(ScheduleError::Cancelled)
            ),
            SupervisorError::Join { source, .. } => source.is_cancelled(),
        }
    }
}
