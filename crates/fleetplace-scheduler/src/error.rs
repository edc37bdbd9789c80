//! Scheduler error types.

use thiserror::Error;

use fleetplace_state::{StateError, TaskStage};

/// Errors surfaced synchronously to callers of the placement service.
///
/// Placement failures are not among them: those end up on the task record.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("placement task not found: {0}")]
    TaskNotFound(String),

    #[error("invalid placement request: {0}")]
    InvalidRequest(String),

    #[error("placement task {id} not terminal after {waited_ms}ms")]
    WaitTimeout { id: String, waited_ms: u64 },

    #[error("task store error: {0}")]
    State(#[from] StateError),
}

impl SchedulerError {
    /// The rejected transition, if this is one.
    pub fn illegal_transition(&self) -> Option<(TaskStage, TaskStage)> {
        match self {
            Self::State(StateError::IllegalTransition { from, to }) => Some((*from, *to)),
            _ => None,
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
