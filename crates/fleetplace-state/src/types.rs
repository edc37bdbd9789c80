//! Persisted placement task records.
//!
//! A `PlacementTask` is the observable record of one placement attempt.
//! Its result fields (`result_code`, `error`) are populated exactly when the
//! stage is terminal, and a terminal record never changes again. Both rules
//! are enforced by [`PlacementTask::apply`].

use serde::{Deserialize, Serialize};

use fleetplace_core::{
    ConstraintSet, HostId, PlacementOutcome, Resource, ResultCode, Score, ServerAddress,
};

use crate::error::{StateError, StateResult};
use crate::stage::TaskStage;

/// Error text stored on a cancelled task.
pub const CANCELLED_ERROR: &str = "placement cancelled";

/// Immutable description of what to place and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub resource: Resource,
    #[serde(default)]
    pub constraints: ConstraintSet,
    /// How many candidate hosts to sample.
    pub sample_host_count: u32,
    /// Fan-out timeout, measured from the moment fan-out begins.
    pub timeout_ms: u64,
    /// Submitter blocks until the task is terminal.
    #[serde(default)]
    pub direct: bool,
}

/// The durable record of a placement task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementTask {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub request: PlacementRequest,
    pub stage: TaskStage,
    /// Record is kept but the placement pipeline never runs for it.
    #[serde(default)]
    pub processing_disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_code: Option<ResultCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<HostId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_address: Option<ServerAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
}

impl PlacementTask {
    /// Build a fresh record in a non-terminal stage.
    pub fn new(
        id: impl Into<String>,
        request: PlacementRequest,
        stage: TaskStage,
        now_ms: u64,
    ) -> StateResult<Self> {
        if stage.is_terminal() {
            return Err(StateError::InvalidPatch(format!(
                "task cannot be created in terminal stage {stage}"
            )));
        }
        Ok(Self {
            id: id.into(),
            request_id: None,
            request,
            stage,
            processing_disabled: false,
            result_code: None,
            error: None,
            host_id: None,
            server_address: None,
            score: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            started_at_ms: (stage == TaskStage::Started).then_some(now_ms),
            finished_at_ms: None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Wall time from the first STARTED patch to the terminal patch.
    pub fn duration_ms(&self) -> Option<u64> {
        let start = self.started_at_ms.unwrap_or(self.created_at_ms);
        self.finished_at_ms.map(|end| end.saturating_sub(start))
    }

    /// Result fields are set exactly when the stage is terminal.
    pub fn invariant_holds(&self) -> bool {
        let terminal = self.is_terminal();
        terminal == self.result_code.is_some() && terminal == self.error.is_some()
    }

    /// Apply a patch through the transition table.
    ///
    /// On error the record is left untouched.
    pub fn apply(&mut self, patch: &TaskPatch, now_ms: u64) -> StateResult<()> {
        self.stage.check_transition(patch.stage)?;
        patch.validate()?;

        match patch.stage {
            TaskStage::Started => {
                self.started_at_ms.get_or_insert(now_ms);
            }
            TaskStage::Finished => {
                self.result_code = Some(ResultCode::Ok);
                self.error = Some(patch.error.clone().unwrap_or_default());
                self.host_id = patch.host_id.clone();
                self.server_address = patch.server_address.clone();
                self.score = patch.score;
                self.finished_at_ms = Some(now_ms);
            }
            TaskStage::Failed => {
                self.result_code = Some(patch.result_code.unwrap_or(ResultCode::SystemError));
                self.error = Some(
                    patch
                        .error
                        .clone()
                        .unwrap_or_else(|| "placement failed".to_string()),
                );
                self.finished_at_ms = Some(now_ms);
            }
            TaskStage::Cancelled => {
                self.result_code = Some(patch.result_code.unwrap_or(ResultCode::SystemError));
                self.error = Some(
                    patch
                        .error
                        .clone()
                        .unwrap_or_else(|| CANCELLED_ERROR.to_string()),
                );
                self.finished_at_ms = Some(now_ms);
            }
            TaskStage::Created => {
                return Err(StateError::IllegalTransition {
                    from: self.stage,
                    to: TaskStage::Created,
                });
            }
        }
        self.stage = patch.stage;
        self.updated_at_ms = now_ms;
        Ok(())
    }
}

/// A requested stage change plus the outcome it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub stage: TaskStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_code: Option<ResultCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<HostId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_address: Option<ServerAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
}

impl TaskPatch {
    /// A bare stage change; terminal stages get their default outcome.
    pub fn stage(stage: TaskStage) -> Self {
        Self {
            stage,
            result_code: None,
            error: None,
            host_id: None,
            server_address: None,
            score: None,
        }
    }

    pub fn started() -> Self {
        Self::stage(TaskStage::Started)
    }

    pub fn cancelled() -> Self {
        Self::stage(TaskStage::Cancelled)
    }

    pub fn failed(result_code: ResultCode, error: impl Into<String>) -> Self {
        Self {
            result_code: Some(result_code),
            error: Some(error.into()),
            ..Self::stage(TaskStage::Failed)
        }
    }

    /// FINISHED for an OK outcome, FAILED otherwise.
    pub fn from_outcome(outcome: &PlacementOutcome) -> Self {
        if outcome.is_ok() {
            Self {
                stage: TaskStage::Finished,
                result_code: Some(ResultCode::Ok),
                error: None,
                host_id: outcome.host_id.clone(),
                server_address: outcome.address.clone(),
                score: outcome.score,
            }
        } else {
            Self::failed(
                outcome.result,
                outcome.error.clone().unwrap_or_default(),
            )
        }
    }

    fn validate(&self) -> StateResult<()> {
        let has_result = self.result_code.is_some() || self.error.is_some();
        let has_selection =
            self.host_id.is_some() || self.server_address.is_some() || self.score.is_some();

        match self.stage {
            TaskStage::Created | TaskStage::Started if has_result || has_selection => Err(
                StateError::InvalidPatch(format!("{} patch cannot carry a result", self.stage)),
            ),
            TaskStage::Finished if self.result_code.is_some_and(|c| !c.is_ok()) => Err(
                StateError::InvalidPatch("FINISHED requires result OK".to_string()),
            ),
            TaskStage::Failed | TaskStage::Cancelled
                if self.result_code.is_some_and(ResultCode::is_ok) =>
            {
                Err(StateError::InvalidPatch(format!(
                    "{} cannot carry result OK",
                    self.stage
                )))
            }
            TaskStage::Failed | TaskStage::Cancelled if has_selection => Err(
                StateError::InvalidPatch(format!("{} cannot select a host", self.stage)),
            ),
            _ => Ok(()),
        }
    }
}
