//! Placement task lifecycle stages and the transition table.
//!
//! ```text
//! CREATED ──► STARTED ──► FINISHED | FAILED | CANCELLED
//!    │           ▲ │
//!    │           └─┘ (self patch)
//!    └──────────────► FINISHED | FAILED | CANCELLED
//! ```
//!
//! Terminal stages accept nothing, and CREATED cannot be re-entered.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStage {
    Created,
    Started,
    Finished,
    Failed,
    Cancelled,
}

impl TaskStage {
    pub const ALL: [TaskStage; 5] = [
        TaskStage::Created,
        TaskStage::Started,
        TaskStage::Finished,
        TaskStage::Failed,
        TaskStage::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStage::Finished | TaskStage::Failed | TaskStage::Cancelled
        )
    }

    /// Whether a patch from `self` to `next` is legal.
    pub fn can_transition_to(self, next: TaskStage) -> bool {
        use TaskStage::*;
        match (self, next) {
            (Created, Started | Finished | Failed | Cancelled) => true,
            (Started, Started | Finished | Failed | Cancelled) => true,
            _ => false,
        }
    }

    pub fn check_transition(self, next: TaskStage) -> StateResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(StateError::IllegalTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::Started => "STARTED",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}
