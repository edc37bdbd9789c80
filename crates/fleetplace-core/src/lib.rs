//! fleetplace-core — shared vocabulary of the placement system.
//!
//! Types here are transport-neutral: every crate that submits, stores,
//! scores, or reports a placement speaks in terms of these.

pub mod config;
pub mod constraint;
pub mod resource;
pub mod types;

pub use config::{ConfigError, SchedulerConfig};
pub use constraint::{Constraint, ConstraintKind, ConstraintSet};
pub use resource::{Disk, DiskImage, Resource, Vm};
pub use types::*;
