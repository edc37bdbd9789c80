//! fleetplace-scheduler — the placement task lifecycle.
//!
//! Accepts placement submissions, stores them as task records, and drives
//! each one through augmentation, sampling and fan-out to exactly one
//! terminal stage.
//!
//! # Architecture
//!
//! ```text
//! PlacementService
//!   ├── TaskStore (task records, transition table)
//!   ├── ConstraintAugmenter ── ImageLocality
//!   ├── CandidateSampler
//!   ├── FanOutCoordinator ── HostScorer × N
//!   └── In-flight pipelines (cancel signal per task)
//! ```

pub mod error;
pub mod service;

pub use error::{SchedulerError, SchedulerResult};
pub use service::{PlacementPorts, PlacementService, SubmitPlacement};
