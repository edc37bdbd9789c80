//! Fleetplace placement core — pick one host for one resource.
//!
//! This crate never keeps a view of the fleet. Each attempt samples a
//! bounded set of candidates, asks every one of them for a score at the
//! same time, and keeps the best answer that arrives before the deadline.
//!
//! # Components
//!
//! - **`ports`** — Collaborator traits (sampler, host scorer, image locality)
//! - **`augment`** — Derives the image datastore constraint from a resource
//! - **`fanout`** — Scatter-gather over candidates and score reduction
//! - **`static_fleet`** — Candidate sampler over a configured host list
//! - **`locality`** — Image locality backed by the task store

pub mod augment;
pub mod error;
pub mod fanout;
pub mod locality;
pub mod ports;
pub mod static_fleet;

pub use augment::ConstraintAugmenter;
pub use error::{HostCallError, PlacementError};
pub use fanout::{FanOutCoordinator, reduce};
pub use ports::{Candidates, CandidateSampler, HostScorer, ImageLocality};
pub use static_fleet::StaticFleetSampler;
