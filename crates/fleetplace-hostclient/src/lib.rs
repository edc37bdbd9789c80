//! fleetplace-hostclient — talks to host agents over HTTP/1.1.
//!
//! [`HttpHostScorer`] is the production [`HostScorer`]: one POST per
//! candidate, each bounded by its own request timeout on top of the
//! fan-out deadline.
//!
//! [`HostScorer`]: fleetplace_placement::HostScorer

pub mod scorer;
pub mod wire;

pub use scorer::HttpHostScorer;
pub use wire::{PLACE_PATH, PlaceRequest, PlaceResponse};
