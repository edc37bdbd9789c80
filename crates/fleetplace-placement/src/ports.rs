//! Collaborators the placement core talks to.
//!
//! All three are injected as `Arc<dyn ...>` so tests can swap in
//! in-process fakes.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use fleetplace_core::{ConstraintSet, HostId, Resource, Score, ServerAddress};

use crate::error::{HostCallError, PlacementError};

/// Sampled hosts, iterated in ascending host-id order.
pub type Candidates = BTreeMap<HostId, ServerAddress>;

/// Returns hosts believed to satisfy a constraint set.
///
/// An empty map is a valid answer. Errors are reserved for failure of the
/// sampler itself.
#[async_trait]
pub trait CandidateSampler: Send + Sync {
    async fn sample(
        &self,
        constraints: &ConstraintSet,
        count: u32,
    ) -> Result<Candidates, PlacementError>;
}

/// Asks one host to score a resource.
#[async_trait]
pub trait HostScorer: Send + Sync {
    async fn score(&self, address: &ServerAddress, resource: &Resource)
    -> Result<Score, HostCallError>;
}

/// Datastores an image has been propagated to. Empty when none.
#[async_trait]
pub trait ImageLocality: Send + Sync {
    async fn locality_of(&self, image_id: &str) -> Result<BTreeSet<String>, PlacementError>;
}
