//! Candidate sampler over a fixed, configured host list.

use std::collections::BTreeSet;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::debug;

use fleetplace_core::config::{ConfigError, HostEntry};
use fleetplace_core::{ConstraintKind, ConstraintSet, HostId, ServerAddress};

use crate::error::PlacementError;
use crate::ports::{CandidateSampler, Candidates};

#[derive(Debug, Clone)]
struct FleetHost {
    id: HostId,
    address: ServerAddress,
    datastores: BTreeSet<String>,
    datastore_tags: BTreeSet<String>,
    networks: BTreeSet<String>,
    availability_zone: Option<String>,
}

impl FleetHost {
    fn values(&self, kind: ConstraintKind) -> Vec<&str> {
        match kind {
            ConstraintKind::Datastore => self.datastores.iter().map(String::as_str).collect(),
            ConstraintKind::DatastoreTag => {
                self.datastore_tags.iter().map(String::as_str).collect()
            }
            ConstraintKind::Network => self.networks.iter().map(String::as_str).collect(),
            ConstraintKind::Host => vec![self.id.as_str()],
            ConstraintKind::AvailabilityZone => {
                self.availability_zone.as_deref().into_iter().collect()
            }
        }
    }
}

/// Samples uniformly at random among configured hosts that satisfy
/// every constraint.
///
/// Host ids are unique, so a sample never names the same host twice.
#[derive(Debug, Clone, Default)]
pub struct StaticFleetSampler {
    hosts: Vec<FleetHost>,
}

impl StaticFleetSampler {
    pub fn from_entries(entries: &[HostEntry]) -> Result<Self, ConfigError> {
        let mut seen = BTreeSet::new();
        let mut hosts = Vec::with_capacity(entries.len());
        for entry in entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(ConfigError::InvalidHost {
                    id: entry.id.clone(),
                    reason: "duplicate host id".to_string(),
                });
            }
            hosts.push(FleetHost {
                id: entry.id.clone(),
                address: entry.server_address()?,
                datastores: entry.datastores.clone(),
                datastore_tags: entry.datastore_tags.clone(),
                networks: entry.networks.clone(),
                availability_zone: entry.availability_zone.clone(),
            });
        }
        Ok(Self { hosts })
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    fn matching(&self, constraints: &ConstraintSet) -> Vec<&FleetHost> {
        self.hosts
            .iter()
            .filter(|h| constraints.satisfied_by(|kind| h.values(kind)))
            .collect()
    }
}

#[async_trait]
impl CandidateSampler for StaticFleetSampler {
    async fn sample(
        &self,
        constraints: &ConstraintSet,
        count: u32,
    ) -> Result<Candidates, PlacementError> {
        let matching = self.matching(constraints);
        let chosen: Candidates = matching
            .choose_multiple(&mut rand::thread_rng(), count as usize)
            .map(|h| (h.id.clone(), h.address.clone()))
            .collect();

        debug!(
            %constraints,
            matching = matching.len(),
            sampled = chosen.len(),
            "sampled candidate hosts"
        );
        Ok(chosen)
    }
}
