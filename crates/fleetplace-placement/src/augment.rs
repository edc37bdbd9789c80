//! Constraint augmentation from resource contents.
//!
//! A VM cloned from an image can only land on a host that sees a datastore
//! where the image has already been seeded. The augmenter turns that rule
//! into an extra DATASTORE constraint. It only ever appends.

use std::sync::Arc;

use tracing::debug;

use fleetplace_core::{Constraint, ConstraintKind, ConstraintSet, Resource};

use crate::error::PlacementError;
use crate::ports::ImageLocality;

pub struct ConstraintAugmenter {
    locality: Arc<dyn ImageLocality>,
}

impl ConstraintAugmenter {
    pub fn new(locality: Arc<dyn ImageLocality>) -> Self {
        Self { locality }
    }

    /// Return `constraints` plus whatever the resource implies.
    ///
    /// Only the first image reference on a VM is used; disks cloned from
    /// different images are not reconciled.
    pub async fn augment(
        &self,
        resource: &Resource,
        constraints: &ConstraintSet,
    ) -> Result<ConstraintSet, PlacementError> {
        let Some(vm) = resource.vm.as_ref().filter(|vm| !vm.disks.is_empty()) else {
            return Ok(constraints.clone());
        };

        let image_id = vm
            .first_image_id()
            .ok_or_else(|| PlacementError::MalformedResource {
                vm_id: vm.id.clone(),
            })?;

        let datastores = self.locality.locality_of(image_id).await?;
        if datastores.is_empty() {
            return Err(PlacementError::UnknownImageLocality {
                image_id: image_id.to_string(),
            });
        }

        debug!(
            vm = %vm.id,
            image = %image_id,
            datastores = datastores.len(),
            "added image datastore constraint"
        );
        Ok(constraints
            .clone()
            .with(Constraint::new(ConstraintKind::Datastore, datastores)))
    }
}
