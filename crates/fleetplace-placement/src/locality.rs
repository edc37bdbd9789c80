//! Image locality resolved from the task store's image table.

use std::collections::BTreeSet;

use async_trait::async_trait;

use fleetplace_state::TaskStore;

use crate::error::PlacementError;
use crate::ports::ImageLocality;

#[async_trait]
impl ImageLocality for TaskStore {
    async fn locality_of(&self, image_id: &str) -> Result<BTreeSet<String>, PlacementError> {
        self.image_datastores(image_id)
            .map_err(|e| PlacementError::Locality(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_seeded_image() {
        let store = TaskStore::open_in_memory().unwrap();
        store.put_image_datastores("ubuntu", ["ds-1", "ds-2"]).unwrap();

        let found = store.locality_of("ubuntu").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(store.locality_of("unknown").await.unwrap().is_empty());
    }
}
