//! TaskStore — redb-backed persistence for placement tasks.
//!
//! Task records are JSON-serialized into redb's `&[u8]` value columns and
//! keyed by task id. Stage patches are read, checked against the transition
//! table, and written back inside a single write transaction; redb
//! serializes writers, so two racing terminal patches can never both land.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Thread-safe task store backed by redb.
#[derive(Clone)]
pub struct TaskStore {
    db: Arc<Database>,
}

impl TaskStore {
    /// Open (or create) a persistent task store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "task store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory task store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory task store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(PLACEMENT_TASKS).map_err(map_err!(Table))?;
        txn.open_table(IMAGE_DATASTORES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Placement tasks ────────────────────────────────────────────

    /// Store a new task record. Fails if the id is taken.
    pub fn create_task(&self, task: &PlacementTask) -> StateResult<()> {
        let value = serde_json::to_vec(task).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PLACEMENT_TASKS).map_err(map_err!(Table))?;
            if table
                .get(task.id.as_str())
                .map_err(map_err!(Read))?
                .is_some()
            {
                return Err(StateError::AlreadyExists(task.id.clone()));
            }
            table
                .insert(task.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = %task.id, stage = %task.stage, "placement task stored");
        Ok(())
    }

    /// Get a task by id.
    pub fn get_task(&self, id: &str) -> StateResult<Option<PlacementTask>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PLACEMENT_TASKS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let task: PlacementTask =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    /// List all tasks, ordered by id.
    pub fn list_tasks(&self) -> StateResult<Vec<PlacementTask>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PLACEMENT_TASKS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let task: PlacementTask =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(task);
        }
        Ok(results)
    }

    /// Apply a stage patch atomically and return the updated record.
    ///
    /// An illegal transition or malformed patch aborts the transaction, so
    /// the stored record is unchanged.
    pub fn patch_task(&self, id: &str, patch: &TaskPatch) -> StateResult<PlacementTask> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let task = {
            let mut table = txn.open_table(PLACEMENT_TASKS).map_err(map_err!(Table))?;
            let mut task: PlacementTask = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(id.to_string())),
            };
            let from = task.stage;
            task.apply(patch, epoch_millis())?;

            let value = serde_json::to_vec(&task).map_err(map_err!(Serialize))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            debug!(%id, %from, to = %task.stage, "placement task patched");
            task
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(task)
    }

    /// Delete a task by id. Returns true if it existed.
    pub fn delete_task(&self, id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(PLACEMENT_TASKS).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%id, existed, "placement task deleted");
        Ok(existed)
    }

    // ── Image locality ─────────────────────────────────────────────

    /// Record that an image is present on the given datastores.
    ///
    /// Merges with what is already known.
    pub fn put_image_datastores<I, S>(&self, image_id: &str, datastores: I) -> StateResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count;
        {
            let mut table = txn.open_table(IMAGE_DATASTORES).map_err(map_err!(Table))?;
            let mut known: BTreeSet<String> = match table.get(image_id).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => BTreeSet::new(),
            };
            known.extend(datastores.into_iter().map(Into::into));
            count = known.len();

            let value = serde_json::to_vec(&known).map_err(map_err!(Serialize))?;
            table
                .insert(image_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%image_id, datastores = count, "image locality stored");
        Ok(())
    }

    pub fn add_image_datastore(&self, image_id: &str, datastore: &str) -> StateResult<()> {
        self.put_image_datastores(image_id, [datastore])
    }

    /// Datastores holding a seeded copy of the image. Empty if unknown.
    pub fn image_datastores(&self, image_id: &str) -> StateResult<BTreeSet<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(IMAGE_DATASTORES).map_err(map_err!(Table))?;
        match table.get(image_id).map_err(map_err!(Read))? {
            Some(guard) => {
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))
            }
            None => Ok(BTreeSet::new()),
        }
    }
}
