//! redb table definitions for the task store.
//!
//! Both tables use `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Placement task records keyed by task id.
pub const PLACEMENT_TASKS: TableDefinition<&str, &[u8]> = TableDefinition::new("placement_tasks");

/// Datastore id sets keyed by image id.
pub const IMAGE_DATASTORES: TableDefinition<&str, &[u8]> = TableDefinition::new("image_datastores");
