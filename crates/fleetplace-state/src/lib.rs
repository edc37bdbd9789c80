//! fleetplace-state — durable placement task records.
//!
//! Backed by [redb](https://docs.rs/redb), holds every placement task
//! record and the image → datastore locality table. The stage transition
//! table lives in [`stage`] and is enforced inside the same write
//! transaction that stores a patch, so at most one terminal write wins.
//!
//! `TaskStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod stage;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use stage::TaskStage;
pub use store::{TaskStore, epoch_millis};
pub use types::*;
