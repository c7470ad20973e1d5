//! Durable monitor state: the record itself, an atomic single-file store and
//! the debounced write policy on top of it.

pub mod manager;
pub mod state;
pub mod store;

pub use manager::{Debounce, PersistenceManager};
pub use state::{IdsExhausted, SCHEMA_VERSION, SampleState};
pub use store::{StateStore, StorageError};
