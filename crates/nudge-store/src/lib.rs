//! `nudge-store`: persistence for the reminder list.
//!
//! The manager only needs [`ReminderStore::load`] and [`ReminderStore::save`].
//! Both backends keep the whole list as one JSON value under a named slot,
//! mirroring a key-value blob store.

pub mod db;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::ReminderStore;
