//! Storage layer for CEPS.
//!
//! Defines the store traits the engine runs against and provides two
//! backends: SQLite (primary) and in-memory (tests and ephemeral hosts).

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    CepsStore, ContactDirectory, CredentialStore, GrantFilter, GrantStore, Group, GroupDirectory,
    MessageStore, ValidationTokenStore,
};
