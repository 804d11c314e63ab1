// Storage module - Saved sequences on the local filesystem

pub mod store;
pub mod types;

pub use store::LocalSequenceStore;
pub use types::PersistedSequence;
