//! Storage traits for pluggable storage implementations

// Re-export the storage traits from types crate
pub use gift_types::storage::{
	OrderListQuery, OrderPage, OrderStorageTrait as OrderStorage, ReconcileOutcome, StorageError,
	StorageResult, UpsertOutcome,
};
