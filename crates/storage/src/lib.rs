//! Gift Storage
//!
//! Order store implementations for the VIP gift order orchestrator.

pub mod memory_store;
pub mod traits;

pub use memory_store::MemoryStore;
pub use traits::OrderStorage;
