//! Gift Types
//!
//! Shared models and traits for the VIP gift order orchestrator.
//! This crate contains the domain models organized by business entity,
//! plus the traits that the storage, queue and adapter crates implement.

pub mod adapters;
pub mod catalog;
pub mod models;
pub mod orders;
pub mod queue;
pub mod storage;

// Re-export chrono, serde_json and rust_decimal for convenience
pub use chrono;
pub use rust_decimal;
pub use rust_decimal::Decimal;
pub use serde_json;

pub use adapters::{
	AdapterError, AdapterResult, PartnerAdapter, PartnerCreateResponse, PartnerOrderState,
	SmsRequest,
};

pub use catalog::{CatalogError, CatalogLookup, CatalogProduct};

pub use models::{CommissionSplit, PartnerMarker, PartnerMarkerError, SecretString};

pub use orders::{
	Order, OrderCreateRequest, OrderError, OrderMessage, OrderResult, OrderStatus,
	OrderUpdateMessage, COMMISSION_RULE_MF,
};

pub use queue::{
	MessagePublisher, QueueError, QueueMessage, QueueResult, TopicReader, TopicSubscriber,
};

pub use storage::{
	OrderListQuery, OrderPage, OrderStorageTrait, ReconcileOutcome, StorageError, StorageResult,
	UpsertOutcome,
};
