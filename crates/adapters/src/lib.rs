//! Gift Adapters
//!
//! Partner-specific adapters for the VIP gift order orchestrator, and the
//! registry routing a downstream order id to the adapter that serves it.

pub mod charge_adapter;
pub mod gift_adapter;
pub mod http;

pub use charge_adapter::{ChargeAdapter, ChargeEndpoints};
pub use gift_adapter::{GiftAdapter, GiftEndpoints};
pub use gift_types::{AdapterError, AdapterResult, PartnerAdapter};

use gift_types::PartnerMarker;
use std::{collections::HashMap, sync::Arc};

/// Marker → adapter routing table
///
/// Routing is a pure function of the downstream id: the leading uppercase
/// run selects exactly one adapter, or none.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
	adapters: HashMap<PartnerMarker, Arc<dyn PartnerAdapter>>,
}

impl AdapterRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register an adapter under its own marker
	pub fn register(&mut self, adapter: Arc<dyn PartnerAdapter>) -> AdapterResult<()> {
		let marker = adapter.marker();
		if let Some(existing) = self.adapters.get(&marker) {
			return Err(AdapterError::ConfigError {
				reason: format!(
					"Marker {} already served by adapter {}, cannot register {}",
					marker,
					existing.id(),
					adapter.id()
				),
			});
		}
		self.adapters.insert(marker, adapter);
		Ok(())
	}

	/// Builder-style registration
	pub fn with_adapter(mut self, adapter: Arc<dyn PartnerAdapter>) -> AdapterResult<Self> {
		self.register(adapter)?;
		Ok(self)
	}

	pub fn get(&self, marker: &PartnerMarker) -> Option<Arc<dyn PartnerAdapter>> {
		self.adapters.get(marker).cloned()
	}

	/// Adapter serving a downstream order id
	pub fn resolve(&self, downstream_order_id: &str) -> Option<Arc<dyn PartnerAdapter>> {
		PartnerMarker::from_downstream_id(downstream_order_id).and_then(|marker| self.get(&marker))
	}

	pub fn markers(&self) -> Vec<PartnerMarker> {
		let mut markers: Vec<_> = self.adapters.keys().cloned().collect();
		markers.sort();
		markers
	}

	pub fn len(&self) -> usize {
		self.adapters.len()
	}

	pub fn is_empty(&self) -> bool {
		self.adapters.is_empty()
	}
}
