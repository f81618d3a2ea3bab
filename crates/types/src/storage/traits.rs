//! Storage traits for pluggable order store implementations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StorageResult;
use crate::{Order, OrderMessage, OrderStatus};

/// Outcome of an idempotent upsert keyed by order id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
	Inserted,
	Updated,
}

/// Outcome of an attempt-guarded reconciliation write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
	/// The write was applied; carries the status it replaced
	Applied { previous: OrderStatus },
	/// A result from the same or a later attempt was already applied
	Stale { applied_attempt: u32 },
}

/// Filter and page for order listing
///
/// The two id sets are unioned; both empty means no id filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
	#[serde(default)]
	pub page: Option<u32>,
	#[serde(default)]
	pub size: Option<u32>,
	#[serde(default)]
	pub order_ids: Vec<String>,
	#[serde(default)]
	pub downstream_order_ids: Vec<String>,
}

/// One page of orders, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
	pub items: Vec<Order>,
	pub total: usize,
	pub page: u32,
	pub size: u32,
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

impl OrderListQuery {
	/// Effective (page, size) after defaults and clamping
	pub fn effective_page(&self) -> (u32, u32) {
		let page = self.page.unwrap_or(1).max(1);
		let size = self
			.size
			.filter(|s| *s > 0)
			.unwrap_or(DEFAULT_PAGE_SIZE)
			.min(MAX_PAGE_SIZE);
		(page, size)
	}

	/// Whether an order passes the id filters
	pub fn matches(&self, order: &Order) -> bool {
		if self.order_ids.is_empty() && self.downstream_order_ids.is_empty() {
			return true;
		}
		self.order_ids.iter().any(|id| *id == order.order_id)
			|| self
				.downstream_order_ids
				.iter()
				.any(|id| *id == order.downstream_order_id)
	}
}

/// Trait for order storage operations
///
/// Every method is atomic per order; there is no cross-order transaction.
#[async_trait]
pub trait OrderStorageTrait: Send + Sync {
	/// Insert a new order; fails if the order id or downstream id is taken
	async fn create_order(&self, order: Order) -> StorageResult<()>;

	/// Get an order by internal id
	async fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>>;

	/// Get an order by downstream id
	async fn get_order_by_downstream_id(
		&self,
		downstream_order_id: &str,
	) -> StorageResult<Option<Order>>;

	/// Replace an existing order (last write wins)
	///
	/// Reconciliation bookkeeping (attempt counters, notified status) is
	/// kept from the stored record.
	async fn update_order(&self, order: Order) -> StorageResult<()>;

	/// Insert from a creation message, or merge its mutable fields
	///
	/// A message whose order id or downstream id conflicts with a stored
	/// record fails with `StorageError::Conflict` and leaves the record as is.
	async fn upsert_order(&self, message: &OrderMessage) -> StorageResult<UpsertOutcome>;

	/// Hand out the next reconciliation attempt number for an order
	///
	/// Numbers are drawn when a partner query is issued, so a result from a
	/// later query always carries a larger number than an earlier one.
	async fn next_reconcile_attempt(&self, order_id: &str) -> StorageResult<u32>;

	/// Write a reconciliation result if `attempt` is newer than any applied one
	async fn apply_reconciliation(
		&self,
		order_id: &str,
		attempt: u32,
		status: OrderStatus,
		remark: &str,
	) -> StorageResult<ReconcileOutcome>;

	/// List orders matching the query, newest first
	async fn list_orders(&self, query: &OrderListQuery) -> StorageResult<OrderPage>;

	/// Record that upstream accepted a notification carrying `status`
	async fn mark_notified(&self, order_id: &str, status: OrderStatus) -> StorageResult<()>;

	/// Orders not touched since `updated_before` that are still open, or
	/// terminal with a status upstream has not accepted yet
	async fn list_stale_unsettled_orders(
		&self,
		updated_before: DateTime<Utc>,
	) -> StorageResult<Vec<Order>>;

	/// Get order count
	async fn order_count(&self) -> StorageResult<usize>;

	/// Health check for the storage system
	async fn health_check(&self) -> StorageResult<bool> {
		Ok(true)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_effective_page_defaults_and_clamps() {
		assert_eq!(OrderListQuery::default().effective_page(), (1, 10));

		let query = OrderListQuery {
			page: Some(0),
			size: Some(1000),
			..Default::default()
		};
		assert_eq!(query.effective_page(), (1, MAX_PAGE_SIZE));

		let query = OrderListQuery {
			page: Some(3),
			size: Some(0),
			..Default::default()
		};
		assert_eq!(query.effective_page(), (3, DEFAULT_PAGE_SIZE));
	}
}
