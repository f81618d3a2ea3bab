//! In-memory order store using DashMap
//!
//! Orders are keyed by order id, with a secondary index from downstream id
//! to order id. Writers that touch both maps always take the index entry
//! first, so the pair stays consistent without a global lock.

use crate::traits::{
	OrderListQuery, OrderPage, OrderStorage, ReconcileOutcome, StorageError, StorageResult,
	UpsertOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gift_types::{Order, OrderMessage, OrderStatus};
use std::sync::Arc;
use tracing::{debug, warn};

const TRACING_TARGET: &str = "vip_gift::storage";

/// In-memory storage for orders
#[derive(Clone, Default)]
pub struct MemoryStore {
	orders: Arc<DashMap<String, Order>>,
	downstream_index: Arc<DashMap<String, String>>,
}

impl MemoryStore {
	/// Create a new memory store instance
	pub fn new() -> Self {
		Self::default()
	}

	fn conflict(id: &str, message: String) -> StorageError {
		StorageError::Conflict {
			id: id.to_string(),
			message,
		}
	}
}

#[async_trait]
impl OrderStorage for MemoryStore {
	async fn create_order(&self, order: Order) -> StorageResult<()> {
		match self.downstream_index.entry(order.downstream_order_id.clone()) {
			Entry::Occupied(_) => Err(StorageError::AlreadyExists {
				id: order.downstream_order_id,
			}),
			Entry::Vacant(index_slot) => match self.orders.entry(order.order_id.clone()) {
				Entry::Occupied(_) => Err(StorageError::AlreadyExists { id: order.order_id }),
				Entry::Vacant(order_slot) => {
					index_slot.insert(order.order_id.clone());
					order_slot.insert(order);
					Ok(())
				},
			},
		}
	}

	async fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
		Ok(self.orders.get(order_id).map(|o| o.clone()))
	}

	async fn get_order_by_downstream_id(
		&self,
		downstream_order_id: &str,
	) -> StorageResult<Option<Order>> {
		let order_id = match self.downstream_index.get(downstream_order_id) {
			Some(entry) => entry.value().clone(),
			None => return Ok(None),
		};
		Ok(self.orders.get(&order_id).map(|o| o.clone()))
	}

	async fn update_order(&self, mut order: Order) -> StorageResult<()> {
		match self.orders.get_mut(&order.order_id) {
			Some(mut stored) => {
				if stored.downstream_order_id != order.downstream_order_id {
					return Err(Self::conflict(
						&order.order_id,
						format!(
							"downstreamOrderId is immutable ('{}' -> '{}')",
							stored.downstream_order_id, order.downstream_order_id
						),
					));
				}
				order.attempts_issued = stored.attempts_issued;
				order.reconcile_attempt = stored.reconcile_attempt;
				order.notified_status = stored.notified_status;
				*stored = order;
				Ok(())
			},
			None => Err(StorageError::NotFound { id: order.order_id }),
		}
	}

	async fn upsert_order(&self, message: &OrderMessage) -> StorageResult<UpsertOutcome> {
		let now = Utc::now();
		match self.downstream_index.entry(message.downstream_order_id.clone()) {
			Entry::Occupied(index_slot) => {
				if index_slot.get() != &message.order_id {
					return Err(Self::conflict(
						&message.order_id,
						format!(
							"downstreamOrderId '{}' already belongs to order {}",
							message.downstream_order_id,
							index_slot.get()
						),
					));
				}
				let mut stored = self.orders.get_mut(&message.order_id).ok_or_else(|| {
					StorageError::Operation {
						message: format!("index points at missing order {}", message.order_id),
					}
				})?;
				stored
					.merge_mutable(message, now)
					.map_err(|e| Self::conflict(&message.order_id, e.to_string()))?;
				debug!(
					target: TRACING_TARGET,
					order_id = %message.order_id,
					status = %message.status,
					"Merged redelivered order"
				);
				Ok(UpsertOutcome::Updated)
			},
			Entry::Vacant(index_slot) => match self.orders.entry(message.order_id.clone()) {
				Entry::Occupied(order_slot) => {
					let err = order_slot
						.get()
						.check_identity(message)
						.err()
						.map(|e| e.to_string())
						.unwrap_or_else(|| "orderId already stored".to_string());
					warn!(
						target: TRACING_TARGET,
						order_id = %message.order_id,
						"Rejected upsert changing an immutable id"
					);
					Err(Self::conflict(&message.order_id, err))
				},
				Entry::Vacant(order_slot) => {
					index_slot.insert(message.order_id.clone());
					order_slot.insert(Order::from_message(message, now));
					Ok(UpsertOutcome::Inserted)
				},
			},
		}
	}

	async fn next_reconcile_attempt(&self, order_id: &str) -> StorageResult<u32> {
		let mut stored = self
			.orders
			.get_mut(order_id)
			.ok_or_else(|| StorageError::NotFound {
				id: order_id.to_string(),
			})?;
		stored.attempts_issued = stored.attempts_issued.max(stored.reconcile_attempt) + 1;
		Ok(stored.attempts_issued)
	}

	async fn apply_reconciliation(
		&self,
		order_id: &str,
		attempt: u32,
		status: OrderStatus,
		remark: &str,
	) -> StorageResult<ReconcileOutcome> {
		let mut stored = self
			.orders
			.get_mut(order_id)
			.ok_or_else(|| StorageError::NotFound {
				id: order_id.to_string(),
			})?;

		if attempt <= stored.reconcile_attempt {
			return Ok(ReconcileOutcome::Stale {
				applied_attempt: stored.reconcile_attempt,
			});
		}

		let previous = stored.status;
		stored.status = status;
		stored.remark = remark.to_string();
		stored.reconcile_attempt = attempt;
		stored.updated_at = Utc::now();
		Ok(ReconcileOutcome::Applied { previous })
	}

	async fn list_orders(&self, query: &OrderListQuery) -> StorageResult<OrderPage> {
		let (page, size) = query.effective_page();
		let mut matched: Vec<Order> = self
			.orders
			.iter()
			.filter(|entry| query.matches(entry.value()))
			.map(|entry| entry.value().clone())
			.collect();

		matched.sort_by(|a, b| {
			b.created_at
				.cmp(&a.created_at)
				.then_with(|| b.order_id.cmp(&a.order_id))
		});

		let total = matched.len();
		let start = ((page - 1) as usize).saturating_mul(size as usize).min(total);
		let end = start.saturating_add(size as usize).min(total);
		let items = matched.drain(start..end).collect();

		Ok(OrderPage {
			items,
			total,
			page,
			size,
		})
	}

	async fn mark_notified(&self, order_id: &str, status: OrderStatus) -> StorageResult<()> {
		let mut stored = self
			.orders
			.get_mut(order_id)
			.ok_or_else(|| StorageError::NotFound {
				id: order_id.to_string(),
			})?;
		stored.notified_status = Some(status);
		Ok(())
	}

	async fn list_stale_unsettled_orders(
		&self,
		updated_before: DateTime<Utc>,
	) -> StorageResult<Vec<Order>> {
		Ok(self
			.orders
			.iter()
			.filter(|entry| {
				let order = entry.value();
				(order.status.is_open() || order.awaits_report())
					&& order.updated_at < updated_before
			})
			.map(|entry| entry.value().clone())
			.collect())
	}

	async fn order_count(&self) -> StorageResult<usize> {
		Ok(self.orders.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;
	use gift_types::{Decimal, COMMISSION_RULE_MF};

	fn message(order_id: &str, downstream_id: &str) -> OrderMessage {
		OrderMessage {
			order_id: order_id.to_string(),
			downstream_order_id: downstream_id.to_string(),
			data_json: "{}".to_string(),
			status: OrderStatus::Init,
			remark: String::new(),
			commission_self: Decimal::new(85, 1),
			commission_parent: Decimal::new(15, 1),
			commission_rule: COMMISSION_RULE_MF.to_string(),
			channel: "VV".to_string(),
			user_sn: "P-1".to_string(),
			parent_sn: "P-0".to_string(),
			public_code: "GIFT-1".to_string(),
		}
	}

	#[tokio::test]
	async fn test_redelivered_message_yields_one_order() {
		let store = MemoryStore::new();
		let msg = message("1", "VV-001");

		assert_eq!(store.upsert_order(&msg).await.unwrap(), UpsertOutcome::Inserted);
		assert_eq!(store.upsert_order(&msg).await.unwrap(), UpsertOutcome::Updated);
		assert_eq!(store.order_count().await.unwrap(), 1);

		let stored = store.get_order_by_downstream_id("VV-001").await.unwrap().unwrap();
		assert_eq!(stored.order_id, "1");
	}

	#[tokio::test]
	async fn test_upsert_only_overwrites_mutable_fields() {
		let store = MemoryStore::new();
		store.upsert_order(&message("1", "VV-001")).await.unwrap();

		let mut redelivery = message("1", "VV-001");
		redelivery.status = OrderStatus::Pending;
		redelivery.remark = "accepted".to_string();
		redelivery.commission_self = Decimal::ZERO;
		store.upsert_order(&redelivery).await.unwrap();

		let stored = store.get_order("1").await.unwrap().unwrap();
		assert_eq!(stored.status, OrderStatus::Pending);
		assert_eq!(stored.remark, "accepted");
		assert_eq!(stored.commission_self, Decimal::new(85, 1));
	}

	#[tokio::test]
	async fn test_upsert_rejects_changed_ids() {
		let store = MemoryStore::new();
		store.upsert_order(&message("1", "VV-001")).await.unwrap();

		let err = store.upsert_order(&message("1", "VV-002")).await.unwrap_err();
		assert!(matches!(err, StorageError::Conflict { .. }));

		let err = store.upsert_order(&message("2", "VV-001")).await.unwrap_err();
		assert!(matches!(err, StorageError::Conflict { .. }));

		assert_eq!(store.order_count().await.unwrap(), 1);
		assert!(store.get_order_by_downstream_id("VV-002").await.unwrap().is_none());
		let stored = store.get_order("1").await.unwrap().unwrap();
		assert_eq!(stored.downstream_order_id, "VV-001");
	}

	#[tokio::test]
	async fn test_reconciliation_rejects_stale_attempts() {
		let store = MemoryStore::new();
		store.upsert_order(&message("1", "VV-001")).await.unwrap();

		let outcome = store
			.apply_reconciliation("1", 3, OrderStatus::Success, "done")
			.await
			.unwrap();
		assert_eq!(
			outcome,
			ReconcileOutcome::Applied {
				previous: OrderStatus::Init
			}
		);

		let outcome = store
			.apply_reconciliation("1", 2, OrderStatus::Pending, "late")
			.await
			.unwrap();
		assert_eq!(outcome, ReconcileOutcome::Stale { applied_attempt: 3 });

		let stored = store.get_order("1").await.unwrap().unwrap();
		assert_eq!(stored.status, OrderStatus::Success);
		assert_eq!(stored.remark, "done");
		assert_eq!(stored.reconcile_attempt, 3);
	}

	#[tokio::test]
	async fn test_reconciliation_on_missing_order() {
		let store = MemoryStore::new();
		let err = store
			.apply_reconciliation("missing", 1, OrderStatus::Success, "")
			.await
			.unwrap_err();
		assert!(matches!(err, StorageError::NotFound { .. }));
	}

	#[tokio::test]
	async fn test_update_order_keeps_downstream_id_immutable() {
		let store = MemoryStore::new();
		store.upsert_order(&message("1", "VV-001")).await.unwrap();

		let mut order = store.get_order("1").await.unwrap().unwrap();
		order.trade_status = "PAID".to_string();
		store.update_order(order.clone()).await.unwrap();

		order.downstream_order_id = "VV-999".to_string();
		assert!(store.update_order(order).await.is_err());
		assert_eq!(
			store.get_order("1").await.unwrap().unwrap().trade_status,
			"PAID"
		);
	}

	#[tokio::test]
	async fn test_create_order_rejects_duplicates() {
		let store = MemoryStore::new();
		let order = Order::from_message(&message("1", "VV-001"), Utc::now());
		store.create_order(order.clone()).await.unwrap();
		assert!(matches!(
			store.create_order(order).await,
			Err(StorageError::AlreadyExists { .. })
		));
	}

	#[tokio::test]
	async fn test_list_orders_filters_and_pages_newest_first() {
		let store = MemoryStore::new();
		let base = Utc::now();
		for i in 0..5 {
			let mut order =
				Order::from_message(&message(&format!("{i}"), &format!("VV-{i:03}")), base);
			order.created_at = base + Duration::seconds(i);
			store.create_order(order).await.unwrap();
		}

		let page = store.list_orders(&OrderListQuery::default()).await.unwrap();
		assert_eq!(page.total, 5);
		let ids: Vec<_> = page.items.iter().map(|o| o.order_id.as_str()).collect();
		assert_eq!(ids, vec!["4", "3", "2", "1", "0"]);

		let query = OrderListQuery {
			page: Some(2),
			size: Some(2),
			..Default::default()
		};
		let page = store.list_orders(&query).await.unwrap();
		let ids: Vec<_> = page.items.iter().map(|o| o.order_id.as_str()).collect();
		assert_eq!(ids, vec!["2", "1"]);

		let query = OrderListQuery {
			order_ids: vec!["0".to_string()],
			downstream_order_ids: vec!["VV-003".to_string()],
			..Default::default()
		};
		let page = store.list_orders(&query).await.unwrap();
		assert_eq!(page.total, 2);
		let ids: Vec<_> = page.items.iter().map(|o| o.order_id.as_str()).collect();
		assert_eq!(ids, vec!["3", "0"]);
	}

	#[tokio::test]
	async fn test_stale_unsettled_orders() {
		let store = MemoryStore::new();
		let old = Utc::now() - Duration::minutes(30);

		let mut pending = Order::from_message(&message("1", "VV-001"), old);
		pending.status = OrderStatus::Pending;
		store.create_order(pending).await.unwrap();

		let mut reported = Order::from_message(&message("2", "VV-002"), old);
		reported.status = OrderStatus::Success;
		reported.notified_status = Some(OrderStatus::Success);
		store.create_order(reported).await.unwrap();

		let mut unreported = Order::from_message(&message("4", "VV-004"), old);
		unreported.status = OrderStatus::UpstreamFail;
		store.create_order(unreported).await.unwrap();

		store
			.create_order(Order::from_message(&message("3", "VV-003"), Utc::now()))
			.await
			.unwrap();

		let mut stale: Vec<String> = store
			.list_stale_unsettled_orders(Utc::now() - Duration::minutes(10))
			.await
			.unwrap()
			.into_iter()
			.map(|o| o.order_id)
			.collect();
		stale.sort();
		assert_eq!(stale, vec!["1", "4"]);
	}

	#[tokio::test]
	async fn test_attempt_numbers_follow_issue_order() {
		let store = MemoryStore::new();
		store.upsert_order(&message("1", "VV-001")).await.unwrap();

		let early = store.next_reconcile_attempt("1").await.unwrap();
		let late = store.next_reconcile_attempt("1").await.unwrap();
		assert!(late > early);

		// the later query answers first; the earlier one is stale
		store
			.apply_reconciliation("1", late, OrderStatus::Success, "done")
			.await
			.unwrap();
		let outcome = store
			.apply_reconciliation("1", early, OrderStatus::Pending, "ordering")
			.await
			.unwrap();
		assert_eq!(outcome, ReconcileOutcome::Stale { applied_attempt: late });

		// a query issued after both still wins
		let next = store.next_reconcile_attempt("1").await.unwrap();
		assert!(next > late);
		assert!(matches!(
			store
				.apply_reconciliation("1", next, OrderStatus::DownstreamFail, "suspicious")
				.await
				.unwrap(),
			ReconcileOutcome::Applied { .. }
		));
	}

	#[tokio::test]
	async fn test_update_order_keeps_reconciliation_bookkeeping() {
		let store = MemoryStore::new();
		store.upsert_order(&message("1", "VV-001")).await.unwrap();
		let snapshot = store.get_order("1").await.unwrap().unwrap();

		let attempt = store.next_reconcile_attempt("1").await.unwrap();
		store
			.apply_reconciliation("1", attempt, OrderStatus::Success, "done")
			.await
			.unwrap();
		store.mark_notified("1", OrderStatus::Success).await.unwrap();

		let mut update = snapshot;
		update.trade_status = "PAID".to_string();
		store.update_order(update).await.unwrap();

		let stored = store.get_order("1").await.unwrap().unwrap();
		assert_eq!(stored.trade_status, "PAID");
		assert_eq!(stored.attempts_issued, attempt);
		assert_eq!(stored.reconcile_attempt, attempt);
		assert_eq!(stored.notified_status, Some(OrderStatus::Success));
		assert!(store.next_reconcile_attempt("1").await.unwrap() > attempt);
	}
}
