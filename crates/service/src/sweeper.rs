//! Restart-safe reconciliation sweep
//!
//! Orders left in `init` or `pending` past a staleness window get a fresh
//! reconciliation task, so a lost delay series does not leave an order open
//! forever. Terminal orders whose status upstream never accepted get one
//! too; the worker reports them without querying the partner.

use chrono::Utc;
use gift_storage::OrderStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::scheduler::{QueryScheduler, QueryTask, SchedulerError};

const TRACING_TARGET: &str = "vip_gift::sweeper";

pub struct PendingOrderSweeper {
	storage: Arc<dyn OrderStorage>,
	scheduler: Arc<QueryScheduler>,
	interval: Duration,
	stale_after: Duration,
}

impl PendingOrderSweeper {
	pub fn new(
		storage: Arc<dyn OrderStorage>,
		scheduler: Arc<QueryScheduler>,
		interval: Duration,
		stale_after: Duration,
	) -> Self {
		Self {
			storage,
			scheduler,
			interval,
			stale_after,
		}
	}

	/// Schedule one immediate task for every stale unsettled order
	pub async fn sweep_once(&self) -> Result<usize, SchedulerError> {
		let window = chrono::Duration::from_std(self.stale_after)
			.unwrap_or_else(|_| chrono::Duration::zero());
		let cutoff = Utc::now() - window;
		let stale = self.storage.list_stale_unsettled_orders(cutoff).await?;

		for order in &stale {
			self.scheduler
				.schedule(QueryTask {
					order_id: order.order_id.clone(),
					downstream_order_id: order.downstream_order_id.clone(),
					delay: Duration::ZERO,
				})
				.await?;
		}

		if stale.is_empty() {
			debug!(target: TRACING_TARGET, "No stale unsettled orders");
		} else {
			info!(
				target: TRACING_TARGET,
				orders = stale.len(),
				"Scheduled reconciliation for stale unsettled orders"
			);
		}
		Ok(stale.len())
	}

	/// Sweep now and then every interval until `shutdown` flips to true
	pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(self.interval.max(Duration::from_secs(1)));
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = ticker.tick() => {
						match self.sweep_once().await {
							Ok(_) => {},
							Err(SchedulerError::Stopped) => break,
							Err(e) => warn!(target: TRACING_TARGET, error = %e, "Sweep failed"),
						}
					}
					changed = shutdown.changed() => {
						if changed.is_err() || *shutdown.borrow() {
							break;
						}
					}
				}
			}
			debug!(target: TRACING_TARGET, "Sweeper stopped");
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::notifier::MockUpstreamNotifier;
	use crate::scheduler::QuerySchedulerConfig;
	use gift_adapters::AdapterRegistry;
	use gift_storage::MemoryStore;
	use gift_types::{Order, OrderMessage, OrderStatus};

	fn order(id: &str, status: OrderStatus, age_secs: i64) -> Order {
		let message = OrderMessage {
			order_id: id.to_string(),
			downstream_order_id: format!("VV-{}", id),
			data_json: "{}".to_string(),
			status,
			remark: String::new(),
			commission_self: Default::default(),
			commission_parent: Default::default(),
			commission_rule: "MF".to_string(),
			channel: "VV".to_string(),
			user_sn: String::new(),
			parent_sn: String::new(),
			public_code: "P-1".to_string(),
		};
		Order::from_message(&message, Utc::now() - chrono::Duration::seconds(age_secs))
	}

	#[tokio::test]
	async fn test_sweep_selects_only_stale_open_orders() {
		let store = Arc::new(MemoryStore::new());
		store.create_order(order("1", OrderStatus::Pending, 3600)).await.unwrap();
		store.create_order(order("2", OrderStatus::Init, 3600)).await.unwrap();
		store.create_order(order("3", OrderStatus::Pending, 10)).await.unwrap();
		let mut reported = order("4", OrderStatus::Success, 3600);
		reported.notified_status = Some(OrderStatus::Success);
		store.create_order(reported).await.unwrap();

		let scheduler = QueryScheduler::start(
			store.clone(),
			Arc::new(AdapterRegistry::new()),
			Arc::new(MockUpstreamNotifier::new()),
			QuerySchedulerConfig::default(),
		);
		let sweeper = PendingOrderSweeper::new(
			store,
			scheduler,
			Duration::from_secs(300),
			Duration::from_secs(600),
		);

		assert_eq!(sweeper.sweep_once().await.unwrap(), 2);
	}

	#[tokio::test]
	async fn test_sweep_after_stop_reports_stopped() {
		let store = Arc::new(MemoryStore::new());
		store.create_order(order("1", OrderStatus::Pending, 3600)).await.unwrap();

		let scheduler = QueryScheduler::start(
			store.clone(),
			Arc::new(AdapterRegistry::new()),
			Arc::new(MockUpstreamNotifier::new()),
			QuerySchedulerConfig::default(),
		);
		scheduler.stop().await;

		let sweeper = PendingOrderSweeper::new(
			store,
			scheduler,
			Duration::from_secs(300),
			Duration::from_secs(600),
		);
		assert!(matches!(
			sweeper.sweep_once().await,
			Err(SchedulerError::Stopped)
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_sweep_reports_unreported_terminal_order() {
		let store = Arc::new(MemoryStore::new());
		store.create_order(order("1", OrderStatus::UpstreamFail, 3600)).await.unwrap();

		let (sent, received) = std::sync::mpsc::channel();
		let mut notifier = MockUpstreamNotifier::new();
		notifier
			.expect_notify_order_status()
			.times(1)
			.returning(move |order: &Order| {
				let _ = sent.send(order.status);
				Ok(())
			});
		let scheduler = QueryScheduler::start(
			store.clone(),
			Arc::new(AdapterRegistry::new()),
			Arc::new(notifier),
			QuerySchedulerConfig::default(),
		);
		let sweeper = PendingOrderSweeper::new(
			store.clone(),
			scheduler,
			Duration::from_secs(300),
			Duration::from_secs(600),
		);

		assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
		tokio::time::sleep(Duration::from_millis(10)).await;

		assert_eq!(received.try_recv().unwrap(), OrderStatus::UpstreamFail);
		let stored = store.get_order("1").await.unwrap().unwrap();
		assert_eq!(stored.notified_status, Some(OrderStatus::UpstreamFail));
		// reported orders drop out of the next sweep
		assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
	}
}
