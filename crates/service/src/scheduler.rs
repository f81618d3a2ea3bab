//! Delayed reconciliation queries
//!
//! A bounded task queue feeds a single dispatcher, which starts one worker
//! per task. Producers wait while the queue is full. Workers are never
//! awaited on shutdown: [`QueryScheduler::stop`] closes the intake and
//! stops the dispatcher, and in-flight workers run to completion on their
//! own.

use gift_adapters::AdapterRegistry;
use gift_storage::OrderStorage;
use gift_types::{Order, OrderStatus, ReconcileOutcome, StorageError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::notifier::{notify_with_retry, NotifyRetryPolicy, UpstreamNotifier};

const TRACING_TARGET: &str = "vip_gift::scheduler";

#[derive(Debug, Error)]
pub enum SchedulerError {
	#[error("Query scheduler is stopped")]
	Stopped,
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// One delayed status query for one order
///
/// The attempt number guarding its write is drawn from the store when the
/// partner query is issued, not when the task is scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTask {
	pub order_id: String,
	pub downstream_order_id: String,
	pub delay: Duration,
}

#[derive(Debug, Clone)]
pub struct QuerySchedulerConfig {
	pub capacity: usize,
	pub query_timeout: Duration,
	pub notify_retry: NotifyRetryPolicy,
}

impl Default for QuerySchedulerConfig {
	fn default() -> Self {
		Self {
			capacity: 1024,
			query_timeout: Duration::from_secs(5),
			notify_retry: NotifyRetryPolicy::default(),
		}
	}
}

/// What a worker did with its task
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
	/// Status stored; `notified` when the status changed and upstream accepted it
	Applied {
		previous: OrderStatus,
		current: OrderStatus,
		notified: bool,
	},
	/// A query issued later was stored first
	Stale,
	/// The order was already terminal but upstream never accepted that
	/// status, so it was sent again without querying the partner
	Reported {
		status: OrderStatus,
		notified: bool,
	},
	/// Nothing queried or nothing stored
	Skipped { reason: String },
}

/// Everything a worker needs, shared by all workers
struct ReconcileWorker {
	storage: Arc<dyn OrderStorage>,
	registry: Arc<AdapterRegistry>,
	notifier: Arc<dyn UpstreamNotifier>,
	config: QuerySchedulerConfig,
}

impl ReconcileWorker {
	fn skipped(reason: impl Into<String>) -> QueryOutcome {
		QueryOutcome::Skipped {
			reason: reason.into(),
		}
	}

	async fn run(&self, task: QueryTask) -> QueryOutcome {
		tokio::time::sleep(task.delay).await;

		let order = match self.storage.get_order(&task.order_id).await {
			Ok(Some(order)) => order,
			Ok(None) => return Self::skipped("order not found"),
			Err(e) => return Self::skipped(format!("storage error: {}", e)),
		};
		if order.awaits_report() {
			let notified = self.report(&order, &self.config.notify_retry).await;
			return QueryOutcome::Reported {
				status: order.status,
				notified,
			};
		}
		if order.status.is_terminal() {
			return Self::skipped(format!("order already {}", order.status));
		}

		let Some(adapter) = self.registry.resolve(&order.downstream_order_id) else {
			return Self::skipped("no adapter for downstream id");
		};
		let attempt = match self.storage.next_reconcile_attempt(&order.order_id).await {
			Ok(attempt) => attempt,
			Err(e) => return Self::skipped(format!("storage error: {}", e)),
		};

		let ids = [order.downstream_order_id.clone()];
		let rows = match tokio::time::timeout(
			self.config.query_timeout,
			adapter.query_remote_orders(&ids),
		)
		.await
		{
			Ok(Ok(rows)) => rows,
			Ok(Err(e)) => return Self::skipped(format!("partner query failed: {}", e)),
			Err(_) => {
				return Self::skipped(format!(
					"partner query timed out after {}ms",
					self.config.query_timeout.as_millis()
				))
			},
		};

		let Some(row) = rows
			.iter()
			.find(|row| row.matches(&order.downstream_order_id))
			.or_else(|| rows.first())
		else {
			return Self::skipped("partner returned no rows");
		};

		let status = adapter.map_status(row.status);
		let remark = row
			.message
			.as_deref()
			.filter(|m| !m.is_empty())
			.unwrap_or_else(|| status.remark())
			.to_string();

		let previous = match self
			.storage
			.apply_reconciliation(&order.order_id, attempt, status, &remark)
			.await
		{
			Ok(ReconcileOutcome::Applied { previous }) => previous,
			Ok(ReconcileOutcome::Stale { applied_attempt }) => {
				debug!(
					target: TRACING_TARGET,
					order_id = %order.order_id,
					attempt,
					applied_attempt,
					"Discarding stale query result"
				);
				return QueryOutcome::Stale;
			},
			Err(e) => return Self::skipped(format!("storage error: {}", e)),
		};

		info!(
			target: TRACING_TARGET,
			order_id = %order.order_id,
			attempt,
			previous = %previous,
			status = %status,
			"Reconciled order status"
		);

		let notified = if previous != status {
			let updated = Order {
				status,
				remark,
				reconcile_attempt: attempt,
				..order
			};
			self.report(&updated, &self.config.notify_retry).await
		} else {
			false
		};

		QueryOutcome::Applied {
			previous,
			current: status,
			notified,
		}
	}

	/// Notify upstream and record the status it accepted
	async fn report(&self, order: &Order, policy: &NotifyRetryPolicy) -> bool {
		if notify_with_retry(self.notifier.as_ref(), order, policy)
			.await
			.is_err()
		{
			return false;
		}
		if let Err(e) = self.storage.mark_notified(&order.order_id, order.status).await {
			warn!(
				target: TRACING_TARGET,
				order_id = %order.order_id,
				error = %e,
				"Failed to record notified status"
			);
		}
		true
	}
}

/// Bounded scheduler of [`QueryTask`]s
pub struct QueryScheduler {
	sender: RwLock<Option<mpsc::Sender<QueryTask>>>,
	shutdown: watch::Sender<bool>,
	dispatcher: std::sync::Mutex<Option<JoinHandle<()>>>,
	worker: Arc<ReconcileWorker>,
}

impl QueryScheduler {
	/// Create the scheduler and start its dispatcher
	pub fn start(
		storage: Arc<dyn OrderStorage>,
		registry: Arc<AdapterRegistry>,
		notifier: Arc<dyn UpstreamNotifier>,
		config: QuerySchedulerConfig,
	) -> Arc<Self> {
		let (sender, receiver) = mpsc::channel(config.capacity.max(1));
		let (shutdown, shutdown_rx) = watch::channel(false);
		let worker = Arc::new(ReconcileWorker {
			storage,
			registry,
			notifier,
			config,
		});

		let dispatcher = tokio::spawn(Self::dispatch(receiver, shutdown_rx, worker.clone()));
		info!(target: TRACING_TARGET, "Query scheduler started");

		Arc::new(Self {
			sender: RwLock::new(Some(sender)),
			shutdown,
			dispatcher: std::sync::Mutex::new(Some(dispatcher)),
			worker,
		})
	}

	async fn dispatch(
		mut receiver: mpsc::Receiver<QueryTask>,
		mut shutdown: watch::Receiver<bool>,
		worker: Arc<ReconcileWorker>,
	) {
		loop {
			tokio::select! {
				_ = shutdown.changed() => break,
				task = receiver.recv() => {
					let Some(task) = task else { break };
					let worker = worker.clone();
					tokio::spawn(async move {
						let order_id = task.order_id.clone();
						let outcome = worker.run(task).await;
						debug!(
							target: TRACING_TARGET,
							order_id = %order_id,
							outcome = ?outcome,
							"Query task finished"
						);
					});
				}
			}
		}
		debug!(target: TRACING_TARGET, "Query dispatcher stopped");
	}

	/// Enqueue a task, waiting while the queue is full
	pub async fn schedule(&self, task: QueryTask) -> Result<(), SchedulerError> {
		let sender = self
			.sender
			.read()
			.await
			.clone()
			.ok_or(SchedulerError::Stopped)?;
		sender.send(task).await.map_err(|_| SchedulerError::Stopped)
	}

	/// Enqueue one task per delay
	pub async fn schedule_series(
		&self,
		order_id: &str,
		downstream_order_id: &str,
		delays: &[Duration],
	) -> Result<usize, SchedulerError> {
		for delay in delays {
			self.schedule(QueryTask {
				order_id: order_id.to_string(),
				downstream_order_id: downstream_order_id.to_string(),
				delay: *delay,
			})
			.await?;
		}
		Ok(delays.len())
	}

	/// Run a task inline, without the queue or its delay
	pub async fn run_now(&self, mut task: QueryTask) -> QueryOutcome {
		task.delay = Duration::ZERO;
		self.worker.run(task).await
	}

	/// Send an order's current status upstream once, without retries
	///
	/// A status that is not accepted here is sent again by a later worker
	/// or the sweeper.
	pub async fn report_status(&self, order: &Order) -> bool {
		self.worker
			.report(order, &NotifyRetryPolicy::at_most_once())
			.await
	}

	pub async fn is_running(&self) -> bool {
		self.sender.read().await.is_some()
	}

	/// Close the intake and stop the dispatcher; in-flight workers continue
	pub async fn stop(&self) {
		if self.sender.write().await.take().is_none() {
			return;
		}
		let _ = self.shutdown.send(true);
		let dispatcher = self
			.dispatcher
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.take();
		if let Some(handle) = dispatcher {
			if let Err(e) = handle.await {
				error!(target: TRACING_TARGET, error = %e, "Query dispatcher panicked");
			}
		}
		info!(target: TRACING_TARGET, "Query scheduler stopped");
	}
}
