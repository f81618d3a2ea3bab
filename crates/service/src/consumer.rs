//! Order topic consumer
//!
//! Two independent loops, one per topic. Every message is committed once
//! handled, whatever the outcome: failures are scoped to the message and
//! never retried from the queue.

use chrono::Utc;
use gift_adapters::AdapterRegistry;
use gift_storage::OrderStorage;
use gift_types::{
	OrderMessage, OrderStatus, OrderUpdateMessage, QueueError, StorageError, TopicReader,
	TopicSubscriber,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::scheduler::QueryScheduler;

const TRACING_TARGET: &str = "vip_gift::consumer";

/// Pause after an unexpected fetch error before reading again
const FETCH_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerTopics {
	pub create_topic: String,
	pub update_topic: String,
	pub group_id: String,
}

/// Result of handling one message
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumeOutcome {
	/// The order was created or updated
	Processed { status: OrderStatus },
	/// Valid message with nothing left to do
	Skipped { reason: String },
	/// Message could not be applied and is discarded
	Dropped { reason: String },
}

#[derive(Debug, Clone, Copy)]
enum MessageKind {
	Create,
	Update,
}

pub struct OrderConsumer {
	storage: Arc<dyn OrderStorage>,
	registry: Arc<AdapterRegistry>,
	scheduler: Arc<QueryScheduler>,
	query_delays: Vec<Duration>,
}

impl OrderConsumer {
	pub fn new(
		storage: Arc<dyn OrderStorage>,
		registry: Arc<AdapterRegistry>,
		scheduler: Arc<QueryScheduler>,
		query_delays: Vec<Duration>,
	) -> Self {
		Self {
			storage,
			registry,
			scheduler,
			query_delays,
		}
	}

	/// Subscribe to both topics and start one loop per topic
	///
	/// Loops end when the queue closes.
	pub fn spawn(
		self: Arc<Self>,
		subscriber: &dyn TopicSubscriber,
		topics: &ConsumerTopics,
	) -> Result<Vec<JoinHandle<()>>, QueueError> {
		let create_reader = subscriber.subscribe(&topics.create_topic, &topics.group_id)?;
		let update_reader = subscriber.subscribe(&topics.update_topic, &topics.group_id)?;

		info!(
			target: TRACING_TARGET,
			create_topic = %topics.create_topic,
			update_topic = %topics.update_topic,
			group_id = %topics.group_id,
			"Order consumer subscribed"
		);

		let creations = tokio::spawn(self.clone().run_loop(create_reader, MessageKind::Create));
		let updates = tokio::spawn(self.run_loop(update_reader, MessageKind::Update));
		Ok(vec![creations, updates])
	}

	async fn run_loop(self: Arc<Self>, mut reader: Box<dyn TopicReader>, kind: MessageKind) {
		let topic = reader.topic().to_string();
		loop {
			let message = match reader.fetch().await {
				Ok(message) => message,
				Err(QueueError::Closed) => break,
				Err(e) => {
					error!(target: TRACING_TARGET, topic = %topic, error = %e, "Fetch failed");
					tokio::time::sleep(FETCH_ERROR_BACKOFF).await;
					continue;
				},
			};

			let outcome = match kind {
				MessageKind::Create => self.handle_create_message(&message.payload).await,
				MessageKind::Update => self.handle_update_message(&message.payload).await,
			};
			match &outcome {
				ConsumeOutcome::Dropped { reason } => warn!(
					target: TRACING_TARGET,
					topic = %topic,
					offset = message.offset,
					key = %message.key,
					reason = %reason,
					"Message dropped"
				),
				other => debug!(
					target: TRACING_TARGET,
					topic = %topic,
					offset = message.offset,
					outcome = ?other,
					"Message handled"
				),
			}

			if let Err(e) = reader.commit(&message).await {
				error!(
					target: TRACING_TARGET,
					topic = %topic,
					offset = message.offset,
					error = %e,
					"Commit failed"
				);
			}
		}
		info!(target: TRACING_TARGET, topic = %topic, "Consumer loop stopped");
	}

	fn dropped(reason: impl Into<String>) -> ConsumeOutcome {
		ConsumeOutcome::Dropped {
			reason: reason.into(),
		}
	}

	/// Persist a new order, create it at the partner and start reconciliation
	pub async fn handle_create_message(&self, payload: &[u8]) -> ConsumeOutcome {
		let mut message: OrderMessage = match serde_json::from_slice(payload) {
			Ok(message) => message,
			Err(e) => return Self::dropped(format!("malformed creation message: {}", e)),
		};
		if let Err(e) = message.validate() {
			return Self::dropped(e.to_string());
		}
		if message.order_id.is_empty() {
			return Self::dropped("orderId is missing");
		}

		match self.storage.get_order(&message.order_id).await {
			Ok(Some(existing)) => {
				if let Err(e) = existing.check_identity(&message) {
					error!(
						target: TRACING_TARGET,
						order_id = %message.order_id,
						downstream_order_id = %message.downstream_order_id,
						error = %e,
						"Creation message conflicts with stored order"
					);
					return Self::dropped(e.to_string());
				}
				if existing.status != OrderStatus::Init {
					return ConsumeOutcome::Skipped {
						reason: format!("order already {}", existing.status),
					};
				}
			},
			Ok(None) => {},
			Err(e) => return Self::dropped(format!("storage error: {}", e)),
		}

		if let Err(e) = self.storage.upsert_order(&message).await {
			return match e {
				StorageError::Conflict { .. } => {
					error!(
						target: TRACING_TARGET,
						order_id = %message.order_id,
						downstream_order_id = %message.downstream_order_id,
						error = %e,
						"Creation message conflicts with stored order"
					);
					Self::dropped(e.to_string())
				},
				other => Self::dropped(format!("storage error: {}", other)),
			};
		}

		let Some(adapter) = self.registry.resolve(&message.downstream_order_id) else {
			return Self::dropped(format!(
				"no partner adapter for {}",
				message.downstream_order_id
			));
		};

		match adapter.create_remote_order(&message).await {
			Err(e) => {
				warn!(
					target: TRACING_TARGET,
					order_id = %message.order_id,
					adapter = %adapter.id(),
					error = %e,
					"Partner create failed"
				);
				message.status = OrderStatus::UpstreamFail;
				message.remark = e.to_string();
				self.store_status(&message).await
			},
			Ok(response) => {
				message.status = OrderStatus::Pending;
				message.remark = response
					.message
					.filter(|m| !m.is_empty())
					.unwrap_or_else(|| OrderStatus::Pending.remark().to_string());
				let outcome = self.store_status(&message).await;

				match self
					.scheduler
					.schedule_series(
						&message.order_id,
						&message.downstream_order_id,
						&self.query_delays,
					)
					.await
				{
					Ok(count) => debug!(
						target: TRACING_TARGET,
						order_id = %message.order_id,
						tasks = count,
						"Reconciliation scheduled"
					),
					Err(e) => warn!(
						target: TRACING_TARGET,
						order_id = %message.order_id,
						error = %e,
						"Could not schedule reconciliation"
					),
				}
				outcome
			},
		}
	}

	async fn store_status(&self, message: &OrderMessage) -> ConsumeOutcome {
		match self.storage.upsert_order(message).await {
			Ok(_) => ConsumeOutcome::Processed {
				status: message.status,
			},
			Err(e) => Self::dropped(format!("storage error: {}", e)),
		}
	}

	/// Merge a partial update into the stored order
	pub async fn handle_update_message(&self, payload: &[u8]) -> ConsumeOutcome {
		let update: OrderUpdateMessage = match serde_json::from_slice(payload) {
			Ok(update) => update,
			Err(e) => return Self::dropped(format!("malformed update message: {}", e)),
		};
		let Some((key, is_downstream)) = update.lookup_key() else {
			return Self::dropped("orderId or downstreamOrderId is required");
		};

		let found = if is_downstream {
			self.storage.get_order_by_downstream_id(key).await
		} else {
			self.storage.get_order(key).await
		};
		let mut order = match found {
			Ok(Some(order)) => order,
			Ok(None) => return Self::dropped(format!("order {} not found", key)),
			Err(e) => return Self::dropped(format!("storage error: {}", e)),
		};

		if !order.apply_update(&update, Utc::now()) {
			return ConsumeOutcome::Skipped {
				reason: "update carries no changes".to_string(),
			};
		}
		let status = order.status;
		match self.storage.update_order(order).await {
			Ok(()) => ConsumeOutcome::Processed { status },
			Err(e) => Self::dropped(format!("storage error: {}", e)),
		}
	}
}
