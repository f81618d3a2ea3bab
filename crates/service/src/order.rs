//! Order service
//!
//! Intake of new orders onto the creation topic, publication of partial
//! updates, and the read side used by the HTTP API.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use gift_adapters::AdapterRegistry;
use gift_storage::OrderStorage;
use gift_types::{
	AdapterError, MessagePublisher, Order, OrderCreateRequest, OrderListQuery, OrderMessage,
	OrderPage, OrderStatus, OrderUpdateMessage, PartnerCreateResponse, PartnerMarker,
	PartnerOrderState, ReconcileOutcome, SmsRequest,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::id_generator::IdGenerator;
use crate::scheduler::QueryScheduler;

const TRACING_TARGET: &str = "vip_gift::order_service";

#[derive(Debug, Error)]
pub enum OrderServiceError {
	#[error("validation error: {0}")]
	Validation(String),
	#[error("order not found: {0}")]
	NotFound(String),
	#[error("no partner adapter for downstream id: {0}")]
	UnknownPartner(String),
	#[error("operation not supported: {0}")]
	Unsupported(String),
	#[error("adapter error: {0}")]
	Adapter(String),
	#[error("storage error: {0}")]
	Storage(String),
	#[error("queue error: {0}")]
	Queue(String),
	#[error("serialization error: {0}")]
	Serialization(String),
}

impl From<AdapterError> for OrderServiceError {
	fn from(error: AdapterError) -> Self {
		match error {
			AdapterError::UnsupportedOperation { .. } => Self::Unsupported(error.to_string()),
			AdapterError::InvalidOrder { .. } | AdapterError::ProductNotFound { .. } => {
				Self::Validation(error.to_string())
			},
			other => Self::Adapter(other.to_string()),
		}
	}
}

/// Topics the service publishes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTopics {
	pub create_topic: String,
	pub update_topic: String,
}

/// Current status of one order as reported by an on-demand query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusView {
	pub order_id: String,
	pub downstream_order_id: String,
	pub status: i64,
	pub status_text: String,
	pub remark: String,
}

impl From<&Order> for OrderStatusView {
	fn from(order: &Order) -> Self {
		Self {
			order_id: order.order_id.clone(),
			downstream_order_id: order.downstream_order_id.clone(),
			status: order.status.code(),
			status_text: order.status.as_str().to_string(),
			remark: order.remark.clone(),
		}
	}
}

#[derive(Clone)]
pub struct OrderService {
	storage: Arc<dyn OrderStorage>,
	registry: Arc<AdapterRegistry>,
	publisher: Arc<dyn MessagePublisher>,
	id_generator: Arc<dyn IdGenerator>,
	topics: OrderTopics,
	scheduler: Option<Arc<QueryScheduler>>,
}

impl OrderService {
	pub fn new(
		storage: Arc<dyn OrderStorage>,
		registry: Arc<AdapterRegistry>,
		publisher: Arc<dyn MessagePublisher>,
		id_generator: Arc<dyn IdGenerator>,
		topics: OrderTopics,
	) -> Self {
		Self {
			storage,
			registry,
			publisher,
			id_generator,
			topics,
			scheduler: None,
		}
	}

	/// Report status changes found by on-demand queries through `scheduler`
	pub fn with_scheduler(mut self, scheduler: Arc<QueryScheduler>) -> Self {
		self.scheduler = Some(scheduler);
		self
	}

	/// Validate a creation message, assign its id and publish it
	///
	/// Nothing is stored here; the consumer persists the order when it
	/// reads the message back.
	pub async fn create_order(
		&self,
		mut message: OrderMessage,
	) -> Result<OrderMessage, OrderServiceError> {
		message
			.validate()
			.map_err(|e| OrderServiceError::Validation(e.to_string()))?;
		message.normalize_payload();
		if message.order_id.trim().is_empty() {
			message.order_id = self.id_generator.next_id();
		}
		message.status = OrderStatus::Init;

		let payload = serde_json::to_vec(&message)
			.map_err(|e| OrderServiceError::Serialization(e.to_string()))?;
		let offset = self
			.publisher
			.publish(&self.topics.create_topic, &message.order_id, payload)
			.await
			.map_err(|e| OrderServiceError::Queue(e.to_string()))?;

		info!(
			target: TRACING_TARGET,
			order_id = %message.order_id,
			downstream_order_id = %message.downstream_order_id,
			offset,
			"Order accepted"
		);
		Ok(message)
	}

	/// Translate an intake request through its partner adapter, then publish
	pub async fn submit_order(
		&self,
		request: &OrderCreateRequest,
	) -> Result<OrderMessage, OrderServiceError> {
		request
			.validate()
			.map_err(|e| OrderServiceError::Validation(e.to_string()))?;

		let adapter = self
			.registry
			.resolve(&request.downstream_order_id)
			.ok_or_else(|| OrderServiceError::UnknownPartner(request.downstream_order_id.clone()))?;

		let message = adapter.translate_request(request).await?;
		self.create_order(message).await
	}

	/// Publish a partial update to the update topic
	pub async fn publish_order_update(
		&self,
		update: &OrderUpdateMessage,
	) -> Result<u64, OrderServiceError> {
		let (key, _) = update.lookup_key().ok_or_else(|| {
			OrderServiceError::Validation("orderId or downstreamOrderId is required".to_string())
		})?;

		let payload = serde_json::to_vec(update)
			.map_err(|e| OrderServiceError::Serialization(e.to_string()))?;
		let offset = self
			.publisher
			.publish(&self.topics.update_topic, key, payload)
			.await
			.map_err(|e| OrderServiceError::Queue(e.to_string()))?;

		debug!(target: TRACING_TARGET, key = %key, offset, "Order update published");
		Ok(offset)
	}

	pub async fn get_order(&self, order_id: &str) -> Result<Option<Order>, OrderServiceError> {
		self.storage
			.get_order(order_id)
			.await
			.map_err(|e| OrderServiceError::Storage(e.to_string()))
	}

	pub async fn get_order_by_downstream_id(
		&self,
		downstream_order_id: &str,
	) -> Result<Option<Order>, OrderServiceError> {
		self.storage
			.get_order_by_downstream_id(downstream_order_id)
			.await
			.map_err(|e| OrderServiceError::Storage(e.to_string()))
	}

	/// Look an order up by order id, or by downstream id when no order id is given
	pub async fn find_order(
		&self,
		order_id: Option<&str>,
		downstream_order_id: Option<&str>,
	) -> Result<Order, OrderServiceError> {
		let order_id = order_id.filter(|id| !id.is_empty());
		let downstream_order_id = downstream_order_id.filter(|id| !id.is_empty());

		let found = match (order_id, downstream_order_id) {
			(Some(id), _) => self.get_order(id).await?,
			(None, Some(id)) => self.get_order_by_downstream_id(id).await?,
			(None, None) => {
				return Err(OrderServiceError::Validation(
					"orderId or downstreamOrderId is required".to_string(),
				))
			},
		};
		found.ok_or_else(|| {
			OrderServiceError::NotFound(
				order_id
					.or(downstream_order_id)
					.unwrap_or_default()
					.to_string(),
			)
		})
	}

	pub async fn list_orders(&self, query: &OrderListQuery) -> Result<OrderPage, OrderServiceError> {
		self.storage
			.list_orders(query)
			.await
			.map_err(|e| OrderServiceError::Storage(e.to_string()))
	}

	/// Ask the partners for the current status of the given orders
	///
	/// Ids are grouped by partner marker and each partner is queried once.
	/// A partner answer is stored and answered with; otherwise the stored
	/// status is. Ids with no stored order produce no row. A stored answer
	/// that changes the status is sent upstream once.
	pub async fn query_orders(
		&self,
		downstream_order_ids: &[String],
	) -> Result<Vec<OrderStatusView>, OrderServiceError> {
		// attempt numbers are drawn before any partner query goes out
		let mut stored = Vec::with_capacity(downstream_order_ids.len());
		for id in downstream_order_ids {
			if let Some(order) = self.get_order_by_downstream_id(id).await? {
				let attempt = self
					.storage
					.next_reconcile_attempt(&order.order_id)
					.await
					.map_err(|e| OrderServiceError::Storage(e.to_string()))?;
				stored.push((order, attempt));
			}
		}

		let mut groups: BTreeMap<PartnerMarker, Vec<String>> = BTreeMap::new();
		for (order, _) in &stored {
			if let Some(marker) = PartnerMarker::from_downstream_id(&order.downstream_order_id) {
				groups
					.entry(marker)
					.or_default()
					.push(order.downstream_order_id.clone());
			}
		}

		let queries = groups.into_iter().filter_map(|(marker, ids)| {
			let adapter = self.registry.get(&marker)?;
			Some(async move {
				let rows = match adapter.query_remote_orders(&ids).await {
					Ok(rows) => rows,
					Err(e) => {
						warn!(
							target: TRACING_TARGET,
							partner = %marker,
							error = %e,
							"Partner query failed, reporting stored status"
						);
						Vec::new()
					},
				};
				(adapter, rows)
			})
		});
		let answers = join_all(queries).await;

		let mut views = Vec::with_capacity(stored.len());
		for (mut order, attempt) in stored {
			let answer = answers.iter().find_map(|(adapter, rows)| {
				rows.iter()
					.find(|row: &&PartnerOrderState| row.matches(&order.downstream_order_id))
					.map(|row| (adapter, row))
			});

			if let Some((adapter, row)) = answer {
				let status = adapter.map_status(row.status);
				let remark = row
					.message
					.as_deref()
					.filter(|m| !m.is_empty())
					.unwrap_or_else(|| status.remark())
					.to_string();
				match self
					.storage
					.apply_reconciliation(&order.order_id, attempt, status, &remark)
					.await
				{
					Ok(ReconcileOutcome::Applied { previous }) => {
						order.status = status;
						order.remark = remark;
						order.reconcile_attempt = attempt;
						if previous != status || order.awaits_report() {
							self.report(&order).await;
						}
					},
					Ok(ReconcileOutcome::Stale { .. }) => {
						if let Some(latest) = self.get_order(&order.order_id).await? {
							order = latest;
						}
					},
					Err(e) => return Err(OrderServiceError::Storage(e.to_string())),
				}
			}
			views.push(OrderStatusView::from(&order));
		}
		Ok(views)
	}

	async fn report(&self, order: &Order) {
		let Some(scheduler) = &self.scheduler else {
			return;
		};
		if !scheduler.report_status(order).await {
			warn!(
				target: TRACING_TARGET,
				order_id = %order.order_id,
				status = %order.status,
				"Upstream did not accept queried status, leaving it to the sweeper"
			);
		}
	}

	/// Send a verification SMS through the partner serving the order
	pub async fn send_sms(
		&self,
		request: &SmsRequest,
	) -> Result<PartnerCreateResponse, OrderServiceError> {
		let adapter = self
			.registry
			.resolve(&request.downstream_order_id)
			.ok_or_else(|| OrderServiceError::UnknownPartner(request.downstream_order_id.clone()))?;
		Ok(adapter.send_sms(request).await?)
	}

	pub async fn health_check(&self) -> Result<bool, OrderServiceError> {
		self.storage
			.health_check()
			.await
			.map_err(|e| OrderServiceError::Storage(e.to_string()))
	}
}
