//! Gift partner adapter
//!
//! Gift products are catalogued locally; the partner knows them by their
//! base codes. Orders are created one by one and queried one id per call.

use async_trait::async_trait;
use gift_types::{
	AdapterError, AdapterResult, CatalogLookup, CommissionSplit, OrderCreateRequest, OrderMessage,
	OrderStatus, PartnerAdapter, PartnerCreateResponse, PartnerMarker, PartnerOrderState,
	SmsRequest, COMMISSION_RULE_MF,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::http::{self, BizPayload, PartnerEnvelope};

const TRACING_TARGET: &str = "vip_gift::adapters::gift";

/// Buyer share of the commission rate (85%)
const SELF_RATIO: Decimal = Decimal::from_parts(85, 0, 0, false, 2);

/// Order source marking an order as promotional on the partner side
pub const PROMOTIONAL_SOURCE: &str = "VIP_GIFT";

/// Partner status vocabulary
pub mod status_codes {
	pub const WAIT_ORDER: i64 = 10;
	pub const ORDERING: i64 = 20;
	pub const ORDER_SUCCESS: i64 = 30;
	pub const ORDER_FAIL: i64 = 40;
	pub const SUSPICIOUS: i64 = 50;
}

/// Gift partner endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct GiftEndpoints {
	pub create_url: String,
	pub query_url: String,
	pub sms_url: Option<String>,
}

/// Adapter for downstream ids marked `VV`
pub struct GiftAdapter {
	endpoints: GiftEndpoints,
	catalog: Arc<dyn CatalogLookup>,
	client: Client,
	timeout: Duration,
}

impl fmt::Debug for GiftAdapter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GiftAdapter")
			.field("endpoints", &self.endpoints)
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

impl GiftAdapter {
	pub const ID: &'static str = "gift";

	pub fn new(
		endpoints: GiftEndpoints,
		catalog: Arc<dyn CatalogLookup>,
		timeout: Duration,
	) -> AdapterResult<Self> {
		http::validate_endpoint("gift create_url", &endpoints.create_url)?;
		http::validate_endpoint("gift query_url", &endpoints.query_url)?;
		if let Some(sms_url) = &endpoints.sms_url {
			http::validate_endpoint("gift sms_url", sms_url)?;
		}

		Ok(Self {
			endpoints,
			catalog,
			client: http::build_client(timeout)?,
			timeout,
		})
	}

	fn invalid_order(&self, reason: impl Into<String>) -> AdapterError {
		AdapterError::InvalidOrder {
			adapter_id: Self::ID.to_string(),
			reason: reason.into(),
		}
	}

	/// Build the partner create body from the stored payload
	///
	/// The product code is swapped for the partner's first base code and the
	/// order is tagged as promotional.
	async fn outbound_body(&self, order: &OrderMessage) -> AdapterResult<Value> {
		let payload: BizPayload<Value> = serde_json::from_str(&order.data_json)
			.map_err(|e| self.invalid_order(format!("unreadable dataJSON: {}", e)))?;

		let mut body = payload.body;
		let fields = body
			.as_object_mut()
			.ok_or_else(|| self.invalid_order("dataJSON body is not an object"))?;

		let public_code = fields
			.get("publicCode")
			.and_then(Value::as_str)
			.filter(|code| !code.is_empty())
			.map(str::to_string)
			.unwrap_or_else(|| order.public_code.clone());
		if public_code.is_empty() {
			return Err(self.invalid_order("publicCode is required"));
		}

		let base_code = self
			.catalog
			.base_codes(&public_code)
			.await
			.ok()
			.and_then(|codes| codes.into_iter().next())
			.ok_or_else(|| AdapterError::ProductNotFound {
				public_code: public_code.clone(),
			})?;
		debug!(
			target: TRACING_TARGET,
			public_code = %public_code,
			base_code = %base_code,
			"Resolved partner base code"
		);

		fields.insert("publicCode".to_string(), Value::String(base_code));
		fields.insert(
			"source".to_string(),
			Value::String(PROMOTIONAL_SOURCE.to_string()),
		);
		Ok(body)
	}
}

#[async_trait]
impl PartnerAdapter for GiftAdapter {
	fn id(&self) -> &str {
		Self::ID
	}

	fn marker(&self) -> PartnerMarker {
		PartnerMarker::gift()
	}

	async fn translate_request(&self, request: &OrderCreateRequest) -> AdapterResult<OrderMessage> {
		if request.downstream_order_id.trim().is_empty() {
			return Err(self.invalid_order("downstreamOrderId is required"));
		}
		if request.public_code.trim().is_empty() {
			return Err(self.invalid_order("publicCode is required"));
		}

		let product = self
			.catalog
			.get_product(&request.public_code)
			.await
			.map_err(|_| AdapterError::ProductNotFound {
				public_code: request.public_code.clone(),
			})?;

		let payload = BizPayload {
			body: request.clone(),
			extra: request.data_json.clone().unwrap_or_default(),
		};
		let split = CommissionSplit::split(product.commission_mf, SELF_RATIO);

		Ok(OrderMessage {
			order_id: String::new(),
			downstream_order_id: request.downstream_order_id.clone(),
			data_json: serde_json::to_string(&payload)?,
			status: OrderStatus::Init,
			remark: String::new(),
			commission_self: split.self_share,
			commission_parent: split.parent_share,
			commission_rule: COMMISSION_RULE_MF.to_string(),
			channel: self.marker().to_string(),
			user_sn: request.partner_id.clone(),
			parent_sn: request.parent_sn.clone(),
			public_code: request.public_code.clone(),
		})
	}

	async fn create_remote_order(
		&self,
		order: &OrderMessage,
	) -> AdapterResult<PartnerCreateResponse> {
		let body = self.outbound_body(order).await?;
		let text =
			http::post_json(&self.client, &self.endpoints.create_url, &body, self.timeout).await?;
		let response: PartnerCreateResponse = http::parse_body(&text, "gift create")?;

		info!(
			target: TRACING_TARGET,
			order_id = %order.order_id,
			downstream_order_id = %order.downstream_order_id,
			partner_order_id = ?response.order_id,
			"Gift order created"
		);
		Ok(response)
	}

	async fn query_remote_orders(
		&self,
		downstream_order_ids: &[String],
	) -> AdapterResult<Vec<PartnerOrderState>> {
		let mut rows = Vec::with_capacity(downstream_order_ids.len());

		for id in downstream_order_ids {
			let query = json!({ "orderIds": [id] });
			let text =
				http::post_json(&self.client, &self.endpoints.query_url, &query, self.timeout)
					.await?;
			let envelope: PartnerEnvelope<Vec<PartnerOrderState>> =
				http::parse_body(&text, "gift query")?;
			if !envelope.is_ok() {
				return Err(AdapterError::PartnerRejected {
					code: envelope.code,
					message: envelope.message,
				});
			}
			rows.extend(envelope.data.unwrap_or_default());
		}

		debug!(
			target: TRACING_TARGET,
			requested = downstream_order_ids.len(),
			returned = rows.len(),
			"Gift query finished"
		);
		Ok(rows)
	}

	fn map_status(&self, partner_status: i64) -> OrderStatus {
		match partner_status {
			status_codes::WAIT_ORDER => OrderStatus::Init,
			status_codes::ORDERING => OrderStatus::Pending,
			status_codes::ORDER_SUCCESS => OrderStatus::Success,
			status_codes::ORDER_FAIL => OrderStatus::UpstreamFail,
			status_codes::SUSPICIOUS => OrderStatus::DownstreamFail,
			_ => OrderStatus::Pending,
		}
	}

	async fn send_sms(&self, request: &SmsRequest) -> AdapterResult<PartnerCreateResponse> {
		let Some(sms_url) = &self.endpoints.sms_url else {
			return Err(AdapterError::UnsupportedOperation {
				operation: "send_sms".to_string(),
				adapter_id: Self::ID.to_string(),
			});
		};
		let text = http::post_json(&self.client, sms_url, request, self.timeout).await?;
		http::parse_body(&text, "gift sms")
	}
}
