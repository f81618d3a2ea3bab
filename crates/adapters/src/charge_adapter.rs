//! Charge (mobile top-up) partner adapter
//!
//! Commission rates come from the partner's product search rather than the
//! local catalog. Status rows already use the internal numeric codes.

use async_trait::async_trait;
use gift_types::{
	AdapterError, AdapterResult, CommissionSplit, OrderCreateRequest, OrderMessage, OrderStatus,
	PartnerAdapter, PartnerCreateResponse, PartnerMarker, PartnerOrderState, COMMISSION_RULE_MF,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info, warn};

use crate::http::{self, BizPayload, PartnerEnvelope};

const TRACING_TARGET: &str = "vip_gift::adapters::charge";

/// Buyer share of the commission rate (80%)
const SELF_RATIO: Decimal = Decimal::from_parts(80, 0, 0, false, 2);

/// Charge partner endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeEndpoints {
	pub create_url: String,
	pub query_url: String,
	pub product_url: String,
}

/// Top-up request body sent to the partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeOrderBody {
	pub phone: String,
	pub downstream_order_id: String,
	pub product_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub amount: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductSearchData {
	#[serde(default)]
	data_list: Vec<ProductSearchItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductSearchItem {
	#[serde(default)]
	product_id: String,
	#[serde(default)]
	commission_value: String,
}

/// Adapter for downstream ids marked `VF`
#[derive(Debug)]
pub struct ChargeAdapter {
	endpoints: ChargeEndpoints,
	client: Client,
	timeout: Duration,
}

impl ChargeAdapter {
	pub const ID: &'static str = "charge";

	pub fn new(endpoints: ChargeEndpoints, timeout: Duration) -> AdapterResult<Self> {
		http::validate_endpoint("charge create_url", &endpoints.create_url)?;
		http::validate_endpoint("charge query_url", &endpoints.query_url)?;
		http::validate_endpoint("charge product_url", &endpoints.product_url)?;

		Ok(Self {
			endpoints,
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

	async fn search_commission(&self, product_id: &str) -> AdapterResult<Option<Decimal>> {
		let query = json!({ "productId": product_id });
		let text =
			http::post_json(&self.client, &self.endpoints.product_url, &query, self.timeout)
				.await?;
		let envelope: PartnerEnvelope<ProductSearchData> =
			http::parse_body(&text, "charge product search")?;
		if !envelope.is_ok() {
			return Err(AdapterError::PartnerRejected {
				code: envelope.code,
				message: envelope.message,
			});
		}

		let Some(item) = envelope
			.data
			.unwrap_or_default()
			.data_list
			.into_iter()
			.find(|item| item.product_id == product_id)
		else {
			return Ok(None);
		};

		Decimal::from_str(item.commission_value.trim())
			.map(Some)
			.map_err(|e| AdapterError::InvalidResponse {
				reason: format!(
					"commissionValue '{}' is not a number: {}",
					item.commission_value, e
				),
			})
	}

	/// Commission rate of a product, zero when it cannot be determined
	async fn lookup_commission(&self, product_id: &str) -> Decimal {
		match self.search_commission(product_id).await {
			Ok(Some(rate)) => rate,
			Ok(None) => {
				warn!(
					target: TRACING_TARGET,
					product_id = %product_id,
					"Product not listed by partner, using zero commission"
				);
				Decimal::ZERO
			},
			Err(e) => {
				warn!(
					target: TRACING_TARGET,
					product_id = %product_id,
					error = %e,
					"Product search failed, using zero commission"
				);
				Decimal::ZERO
			},
		}
	}
}

#[async_trait]
impl PartnerAdapter for ChargeAdapter {
	fn id(&self) -> &str {
		Self::ID
	}

	fn marker(&self) -> PartnerMarker {
		PartnerMarker::charge()
	}

	async fn translate_request(&self, request: &OrderCreateRequest) -> AdapterResult<OrderMessage> {
		if request.downstream_order_id.trim().is_empty() {
			return Err(self.invalid_order("downstreamOrderId is required"));
		}
		if request.public_code.trim().is_empty() {
			return Err(self.invalid_order("publicCode is required"));
		}

		let payload = BizPayload {
			body: ChargeOrderBody {
				phone: request.phone.clone(),
				downstream_order_id: request.downstream_order_id.clone(),
				product_id: request.public_code.clone(),
				amount: request.amount,
			},
			extra: request.data_json.clone().unwrap_or_default(),
		};
		let rate = self.lookup_commission(&request.public_code).await;
		let split = CommissionSplit::split(rate, SELF_RATIO);

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
		let payload: BizPayload<ChargeOrderBody> = serde_json::from_str(&order.data_json)
			.map_err(|e| self.invalid_order(format!("unreadable dataJSON: {}", e)))?;

		let text = http::post_json(
			&self.client,
			&self.endpoints.create_url,
			&payload.body,
			self.timeout,
		)
		.await?;
		let envelope: PartnerEnvelope<Value> = http::parse_body(&text, "charge create")?;
		if !envelope.is_ok() {
			return Err(AdapterError::PartnerRejected {
				code: envelope.code,
				message: envelope.message,
			});
		}

		info!(
			target: TRACING_TARGET,
			order_id = %order.order_id,
			downstream_order_id = %order.downstream_order_id,
			"Charge order created"
		);
		Ok(PartnerCreateResponse {
			order_id: Some(order.order_id.clone()),
			status: Some(OrderStatus::Pending.code()),
			message: Some(envelope.data.unwrap_or(Value::Null).to_string()),
		})
	}

	async fn query_remote_orders(
		&self,
		downstream_order_ids: &[String],
	) -> AdapterResult<Vec<PartnerOrderState>> {
		let query = json!({ "orderIds": downstream_order_ids });
		let text =
			http::post_json(&self.client, &self.endpoints.query_url, &query, self.timeout).await?;
		let envelope: PartnerEnvelope<Vec<PartnerOrderState>> =
			http::parse_body(&text, "charge query")?;
		if !envelope.is_ok() {
			return Err(AdapterError::PartnerRejected {
				code: envelope.code,
				message: envelope.message,
			});
		}

		let rows = envelope.data.unwrap_or_default();
		debug!(
			target: TRACING_TARGET,
			requested = downstream_order_ids.len(),
			returned = rows.len(),
			"Charge query finished"
		);
		Ok(rows)
	}

	fn map_status(&self, partner_status: i64) -> OrderStatus {
		OrderStatus::from_code(partner_status).unwrap_or(OrderStatus::Pending)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{extract::State, routing::post, Json, Router};
	use gift_types::SmsRequest;
	use std::sync::{Arc, Mutex};

	#[derive(Clone, Default)]
	struct PartnerState {
		calls: Arc<Mutex<Vec<(String, Value)>>>,
		create_code: i64,
	}

	async fn product(State(state): State<PartnerState>, Json(body): Json<Value>) -> Json<Value> {
		state.calls.lock().unwrap().push(("product".to_string(), body));
		Json(json!({
			"code": 200,
			"message": "ok",
			"data": {"dataList": [
				{"productId": "OTHER", "commissionValue": "99"},
				{"productId": "TOPUP-50", "commissionValue": "2.5"}
			], "total": 2}
		}))
	}

	async fn create(State(state): State<PartnerState>, Json(body): Json<Value>) -> Json<Value> {
		state.calls.lock().unwrap().push(("create".to_string(), body));
		Json(json!({"code": state.create_code, "message": "handled", "data": {"ticket": "T-1"}}))
	}

	async fn query(State(state): State<PartnerState>, Json(body): Json<Value>) -> Json<Value> {
		let rows: Vec<Value> = body["orderIds"]
			.as_array()
			.cloned()
			.unwrap_or_default()
			.into_iter()
			.map(|id| json!({"downstreamOrderId": id, "status": 200}))
			.collect();
		state.calls.lock().unwrap().push(("query".to_string(), body));
		Json(json!({"code": 200, "message": "ok", "data": rows}))
	}

	async fn spawn_partner(state: PartnerState) -> String {
		let router = Router::new()
			.route("/product", post(product))
			.route("/create", post(create))
			.route("/query", post(query))
			.with_state(state);
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, router).await.unwrap();
		});
		format!("http://{}", addr)
	}

	fn adapter(base: &str, product_path: &str) -> ChargeAdapter {
		ChargeAdapter::new(
			ChargeEndpoints {
				create_url: format!("{}/create", base),
				query_url: format!("{}/query", base),
				product_url: format!("{}{}", base, product_path),
			},
			Duration::from_secs(5),
		)
		.unwrap()
	}

	fn request() -> OrderCreateRequest {
		OrderCreateRequest {
			phone: "13800000000".to_string(),
			public_code: "TOPUP-50".to_string(),
			downstream_order_id: "VF-001".to_string(),
			amount: Some(Decimal::new(50, 0)),
			partner_id: "U-1".to_string(),
			parent_sn: "U-0".to_string(),
			..Default::default()
		}
	}

	#[tokio::test]
	async fn test_translate_uses_partner_commission() {
		let base = spawn_partner(PartnerState {
			create_code: 200,
			..Default::default()
		})
		.await;
		let adapter = adapter(&base, "/product");

		let message = adapter.translate_request(&request()).await.unwrap();
		assert_eq!(message.commission_self, Decimal::new(2, 0));
		assert_eq!(message.commission_parent, Decimal::new(5, 1));
		assert_eq!(message.channel, "VF");

		let payload: BizPayload<ChargeOrderBody> =
			serde_json::from_str(&message.data_json).unwrap();
		assert_eq!(payload.body.product_id, "TOPUP-50");
		assert_eq!(payload.body.amount, Some(Decimal::new(50, 0)));
	}

	#[tokio::test]
	async fn test_failed_product_search_degrades_to_zero() {
		let base = spawn_partner(PartnerState::default()).await;
		let adapter = adapter(&base, "/missing");

		let message = adapter.translate_request(&request()).await.unwrap();
		assert_eq!(message.commission_self, Decimal::ZERO);
		assert_eq!(message.commission_parent, Decimal::ZERO);
	}

	#[tokio::test]
	async fn test_create_posts_body_only() {
		let state = PartnerState {
			create_code: 200,
			..Default::default()
		};
		let base = spawn_partner(state.clone()).await;
		let adapter = adapter(&base, "/product");

		let mut message = adapter.translate_request(&request()).await.unwrap();
		message.order_id = "42".to_string();
		let response = adapter.create_remote_order(&message).await.unwrap();
		assert_eq!(response.order_id.as_deref(), Some("42"));
		assert_eq!(response.status, Some(100));

		let calls = state.calls.lock().unwrap();
		let (_, sent) = calls.iter().find(|(kind, _)| kind == "create").unwrap();
		assert_eq!(sent["productId"], "TOPUP-50");
		assert!(sent.get("body").is_none());
	}

	#[tokio::test]
	async fn test_create_rejected_by_envelope_code() {
		let base = spawn_partner(PartnerState {
			create_code: 500,
			..Default::default()
		})
		.await;
		let adapter = adapter(&base, "/product");

		let message = adapter.translate_request(&request()).await.unwrap();
		assert!(matches!(
			adapter.create_remote_order(&message).await,
			Err(AdapterError::PartnerRejected { code: 500, .. })
		));
	}

	#[tokio::test]
	async fn test_query_batches_ids() {
		let state = PartnerState::default();
		let base = spawn_partner(state.clone()).await;
		let adapter = adapter(&base, "/product");

		let ids = vec!["VF-001".to_string(), "VF-002".to_string()];
		let rows = adapter.query_remote_orders(&ids).await.unwrap();
		assert_eq!(rows.len(), 2);
		assert_eq!(adapter.map_status(rows[0].status), OrderStatus::Success);

		let calls = state.calls.lock().unwrap();
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].1["orderIds"], json!(["VF-001", "VF-002"]));
	}

	#[test]
	fn test_status_uses_internal_codes() {
		let adapter = adapter("http://127.0.0.1:1", "/product");
		assert_eq!(adapter.map_status(0), OrderStatus::Init);
		assert_eq!(adapter.map_status(400), OrderStatus::DownstreamFail);
		assert_eq!(adapter.map_status(500), OrderStatus::UpstreamFail);
		assert_eq!(adapter.map_status(7), OrderStatus::Pending);
	}

	#[tokio::test]
	async fn test_sms_is_unsupported() {
		let adapter = adapter("http://127.0.0.1:1", "/product");
		let sms = SmsRequest {
			phone: "13800000000".to_string(),
			public_code: "TOPUP-50".to_string(),
			downstream_order_id: "VF-001".to_string(),
		};
		assert!(matches!(
			adapter.send_sms(&sms).await,
			Err(AdapterError::UnsupportedOperation { .. })
		));
	}
}
