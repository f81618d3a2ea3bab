//! Order handlers
//!
//! Every route answers with the `{code, message, data}` envelope. Malformed
//! JSON bodies are reported as 400 in the same envelope.
use axum::{
	extract::{rejection::JsonRejection, State},
	http::HeaderMap,
	response::Json,
	Extension,
};
use gift_service::{Claims, OrderStatusView};
use gift_types::{
	Order, OrderCreateRequest, OrderListQuery, OrderUpdateMessage, PartnerCreateResponse,
	SmsRequest,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::handlers::common::{ApiError, ApiResponse, ApiResult};
use crate::state::AppState;

const TRACING_TARGET: &str = "vip_gift::api";

// Header names are case-insensitive; lookups use the lowercase form
const PARTNER_ID_HEADER: (&str, &str) = ("partnerid", "partnerId");
const PARENT_SN_HEADER: (&str, &str) = ("parentsn", "parentSn");

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
	payload
		.map(|Json(value)| value)
		.map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn required_header(headers: &HeaderMap, (key, name): (&str, &str)) -> Result<String, ApiError> {
	headers
		.get(key)
		.and_then(|v| v.to_str().ok())
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.map(str::to_string)
		.ok_or_else(|| ApiError::unauthorized(format!("{} is required", name)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreateResponse {
	pub order_id: String,
	pub status: i64,
	pub status_text: String,
	pub message: String,
}

/// POST /orders/create - Accept an order and publish it for fulfillment
pub async fn create_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	payload: Result<Json<OrderCreateRequest>, JsonRejection>,
) -> ApiResult<OrderCreateResponse> {
	let mut request = body(payload)?;
	request.partner_id = required_header(&headers, PARTNER_ID_HEADER)?;
	request.parent_sn = required_header(&headers, PARENT_SN_HEADER)?;

	let message = state.order_service.submit_order(&request).await?;
	info!(
		target: TRACING_TARGET,
		order_id = %message.order_id,
		downstream_order_id = %message.downstream_order_id,
		"Order submitted"
	);

	Ok(ApiResponse::success(OrderCreateResponse {
		order_id: message.order_id,
		status: message.status.code(),
		status_text: message.status.as_str().to_string(),
		message: message.status.remark().to_string(),
	}))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLookupRequest {
	#[serde(default)]
	pub order_id: Option<String>,
	#[serde(default)]
	pub downstream_order_id: Option<String>,
}

/// POST /orders/one - One order by order id or downstream id
pub async fn get_one_order(
	State(state): State<AppState>,
	payload: Result<Json<OrderLookupRequest>, JsonRejection>,
) -> ApiResult<Order> {
	let lookup = body(payload)?;
	let order = state
		.order_service
		.find_order(
			lookup.order_id.as_deref(),
			lookup.downstream_order_id.as_deref(),
		)
		.await?;
	Ok(ApiResponse::success(order))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListResponse {
	pub total: usize,
	pub data_list: Vec<Order>,
}

/// POST /orders/list - Page through orders, newest first
pub async fn list_orders(
	State(state): State<AppState>,
	payload: Result<Json<OrderListQuery>, JsonRejection>,
) -> ApiResult<OrderListResponse> {
	let query = body(payload)?;
	let page = state.order_service.list_orders(&query).await?;
	debug!(
		target: TRACING_TARGET,
		page = page.page,
		size = page.size,
		total = page.total,
		"Listed orders"
	);
	Ok(ApiResponse::success(OrderListResponse {
		total: page.total,
		data_list: page.items,
	}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQueryRequest {
	/// Downstream order ids
	#[serde(default)]
	pub order_ids: Vec<String>,
}

/// POST /orders/query - Refresh order status from the partners
pub async fn query_orders(
	State(state): State<AppState>,
	payload: Result<Json<OrderQueryRequest>, JsonRejection>,
) -> ApiResult<Vec<OrderStatusView>> {
	let request = body(payload)?;
	if request.order_ids.is_empty() {
		return Err(ApiError::bad_request("orderIds is required"));
	}
	let views = state.order_service.query_orders(&request.order_ids).await?;
	Ok(ApiResponse::success(views))
}

/// POST /orders/update_status - Publish a partial status update
///
/// Restricted to the privileged caller. A downstream id alone is resolved to
/// its order id before publishing.
pub async fn update_order_status(
	State(state): State<AppState>,
	Extension(claims): Extension<Claims>,
	payload: Result<Json<OrderUpdateMessage>, JsonRejection>,
) -> ApiResult<OrderUpdateMessage> {
	if claims.user_sn != state.privileged_caller {
		warn!(
			target: TRACING_TARGET,
			user_sn = %claims.user_sn,
			"Status update refused for unprivileged caller"
		);
		return Err(ApiError::unauthorized(format!(
			"userSn must be '{}'",
			state.privileged_caller
		)));
	}

	let mut update = body(payload)?;
	let has_order_id = update.order_id.as_deref().is_some_and(|id| !id.is_empty());
	if !has_order_id {
		let downstream_order_id = update
			.downstream_order_id
			.clone()
			.filter(|id| !id.is_empty())
			.ok_or_else(|| {
				ApiError::bad_request("Either orderId or downstreamOrderId is required")
			})?;
		let order = state
			.order_service
			.find_order(None, Some(&downstream_order_id))
			.await?;
		update.order_id = Some(order.order_id);
	}

	state.order_service.publish_order_update(&update).await?;
	Ok(ApiResponse::success(update))
}

/// POST /orders/sms - Ask the partner to send the verification SMS
pub async fn send_sms(
	State(state): State<AppState>,
	payload: Result<Json<SmsRequest>, JsonRejection>,
) -> ApiResult<PartnerCreateResponse> {
	let request = body(payload)?;
	let response = state.order_service.send_sms(&request).await?;
	Ok(ApiResponse::success(response))
}
