use axum::{
	middleware,
	routing::{get, post},
	Router,
};
use tower::ServiceBuilder;
use tower_http::{
	compression::CompressionLayer,
	cors::CorsLayer,
	limit::RequestBodyLimitLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	trace::TraceLayer,
};
use tracing::Level;

use crate::handlers::{
	create_order, get_one_order, health, list_orders, query_orders, send_sms,
	update_order_status,
};
use crate::security::{add_security_headers, require_bearer};
use crate::state::AppState;

/// Path prefix of the authenticated order routes
pub const API_PREFIX: &str = "/api/product/gift";

pub fn create_router(state: AppState, body_limit_bytes: usize) -> Router {
	let cors = CorsLayer::permissive();
	let body_limit = RequestBodyLimitLayer::new(body_limit_bytes);
	let trace = TraceLayer::new_for_http()
		.make_span_with(|req: &axum::http::Request<_>| {
			let req_id = req
				.headers()
				.get("x-request-id")
				.and_then(|v| v.to_str().ok())
				.unwrap_or("-");
			tracing::info_span!(
				"http_request",
				method = %req.method(),
				uri = %req.uri(),
				req_id
			)
		})
		.on_request(tower_http::trace::DefaultOnRequest::new().level(Level::INFO))
		.on_response(
			tower_http::trace::DefaultOnResponse::new()
				.level(Level::INFO)
				.latency_unit(tower_http::LatencyUnit::Millis),
		);
	let req_id = ServiceBuilder::new()
		.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
		.layer(PropagateRequestIdLayer::x_request_id());

	let orders = Router::new()
		.route("/orders/create", post(create_order))
		.route("/orders/one", post(get_one_order))
		.route("/orders/list", post(list_orders))
		.route("/orders/query", post(query_orders))
		.route("/orders/update_status", post(update_order_status))
		.route("/orders/sms", post(send_sms))
		.route_layer(middleware::from_fn_with_state(
			state.clone(),
			require_bearer,
		));

	let router = Router::new()
		.route("/health", get(health))
		.nest(API_PREFIX, orders)
		.layer(cors)
		.layer(CompressionLayer::new())
		.layer(trace)
		.layer(req_id)
		.layer(body_limit)
		.with_state(state);

	add_security_headers(router)
}
