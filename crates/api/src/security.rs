//! Bearer authentication and security response headers

use axum::{
	extract::{Request, State},
	http::header::{HeaderName, HeaderValue, AUTHORIZATION},
	middleware::Next,
	response::Response,
	Router,
};
use gift_service::TokenError;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::debug;

use crate::handlers::common::ApiError;
use crate::state::AppState;

const TRACING_TARGET: &str = "vip_gift::api::auth";

/// Require a valid Bearer token and expose its claims to handlers
///
/// The verified `Claims` are inserted as a request extension.
pub async fn require_bearer(
	State(state): State<AppState>,
	mut request: Request,
	next: Next,
) -> Result<Response, ApiError> {
	let token = request
		.headers()
		.get(AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "))
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.ok_or_else(|| ApiError::unauthorized("Missing or malformed JWT"))?;

	let claims = state.tokens.verify(token).map_err(|e| {
		debug!(
			target: TRACING_TARGET,
			path = %request.uri().path(),
			error = %e,
			"Bearer token rejected"
		);
		match e {
			TokenError::Expired => ApiError::unauthorized("Token expired"),
			TokenError::MissingClaim { claim } => {
				ApiError::unauthorized(format!("Missing {}", claim))
			},
			other => ApiError::unauthorized(other.to_string()),
		}
	})?;

	request.extensions_mut().insert(claims);
	Ok(next.run(request).await)
}

/// Default security headers, set only when a handler has not set them
pub fn add_security_headers<S>(router: Router<S>) -> Router<S>
where
	S: Clone + Send + Sync + 'static,
{
	router.layer(
		ServiceBuilder::new()
			.layer(SetResponseHeaderLayer::if_not_present(
				HeaderName::from_static("x-content-type-options"),
				HeaderValue::from_static("nosniff"),
			))
			.layer(SetResponseHeaderLayer::if_not_present(
				HeaderName::from_static("x-frame-options"),
				HeaderValue::from_static("DENY"),
			))
			.layer(SetResponseHeaderLayer::if_not_present(
				HeaderName::from_static("referrer-policy"),
				HeaderValue::from_static("no-referrer"),
			))
			.layer(SetResponseHeaderLayer::if_not_present(
				HeaderName::from_static("cache-control"),
				HeaderValue::from_static("no-store"),
			)),
	)
}
