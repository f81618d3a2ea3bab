//! Upstream status notification
//!
//! Reports an order's status back to the system that originated it, with a
//! signed Bearer token asserting this service's identity.

use async_trait::async_trait;
use gift_types::Order;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::token::{TokenError, TokenIssuer};

const TRACING_TARGET: &str = "vip_gift::notifier";

#[derive(Debug, Error)]
pub enum NotifierError {
	#[error("Failed to sign notification token: {0}")]
	Token(#[from] TokenError),
	#[error("Notification request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("Notification timed out after {timeout_ms}ms")]
	Timeout { timeout_ms: u64 },
	#[error("Upstream rejected notification: HTTP {status_code}: {body}")]
	Rejected { status_code: u16, body: String },
}

/// Webhook body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
	pub upstream_order_sn: String,
	pub message: String,
	pub status: i64,
	pub status_text: String,
}

impl From<&Order> for NotificationPayload {
	fn from(order: &Order) -> Self {
		Self {
			upstream_order_sn: order.order_id.clone(),
			message: order.remark.clone(),
			status: order.status.code(),
			status_text: order.status.as_str().to_string(),
		}
	}
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpstreamNotifier: Send + Sync {
	/// Deliver one notification for the order's current status
	async fn notify_order_status(&self, order: &Order) -> Result<(), NotifierError>;
}

/// Webhook notifier posting [`NotificationPayload`] to a fixed URL
pub struct HttpUpstreamNotifier {
	client: Client,
	url: String,
	timeout: Duration,
	tokens: Arc<TokenIssuer>,
}

impl HttpUpstreamNotifier {
	pub fn new(
		url: impl Into<String>,
		timeout: Duration,
		tokens: Arc<TokenIssuer>,
	) -> Result<Self, NotifierError> {
		let client = Client::builder().timeout(timeout).build()?;
		Ok(Self {
			client,
			url: url.into(),
			timeout,
			tokens,
		})
	}
}

#[async_trait]
impl UpstreamNotifier for HttpUpstreamNotifier {
	async fn notify_order_status(&self, order: &Order) -> Result<(), NotifierError> {
		let payload = NotificationPayload::from(order);
		let token = self.tokens.issue()?;

		let response = self
			.client
			.post(&self.url)
			.bearer_auth(token)
			.json(&payload)
			.send()
			.await
			.map_err(|e| {
				if e.is_timeout() {
					NotifierError::Timeout {
						timeout_ms: self.timeout.as_millis() as u64,
					}
				} else {
					NotifierError::Http(e)
				}
			})?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(NotifierError::Rejected {
				status_code: status.as_u16(),
				body,
			});
		}

		debug!(
			target: TRACING_TARGET,
			order_id = %order.order_id,
			status = %order.status,
			"Upstream notified"
		);
		Ok(())
	}
}

/// Retry policy for failed notifications
///
/// `max_retries = 0` means a single attempt. Retry `n` waits `backoff[n-1]`,
/// or the last backoff entry once the list is exhausted.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyRetryPolicy {
	pub max_retries: u32,
	pub backoff: Vec<Duration>,
}

impl Default for NotifyRetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 3,
			backoff: [2, 4, 8].into_iter().map(Duration::from_secs).collect(),
		}
	}
}

impl NotifyRetryPolicy {
	pub fn at_most_once() -> Self {
		Self {
			max_retries: 0,
			backoff: Vec::new(),
		}
	}

	pub fn delay_before_retry(&self, retry: u32) -> Duration {
		let index = (retry.max(1) - 1) as usize;
		self.backoff
			.get(index)
			.or_else(|| self.backoff.last())
			.copied()
			.unwrap_or(Duration::ZERO)
	}
}

/// Notify with retries; returns the number of attempts made on success
pub async fn notify_with_retry(
	notifier: &dyn UpstreamNotifier,
	order: &Order,
	policy: &NotifyRetryPolicy,
) -> Result<u32, NotifierError> {
	let mut attempt = 0;
	loop {
		attempt += 1;
		match notifier.notify_order_status(order).await {
			Ok(()) => return Ok(attempt),
			Err(e) if attempt > policy.max_retries => {
				error!(
					target: TRACING_TARGET,
					order_id = %order.order_id,
					attempts = attempt,
					error = %e,
					"Upstream notification abandoned"
				);
				return Err(e);
			},
			Err(e) => {
				let delay = policy.delay_before_retry(attempt);
				warn!(
					target: TRACING_TARGET,
					order_id = %order.order_id,
					attempt,
					retry_in_ms = delay.as_millis() as u64,
					error = %e,
					"Upstream notification failed, retrying"
				);
				tokio::time::sleep(delay).await;
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
	use gift_types::{OrderMessage, OrderStatus, SecretString};
	use std::sync::Mutex;

	fn order(status: OrderStatus) -> Order {
		let message = OrderMessage {
			order_id: "1001".to_string(),
			downstream_order_id: "VV-001".to_string(),
			data_json: "{}".to_string(),
			status,
			remark: status.remark().to_string(),
			commission_self: Default::default(),
			commission_parent: Default::default(),
			commission_rule: "MF".to_string(),
			channel: "VV".to_string(),
			user_sn: "U-1".to_string(),
			parent_sn: "U-0".to_string(),
			public_code: "P-1".to_string(),
		};
		Order::from_message(&message, chrono::Utc::now())
	}

	fn failing() -> NotifierError {
		NotifierError::Rejected {
			status_code: 503,
			body: "busy".to_string(),
		}
	}

	#[test]
	fn test_payload_from_order() {
		let payload = NotificationPayload::from(&order(OrderStatus::Success));
		assert_eq!(payload.upstream_order_sn, "1001");
		assert_eq!(payload.status, 200);
		assert_eq!(payload.status_text, "success");

		let json = serde_json::to_value(&payload).unwrap();
		assert!(json.get("upstreamOrderSn").is_some());
		assert!(json.get("statusText").is_some());
	}

	#[test]
	fn test_backoff_repeats_last_delay() {
		let policy = NotifyRetryPolicy::default();
		assert_eq!(policy.delay_before_retry(1), Duration::from_secs(2));
		assert_eq!(policy.delay_before_retry(3), Duration::from_secs(8));
		assert_eq!(policy.delay_before_retry(9), Duration::from_secs(8));
		assert_eq!(
			NotifyRetryPolicy::at_most_once().delay_before_retry(1),
			Duration::ZERO
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_retries_until_success() {
		let mut mock = MockUpstreamNotifier::new();
		let mut calls = 0;
		mock.expect_notify_order_status().times(3).returning(move |_| {
			calls += 1;
			if calls < 3 {
				Err(failing())
			} else {
				Ok(())
			}
		});

		let started = tokio::time::Instant::now();
		let attempts = notify_with_retry(
			&mock,
			&order(OrderStatus::Success),
			&NotifyRetryPolicy::default(),
		)
		.await
		.unwrap();

		assert_eq!(attempts, 3);
		let waited = started.elapsed();
		assert!(waited >= Duration::from_secs(6) && waited < Duration::from_secs(7));
	}

	#[tokio::test(start_paused = true)]
	async fn test_at_most_once_makes_single_attempt() {
		let mut mock = MockUpstreamNotifier::new();
		mock.expect_notify_order_status()
			.times(1)
			.returning(|_| Err(failing()));

		let result = notify_with_retry(
			&mock,
			&order(OrderStatus::Success),
			&NotifyRetryPolicy::at_most_once(),
		)
		.await;
		assert!(matches!(result, Err(NotifierError::Rejected { .. })));
	}

	#[tokio::test(start_paused = true)]
	async fn test_gives_up_after_max_retries() {
		let mut mock = MockUpstreamNotifier::new();
		mock.expect_notify_order_status()
			.times(4)
			.returning(|_| Err(failing()));

		let result = notify_with_retry(
			&mock,
			&order(OrderStatus::DownstreamFail),
			&NotifyRetryPolicy::default(),
		)
		.await;
		assert!(result.is_err());
	}

	type Received = Arc<Mutex<Vec<(Option<String>, NotificationPayload)>>>;

	async fn upstream(
		State(received): State<Received>,
		headers: HeaderMap,
		Json(payload): Json<NotificationPayload>,
	) -> StatusCode {
		let auth = headers
			.get("authorization")
			.and_then(|v| v.to_str().ok())
			.map(str::to_string);
		received.lock().unwrap().push((auth, payload));
		StatusCode::NO_CONTENT
	}

	#[tokio::test]
	async fn test_http_notifier_posts_signed_payload() {
		let received = Received::default();
		let router = Router::new()
			.route("/notify", post(upstream))
			.with_state(received.clone());
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, router).await.unwrap();
		});

		let tokens = Arc::new(TokenIssuer::new(
			SecretString::from("secret"),
			Duration::from_secs(300),
			"VIP",
		));
		let notifier = HttpUpstreamNotifier::new(
			format!("http://{}/notify", addr),
			Duration::from_secs(5),
			tokens.clone(),
		)
		.unwrap();

		notifier
			.notify_order_status(&order(OrderStatus::Success))
			.await
			.unwrap();

		let received = received.lock().unwrap();
		let (auth, payload) = &received[0];
		let token = auth.as_deref().unwrap().strip_prefix("Bearer ").unwrap();
		assert_eq!(tokens.verify(token).unwrap().user_sn, "VIP");
		assert_eq!(payload.status_text, "success");
	}

	#[tokio::test]
	async fn test_http_notifier_non_2xx_is_error() {
		let router = Router::new().route(
			"/notify",
			post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "down") }),
		);
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, router).await.unwrap();
		});

		let tokens = Arc::new(TokenIssuer::new(
			SecretString::from("secret"),
			Duration::from_secs(300),
			"VIP",
		));
		let notifier =
			HttpUpstreamNotifier::new(format!("http://{}/notify", addr), Duration::from_secs(5), tokens)
				.unwrap();

		match notifier
			.notify_order_status(&order(OrderStatus::Success))
			.await
		{
			Err(NotifierError::Rejected { status_code, body }) => {
				assert_eq!(status_code, 500);
				assert_eq!(body, "down");
			},
			other => panic!("expected rejection, got {:?}", other),
		}
	}
}
