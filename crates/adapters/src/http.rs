//! HTTP plumbing shared by the partner adapters

use gift_types::{AdapterError, AdapterResult};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

const TRACING_TARGET: &str = "vip_gift::adapters";
const USER_AGENT: &str = "VIP-Gift-Orchestrator/1.0";

/// Partner response envelope (`{code, message, data}`)
#[derive(Debug, Clone, Deserialize)]
pub struct PartnerEnvelope<T> {
	pub code: i64,
	#[serde(default)]
	pub message: String,
	pub data: Option<T>,
}

impl<T> PartnerEnvelope<T> {
	pub fn is_ok(&self) -> bool {
		self.code == 200
	}
}

/// Partner payload wrapper stored as the order's `dataJSON`
///
/// `body` is the partner specific request; `extra` carries the caller's
/// own opaque payload through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BizPayload<T> {
	pub body: T,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub extra: String,
}

/// Build the client a single adapter uses for every call
pub fn build_client(timeout: Duration) -> AdapterResult<Client> {
	Client::builder()
		.timeout(timeout)
		.user_agent(USER_AGENT)
		.build()
		.map_err(AdapterError::HttpError)
}

/// Reject endpoints that are not absolute http(s) URLs
pub fn validate_endpoint(name: &str, endpoint: &str) -> AdapterResult<()> {
	let url = Url::parse(endpoint).map_err(|e| AdapterError::ConfigError {
		reason: format!("Invalid {} '{}': {}", name, endpoint, e),
	})?;
	if !matches!(url.scheme(), "http" | "https") {
		return Err(AdapterError::ConfigError {
			reason: format!("{} must be http or https, got '{}'", name, endpoint),
		});
	}
	Ok(())
}

/// POST a JSON body and return the raw response body on a 2xx status
pub async fn post_json<B>(
	client: &Client,
	url: &str,
	body: &B,
	timeout: Duration,
) -> AdapterResult<String>
where
	B: Serialize + ?Sized,
{
	let response = client
		.post(url)
		.json(body)
		.send()
		.await
		.map_err(|e| map_send_error(e, timeout))?;

	let status = response.status();
	let text = match response.text().await {
		Ok(text) => text,
		Err(e) if status.is_success() => return Err(map_send_error(e, timeout)),
		Err(e) => format!("<unreadable body: {}>", e),
	};
	debug!(
		target: TRACING_TARGET,
		url = %url,
		status = status.as_u16(),
		bytes = text.len(),
		"Partner endpoint responded"
	);

	if !status.is_success() {
		return Err(AdapterError::HttpStatusError {
			status_code: status.as_u16(),
			body: text,
		});
	}
	Ok(text)
}

/// Parse a partner response body, keeping the body in the error
pub fn parse_body<T: DeserializeOwned>(body: &str, what: &str) -> AdapterResult<T> {
	serde_json::from_str(body).map_err(|e| AdapterError::InvalidResponse {
		reason: format!("Failed to parse {} response: {} (body: {})", what, e, body),
	})
}

fn map_send_error(error: reqwest::Error, timeout: Duration) -> AdapterError {
	if error.is_timeout() {
		AdapterError::Timeout {
			timeout_ms: timeout.as_millis() as u64,
		}
	} else {
		AdapterError::HttpError(error)
	}
}
