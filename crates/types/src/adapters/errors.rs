//! Error types for partner adapter operations

use thiserror::Error;

/// Partner adapter operation errors
///
/// Adapters never retry; every failure surfaces to the caller with the
/// upstream status or body attached where one exists.
#[derive(Error, Debug)]
pub enum AdapterError {
	#[error("HTTP request failed: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("HTTP {status_code}: {body}")]
	HttpStatusError { status_code: u16, body: String },

	#[error("Invalid response format: {reason}")]
	InvalidResponse { reason: String },

	#[error("Partner rejected request: code={code} message={message}")]
	PartnerRejected { code: i64, message: String },

	#[error("Timeout occurred after {timeout_ms}ms")]
	Timeout { timeout_ms: u64 },

	#[error("Product {public_code} has no partner base code")]
	ProductNotFound { public_code: String },

	#[error("Invalid order for {adapter_id}: {reason}")]
	InvalidOrder { adapter_id: String, reason: String },

	#[error("Configuration error: {reason}")]
	ConfigError { reason: String },

	#[error("Unsupported operation: {operation} for adapter {adapter_id}")]
	UnsupportedOperation {
		operation: String,
		adapter_id: String,
	},

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl AdapterError {
	/// Extract HTTP status code from the error if available
	pub fn status_code(&self) -> Option<u16> {
		match self {
			AdapterError::HttpStatusError { status_code, .. } => Some(*status_code),
			AdapterError::HttpError(reqwest_error) => {
				reqwest_error.status().map(|status| status.as_u16())
			},
			_ => None,
		}
	}

	/// Whether a later attempt might succeed
	pub fn is_transient(&self) -> bool {
		match self {
			AdapterError::HttpError(_) | AdapterError::Timeout { .. } => true,
			AdapterError::HttpStatusError { status_code, .. } => *status_code >= 500,
			_ => false,
		}
	}
}
