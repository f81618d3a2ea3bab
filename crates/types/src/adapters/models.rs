//! Partner-neutral request and response models

use serde::{Deserialize, Serialize};

/// Outcome of a partner create call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerCreateResponse {
	/// Partner side order id, when the partner returns one
	#[serde(default)]
	pub order_id: Option<String>,
	#[serde(default)]
	pub status: Option<i64>,
	#[serde(default)]
	pub message: Option<String>,
}

/// One row of a partner query response
///
/// `status` is in the partner's own vocabulary; the adapter that produced
/// the row maps it to an [`crate::OrderStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerOrderState {
	#[serde(default)]
	pub order_id: Option<String>,
	#[serde(default)]
	pub downstream_order_id: Option<String>,
	pub status: i64,
	#[serde(default)]
	pub message: Option<String>,
	#[serde(default)]
	pub data: Option<serde_json::Value>,
}

/// Request to push a verification SMS through the partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsRequest {
	pub phone: String,
	pub public_code: String,
	pub downstream_order_id: String,
}

impl PartnerOrderState {
	/// Whether this row describes the given downstream order
	pub fn matches(&self, downstream_order_id: &str) -> bool {
		self.downstream_order_id.as_deref() == Some(downstream_order_id)
			|| self.order_id.as_deref() == Some(downstream_order_id)
	}
}
