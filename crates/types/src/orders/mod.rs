//! Core Order domain model and business logic

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod errors;
pub mod status;

pub use errors::{OrderError, OrderResult};
pub use status::OrderStatus;

/// Commission rule applied to every gift and top-up order (instant payout)
pub const COMMISSION_RULE_MF: &str = "MF";

/// Order record as persisted by the order store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Internally generated identifier
	pub order_id: String,
	/// Caller supplied correlation key, immutable once stored
	pub downstream_order_id: String,
	/// Opaque partner payload (`{"body": ..., "extra": ...}`)
	#[serde(rename = "dataJSON")]
	pub data_json: String,
	pub status: OrderStatus,
	pub remark: String,
	pub commission_self: Decimal,
	pub commission_parent: Decimal,
	pub commission_rule: String,
	/// Partner marker the order was routed with (`VV`, `VF`)
	pub channel: String,
	pub user_sn: String,
	pub parent_sn: String,
	pub public_code: String,

	// Sub-status fields, only written by update messages
	pub trade_status: String,
	pub refund_status: String,
	pub delivery_status: i64,
	pub settlement_status: i64,

	/// Highest reconciliation attempt number handed out so far
	#[serde(default)]
	pub attempts_issued: u32,
	/// Highest reconciliation attempt whose result has been applied
	pub reconcile_attempt: u32,
	/// Last status the upstream system accepted a notification for
	#[serde(default)]
	pub notified_status: Option<OrderStatus>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Message carried on the order creation topic
///
/// This is also the order snapshot handed to partner adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMessage {
	#[serde(default)]
	pub order_id: String,
	pub downstream_order_id: String,
	#[serde(rename = "dataJSON", default)]
	pub data_json: String,
	#[serde(default)]
	pub status: OrderStatus,
	#[serde(default)]
	pub remark: String,
	#[serde(default)]
	pub commission_self: Decimal,
	#[serde(default)]
	pub commission_parent: Decimal,
	#[serde(default)]
	pub commission_rule: String,
	#[serde(default)]
	pub channel: String,
	#[serde(default)]
	pub user_sn: String,
	#[serde(default)]
	pub parent_sn: String,
	#[serde(default)]
	pub public_code: String,
}

/// Message carried on the order update topic
///
/// Every field is optional; only present and non-zero values are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdateMessage {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub order_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub downstream_order_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub trade_status: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refund_status: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub delivery_status: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub settlement_status: Option<i64>,
}

/// Order creation request as received at intake
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreateRequest {
	#[serde(default)]
	pub phone: String,
	#[serde(default)]
	pub public_code: String,
	#[serde(default)]
	pub downstream_order_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub otac: Option<String>,
	#[serde(rename = "dataJSON", default, skip_serializing_if = "Option::is_none")]
	pub data_json: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub amount: Option<Decimal>,
	/// Caller identity, taken from request headers rather than the body
	#[serde(default, skip_serializing)]
	pub partner_id: String,
	#[serde(default, skip_serializing)]
	pub parent_sn: String,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
	value.as_deref().filter(|v| !v.is_empty())
}

impl OrderMessage {
	/// Validate the fields intake requires before publishing
	pub fn validate(&self) -> OrderResult<()> {
		if self.downstream_order_id.trim().is_empty() {
			return Err(OrderError::MissingRequiredField {
				field: "downstreamOrderId".to_string(),
			});
		}
		Ok(())
	}

	/// Replace an empty payload with an empty JSON object
	pub fn normalize_payload(&mut self) {
		if self.data_json.trim().is_empty() {
			self.data_json = "{}".to_string();
		}
	}

	/// Commission total carried by this message
	pub fn commission_total(&self) -> Decimal {
		self.commission_self + self.commission_parent
	}
}

impl Order {
	/// Build a fresh record from a creation message
	pub fn from_message(message: &OrderMessage, now: DateTime<Utc>) -> Self {
		Self {
			order_id: message.order_id.clone(),
			downstream_order_id: message.downstream_order_id.clone(),
			data_json: message.data_json.clone(),
			status: message.status,
			remark: message.remark.clone(),
			commission_self: message.commission_self,
			commission_parent: message.commission_parent,
			commission_rule: message.commission_rule.clone(),
			channel: message.channel.clone(),
			user_sn: message.user_sn.clone(),
			parent_sn: message.parent_sn.clone(),
			public_code: message.public_code.clone(),
			trade_status: String::new(),
			refund_status: String::new(),
			delivery_status: 0,
			settlement_status: 0,
			attempts_issued: 0,
			reconcile_attempt: 0,
			notified_status: None,
			created_at: now,
			updated_at: now,
		}
	}

	/// Snapshot of this record in creation message form
	pub fn to_message(&self) -> OrderMessage {
		OrderMessage {
			order_id: self.order_id.clone(),
			downstream_order_id: self.downstream_order_id.clone(),
			data_json: self.data_json.clone(),
			status: self.status,
			remark: self.remark.clone(),
			commission_self: self.commission_self,
			commission_parent: self.commission_parent,
			commission_rule: self.commission_rule.clone(),
			channel: self.channel.clone(),
			user_sn: self.user_sn.clone(),
			parent_sn: self.parent_sn.clone(),
			public_code: self.public_code.clone(),
		}
	}

	/// Check that a message refers to this same record
	///
	/// Neither identifier may change once persisted.
	pub fn check_identity(&self, message: &OrderMessage) -> OrderResult<()> {
		if self.order_id != message.order_id {
			return Err(OrderError::ImmutableFieldChanged {
				field: "orderId".to_string(),
				stored: self.order_id.clone(),
				incoming: message.order_id.clone(),
			});
		}
		if self.downstream_order_id != message.downstream_order_id {
			return Err(OrderError::ImmutableFieldChanged {
				field: "downstreamOrderId".to_string(),
				stored: self.downstream_order_id.clone(),
				incoming: message.downstream_order_id.clone(),
			});
		}
		Ok(())
	}

	/// Terminal, but upstream has not accepted this status yet
	pub fn awaits_report(&self) -> bool {
		self.status.is_terminal() && self.notified_status != Some(self.status)
	}

	/// Overwrite the mutable fields from a redelivered creation message
	pub fn merge_mutable(&mut self, message: &OrderMessage, now: DateTime<Utc>) -> OrderResult<()> {
		self.check_identity(message)?;
		self.status = message.status;
		self.remark = message.remark.clone();
		self.updated_at = now;
		Ok(())
	}

	/// Apply a partial update; returns whether any field changed
	pub fn apply_update(&mut self, update: &OrderUpdateMessage, now: DateTime<Utc>) -> bool {
		let mut changed = false;

		if let Some(trade_status) = non_empty(&update.trade_status) {
			self.trade_status = trade_status.to_string();
			changed = true;
		}
		if let Some(refund_status) = non_empty(&update.refund_status) {
			self.refund_status = refund_status.to_string();
			changed = true;
		}
		if let Some(delivery_status) = update.delivery_status.filter(|v| *v > 0) {
			self.delivery_status = delivery_status;
			changed = true;
		}
		if let Some(settlement_status) = update.settlement_status.filter(|v| *v != 0) {
			self.settlement_status = settlement_status;
			changed = true;
		}

		if changed {
			self.updated_at = now;
		}
		changed
	}
}

impl OrderUpdateMessage {
	/// Key used to locate the stored order: downstream id first, then order id
	pub fn lookup_key(&self) -> Option<(&str, bool)> {
		if let Some(downstream_id) = non_empty(&self.downstream_order_id) {
			return Some((downstream_id, true));
		}
		non_empty(&self.order_id).map(|order_id| (order_id, false))
	}

	/// Whether the message carries at least one mergeable field
	pub fn has_changes(&self) -> bool {
		non_empty(&self.trade_status).is_some()
			|| non_empty(&self.refund_status).is_some()
			|| self.delivery_status.is_some_and(|v| v > 0)
			|| self.settlement_status.is_some_and(|v| v != 0)
	}
}

impl OrderCreateRequest {
	/// Validate the fields every partner needs
	pub fn validate(&self) -> OrderResult<()> {
		if self.downstream_order_id.trim().is_empty() {
			return Err(OrderError::MissingRequiredField {
				field: "downstreamOrderId".to_string(),
			});
		}
		if self.public_code.trim().is_empty() {
			return Err(OrderError::MissingRequiredField {
				field: "publicCode".to_string(),
			});
		}
		Ok(())
	}
}
