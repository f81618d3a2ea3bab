//! Order status enumeration
//!
//! The wire form is the dotted string (`"fail.upstream"`); the numeric
//! code is what the upstream webhook and the Charge partner speak.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::OrderError;

/// Lifecycle status of an order
///
/// Intended path: `init -> pending -> {success | fail.downstream | fail.upstream}`.
/// The store does not enforce transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
	#[default]
	#[serde(rename = "init")]
	Init,
	#[serde(rename = "pending")]
	Pending,
	#[serde(rename = "success")]
	Success,
	#[serde(rename = "fail.downstream")]
	DownstreamFail,
	#[serde(rename = "fail.upstream")]
	UpstreamFail,
}

impl OrderStatus {
	/// Numeric status code used on the webhook and by the Charge partner
	pub fn code(&self) -> i64 {
		match self {
			OrderStatus::Init => 0,
			OrderStatus::Pending => 100,
			OrderStatus::Success => 200,
			OrderStatus::DownstreamFail => 400,
			OrderStatus::UpstreamFail => 500,
		}
	}

	/// Reverse of [`OrderStatus::code`]
	pub fn from_code(code: i64) -> Option<Self> {
		match code {
			0 => Some(OrderStatus::Init),
			100 => Some(OrderStatus::Pending),
			200 => Some(OrderStatus::Success),
			400 => Some(OrderStatus::DownstreamFail),
			500 => Some(OrderStatus::UpstreamFail),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Init => "init",
			OrderStatus::Pending => "pending",
			OrderStatus::Success => "success",
			OrderStatus::DownstreamFail => "fail.downstream",
			OrderStatus::UpstreamFail => "fail.upstream",
		}
	}

	/// Default human readable remark stored alongside a status
	pub fn remark(&self) -> &'static str {
		match self {
			OrderStatus::Init => "order initialized",
			OrderStatus::Pending => "order in progress",
			OrderStatus::Success => "order fulfilled",
			OrderStatus::DownstreamFail => "order failed downstream",
			OrderStatus::UpstreamFail => "order failed upstream",
		}
	}

	/// Whether reconciliation can stop for this order
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			OrderStatus::Success | OrderStatus::DownstreamFail | OrderStatus::UpstreamFail
		)
	}

	/// Whether the order still awaits a partner outcome
	pub fn is_open(&self) -> bool {
		!self.is_terminal()
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = OrderError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"init" => Ok(OrderStatus::Init),
			"pending" => Ok(OrderStatus::Pending),
			"success" => Ok(OrderStatus::Success),
			"fail.downstream" => Ok(OrderStatus::DownstreamFail),
			"fail.upstream" => Ok(OrderStatus::UpstreamFail),
			other => Err(OrderError::UnknownStatus {
				value: other.to_string(),
			}),
		}
	}
}
