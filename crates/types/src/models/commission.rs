//! Commission split between the buyer and their referrer

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Commission split of a product's commission rate
///
/// `self_share + parent_share` always equals the rate exactly; the parent
/// share is computed as the remainder instead of a second multiplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionSplit {
	pub self_share: Decimal,
	pub parent_share: Decimal,
}

impl CommissionSplit {
	/// Split `rate`, giving `self_ratio` of it to the buyer
	pub fn split(rate: Decimal, self_ratio: Decimal) -> Self {
		let self_share = rate * self_ratio;
		Self {
			self_share,
			parent_share: rate - self_share,
		}
	}

	pub fn zero() -> Self {
		Self {
			self_share: Decimal::ZERO,
			parent_share: Decimal::ZERO,
		}
	}

	pub fn total(&self) -> Decimal {
		self.self_share + self.parent_share
	}
}
