//! Partner routing discriminant
//!
//! Every downstream order id starts with a run of uppercase ASCII letters
//! naming the partner family that fulfills it (`VV-001` is routed to `VV`).
//! The marker is that whole leading run, never a substring match, so `VVX-1`
//! routes to `VVX` and not to `VV`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Marker of the Gift partner family
pub const GIFT_MARKER: &str = "VV";
/// Marker of the Charge partner family
pub const CHARGE_MARKER: &str = "VF";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartnerMarkerError {
	#[error("Partner marker must be non-empty uppercase ASCII, got '{value}'")]
	Invalid { value: String },
}

/// Well-formed partner discriminant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartnerMarker(String);

impl PartnerMarker {
	/// Create a marker, rejecting anything that is not uppercase ASCII
	pub fn new(value: impl Into<String>) -> Result<Self, PartnerMarkerError> {
		let value = value.into();
		if value.is_empty() || !value.bytes().all(|b| b.is_ascii_uppercase()) {
			return Err(PartnerMarkerError::Invalid { value });
		}
		Ok(Self(value))
	}

	/// Extract the marker from a downstream order id
	///
	/// Returns `None` when the id does not start with an uppercase letter.
	pub fn from_downstream_id(downstream_order_id: &str) -> Option<Self> {
		let trimmed = downstream_order_id.trim();
		let end = trimmed
			.bytes()
			.position(|b| !b.is_ascii_uppercase())
			.unwrap_or(trimmed.len());
		if end == 0 {
			return None;
		}
		Some(Self(trimmed[..end].to_string()))
	}

	pub fn gift() -> Self {
		Self(GIFT_MARKER.to_string())
	}

	pub fn charge() -> Self {
		Self(CHARGE_MARKER.to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PartnerMarker {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl TryFrom<String> for PartnerMarker {
	type Error = PartnerMarkerError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl From<PartnerMarker> for String {
	fn from(marker: PartnerMarker) -> Self {
		marker.0
	}
}
