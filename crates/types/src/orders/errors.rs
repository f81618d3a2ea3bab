//! Error types for order operations

use thiserror::Error;

/// Order validation and conversion errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
	#[error("Missing required field: {field}")]
	MissingRequiredField { field: String },

	#[error("Invalid field {field}: {reason}")]
	InvalidField { field: String, reason: String },

	#[error("Unknown order status: {value}")]
	UnknownStatus { value: String },

	#[error("Immutable field {field} cannot change from '{stored}' to '{incoming}'")]
	ImmutableFieldChanged {
		field: String,
		stored: String,
		incoming: String,
	},
}

pub type OrderResult<T> = Result<T, OrderError>;
