//! Shared domain models used across entities

pub mod commission;
pub mod partner_marker;
pub mod secret_string;

pub use commission::CommissionSplit;
pub use partner_marker::{PartnerMarker, PartnerMarkerError};
pub use secret_string::SecretString;
