//! Partner adapter contracts

pub mod errors;
pub mod models;
pub mod traits;

pub use errors::AdapterError;
pub use models::{PartnerCreateResponse, PartnerOrderState, SmsRequest};
pub use traits::PartnerAdapter;

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;
