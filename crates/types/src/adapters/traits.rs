//! Core adapter trait implemented once per partner family

use async_trait::async_trait;
use std::fmt::Debug;

use super::{AdapterError, AdapterResult, PartnerCreateResponse, PartnerOrderState, SmsRequest};
use crate::{OrderCreateRequest, OrderMessage, OrderStatus, PartnerMarker};

/// Partner-specific wire formats and status mappings
///
/// One implementation per partner family; the registry routes to it by the
/// [`PartnerMarker`] at the front of the downstream order id.
#[async_trait]
pub trait PartnerAdapter: Send + Sync + Debug {
	/// Stable adapter identifier, used in logs and errors
	fn id(&self) -> &str;

	/// Marker of the downstream ids this adapter serves
	fn marker(&self) -> PartnerMarker;

	/// Wrap an intake request into a creation message
	///
	/// Fills the partner payload, the commission split and the channel tag.
	/// The order id is left empty for intake to assign.
	async fn translate_request(&self, request: &OrderCreateRequest) -> AdapterResult<OrderMessage>;

	/// Create the order on the partner platform
	async fn create_remote_order(&self, order: &OrderMessage)
		-> AdapterResult<PartnerCreateResponse>;

	/// Query the partner for the current state of the given downstream ids
	async fn query_remote_orders(
		&self,
		downstream_order_ids: &[String],
	) -> AdapterResult<Vec<PartnerOrderState>>;

	/// Map a partner status code to the internal status
	///
	/// Total over every input: unknown codes map to a defined fallback.
	fn map_status(&self, partner_status: i64) -> OrderStatus;

	/// Send a verification SMS for an order
	///
	/// Default implementation returns UnsupportedOperation error.
	async fn send_sms(&self, _request: &SmsRequest) -> AdapterResult<PartnerCreateResponse> {
		Err(AdapterError::UnsupportedOperation {
			operation: "send_sms".to_string(),
			adapter_id: self.id().to_string(),
		})
	}
}
