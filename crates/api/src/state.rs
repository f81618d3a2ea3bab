use std::sync::Arc;

use gift_service::{OrderService, TokenIssuer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
	pub order_service: Arc<OrderService>,
	pub tokens: Arc<TokenIssuer>,
	/// `userSn` allowed to publish status updates
	pub privileged_caller: String,
}
