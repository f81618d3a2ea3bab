pub mod common;
pub mod health;
pub mod orders;

pub use health::health;
pub use orders::{
	create_order, get_one_order, list_orders, query_orders, send_sms, update_order_status,
};
