//! Shared fixtures for the integration suites
//!
//! In-process axum servers stand in for the Gift partner and the upstream
//! webhook, recording every request they receive.

pub mod fixtures;
pub mod partner;
pub mod upstream;

#[allow(unused_imports)]
pub use fixtures::{bearer, test_settings, wait_for, TEST_SECRET};
#[allow(unused_imports)]
pub use partner::MockGiftPartner;
#[allow(unused_imports)]
pub use upstream::MockUpstream;

use axum::Router;

/// Serve a router on an ephemeral local port and return its base URL
pub async fn serve(router: Router) -> String {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, router).await.unwrap();
	});
	format!("http://{}", addr)
}
