//! Mock upstream webhook recording notifications and their bearer tokens

use axum::{
	extract::State,
	http::{HeaderMap, StatusCode},
	routing::post,
	Json, Router,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct ReceivedNotification {
	pub authorization: Option<String>,
	pub body: Value,
}

#[derive(Default)]
struct UpstreamState {
	received: Mutex<Vec<ReceivedNotification>>,
	failures_left: AtomicU32,
}

#[derive(Clone)]
pub struct MockUpstream {
	pub url: String,
	state: Arc<UpstreamState>,
}

#[allow(dead_code)]
impl MockUpstream {
	pub async fn spawn() -> Self {
		Self::spawn_failing(0).await
	}

	/// Answer the first `failures` notifications with a 500
	pub async fn spawn_failing(failures: u32) -> Self {
		let state = Arc::new(UpstreamState::default());
		state.failures_left.store(failures, Ordering::SeqCst);
		let router = Router::new()
			.route("/notify", post(notify))
			.with_state(state.clone());
		let base = super::serve(router).await;
		Self {
			url: format!("{}/notify", base),
			state,
		}
	}

	pub fn received(&self) -> Vec<ReceivedNotification> {
		self.state.received.lock().unwrap().clone()
	}
}

async fn notify(
	State(state): State<Arc<UpstreamState>>,
	headers: HeaderMap,
	Json(body): Json<Value>,
) -> StatusCode {
	state.received.lock().unwrap().push(ReceivedNotification {
		authorization: headers
			.get("authorization")
			.and_then(|v| v.to_str().ok())
			.map(str::to_string),
		body,
	});
	let failing = state
		.failures_left
		.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
		.is_ok();
	if failing {
		StatusCode::INTERNAL_SERVER_ERROR
	} else {
		StatusCode::OK
	}
}
