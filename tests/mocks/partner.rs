//! Mock Gift partner: create, query and SMS endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct PartnerState {
	creates: Mutex<Vec<Value>>,
	queries: Mutex<Vec<Value>>,
	query_status: AtomicI64,
	reject_creates: AtomicBool,
}

#[derive(Clone)]
pub struct MockGiftPartner {
	pub base_url: String,
	state: Arc<PartnerState>,
}

#[allow(dead_code)]
impl MockGiftPartner {
	/// Spawn a partner answering queries with the given partner status code
	pub async fn spawn(query_status: i64) -> Self {
		let state = Arc::new(PartnerState::default());
		state.query_status.store(query_status, Ordering::SeqCst);

		let router = Router::new()
			.route("/create", post(create))
			.route("/query", post(query))
			.route("/sms", post(sms))
			.with_state(state.clone());
		let base_url = super::serve(router).await;
		Self { base_url, state }
	}

	pub fn create_url(&self) -> String {
		format!("{}/create", self.base_url)
	}

	pub fn query_url(&self) -> String {
		format!("{}/query", self.base_url)
	}

	pub fn sms_url(&self) -> String {
		format!("{}/sms", self.base_url)
	}

	pub fn set_query_status(&self, status: i64) {
		self.state.query_status.store(status, Ordering::SeqCst);
	}

	/// Answer creates with a 503 from now on
	pub fn reject_creates(&self) {
		self.state.reject_creates.store(true, Ordering::SeqCst);
	}

	pub fn creates(&self) -> Vec<Value> {
		self.state.creates.lock().unwrap().clone()
	}

	pub fn queries(&self) -> Vec<Value> {
		self.state.queries.lock().unwrap().clone()
	}
}

async fn create(State(state): State<Arc<PartnerState>>, Json(body): Json<Value>) -> impl IntoResponse {
	state.creates.lock().unwrap().push(body);
	if state.reject_creates.load(Ordering::SeqCst) {
		return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "maintenance"})));
	}
	(
		StatusCode::OK,
		Json(json!({"orderId": "G-1", "status": 20, "message": "accepted"})),
	)
}

async fn query(State(state): State<Arc<PartnerState>>, Json(body): Json<Value>) -> Json<Value> {
	let ids: Vec<String> = body["orderIds"]
		.as_array()
		.map(|ids| {
			ids.iter()
				.filter_map(|id| id.as_str().map(str::to_string))
				.collect()
		})
		.unwrap_or_default();
	state.queries.lock().unwrap().push(body);

	let status = state.query_status.load(Ordering::SeqCst);
	let rows: Vec<Value> = ids
		.iter()
		.map(|id| json!({"orderId": "G-1", "downstreamOrderId": id, "status": status}))
		.collect();
	Json(json!({"code": 200, "message": "ok", "data": rows}))
}

async fn sms(Json(body): Json<Value>) -> Json<Value> {
	Json(json!({"orderId": body["downstreamOrderId"], "status": 0, "message": "sent"}))
}
