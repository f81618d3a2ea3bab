//! Response envelope shared by every handler

use axum::{
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use gift_service::OrderServiceError;
use serde::Serialize;

/// `{code, message, data}` envelope; `code` mirrors the HTTP status
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
	pub code: u16,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
	pub fn success(data: T) -> Json<Self> {
		Json(Self {
			code: StatusCode::OK.as_u16(),
			message: "success".to_string(),
			data: Some(data),
		})
	}
}

/// Handler failure rendered as an envelope without data
#[derive(Debug)]
pub struct ApiError {
	pub status: StatusCode,
	pub message: String,
}

impl ApiError {
	pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
		Self {
			status,
			message: message.into(),
		}
	}

	pub fn bad_request(message: impl Into<String>) -> Self {
		Self::new(StatusCode::BAD_REQUEST, message)
	}

	pub fn unauthorized(message: impl Into<String>) -> Self {
		Self::new(StatusCode::UNAUTHORIZED, message)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ApiResponse::<()> {
			code: self.status.as_u16(),
			message: self.message,
			data: None,
		};
		(self.status, Json(body)).into_response()
	}
}

impl From<OrderServiceError> for ApiError {
	fn from(error: OrderServiceError) -> Self {
		let status = match &error {
			OrderServiceError::Validation(_) | OrderServiceError::UnknownPartner(_) => {
				StatusCode::BAD_REQUEST
			},
			OrderServiceError::NotFound(_) => StatusCode::NOT_FOUND,
			OrderServiceError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
			OrderServiceError::Adapter(_) => StatusCode::BAD_GATEWAY,
			OrderServiceError::Storage(_)
			| OrderServiceError::Queue(_)
			| OrderServiceError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};
		Self::new(status, error.to_string())
	}
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_service_errors_map_to_statuses() {
		let cases = [
			(OrderServiceError::Validation("x".into()), StatusCode::BAD_REQUEST),
			(OrderServiceError::UnknownPartner("ZZ-1".into()), StatusCode::BAD_REQUEST),
			(OrderServiceError::NotFound("1".into()), StatusCode::NOT_FOUND),
			(OrderServiceError::Unsupported("sms".into()), StatusCode::NOT_IMPLEMENTED),
			(OrderServiceError::Adapter("down".into()), StatusCode::BAD_GATEWAY),
			(OrderServiceError::Queue("closed".into()), StatusCode::INTERNAL_SERVER_ERROR),
		];
		for (error, status) in cases {
			assert_eq!(ApiError::from(error).status, status);
		}
	}

	#[test]
	fn test_envelope_omits_missing_data() {
		let body = serde_json::to_value(ApiResponse::<()> {
			code: 404,
			message: "order not found: 1".to_string(),
			data: None,
		})
		.unwrap();
		assert_eq!(body, serde_json::json!({"code": 404, "message": "order not found: 1"}));
	}
}
