//! API types for the mailer HTTP API.
//!
//! This module defines the request and response bodies of the order, proof
//! and escalation endpoints together with the structured error type that
//! maps the lifecycle error taxonomy onto HTTP status codes.

use crate::{
	EscalationAction, Order, OrderStatus, OrderStatusKind, Proof, ProofAction,
	StatusHistoryEntry,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /orders/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
	pub new_status: OrderStatusKind,
	#[serde(default)]
	pub comments: Option<String>,
}

/// Response of an accepted status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
	pub order: Order,
	pub history: StatusHistoryEntry,
}

/// A transition the caller may attempt next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTransition {
	pub to_status: OrderStatusKind,
	pub requires_comment: bool,
	pub auto_notify: bool,
	pub description: String,
}

/// Response of `GET /orders/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusResponse {
	pub order_id: String,
	pub order_number: String,
	pub status: OrderStatus,
	pub available_transitions: Vec<AvailableTransition>,
	pub history: Vec<StatusHistoryEntry>,
}

/// Body of `POST /orders/{id}/proofs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProofRequest {
	pub file_reference: String,
}

/// Response of a proof upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProofResponse {
	pub proof: Proof,
	pub order: Order,
}

/// Body of `POST /orders/{id}/proofs/{proof_id}/respond`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondToProofRequest {
	pub action: ProofAction,
	#[serde(default)]
	pub feedback: Option<String>,
}

/// Response of a proof response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondToProofResponse {
	pub proof: Proof,
	pub order_status: OrderStatus,
	pub escalated: bool,
	pub history: StatusHistoryEntry,
}

/// Body of `POST /admin/orders/{id}/escalate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRequest {
	pub action: EscalationAction,
	#[serde(default)]
	pub escalation_notes: Option<String>,
	#[serde(default)]
	pub contact_customer: bool,
}

/// Response of an escalation action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationResponse {
	pub order_id: String,
	pub status: OrderStatus,
	pub history: StatusHistoryEntry,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Missing or malformed input (400)
	BadRequest { error_type: String, message: String },
	/// No resolvable principal (401)
	Unauthorized { message: String },
	/// Principal lacks the capability (403)
	Forbidden { message: String },
	/// Resource absent (404)
	NotFound { message: String },
	/// Concurrent modification or repeated response (409)
	Conflict { message: String },
	/// Business rule rejection such as an illegal transition (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Internal server error (500)
	InternalServerError { message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Unauthorized { .. } => 401,
			APIError::Forbidden { .. } => 403,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details) = match self {
			APIError::BadRequest {
				error_type,
				message,
			} => (error_type.as_str(), message, None),
			APIError::Unauthorized { message } => ("UNAUTHORIZED", message, None),
			APIError::Forbidden { message } => ("FORBIDDEN", message, None),
			APIError::NotFound { message } => ("NOT_FOUND", message, None),
			APIError::Conflict { message } => ("CONFLICT", message, None),
			APIError::UnprocessableEntity {
				error_type,
				message,
				details,
			} => (error_type.as_str(), message, details.clone()),
			APIError::InternalServerError { message } => ("INTERNAL_ERROR", message, None),
		};
		ErrorResponse {
			error: error.to_string(),
			message: message.clone(),
			details,
			retry_after: None,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
			APIError::Forbidden { message } => write!(f, "Forbidden: {}", message),
			APIError::NotFound { message } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message } => write!(f, "Conflict: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			}
			APIError::InternalServerError { message } => {
				write!(f, "Internal Server Error: {}", message)
			}
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_error_codes_follow_taxonomy() {
		let err = APIError::Conflict {
			message: "status changed".into(),
		};
		assert_eq!(err.status_code(), 409);
		assert_eq!(err.to_error_response().error, "CONFLICT");

		let err = APIError::BadRequest {
			error_type: "MISSING_COMMENT".into(),
			message: "comment required".into(),
		};
		assert_eq!(err.status_code(), 400);
		assert_eq!(err.to_error_response().error, "MISSING_COMMENT");
	}

	#[test]
	fn test_escalation_request_defaults() {
		let request: EscalationRequest =
			serde_json::from_str(r#"{"action":"CONTACT_CUSTOMER"}"#).unwrap();
		assert_eq!(request.action, EscalationAction::ContactCustomer);
		assert!(!request.contact_customer);
		assert!(request.escalation_notes.is_none());
	}
}
