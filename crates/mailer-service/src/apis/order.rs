//! Order endpoints: creation, lookup, status and history.

use super::rejected;
use crate::server::{AppState, Caller};
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
};
use mailer_types::{
	APIError, NewOrder, Order, OrderStatusResponse, StatusHistoryEntry, UpdateStatusRequest,
	UpdateStatusResponse,
};

/// Handles POST /api/orders.
pub async fn handle_create_order(
	State(state): State<AppState>,
	caller: Caller,
	Json(request): Json<NewOrder>,
) -> Result<(StatusCode, Json<Order>), APIError> {
	state
		.lifecycle
		.create_order(caller.principal(), request)
		.await
		.map(|order| (StatusCode::CREATED, Json(order)))
		.map_err(|e| rejected("create_order", e))
}

/// Handles GET /api/orders.
pub async fn handle_list_orders(
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Vec<Order>>, APIError> {
	state
		.lifecycle
		.list_orders(caller.principal())
		.await
		.map(Json)
		.map_err(|e| rejected("list_orders", e))
}

/// Handles GET /api/orders/{id}.
pub async fn handle_get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Order>, APIError> {
	state
		.lifecycle
		.get_order(caller.principal(), &id)
		.await
		.map(Json)
		.map_err(|e| rejected("get_order", e))
}

/// Handles GET /api/orders/{id}/status.
pub async fn handle_get_status(
	Path(id): Path<String>,
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<OrderStatusResponse>, APIError> {
	state
		.lifecycle
		.status(caller.principal(), &id)
		.await
		.map(Json)
		.map_err(|e| rejected("get_status", e))
}

/// Handles POST /api/orders/{id}/status.
pub async fn handle_update_status(
	Path(id): Path<String>,
	State(state): State<AppState>,
	caller: Caller,
	Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>, APIError> {
	state
		.lifecycle
		.transition(caller.principal(), &id, request)
		.await
		.map(Json)
		.map_err(|e| rejected("update_status", e))
}

/// Handles GET /api/orders/{id}/history.
pub async fn handle_get_history(
	Path(id): Path<String>,
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Vec<StatusHistoryEntry>>, APIError> {
	state
		.lifecycle
		.history(caller.principal(), &id)
		.await
		.map(Json)
		.map_err(|e| rejected("get_history", e))
}

#[cfg(test)]
mod tests {
	use crate::server::tests::TestApp;
	use axum::http::StatusCode;
	use serde_json::json;

	#[tokio::test]
	async fn test_order_lifecycle_over_http() {
		let app = TestApp::new();
		let practice = app.practice("Riverside Dental").await;
		let owner = Some(("u-owner", "USER", Some(practice.as_str())));
		let staff = Some(("staff-1", "ADMIN", Some(practice.as_str())));

		let (status, order) = app
			.call(
				"POST",
				"/api/orders",
				owner,
				Some(json!({ "cost": "480.00", "description": "Recall postcards" })),
			)
			.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(order["status"], "draft");
		let id = order["id"].as_str().unwrap().to_string();

		let (status, body) = app
			.call(
				"POST",
				&format!("/api/orders/{}/status", id),
				owner,
				Some(json!({ "newStatus": "pending" })),
			)
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["order"]["status"], "pending");
		assert_eq!(body["history"]["fromStatus"], "draft");
		assert_eq!(body["history"]["toStatus"], "pending");

		let (status, body) = app
			.call(
				"POST",
				&format!("/api/orders/{}/status", id),
				owner,
				Some(json!({ "newStatus": "completed" })),
			)
			.await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"], "INVALID_TRANSITION");

		let (status, body) = app
			.call("GET", &format!("/api/orders/{}/status", id), staff, None)
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "pending");
		assert_eq!(body["availableTransitions"].as_array().unwrap().len(), 3);
		assert_eq!(body["history"].as_array().unwrap().len(), 1);

		let (status, body) = app
			.call("GET", &format!("/api/orders/{}/history", id), owner, None)
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body.as_array().unwrap().len(), 1);

		let (status, body) = app.call("GET", "/api/orders", owner, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body.as_array().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_cross_tenant_access_is_forbidden() {
		let app = TestApp::new();
		let practice = app.practice("Riverside Dental").await;
		let other = app.practice("Harbor Vision").await;

		let (_, order) = app
			.call(
				"POST",
				"/api/orders",
				Some(("u-owner", "USER", Some(practice.as_str()))),
				Some(json!({ "cost": "99.00" })),
			)
			.await;
		let id = order["id"].as_str().unwrap();

		let outsider = Some(("staff-9", "ADMIN", Some(other.as_str())));
		let (status, body) = app
			.call(
				"POST",
				&format!("/api/orders/{}/status", id),
				outsider,
				Some(json!({ "newStatus": "pending" })),
			)
			.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["error"], "FORBIDDEN");

		let (status, body) = app
			.call("GET", &format!("/api/orders/{}", id), Some(("ops", "ADMIN", None)), None)
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "draft");
	}

	#[tokio::test]
	async fn test_missing_comment_is_bad_request() {
		let app = TestApp::new();
		let practice = app.practice("Riverside Dental").await;
		let staff = Some(("staff-1", "ADMIN", Some(practice.as_str())));

		let (_, order) = app
			.call(
				"POST",
				"/api/orders",
				staff,
				Some(json!({ "cost": "12.50", "quoteId": "Q-9" })),
			)
			.await;
		assert_eq!(order["status"], "pending");
		let id = order["id"].as_str().unwrap();

		let (status, _) = app
			.call(
				"POST",
				&format!("/api/orders/{}/proofs", id),
				staff,
				Some(json!({ "fileReference": "proofs/r1.pdf" })),
			)
			.await;
		assert_eq!(status, StatusCode::CREATED);

		let (status, body) = app
			.call(
				"POST",
				&format!("/api/orders/{}/status", id),
				staff,
				Some(json!({ "newStatus": "escalated", "comments": "  " })),
			)
			.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "MISSING_COMMENT");
	}
}
