use super::rejected;
use crate::server::{AppState, Caller};
use axum::{extract::State, http::StatusCode, response::Json};
use mailer_types::{APIError, NewPractice, Practice};

/// Handles POST /api/admin/practices.
pub async fn handle_create_practice(
	State(state): State<AppState>,
	caller: Caller,
	Json(request): Json<NewPractice>,
) -> Result<(StatusCode, Json<Practice>), APIError> {
	state
		.lifecycle
		.create_practice(caller.principal(), request)
		.await
		.map(|practice| (StatusCode::CREATED, Json(practice)))
		.map_err(|e| rejected("create_practice", e))
}

/// Handles GET /api/practices.
pub async fn handle_list_practices(
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Vec<Practice>>, APIError> {
	state
		.lifecycle
		.list_practices(caller.principal())
		.await
		.map(Json)
		.map_err(|e| rejected("list_practices", e))
}

#[cfg(test)]
mod tests {
	use crate::server::tests::TestApp;
	use axum::http::StatusCode;
	use serde_json::json;

	#[tokio::test]
	async fn test_practice_registration() {
		let app = TestApp::new();
		let id = app.practice("Riverside Dental").await;

		let (status, body) = app
			.call(
				"POST",
				"/api/admin/practices",
				Some(("staff-1", "ADMIN", Some(id.as_str()))),
				Some(json!({ "name": "Sneaky Clinic" })),
			)
			.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["error"], "FORBIDDEN");

		let (status, body) = app
			.call(
				"POST",
				"/api/admin/practices",
				Some(("ops", "ADMIN", None)),
				Some(json!({ "name": " " })),
			)
			.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "BAD_REQUEST");

		let (status, body) = app
			.call(
				"GET",
				"/api/practices",
				Some(("u-1", "USER", Some(id.as_str()))),
				None,
			)
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body[0]["name"], "Riverside Dental");
	}
}
