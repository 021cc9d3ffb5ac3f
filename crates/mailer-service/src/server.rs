//! HTTP server for the mailer API.
//!
//! Routes live under `/api`. Every handler resolves the caller through the
//! configured identity provider and hands the request to the lifecycle
//! service; errors render as `ErrorResponse` bodies.

use crate::apis::{escalation, order, practice, proof};
use axum::{
	extract::FromRequestParts,
	http::request::Parts,
	response::Json,
	routing::{get, post},
	Router,
};
use mailer_config::ApiConfig;
use mailer_core::{OrderLifecycleService, ServiceHandles};
use mailer_identity::IdentityService;
use mailer_types::{APIError, Principal};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub lifecycle: Arc<OrderLifecycleService>,
	pub identity: Arc<IdentityService>,
}

impl From<ServiceHandles> for AppState {
	fn from(handles: ServiceHandles) -> Self {
		Self {
			lifecycle: handles.lifecycle,
			identity: handles.identity,
		}
	}
}

/// The resolved caller of a request, if any credentials were presented.
///
/// Missing credentials are not rejected here; the lifecycle service decides
/// whether an operation needs a principal. Credentials that are present but
/// invalid are rejected with 401.
pub struct Caller(pub Option<Principal>);

impl Caller {
	pub fn principal(&self) -> Option<&Principal> {
		self.0.as_ref()
	}
}

impl FromRequestParts<AppState> for Caller {
	type Rejection = APIError;

	async fn from_request_parts(
		parts: &mut Parts,
		state: &AppState,
	) -> Result<Self, Self::Rejection> {
		state
			.identity
			.resolve(&parts.headers)
			.await
			.map(Caller)
			.map_err(|e| APIError::Unauthorized {
				message: e.to_string(),
			})
	}
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/health", get(health))
				.route(
					"/orders",
					post(order::handle_create_order).get(order::handle_list_orders),
				)
				.route("/orders/{id}", get(order::handle_get_order))
				.route(
					"/orders/{id}/status",
					get(order::handle_get_status).post(order::handle_update_status),
				)
				.route("/orders/{id}/history", get(order::handle_get_history))
				.route(
					"/orders/{id}/proofs",
					post(proof::handle_upload_proof).get(proof::handle_list_proofs),
				)
				.route(
					"/orders/{id}/proofs/{proof_id}/respond",
					post(proof::handle_respond_to_proof),
				)
				.route(
					"/admin/orders/{id}/escalate",
					post(escalation::handle_escalate),
				)
				.route(
					"/admin/notifications/failures",
					get(escalation::handle_notification_failures),
				)
				.route("/admin/practices", post(practice::handle_create_practice))
				.route("/practices", get(practice::handle_list_practices)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(state)
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	handles: ServiceHandles,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState::from(handles));

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Mailer API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

async fn health() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::factory_registry::build_service_from_config;
	use axum::{
		body::Body,
		http::{Request, StatusCode},
	};
	use http_body_util::BodyExt;
	use mailer_config::Config;
	use serde_json::{json, Value};
	use tower::ServiceExt;

	const CONFIG: &str = r#"
[service]
id = "mailer-http-test"

[storage]
primary = "memory"
[storage.implementations.memory]

[identity]
primary = "header"
[identity.implementations.header]

[notification]
primary = "log"
max_attempts = 1
retry_delay_ms = 1
[notification.implementations.log]
"#;

	pub(crate) struct TestApp {
		router: Router,
	}

	/// `(user id, role, practice id)` sent as identity headers.
	pub(crate) type As<'a> = Option<(&'a str, &'a str, Option<&'a str>)>;

	impl TestApp {
		pub(crate) fn new() -> Self {
			let config: Config = CONFIG.parse().unwrap();
			let handles = build_service_from_config(config).unwrap();
			Self {
				router: router(AppState::from(handles)),
			}
		}

		pub(crate) async fn call(
			&self,
			method: &str,
			uri: &str,
			caller: As<'_>,
			body: Option<Value>,
		) -> (StatusCode, Value) {
			let mut request = Request::builder().method(method).uri(uri);
			if let Some((user, role, practice)) = caller {
				request = request.header("x-user-id", user).header("x-user-role", role);
				if let Some(practice) = practice {
					request = request.header("x-practice-id", practice);
				}
			}
			let request = match body {
				Some(body) => request
					.header("content-type", "application/json")
					.body(Body::from(body.to_string()))
					.unwrap(),
				None => request.body(Body::empty()).unwrap(),
			};

			let response = self.router.clone().oneshot(request).await.unwrap();
			let status = response.status();
			let bytes = response.into_body().collect().await.unwrap().to_bytes();
			let value = if bytes.is_empty() {
				Value::Null
			} else {
				serde_json::from_slice(&bytes).unwrap_or(Value::Null)
			};
			(status, value)
		}

		/// Registers a practice as super-admin and returns its id.
		pub(crate) async fn practice(&self, name: &str) -> String {
			let (status, body) = self
				.call(
					"POST",
					"/api/admin/practices",
					Some(("ops", "ADMIN", None)),
					Some(json!({ "name": name })),
				)
				.await;
			assert_eq!(status, StatusCode::CREATED);
			body["id"].as_str().unwrap().to_string()
		}
	}

	#[tokio::test]
	async fn test_health() {
		let app = TestApp::new();
		let (status, body) = app.call("GET", "/api/health", None, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "ok");
	}

	#[tokio::test]
	async fn test_missing_identity_is_unauthorized() {
		let app = TestApp::new();
		let (status, body) = app
			.call("POST", "/api/orders", None, Some(json!({ "cost": "10.00" })))
			.await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body["error"], "UNAUTHORIZED");
	}

	#[tokio::test]
	async fn test_malformed_identity_is_unauthorized() {
		let app = TestApp::new();
		let (status, body) = app
			.call("GET", "/api/orders", Some(("u-1", "JANITOR", None)), None)
			.await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body["error"], "UNAUTHORIZED");
	}

	#[tokio::test]
	async fn test_unknown_order_is_not_found() {
		let app = TestApp::new();
		let (status, body) = app
			.call(
				"GET",
				"/api/orders/does-not-exist",
				Some(("ops", "ADMIN", None)),
				None,
			)
			.await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "NOT_FOUND");
	}
}
