//! Staff endpoints for escalated orders and delivery failures.

use super::rejected;
use crate::server::{AppState, Caller};
use axum::{
	extract::{Path, State},
	response::Json,
};
use mailer_types::{APIError, EscalationRequest, EscalationResponse, NotificationFailure};

/// Handles POST /api/admin/orders/{id}/escalate.
pub async fn handle_escalate(
	Path(id): Path<String>,
	State(state): State<AppState>,
	caller: Caller,
	Json(request): Json<EscalationRequest>,
) -> Result<Json<EscalationResponse>, APIError> {
	state
		.lifecycle
		.handle_escalation(caller.principal(), &id, request)
		.await
		.map(Json)
		.map_err(|e| rejected("escalate", e))
}

/// Handles GET /api/admin/notifications/failures.
pub async fn handle_notification_failures(
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Vec<NotificationFailure>>, APIError> {
	state
		.lifecycle
		.notification_failures(caller.principal())
		.await
		.map(Json)
		.map_err(|e| rejected("notification_failures", e))
}
