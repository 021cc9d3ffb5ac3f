//! Proof endpoints.

use super::rejected;
use crate::server::{AppState, Caller};
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
};
use mailer_types::{
	APIError, Proof, RespondToProofRequest, RespondToProofResponse, UploadProofRequest,
	UploadProofResponse,
};

/// Handles POST /api/orders/{id}/proofs.
pub async fn handle_upload_proof(
	Path(id): Path<String>,
	State(state): State<AppState>,
	caller: Caller,
	Json(request): Json<UploadProofRequest>,
) -> Result<(StatusCode, Json<UploadProofResponse>), APIError> {
	state
		.lifecycle
		.upload_proof(caller.principal(), &id, request)
		.await
		.map(|uploaded| (StatusCode::CREATED, Json(uploaded)))
		.map_err(|e| rejected("upload_proof", e))
}

/// Handles GET /api/orders/{id}/proofs.
pub async fn handle_list_proofs(
	Path(id): Path<String>,
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Vec<Proof>>, APIError> {
	state
		.lifecycle
		.list_proofs(caller.principal(), &id)
		.await
		.map(Json)
		.map_err(|e| rejected("list_proofs", e))
}

/// Handles POST /api/orders/{id}/proofs/{proof_id}/respond.
pub async fn handle_respond_to_proof(
	Path((id, proof_id)): Path<(String, String)>,
	State(state): State<AppState>,
	caller: Caller,
	Json(request): Json<RespondToProofRequest>,
) -> Result<Json<RespondToProofResponse>, APIError> {
	state
		.lifecycle
		.respond_to_proof(caller.principal(), &id, &proof_id, request)
		.await
		.map(Json)
		.map_err(|e| rejected("respond_to_proof", e))
}
