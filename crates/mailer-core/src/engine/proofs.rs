//! Proof uploads and customer responses.

use super::{describe_change, OrderLifecycleService};
use crate::{AuditTrail, AuthorizationGuard, LifecycleError, ProofWorkflow, StatusManager};
use chrono::Utc;
use mailer_types::{
	non_blank, truncate_id, EmailType, HistoryMetadata, OrderStatus, OrderStatusKind, Principal,
	Proof, RespondToProofRequest, RespondToProofResponse, Role, UploadProofRequest,
	UploadProofResponse,
};
use tracing::instrument;

impl OrderLifecycleService {
	/// Uploads the next proof round and moves the order to `waiting-approval`.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn upload_proof(
		&self,
		principal: Option<&Principal>,
		order_id: &str,
		request: UploadProofRequest,
	) -> Result<UploadProofResponse, LifecycleError> {
		let actor = AuthorizationGuard::require_principal(principal)?;
		let current = self.load_order(order_id).await?;
		AuthorizationGuard::authorize_staff(principal, &current.value)?;

		let file_reference = non_blank(Some(&request.file_reference))
			.ok_or_else(|| LifecycleError::Validation("fileReference cannot be empty".into()))?;

		let from = current.value.status;
		let rule = StatusManager::validate(
			from.kind(),
			OrderStatusKind::WaitingApproval,
			Role::Admin,
		)?;

		let round = ProofWorkflow::next_round(&self.proofs.proofs(order_id).await?);
		let now = Utc::now();
		let proof = ProofWorkflow::new_proof(order_id, round, file_reference, &actor.user_id, now);
		let entry = AuditTrail::record(
			&current.value,
			OrderStatus::WaitingApproval { round },
			actor,
			Role::Admin,
			None,
			HistoryMetadata::ProofUploaded {
				proof_id: proof.id.clone(),
				proof_round: round,
				file_reference: proof.file_reference.clone(),
			},
			now,
		);

		let mut tx = self.storage.transaction();
		let order = Self::stage_order_change(&mut tx, &current, &entry, now)?;
		ProofWorkflow::insert(&mut tx, &proof)?;
		tx.commit().await?;

		tracing::info!(round, by = %actor.user_id, "Proof uploaded");
		if rule.auto_notify {
			self.notify(
				&order,
				EmailType::StatusChange,
				describe_change(&order, from, order.status, rule.description),
			);
		}

		Ok(UploadProofResponse { proof, order })
	}

	/// Lists an order's proofs by round.
	pub async fn list_proofs(
		&self,
		principal: Option<&Principal>,
		order_id: &str,
	) -> Result<Vec<Proof>, LifecycleError> {
		AuthorizationGuard::require_principal(principal)?;
		let order = self.load_order(order_id).await?.value;
		AuthorizationGuard::authorize(principal, &order)?;
		self.proofs.proofs(&order.id).await
	}

	/// Records the customer's answer to a proof.
	///
	/// Requesting changes once the order has reached the escalation
	/// threshold moves it to `escalated` instead of `changes-requested`.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), proof_id = %truncate_id(proof_id)))]
	pub async fn respond_to_proof(
		&self,
		principal: Option<&Principal>,
		order_id: &str,
		proof_id: &str,
		request: RespondToProofRequest,
	) -> Result<RespondToProofResponse, LifecycleError> {
		let actor = AuthorizationGuard::require_principal(principal)?;
		let current = self.load_order(order_id).await?;
		let capability = AuthorizationGuard::authorize(principal, &current.value)?;

		let found = self.proofs.find(order_id, proof_id).await?;
		let mut proof = found.value.clone();
		let feedback = ProofWorkflow::check_response(&proof, request.action, request.feedback.as_deref())?;

		let from = current.value.status;
		if let OrderStatus::WaitingApproval { round } = from {
			if round != proof.proof_round {
				return Err(LifecycleError::Conflict(format!(
					"Proof round {} is superseded by round {}",
					proof.proof_round, round
				)));
			}
		}
		let rule = StatusManager::validate(
			from.kind(),
			ProofWorkflow::requested_status(request.action),
			capability.effective_role(),
		)?;

		let proof_count = self.proofs.proofs(order_id).await?.len();
		let (target, escalated) = self.proofs.resolve_status(request.action, proof_count);
		let to_status = OrderStatus::from_kind(target, None).ok_or_else(|| {
			LifecycleError::Internal(format!("Status {} needs a parameter", target))
		})?;

		let now = Utc::now();
		ProofWorkflow::answer(&mut proof, request.action, feedback.clone(), now);
		let entry = AuditTrail::record(
			&current.value,
			to_status,
			actor,
			capability.effective_role(),
			feedback,
			HistoryMetadata::ProofResponse {
				proof_id: proof.id.clone(),
				proof_round: proof.proof_round,
				action: request.action,
				escalated,
			},
			now,
		);

		let mut tx = self.storage.transaction();
		let order = Self::stage_order_change(&mut tx, &current, &entry, now)?;
		ProofWorkflow::replace(&mut tx, &proof, &found.raw)?;
		tx.commit().await?;

		if escalated {
			tracing::warn!(
				round = proof.proof_round,
				threshold = self.proofs.escalation_threshold(),
				"Change requested past threshold, order escalated"
			);
		} else {
			tracing::info!(round = proof.proof_round, action = %request.action, "Proof answered");
		}
		self.notify(
			&order,
			EmailType::ProofResponse,
			describe_change(&order, from, order.status, rule.description),
		);

		Ok(RespondToProofResponse {
			proof,
			order_status: order.status,
			escalated,
			history: entry,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::super::test_support::Harness;
	use super::*;
	use mailer_types::{
		EscalationAction, EscalationRequest, NewOrder, Order, ProofAction, ProofStatus,
		UpdateStatusRequest,
	};
	use rust_decimal::Decimal;

	async fn pending_order(h: &Harness) -> Order {
		h.service
			.create_order(
				Some(&h.owner()),
				NewOrder {
					practice_id: None,
					cost: Decimal::new(125_000, 2),
					description: Some("O-100 reactivation mailer".into()),
					quote_id: Some("Q-100".into()),
				},
			)
			.await
			.unwrap()
	}

	async fn upload(h: &Harness, order_id: &str, file: &str) -> UploadProofResponse {
		h.service
			.upload_proof(
				Some(&h.practice_admin()),
				order_id,
				UploadProofRequest {
					file_reference: file.into(),
				},
			)
			.await
			.unwrap()
	}

	async fn respond(
		h: &Harness,
		order_id: &str,
		proof_id: &str,
		action: ProofAction,
		feedback: Option<&str>,
	) -> Result<RespondToProofResponse, LifecycleError> {
		h.service
			.respond_to_proof(
				Some(&h.owner()),
				order_id,
				proof_id,
				RespondToProofRequest {
					action,
					feedback: feedback.map(str::to_string),
				},
			)
			.await
	}

	#[tokio::test]
	async fn test_three_change_requests_escalate_then_resolve() {
		let h = Harness::new().await;
		let order = pending_order(&h).await;

		for round in 1..=3u32 {
			let uploaded = upload(&h, &order.id, &format!("proofs/o-100/r{}.pdf", round)).await;
			assert_eq!(uploaded.proof.proof_round, round);
			assert_eq!(uploaded.order.status, OrderStatus::WaitingApproval { round });

			let answered = respond(
				&h,
				&order.id,
				&uploaded.proof.id,
				ProofAction::ChangesRequested,
				Some("font too small"),
			)
			.await
			.unwrap();
			assert_eq!(answered.proof.status, ProofStatus::ChangesRequested);
			if round < 3 {
				assert_eq!(answered.order_status, OrderStatus::ChangesRequested);
				assert!(!answered.escalated);
			} else {
				assert_eq!(answered.order_status, OrderStatus::Escalated);
				assert!(answered.escalated);
			}
		}

		let resolved = h
			.service
			.handle_escalation(
				Some(&h.practice_admin()),
				&order.id,
				EscalationRequest {
					action: EscalationAction::Resolve,
					escalation_notes: Some("fixed font size".into()),
					contact_customer: false,
				},
			)
			.await
			.unwrap();
		assert_eq!(resolved.status, OrderStatus::Draft);

		let history = h.service.history(Some(&h.owner()), &order.id).await.unwrap();
		assert_eq!(history.len(), 7);
		let last = history.last().unwrap();
		assert_eq!(last.from_status, OrderStatus::Escalated);
		assert_eq!(last.to_status, OrderStatus::Draft);
		assert_eq!(last.comments.as_deref(), Some("fixed font size"));

		let rounds: Vec<_> = h
			.service
			.list_proofs(Some(&h.owner()), &order.id)
			.await
			.unwrap()
			.iter()
			.map(|p| p.proof_round)
			.collect();
		assert_eq!(rounds, vec![1, 2, 3]);

		let sent = h.sent_types(7).await;
		assert_eq!(
			sent.iter().filter(|t| **t == EmailType::ProofResponse).count(),
			3
		);
		assert!(sent.contains(&EmailType::EscalationHandled));
	}

	#[tokio::test]
	async fn test_approval_is_never_escalated() {
		let h = Harness::new().await;
		let order = pending_order(&h).await;

		for _ in 0..3 {
			let uploaded = upload(&h, &order.id, "proofs/r.pdf").await;
			respond(&h, &order.id, &uploaded.proof.id, ProofAction::ChangesRequested, Some("again"))
				.await
				.unwrap();
		}
		// Escalated orders accept no uploads until resolved.
		let blocked = h
			.service
			.upload_proof(
				Some(&h.practice_admin()),
				&order.id,
				UploadProofRequest {
					file_reference: "proofs/r4.pdf".into(),
				},
			)
			.await;
		assert!(matches!(blocked, Err(LifecycleError::InvalidTransition { .. })));

		let h = Harness::new().await;
		let order = pending_order(&h).await;
		let first = upload(&h, &order.id, "proofs/r1.pdf").await;
		respond(&h, &order.id, &first.proof.id, ProofAction::ChangesRequested, Some("color"))
			.await
			.unwrap();
		let second = upload(&h, &order.id, "proofs/r2.pdf").await;
		respond(&h, &order.id, &second.proof.id, ProofAction::ChangesRequested, Some("logo"))
			.await
			.unwrap();
		let third = upload(&h, &order.id, "proofs/r3.pdf").await;
		let approved = respond(&h, &order.id, &third.proof.id, ProofAction::Approved, None)
			.await
			.unwrap();
		assert_eq!(approved.order_status, OrderStatus::Approved);
		assert!(!approved.escalated);
		assert_eq!(approved.proof.status, ProofStatus::Approved);
	}

	#[tokio::test]
	async fn test_response_rules() {
		let h = Harness::new().await;
		let order = pending_order(&h).await;
		let uploaded = upload(&h, &order.id, "proofs/r1.pdf").await;

		assert!(matches!(
			respond(&h, &order.id, &uploaded.proof.id, ProofAction::ChangesRequested, None).await,
			Err(LifecycleError::MissingComment(_))
		));
		assert!(matches!(
			respond(&h, &order.id, "missing", ProofAction::Approved, None).await,
			Err(LifecycleError::NotFound(_))
		));

		respond(&h, &order.id, &uploaded.proof.id, ProofAction::Approved, None)
			.await
			.unwrap();
		assert!(matches!(
			respond(&h, &order.id, &uploaded.proof.id, ProofAction::Approved, None).await,
			Err(LifecycleError::Conflict(_))
		));

		// One history row for the upload and one for the answer.
		let history = h.service.history(Some(&h.owner()), &order.id).await.unwrap();
		assert_eq!(history.len(), 2);
		assert!(matches!(
			history[1].metadata,
			HistoryMetadata::ProofResponse { escalated: false, .. }
		));
	}

	#[tokio::test]
	async fn test_superseded_round_is_a_conflict() {
		let h = Harness::new().await;
		let order = pending_order(&h).await;
		let first = upload(&h, &order.id, "proofs/r1.pdf").await;

		// Staff pull the order back through escalation while round 1 is
		// still pending, then upload round 2.
		let staff = h.practice_admin();
		h.service
			.transition(
				Some(&staff),
				&order.id,
				UpdateStatusRequest {
					new_status: OrderStatusKind::Escalated,
					comments: Some("customer phoned in edits".into()),
				},
			)
			.await
			.unwrap();
		h.service
			.handle_escalation(
				Some(&staff),
				&order.id,
				EscalationRequest {
					action: EscalationAction::Resolve,
					escalation_notes: Some("edits taken by phone".into()),
					contact_customer: false,
				},
			)
			.await
			.unwrap();
		h.service
			.transition(
				Some(&h.owner()),
				&order.id,
				UpdateStatusRequest {
					new_status: OrderStatusKind::Pending,
					comments: None,
				},
			)
			.await
			.unwrap();
		upload(&h, &order.id, "proofs/r2.pdf").await;

		assert!(matches!(
			respond(&h, &order.id, &first.proof.id, ProofAction::Approved, None).await,
			Err(LifecycleError::Conflict(_))
		));
	}

	#[tokio::test]
	async fn test_upload_rules() {
		let h = Harness::new().await;
		let order = pending_order(&h).await;

		let by_customer = h
			.service
			.upload_proof(
				Some(&h.owner()),
				&order.id,
				UploadProofRequest {
					file_reference: "proofs/r1.pdf".into(),
				},
			)
			.await;
		assert!(matches!(by_customer, Err(LifecycleError::Forbidden(_))));

		let blank = h
			.service
			.upload_proof(
				Some(&h.practice_admin()),
				&order.id,
				UploadProofRequest {
					file_reference: "   ".into(),
				},
			)
			.await;
		assert!(matches!(blank, Err(LifecycleError::Validation(_))));

		assert!(h
			.service
			.list_proofs(Some(&h.owner()), &order.id)
			.await
			.unwrap()
			.is_empty());
	}
}
