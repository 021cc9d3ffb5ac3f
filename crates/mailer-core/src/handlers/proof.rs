//! Proof rounds and customer responses.
//!
//! Each upload gets the next round number for its order, starting at 1.
//! Proofs are keyed `proofs:{order_id}:{round}` and inserted with an
//! "absent" precondition, so a round number can never be assigned twice.
//! A customer answers a proof once; requesting changes on a round at or past
//! the configured threshold escalates the order instead.

use crate::LifecycleError;
use chrono::{DateTime, Utc};
use mailer_storage::{StorageError, StorageService, Transaction, Versioned};
use mailer_types::{
	nested_id, non_blank, OrderStatusKind, Proof, ProofAction, ProofStatus, StorageKey,
};
use std::sync::Arc;

pub struct ProofWorkflow {
	storage: Arc<StorageService>,
	escalation_threshold: u32,
}

impl ProofWorkflow {
	pub fn new(storage: Arc<StorageService>, escalation_threshold: u32) -> Self {
		Self {
			storage,
			escalation_threshold: escalation_threshold.max(1),
		}
	}

	pub fn escalation_threshold(&self) -> u32 {
		self.escalation_threshold
	}

	/// Returns every proof of an order, ordered by round.
	pub async fn proofs(&self, order_id: &str) -> Result<Vec<Proof>, LifecycleError> {
		Ok(self
			.storage
			.list(StorageKey::Proofs.as_str(), &format!("{}:", order_id))
			.await?)
	}

	/// Round number for the next upload.
	pub fn next_round(proofs: &[Proof]) -> u32 {
		proofs.iter().map(|p| p.proof_round).max().unwrap_or(0) + 1
	}

	/// Loads a proof of `order_id` together with its stored bytes.
	///
	/// A proof that exists but belongs to another order is reported as not
	/// found.
	pub async fn find(
		&self,
		order_id: &str,
		proof_id: &str,
	) -> Result<Versioned<Proof>, LifecycleError> {
		let not_found = || LifecycleError::NotFound(format!("Proof {} not found", proof_id));

		let round = self
			.proofs(order_id)
			.await?
			.into_iter()
			.find(|p| p.id == proof_id)
			.map(|p| p.proof_round)
			.ok_or_else(not_found)?;

		match self
			.storage
			.retrieve_versioned(StorageKey::Proofs.as_str(), &nested_id(order_id, round.into()))
			.await
		{
			Ok(found) => Ok(found),
			Err(StorageError::NotFound) => Err(not_found()),
			Err(e) => Err(e.into()),
		}
	}

	pub fn new_proof(
		order_id: &str,
		round: u32,
		file_reference: &str,
		uploaded_by: &str,
		at: DateTime<Utc>,
	) -> Proof {
		Proof {
			id: uuid::Uuid::new_v4().to_string(),
			order_id: order_id.to_string(),
			proof_round: round,
			status: ProofStatus::Pending,
			file_reference: file_reference.to_string(),
			uploaded_by: uploaded_by.to_string(),
			uploaded_at: at,
			responded_at: None,
			user_feedback: None,
		}
	}

	/// Checks a response against a proof and returns the normalised feedback.
	pub fn check_response(
		proof: &Proof,
		action: ProofAction,
		feedback: Option<&str>,
	) -> Result<Option<String>, LifecycleError> {
		if !proof.is_pending() {
			return Err(LifecycleError::Conflict(format!(
				"Proof round {} has already been answered",
				proof.proof_round
			)));
		}
		let feedback = non_blank(feedback).map(str::to_string);
		if action == ProofAction::ChangesRequested && feedback.is_none() {
			return Err(LifecycleError::MissingComment(
				"Feedback is required when requesting changes".into(),
			));
		}
		Ok(feedback)
	}

	/// The transition the customer is asking for.
	pub fn requested_status(action: ProofAction) -> OrderStatusKind {
		match action {
			ProofAction::Approved => OrderStatusKind::Approved,
			ProofAction::ChangesRequested => OrderStatusKind::ChangesRequested,
		}
	}

	/// Applies the escalation policy to a response.
	///
	/// Approval always approves. A change request escalates once the order
	/// has `threshold` or more proofs in total, the answered one included.
	pub fn resolve_status(&self, action: ProofAction, proof_count: usize) -> (OrderStatusKind, bool) {
		match action {
			ProofAction::Approved => (OrderStatusKind::Approved, false),
			ProofAction::ChangesRequested
				if proof_count >= self.escalation_threshold as usize =>
			{
				(OrderStatusKind::Escalated, true)
			}
			ProofAction::ChangesRequested => (OrderStatusKind::ChangesRequested, false),
		}
	}

	/// Records the response on the proof.
	pub fn answer(proof: &mut Proof, action: ProofAction, feedback: Option<String>, at: DateTime<Utc>) {
		proof.status = action.proof_status();
		proof.user_feedback = feedback;
		proof.responded_at = Some(at);
	}

	pub fn insert(tx: &mut Transaction<'_>, proof: &Proof) -> Result<(), StorageError> {
		tx.insert(
			StorageKey::Proofs.as_str(),
			&nested_id(&proof.order_id, proof.proof_round.into()),
			proof,
		)?;
		Ok(())
	}

	pub fn replace(
		tx: &mut Transaction<'_>,
		proof: &Proof,
		expected: &[u8],
	) -> Result<(), StorageError> {
		tx.replace(
			StorageKey::Proofs.as_str(),
			&nested_id(&proof.order_id, proof.proof_round.into()),
			proof,
			expected,
		)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use mailer_storage::implementations::memory::MemoryStorage;

	fn workflow(threshold: u32) -> ProofWorkflow {
		ProofWorkflow::new(
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			threshold,
		)
	}

	#[test]
	fn test_escalation_policy() {
		let workflow = workflow(3);
		assert_eq!(
			workflow.resolve_status(ProofAction::ChangesRequested, 1),
			(OrderStatusKind::ChangesRequested, false)
		);
		assert_eq!(
			workflow.resolve_status(ProofAction::ChangesRequested, 2),
			(OrderStatusKind::ChangesRequested, false)
		);
		for count in [3, 4, 9] {
			assert_eq!(
				workflow.resolve_status(ProofAction::ChangesRequested, count),
				(OrderStatusKind::Escalated, true)
			);
		}
		for count in [1, 3, 12] {
			assert_eq!(
				workflow.resolve_status(ProofAction::Approved, count),
				(OrderStatusKind::Approved, false)
			);
		}
	}

	#[test]
	fn test_threshold_is_configurable() {
		let workflow = workflow(5);
		assert_eq!(
			workflow.resolve_status(ProofAction::ChangesRequested, 4).0,
			OrderStatusKind::ChangesRequested
		);
		assert_eq!(
			workflow.resolve_status(ProofAction::ChangesRequested, 5).0,
			OrderStatusKind::Escalated
		);
	}

	#[test]
	fn test_response_checks() {
		let mut proof = ProofWorkflow::new_proof("o-1", 1, "proofs/o-1/r1.pdf", "staff", Utc::now());

		assert!(matches!(
			ProofWorkflow::check_response(&proof, ProofAction::ChangesRequested, Some(" ")),
			Err(LifecycleError::MissingComment(_))
		));
		assert_eq!(
			ProofWorkflow::check_response(&proof, ProofAction::Approved, None).unwrap(),
			None
		);

		ProofWorkflow::answer(&mut proof, ProofAction::Approved, None, Utc::now());
		assert_eq!(proof.status, ProofStatus::Approved);
		assert!(proof.responded_at.is_some());
		assert!(matches!(
			ProofWorkflow::check_response(&proof, ProofAction::Approved, None),
			Err(LifecycleError::Conflict(_))
		));
	}

	#[tokio::test]
	async fn test_rounds_and_lookup() {
		let workflow = workflow(3);
		assert_eq!(ProofWorkflow::next_round(&[]), 1);

		let mut tx = workflow.storage.transaction();
		for round in 1..=2 {
			let proof = ProofWorkflow::new_proof("o-1", round, "f", "staff", Utc::now());
			ProofWorkflow::insert(&mut tx, &proof).unwrap();
		}
		let foreign = ProofWorkflow::new_proof("o-2", 1, "f", "staff", Utc::now());
		ProofWorkflow::insert(&mut tx, &foreign).unwrap();
		tx.commit().await.unwrap();

		let proofs = workflow.proofs("o-1").await.unwrap();
		let rounds: Vec<_> = proofs.iter().map(|p| p.proof_round).collect();
		assert_eq!(rounds, vec![1, 2]);
		assert_eq!(ProofWorkflow::next_round(&proofs), 3);

		let found = workflow.find("o-1", &proofs[1].id).await.unwrap();
		assert_eq!(found.value.proof_round, 2);
		assert!(matches!(
			workflow.find("o-1", &foreign.id).await,
			Err(LifecycleError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_round_cannot_be_reused() {
		let workflow = workflow(3);
		let mut tx = workflow.storage.transaction();
		ProofWorkflow::insert(&mut tx, &ProofWorkflow::new_proof("o-1", 1, "a", "s", Utc::now()))
			.unwrap();
		tx.commit().await.unwrap();

		let mut tx = workflow.storage.transaction();
		ProofWorkflow::insert(&mut tx, &ProofWorkflow::new_proof("o-1", 1, "b", "s", Utc::now()))
			.unwrap();
		assert!(matches!(tx.commit().await, Err(StorageError::Conflict(_))));
	}
}
