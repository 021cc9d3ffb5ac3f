//! Order lifecycle orchestration.
//!
//! Every mutating operation follows the same path: resolve the caller's
//! capability, validate against the transition table, then commit the order
//! update, its history row and any proof change as one storage batch guarded
//! by the exact order bytes read during validation. A concurrent change to
//! the order makes the batch fail with `Conflict` and leaves nothing behind.
//! Notifications are spawned only after the batch has landed.

mod escalation;
mod orders;
mod proofs;

use crate::audit::AuditTrail;
use crate::handlers::ProofWorkflow;
use crate::{AuthorizationGuard, LifecycleError};
use chrono::{DateTime, Utc};
use mailer_config::WorkflowConfig;
use mailer_notify::NotificationService;
use mailer_storage::{StorageError, StorageService, Transaction, Versioned};
use mailer_types::{
	truncate_id, EmailType, NotificationFailure, NotificationRequest, Order, OrderStatus,
	Principal, StatusHistoryEntry, StorageKey,
};
use std::sync::Arc;

/// Entry point for every order, proof and escalation operation.
pub struct OrderLifecycleService {
	storage: Arc<StorageService>,
	notifications: Arc<NotificationService>,
	audit: AuditTrail,
	proofs: ProofWorkflow,
	workflow: WorkflowConfig,
}

impl OrderLifecycleService {
	pub fn new(
		storage: Arc<StorageService>,
		notifications: Arc<NotificationService>,
		workflow: WorkflowConfig,
	) -> Self {
		Self {
			audit: AuditTrail::new(storage.clone()),
			proofs: ProofWorkflow::new(storage.clone(), workflow.escalation_proof_threshold),
			storage,
			notifications,
			workflow,
		}
	}

	pub fn workflow(&self) -> &WorkflowConfig {
		&self.workflow
	}

	async fn load_order(&self, order_id: &str) -> Result<Versioned<Order>, LifecycleError> {
		match self
			.storage
			.retrieve_versioned(StorageKey::Orders.as_str(), order_id)
			.await
		{
			Ok(order) => Ok(order),
			Err(StorageError::NotFound) => {
				Err(LifecycleError::NotFound(format!("Order {} not found", order_id)))
			}
			Err(e) => Err(e.into()),
		}
	}

	/// Adds the guarded order update and its history row to a batch.
	///
	/// Returns the updated order.
	fn stage_order_change(
		tx: &mut Transaction<'_>,
		current: &Versioned<Order>,
		entry: &StatusHistoryEntry,
		at: DateTime<Utc>,
	) -> Result<Order, StorageError> {
		let mut updated = current.value.clone();
		updated.status = entry.to_status;
		updated.version += 1;
		updated.updated_at = at;

		tx.replace(
			StorageKey::Orders.as_str(),
			&updated.id,
			&updated,
			&current.raw,
		)?;
		AuditTrail::append(tx, entry)?;
		Ok(updated)
	}

	/// Hands a notification to the dispatcher without waiting for it.
	fn notify(&self, order: &Order, email_type: EmailType, description: String) {
		let request = NotificationRequest {
			id: uuid::Uuid::new_v4().to_string(),
			email_type,
			order_id: order.id.clone(),
			order_number: order.order_number.clone(),
			practice_id: order.practice_id.clone(),
			user_id: order.user_id.clone(),
			description,
			created_at: Utc::now(),
		};
		let notifications = self.notifications.clone();
		tokio::spawn(async move {
			if let Err(failure) = notifications.dispatch(&request).await {
				tracing::warn!(
					order_id = %truncate_id(&request.order_id),
					email_type = %request.email_type,
					attempts = failure.attempts,
					"Notification could not be delivered"
				);
			}
		});
	}

	/// Lists undelivered notifications. Super-admins only.
	pub async fn notification_failures(
		&self,
		principal: Option<&Principal>,
	) -> Result<Vec<NotificationFailure>, LifecycleError> {
		AuthorizationGuard::require_super_admin(principal)?;
		self.notifications
			.failures()
			.await
			.map_err(|e| LifecycleError::Internal(e.to_string()))
	}
}

fn describe_change(order: &Order, from: OrderStatus, to: OrderStatus, what: &str) -> String {
	format!(
		"Order {} moved from {} to {}: {}",
		order.order_number, from, to, what
	)
}
