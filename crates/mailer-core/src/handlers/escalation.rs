//! Staff actions on escalated orders.
//!
//! Only `RESOLVE` changes the status (back to `draft`). The other two actions
//! keep the order escalated but are still recorded as history rows, since the
//! action itself is part of the audit record.

use crate::{LifecycleError, StatusManager};
use mailer_types::{
	non_blank, EmailType, EscalationAction, EscalationRequest, OrderStatus, OrderStatusKind, Role,
};

/// What an escalation request will do once committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationPlan {
	pub action: EscalationAction,
	pub to_status: OrderStatus,
	pub comments: Option<String>,
	pub contact_customer: bool,
	/// Notification to send after commit, if any.
	pub email: Option<EmailType>,
	pub description: String,
}

pub struct EscalationHandler;

impl EscalationHandler {
	/// Validates a request against the order's current status.
	///
	/// The caller must already be known to be staff.
	pub fn plan(
		current: OrderStatus,
		request: &EscalationRequest,
	) -> Result<EscalationPlan, LifecycleError> {
		if current.kind() != OrderStatusKind::Escalated {
			return Err(LifecycleError::InvalidTransition {
				from: current.kind(),
				to: match request.action {
					EscalationAction::Resolve => OrderStatusKind::Draft,
					_ => OrderStatusKind::Escalated,
				},
			});
		}

		let notes = request.escalation_notes.as_deref();
		let plan = match request.action {
			EscalationAction::Resolve => {
				let rule = StatusManager::validate(
					OrderStatusKind::Escalated,
					OrderStatusKind::Draft,
					Role::Admin,
				)?;
				let comments = StatusManager::check_comment(rule, notes).map_err(|_| {
					LifecycleError::MissingComment(
						"Resolving an escalation requires escalation notes".into(),
					)
				})?;
				EscalationPlan {
					action: request.action,
					to_status: OrderStatus::Draft,
					comments,
					contact_customer: request.contact_customer,
					email: Some(EmailType::EscalationHandled),
					description: rule.description.to_string(),
				}
			}
			EscalationAction::ContactCustomer => EscalationPlan {
				action: request.action,
				to_status: OrderStatus::Escalated,
				comments: non_blank(notes).map(str::to_string),
				contact_customer: request.contact_customer,
				email: request
					.contact_customer
					.then_some(EmailType::EscalationCustomerContact),
				description: "Staff contacted the customer".to_string(),
			},
			EscalationAction::EscalateToManager => EscalationPlan {
				action: request.action,
				to_status: OrderStatus::Escalated,
				comments: non_blank(notes).map(str::to_string),
				contact_customer: request.contact_customer,
				email: Some(EmailType::EscalationHandled),
				description: "Escalation handed over to a manager".to_string(),
			},
		};
		Ok(plan)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn request(action: EscalationAction, notes: Option<&str>, contact: bool) -> EscalationRequest {
		EscalationRequest {
			action,
			escalation_notes: notes.map(str::to_string),
			contact_customer: contact,
		}
	}

	#[test]
	fn test_resolve_returns_to_draft() {
		let plan = EscalationHandler::plan(
			OrderStatus::Escalated,
			&request(EscalationAction::Resolve, Some("fixed font size"), false),
		)
		.unwrap();
		assert_eq!(plan.to_status, OrderStatus::Draft);
		assert_eq!(plan.comments.as_deref(), Some("fixed font size"));
		assert_eq!(plan.email, Some(EmailType::EscalationHandled));
	}

	#[test]
	fn test_resolve_requires_notes() {
		for notes in [None, Some(""), Some("  ")] {
			assert!(matches!(
				EscalationHandler::plan(
					OrderStatus::Escalated,
					&request(EscalationAction::Resolve, notes, false)
				),
				Err(LifecycleError::MissingComment(_))
			));
		}
	}

	#[test]
	fn test_other_actions_keep_status() {
		let contact = EscalationHandler::plan(
			OrderStatus::Escalated,
			&request(EscalationAction::ContactCustomer, None, true),
		)
		.unwrap();
		assert_eq!(contact.to_status, OrderStatus::Escalated);
		assert_eq!(contact.email, Some(EmailType::EscalationCustomerContact));

		let quiet = EscalationHandler::plan(
			OrderStatus::Escalated,
			&request(EscalationAction::ContactCustomer, Some("called"), false),
		)
		.unwrap();
		assert_eq!(quiet.email, None);

		let manager = EscalationHandler::plan(
			OrderStatus::Escalated,
			&request(EscalationAction::EscalateToManager, None, false),
		)
		.unwrap();
		assert_eq!(manager.to_status, OrderStatus::Escalated);
	}

	#[test]
	fn test_only_escalated_orders() {
		for status in [
			OrderStatus::Draft,
			OrderStatus::ChangesRequested,
			OrderStatus::WaitingApproval { round: 2 },
		] {
			assert!(matches!(
				EscalationHandler::plan(
					status,
					&request(EscalationAction::EscalateToManager, None, false)
				),
				Err(LifecycleError::InvalidTransition { .. })
			));
		}
	}
}
