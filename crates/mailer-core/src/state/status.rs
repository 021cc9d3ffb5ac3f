//! Transition table and validation for order statuses.
//!
//! Legality is decided on [`OrderStatusKind`]: the proof round carried by
//! `waiting-approval` never changes which moves are allowed.

use mailer_types::{non_blank, OrderStatusKind, Role};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use thiserror::Error;

/// Why a requested transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
	#[error("No transition from {from} to {to}")]
	NotAllowed {
		from: OrderStatusKind,
		to: OrderStatusKind,
	},
	#[error("Role {role} may not move an order from {from} to {to}")]
	RoleNotPermitted {
		from: OrderStatusKind,
		to: OrderStatusKind,
		role: Role,
	},
	#[error("A comment is required to move an order from {from} to {to}")]
	MissingComment {
		from: OrderStatusKind,
		to: OrderStatusKind,
	},
}

/// One legal move between two status kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRule {
	pub from: OrderStatusKind,
	pub to: OrderStatusKind,
	pub allowed_roles: &'static [Role],
	pub requires_comment: bool,
	pub auto_notify: bool,
	pub description: &'static str,
}

impl TransitionRule {
	pub fn permits(&self, role: Role) -> bool {
		self.allowed_roles.contains(&role)
	}
}

const STAFF: &[Role] = &[Role::Admin];
const ANYONE: &[Role] = &[Role::Admin, Role::User];

/// Outgoing transitions per status kind, in the order they are offered.
static TRANSITIONS: Lazy<HashMap<OrderStatusKind, Vec<TransitionRule>>> = Lazy::new(|| {
	use OrderStatusKind::*;

	let rules = [
		(Draft, Pending, ANYONE, false, true, "Submit order for production"),
		(Pending, Draft, ANYONE, false, false, "Return order to draft"),
		(Pending, InProgress, STAFF, false, true, "Start production"),
		(Pending, WaitingApproval, STAFF, false, true, "Upload proof for approval"),
		(InProgress, WaitingApproval, STAFF, false, true, "Upload proof for approval"),
		(InProgress, Completed, STAFF, false, true, "Mark production complete"),
		(WaitingApproval, Approved, ANYONE, false, true, "Approve proof"),
		(WaitingApproval, ChangesRequested, ANYONE, true, true, "Request changes to proof"),
		(WaitingApproval, Escalated, STAFF, true, true, "Escalate to staff review"),
		(ChangesRequested, WaitingApproval, STAFF, false, true, "Upload revised proof"),
		(ChangesRequested, InProgress, STAFF, false, false, "Resume production with changes"),
		(ChangesRequested, Escalated, STAFF, true, true, "Escalate to staff review"),
		(Approved, InProgress, STAFF, false, true, "Send approved proof to print"),
		(Approved, Completed, STAFF, false, true, "Mark production complete"),
		(Completed, Delivered, STAFF, false, true, "Confirm delivery"),
		(Escalated, Draft, STAFF, true, true, "Resolve escalation"),
	];

	let mut table: HashMap<OrderStatusKind, Vec<TransitionRule>> =
		OrderStatusKind::all().map(|kind| (kind, Vec::new())).collect();
	for (from, to, allowed_roles, requires_comment, auto_notify, description) in rules {
		table.entry(from).or_default().push(TransitionRule {
			from,
			to,
			allowed_roles,
			requires_comment,
			auto_notify,
			description,
		});
	}
	table
});

/// Stateless access to the transition table.
pub struct StatusManager;

impl StatusManager {
	/// Looks up the rule for a move regardless of role.
	pub fn rule(from: OrderStatusKind, to: OrderStatusKind) -> Option<&'static TransitionRule> {
		TRANSITIONS
			.get(&from)
			.and_then(|rules| rules.iter().find(|rule| rule.to == to))
	}

	/// Validates a move for a role and returns its rule.
	///
	/// Fails with `NotAllowed` when the table has no such move and with
	/// `RoleNotPermitted` when it exists for other roles only.
	pub fn validate(
		current: OrderStatusKind,
		target: OrderStatusKind,
		role: Role,
	) -> Result<&'static TransitionRule, TransitionError> {
		let rule = Self::rule(current, target).ok_or(TransitionError::NotAllowed {
			from: current,
			to: target,
		})?;
		if !rule.permits(role) {
			return Err(TransitionError::RoleNotPermitted {
				from: current,
				to: target,
				role,
			});
		}
		Ok(rule)
	}

	/// Returns the trimmed comment, or `MissingComment` if the rule needs one
	/// and none was given.
	pub fn check_comment(
		rule: &TransitionRule,
		comments: Option<&str>,
	) -> Result<Option<String>, TransitionError> {
		let comments = non_blank(comments);
		if rule.requires_comment && comments.is_none() {
			return Err(TransitionError::MissingComment {
				from: rule.from,
				to: rule.to,
			});
		}
		Ok(comments.map(str::to_string))
	}

	/// Whether a move is made only by the proof workflow: entering
	/// `waiting-approval` needs an uploaded proof, and leaving it for
	/// `approved` or `changes-requested` answers that proof.
	pub fn is_proof_driven(from: OrderStatusKind, to: OrderStatusKind) -> bool {
		use OrderStatusKind::*;
		matches!(
			(from, to),
			(_, WaitingApproval) | (WaitingApproval, Approved | ChangesRequested)
		)
	}

	/// Lists the moves a role may attempt from the current status.
	pub fn available_transitions(
		current: OrderStatusKind,
		role: Role,
	) -> Vec<&'static TransitionRule> {
		TRANSITIONS
			.get(&current)
			.map(|rules| rules.iter().filter(|rule| rule.permits(role)).collect())
			.unwrap_or_default()
	}
}
