//! Status history types.
//!
//! History rows are append-only. Each one records who moved an order from
//! which status to which, plus metadata describing the event kind.

use crate::{OrderStatus, ProofAction, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Staff action taken on an escalated order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationAction {
	/// Return the order to `draft`.
	Resolve,
	/// Record that staff contacted the customer.
	ContactCustomer,
	/// Hand the order over to a manager.
	EscalateToManager,
}

impl fmt::Display for EscalationAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EscalationAction::Resolve => f.write_str("RESOLVE"),
			EscalationAction::ContactCustomer => f.write_str("CONTACT_CUSTOMER"),
			EscalationAction::EscalateToManager => f.write_str("ESCALATE_TO_MANAGER"),
		}
	}
}

/// Structured metadata attached to a history row, one variant per event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryMetadata {
	/// A transition requested through the status endpoint.
	StatusChange { description: String },
	/// Staff uploaded a new proof round.
	#[serde(rename_all = "camelCase")]
	ProofUploaded {
		proof_id: String,
		proof_round: u32,
		file_reference: String,
	},
	/// The customer answered a proof.
	#[serde(rename_all = "camelCase")]
	ProofResponse {
		proof_id: String,
		proof_round: u32,
		action: ProofAction,
		/// True when the escalation policy replaced `changes-requested`.
		escalated: bool,
	},
	/// Staff acted on an escalated order.
	#[serde(rename_all = "camelCase")]
	Escalation {
		action: EscalationAction,
		contact_customer: bool,
	},
}

/// One immutable row of an order's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
	pub id: String,
	pub order_id: String,
	/// 1-based position of the row in the order's history.
	pub sequence: u64,
	pub from_status: OrderStatus,
	pub to_status: OrderStatus,
	pub changed_by: String,
	pub changed_by_role: Role,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub comments: Option<String>,
	pub metadata: HistoryMetadata,
	pub created_at: DateTime<Utc>,
}
