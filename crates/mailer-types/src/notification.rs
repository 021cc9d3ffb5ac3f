//! Notification types.
//!
//! Notification requests are produced after a transition commits and handed
//! to an external mail channel. Delivery and templating happen outside the
//! service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of email the external channel should send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
	StatusChange,
	ProofResponse,
	EscalationHandled,
	EscalationCustomerContact,
}

impl fmt::Display for EmailType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			EmailType::StatusChange => "status_change",
			EmailType::ProofResponse => "proof_response",
			EmailType::EscalationHandled => "escalation_handled",
			EmailType::EscalationCustomerContact => "escalation_customer_contact",
		};
		f.write_str(s)
	}
}

/// A request for the notification channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
	pub id: String,
	pub email_type: EmailType,
	pub order_id: String,
	pub order_number: String,
	pub practice_id: String,
	/// Owner of the order, the usual recipient.
	pub user_id: String,
	/// Human-readable summary of what happened.
	pub description: String,
	pub created_at: DateTime<Utc>,
}

/// Record stored when every delivery attempt for a request failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFailure {
	pub id: String,
	pub request: NotificationRequest,
	pub attempts: u32,
	pub last_error: String,
	pub failed_at: DateTime<Utc>,
}
