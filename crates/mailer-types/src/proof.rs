//! Proof types.
//!
//! A proof is one round of vendor-produced preview material. Staff upload it,
//! the customer responds to it exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Review state of a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofStatus {
	Pending,
	Approved,
	ChangesRequested,
}

/// Customer response to a pending proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofAction {
	Approved,
	ChangesRequested,
}

impl ProofAction {
	/// Proof status recorded once this response is accepted.
	pub fn proof_status(&self) -> ProofStatus {
		match self {
			ProofAction::Approved => ProofStatus::Approved,
			ProofAction::ChangesRequested => ProofStatus::ChangesRequested,
		}
	}
}

impl fmt::Display for ProofAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProofAction::Approved => f.write_str("APPROVED"),
			ProofAction::ChangesRequested => f.write_str("CHANGES_REQUESTED"),
		}
	}
}

/// One proof round attached to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
	pub id: String,
	pub order_id: String,
	/// 1-based, strictly increasing per order.
	pub proof_round: u32,
	pub status: ProofStatus,
	/// Path or identifier in external file storage.
	pub file_reference: String,
	pub uploaded_by: String,
	pub uploaded_at: DateTime<Utc>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub responded_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_feedback: Option<String>,
}

impl Proof {
	pub fn is_pending(&self) -> bool {
		self.status == ProofStatus::Pending
	}
}
