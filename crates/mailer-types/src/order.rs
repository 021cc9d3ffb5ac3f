//! Order and practice types.
//!
//! An order is the unit of print-and-mail work placed by a practice. Its
//! `status` is a cached projection of the most recent status history row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Tenant organization that owns orders and users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Practice {
	pub id: String,
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub contact_email: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub contact_phone: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// Request body for registering a practice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPractice {
	pub name: String,
	#[serde(default)]
	pub contact_email: Option<String>,
	#[serde(default)]
	pub contact_phone: Option<String>,
	#[serde(default)]
	pub address: Option<String>,
}

/// A mailing order tracked through the status lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// Human-facing order number, immutable once assigned.
	pub order_number: String,
	/// Practice (tenant) that owns the order.
	pub practice_id: String,
	/// User who created the order.
	pub user_id: String,
	/// Current status, always equal to the last history row's `to_status`.
	pub status: OrderStatus,
	/// Quoted cost of the mailing.
	pub cost: Decimal,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Quote this order was converted from, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub quote_id: Option<String>,
	/// Incremented on every committed mutation.
	pub version: u64,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Request body for creating an order or converting a quote into one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
	/// Target practice. Required for super-admins, defaulted for everyone else.
	#[serde(default)]
	pub practice_id: Option<String>,
	pub cost: Decimal,
	#[serde(default)]
	pub description: Option<String>,
	/// When present the order is a quote conversion and starts `pending`.
	#[serde(default)]
	pub quote_id: Option<String>,
}

/// Status of an order, without the round parameter.
///
/// Transition legality is decided on the kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatusKind {
	Draft,
	Pending,
	InProgress,
	WaitingApproval,
	Approved,
	ChangesRequested,
	Escalated,
	Completed,
	Delivered,
}

impl OrderStatusKind {
	/// Returns the wire representation of the kind.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatusKind::Draft => "draft",
			OrderStatusKind::Pending => "pending",
			OrderStatusKind::InProgress => "in-progress",
			OrderStatusKind::WaitingApproval => "waiting-approval",
			OrderStatusKind::Approved => "approved",
			OrderStatusKind::ChangesRequested => "changes-requested",
			OrderStatusKind::Escalated => "escalated",
			OrderStatusKind::Completed => "completed",
			OrderStatusKind::Delivered => "delivered",
		}
	}

	/// Returns an iterator over every kind.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Draft,
			Self::Pending,
			Self::InProgress,
			Self::WaitingApproval,
			Self::Approved,
			Self::ChangesRequested,
			Self::Escalated,
			Self::Completed,
			Self::Delivered,
		]
		.into_iter()
	}
}

impl fmt::Display for OrderStatusKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatusKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.starts_with("waiting-approval") {
			return s.parse::<OrderStatus>().map(|status| status.kind()).or_else(|_| {
				if s == "waiting-approval" {
					Ok(Self::WaitingApproval)
				} else {
					Err(format!("unknown order status '{}'", s))
				}
			});
		}
		Self::all()
			.find(|kind| kind.as_str() == s)
			.ok_or_else(|| format!("unknown order status '{}'", s))
	}
}

/// Status of an order, including the proof round while awaiting approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
	Draft,
	Pending,
	InProgress,
	WaitingApproval { round: u32 },
	Approved,
	ChangesRequested,
	Escalated,
	Completed,
	Delivered,
}

const WAITING_APPROVAL_PREFIX: &str = "waiting-approval-round-";

impl OrderStatus {
	/// Returns the kind of this status, dropping the round parameter.
	pub fn kind(&self) -> OrderStatusKind {
		match self {
			OrderStatus::Draft => OrderStatusKind::Draft,
			OrderStatus::Pending => OrderStatusKind::Pending,
			OrderStatus::InProgress => OrderStatusKind::InProgress,
			OrderStatus::WaitingApproval { .. } => OrderStatusKind::WaitingApproval,
			OrderStatus::Approved => OrderStatusKind::Approved,
			OrderStatus::ChangesRequested => OrderStatusKind::ChangesRequested,
			OrderStatus::Escalated => OrderStatusKind::Escalated,
			OrderStatus::Completed => OrderStatusKind::Completed,
			OrderStatus::Delivered => OrderStatusKind::Delivered,
		}
	}

	/// Builds a status from a kind. `WaitingApproval` needs the proof round.
	pub fn from_kind(kind: OrderStatusKind, round: Option<u32>) -> Option<Self> {
		Some(match kind {
			OrderStatusKind::Draft => OrderStatus::Draft,
			OrderStatusKind::Pending => OrderStatus::Pending,
			OrderStatusKind::InProgress => OrderStatus::InProgress,
			OrderStatusKind::WaitingApproval => OrderStatus::WaitingApproval { round: round? },
			OrderStatusKind::Approved => OrderStatus::Approved,
			OrderStatusKind::ChangesRequested => OrderStatus::ChangesRequested,
			OrderStatusKind::Escalated => OrderStatus::Escalated,
			OrderStatusKind::Completed => OrderStatus::Completed,
			OrderStatusKind::Delivered => OrderStatus::Delivered,
		})
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::WaitingApproval { round } => {
				write!(f, "{}{}", WAITING_APPROVAL_PREFIX, round)
			}
			other => f.write_str(other.kind().as_str()),
		}
	}
}

impl FromStr for OrderStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if let Some(round) = s.strip_prefix(WAITING_APPROVAL_PREFIX) {
			let round: u32 = round
				.parse()
				.map_err(|_| format!("invalid proof round in status '{}'", s))?;
			if round == 0 {
				return Err(format!("proof rounds start at 1, got '{}'", s));
			}
			return Ok(OrderStatus::WaitingApproval { round });
		}
		let kind = OrderStatusKind::all()
			.filter(|kind| *kind != OrderStatusKind::WaitingApproval)
			.find(|kind| kind.as_str() == s)
			.ok_or_else(|| format!("unknown order status '{}'", s))?;
		OrderStatus::from_kind(kind, None).ok_or_else(|| format!("unknown order status '{}'", s))
	}
}

impl Serialize for OrderStatus {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for OrderStatus {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_waiting_approval_carries_round() {
		let status: OrderStatus = "waiting-approval-round-2".parse().unwrap();
		assert_eq!(status, OrderStatus::WaitingApproval { round: 2 });
		assert_eq!(status.to_string(), "waiting-approval-round-2");
		assert_eq!(status.kind(), OrderStatusKind::WaitingApproval);
	}

	#[test]
	fn test_bare_waiting_approval_is_only_a_kind() {
		assert!("waiting-approval".parse::<OrderStatus>().is_err());
		assert_eq!(
			"waiting-approval".parse::<OrderStatusKind>().unwrap(),
			OrderStatusKind::WaitingApproval
		);
		assert!("waiting-approval-round-0".parse::<OrderStatus>().is_err());
	}

	#[test]
	fn test_status_json_uses_kebab_strings() {
		let json = serde_json::to_string(&OrderStatus::InProgress).unwrap();
		assert_eq!(json, "\"in-progress\"");
		let kind: OrderStatusKind = serde_json::from_str("\"changes-requested\"").unwrap();
		assert_eq!(kind, OrderStatusKind::ChangesRequested);
	}
}
