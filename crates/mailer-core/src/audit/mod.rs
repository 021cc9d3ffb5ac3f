//! Append-only status history.
//!
//! Rows are keyed `order_history:{order_id}:{sequence}` with a zero-padded
//! sequence, so a prefix listing returns them in commit order. A row is only
//! ever written with an "absent" precondition inside the same batch as the
//! order update it describes; nothing in the crate updates or deletes one.

use chrono::{DateTime, Utc};
use mailer_storage::{StorageError, StorageService, Transaction};
use mailer_types::{
	nested_id, HistoryMetadata, Order, OrderStatus, Principal, Role, StatusHistoryEntry,
	StorageKey,
};
use std::sync::Arc;

pub struct AuditTrail {
	storage: Arc<StorageService>,
}

impl AuditTrail {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Builds the row for a change to `order`.
	///
	/// The sequence follows the order's version: every committed change bumps
	/// the version by one and writes exactly one row, so the row describing
	/// the change from version `v` is number `v + 1`. `role` is the role the
	/// actor acted with on this order, which for an admin of another practice
	/// who owns the order is `USER`.
	pub fn record(
		order: &Order,
		to_status: OrderStatus,
		actor: &Principal,
		role: Role,
		comments: Option<String>,
		metadata: HistoryMetadata,
		at: DateTime<Utc>,
	) -> StatusHistoryEntry {
		StatusHistoryEntry {
			id: uuid::Uuid::new_v4().to_string(),
			order_id: order.id.clone(),
			sequence: order.version + 1,
			from_status: order.status,
			to_status,
			changed_by: actor.user_id.clone(),
			changed_by_role: role,
			comments,
			metadata,
			created_at: at,
		}
	}

	/// Adds the row to a batch. The batch fails if the sequence is taken.
	pub fn append(tx: &mut Transaction<'_>, entry: &StatusHistoryEntry) -> Result<(), StorageError> {
		tx.insert(
			StorageKey::OrderHistory.as_str(),
			&nested_id(&entry.order_id, entry.sequence),
			entry,
		)?;
		Ok(())
	}

	/// Returns an order's history, oldest first.
	pub async fn history(&self, order_id: &str) -> Result<Vec<StatusHistoryEntry>, StorageError> {
		self.storage
			.list(
				StorageKey::OrderHistory.as_str(),
				&format!("{}:", order_id),
			)
			.await
	}
}
