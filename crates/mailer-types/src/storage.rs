//! Storage-related types for the mailer service.

use std::str::FromStr;

/// Storage namespaces for the different record collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Practice (tenant) records
	Practices,
	/// Order records
	Orders,
	/// Index of assigned order numbers to order ids
	OrderNumbers,
	/// Proof records, keyed by order id and round
	Proofs,
	/// Append-only status history, keyed by order id and sequence
	OrderHistory,
	/// Notifications whose delivery failed
	NotificationFailures,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Practices => "practices",
			StorageKey::Orders => "orders",
			StorageKey::OrderNumbers => "order_numbers",
			StorageKey::Proofs => "proofs",
			StorageKey::OrderHistory => "order_history",
			StorageKey::NotificationFailures => "notification_failures",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Practices,
			Self::Orders,
			Self::OrderNumbers,
			Self::Proofs,
			Self::OrderHistory,
			Self::NotificationFailures,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}

/// Builds the id of a record nested under an order, e.g. `order-1:000003`.
///
/// Zero-padding keeps lexical key order equal to numeric order.
pub fn nested_id(order_id: &str, position: u64) -> String {
	format!("{}:{:06}", order_id, position)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_storage_key_round_trips_through_str() {
		for key in StorageKey::all() {
			assert_eq!(key.as_str().parse::<StorageKey>(), Ok(key));
		}
		assert!("quotes".parse::<StorageKey>().is_err());
	}

	#[test]
	fn test_nested_ids_sort_numerically() {
		let mut ids = vec![nested_id("o", 10), nested_id("o", 2), nested_id("o", 1)];
		ids.sort();
		assert_eq!(ids, vec!["o:000001", "o:000002", "o:000010"]);
	}
}
