//! Storage module for the mail-order lifecycle service.
//!
//! Backends are plain key-value stores with one extra capability: a
//! [`WriteBatch`] of guarded writes that either lands completely or not at
//! all. Every state change of an order (the order record, its history row and
//! any proof) goes through a single batch, and the guard on the order record
//! is what turns two racing transitions into one success and one
//! [`StorageError::Conflict`].

use async_trait::async_trait;
use mailer_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	/// A write precondition did not hold; nothing from the batch was written.
	#[error("Write conflict on key '{0}'")]
	Conflict(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Condition a key must satisfy for a guarded write to proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
	/// Write unconditionally.
	Any,
	/// The key must not exist yet.
	Absent,
	/// The key must currently hold exactly these bytes.
	Matches(Vec<u8>),
}

impl Precondition {
	/// Checks the precondition against the current value of a key.
	pub fn holds(&self, current: Option<&[u8]>) -> bool {
		match (self, current) {
			(Precondition::Any, _) => true,
			(Precondition::Absent, current) => current.is_none(),
			(Precondition::Matches(expected), Some(current)) => expected.as_slice() == current,
			(Precondition::Matches(_), None) => false,
		}
	}
}

/// A single guarded write inside a batch.
#[derive(Debug, Clone)]
pub struct GuardedWrite {
	pub key: String,
	pub value: Vec<u8>,
	pub precondition: Precondition,
}

/// Writes that must be applied as one unit.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
	writes: Vec<GuardedWrite>,
}

impl WriteBatch {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>, precondition: Precondition) {
		self.writes.push(GuardedWrite {
			key: key.into(),
			value,
			precondition,
		});
	}

	pub fn writes(&self) -> &[GuardedWrite] {
		&self.writes
	}

	pub fn is_empty(&self) -> bool {
		self.writes.is_empty()
	}

	pub fn len(&self) -> usize {
		self.writes.len()
	}
}

/// Trait defining the low-level interface for storage backends.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, overwriting any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists every key starting with `prefix`, in ascending order.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Applies every write of the batch, or none of them.
	///
	/// All preconditions are checked before anything is written. If one
	/// fails the call returns [`StorageError::Conflict`] naming that key.
	async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

fn storage_key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

fn encode<T: Serialize>(data: &T) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
	serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// A stored value together with the exact bytes it was decoded from.
///
/// The bytes are the token for a later [`Transaction::replace`].
#[derive(Debug, Clone)]
pub struct Versioned<T> {
	pub value: T,
	pub raw: Vec<u8>,
}

/// High-level storage service that provides typed operations.
///
/// Values are stored as JSON under `namespace:id` keys.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a value unconditionally.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes = encode(data)?;
		self.backend
			.set_bytes(&storage_key(namespace, id), bytes)
			.await
	}

	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&storage_key(namespace, id)).await?;
		decode(&bytes)
	}

	/// Retrieves a value along with the bytes needed to guard an update.
	pub async fn retrieve_versioned<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Versioned<T>, StorageError> {
		let raw = self.backend.get_bytes(&storage_key(namespace, id)).await?;
		let value = decode(&raw)?;
		Ok(Versioned { value, raw })
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&storage_key(namespace, id)).await
	}

	/// Lists the values of a namespace whose id starts with `id_prefix`,
	/// ordered by key.
	pub async fn list<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id_prefix: &str,
	) -> Result<Vec<T>, StorageError> {
		let keys = self
			.backend
			.list_keys(&storage_key(namespace, id_prefix))
			.await?;

		let mut values = Vec::with_capacity(keys.len());
		for key in keys {
			match self.backend.get_bytes(&key).await {
				Ok(bytes) => values.push(decode(&bytes)?),
				// Deleted between listing and reading.
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(values)
	}

	/// Starts a batch of guarded writes.
	pub fn transaction(&self) -> Transaction<'_> {
		Transaction {
			service: self,
			batch: WriteBatch::new(),
		}
	}
}

/// Typed builder over a [`WriteBatch`].
pub struct Transaction<'a> {
	service: &'a StorageService,
	batch: WriteBatch,
}

impl Transaction<'_> {
	/// Writes a value that must not exist yet.
	pub fn insert<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<&mut Self, StorageError> {
		self.batch
			.put(storage_key(namespace, id), encode(data)?, Precondition::Absent);
		Ok(self)
	}

	/// Overwrites a value that must still hold the bytes it was read from.
	pub fn replace<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
		expected: &[u8],
	) -> Result<&mut Self, StorageError> {
		self.batch.put(
			storage_key(namespace, id),
			encode(data)?,
			Precondition::Matches(expected.to_vec()),
		);
		Ok(self)
	}

	pub fn len(&self) -> usize {
		self.batch.len()
	}

	pub fn is_empty(&self) -> bool {
		self.batch.is_empty()
	}

	pub async fn commit(self) -> Result<(), StorageError> {
		if self.batch.is_empty() {
			return Ok(());
		}
		self.service.backend.commit(self.batch).await
	}
}
