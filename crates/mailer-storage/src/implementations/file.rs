//! File-based storage backend.
//!
//! Each key is one file under the configured directory. Keys are escaped into
//! file names reversibly so that prefix listing can recover them. Single
//! writes go through a temp file and a rename.
//!
//! A batch commit holds the write side of a process-wide lock: it checks
//! every precondition, writes every value to a temp file, and only then
//! renames them into place. If a rename fails the files already renamed are
//! put back to their previous contents. Reads take the read side, so they
//! never observe a batch half applied.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry, WriteBatch};
use async_trait::async_trait;
use mailer_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

const EXTENSION: &str = "json";

pub struct FileStorage {
	base_path: PathBuf,
	lock: RwLock<()>,
}

/// A batch write whose value sits in a temp file, waiting to be renamed.
struct StagedWrite {
	key: String,
	temp: PathBuf,
	path: PathBuf,
	previous: Option<Vec<u8>>,
}

fn backend_error(e: std::io::Error) -> StorageError {
	StorageError::Backend(e.to_string())
}

async fn remove_if_present(path: &Path) -> Result<(), StorageError> {
	match fs::remove_file(path).await {
		Ok(_) => Ok(()),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(backend_error(e)),
	}
}

async fn discard(staged: &[StagedWrite]) {
	for write in staged {
		if let Err(e) = remove_if_present(&write.temp).await {
			tracing::warn!(key = %write.key, error = %e, "Failed to remove temp file");
		}
	}
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self {
			base_path,
			lock: RwLock::new(()),
		}
	}

	fn file_path(&self, key: &str) -> PathBuf {
		self.base_path
			.join(format!("{}.{}", escape_key(key), EXTENSION))
	}

	async fn read_optional(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		match fs::read(self.file_path(key)).await {
			Ok(data) => Ok(Some(data)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(backend_error(e)),
		}
	}

	async fn write_file(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
		fs::create_dir_all(&self.base_path)
			.await
			.map_err(backend_error)?;

		let path = self.file_path(key);
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value).await.map_err(backend_error)?;
		fs::rename(&temp_path, &path).await.map_err(backend_error)
	}

	/// Checks every precondition, then writes every value to its own temp
	/// file. Nothing visible changes; on error no temp file is left behind.
	async fn stage(&self, batch: &WriteBatch) -> Result<Vec<StagedWrite>, StorageError> {
		let mut previous = Vec::with_capacity(batch.len());
		for write in batch.writes() {
			let current = self.read_optional(&write.key).await?;
			if !write.precondition.holds(current.as_deref()) {
				return Err(StorageError::Conflict(write.key.clone()));
			}
			previous.push(current);
		}

		fs::create_dir_all(&self.base_path)
			.await
			.map_err(backend_error)?;

		let mut staged: Vec<StagedWrite> = Vec::with_capacity(batch.len());
		for (index, (write, previous)) in batch.writes().iter().zip(previous).enumerate() {
			let path = self.file_path(&write.key);
			let temp = path.with_extension(format!("{}.tmp", index));
			if let Err(e) = fs::write(&temp, &write.value).await {
				discard(&staged).await;
				let _ = remove_if_present(&temp).await;
				return Err(backend_error(e));
			}
			staged.push(StagedWrite {
				key: write.key.clone(),
				temp,
				path,
				previous,
			});
		}
		Ok(staged)
	}

	/// Renames staged files into place. A failed rename undoes the ones
	/// already done and drops the rest.
	async fn publish(&self, staged: Vec<StagedWrite>) -> Result<(), StorageError> {
		for (done, write) in staged.iter().enumerate() {
			if let Err(e) = fs::rename(&write.temp, &write.path).await {
				tracing::error!(key = %write.key, error = %e, "Batch rename failed, rolling back");
				self.restore(&staged[..done]).await;
				discard(&staged[done..]).await;
				return Err(backend_error(e));
			}
		}
		Ok(())
	}

	async fn restore(&self, applied: &[StagedWrite]) {
		for write in applied.iter().rev() {
			let result = match &write.previous {
				Some(bytes) => self.write_file(&write.key, bytes).await,
				None => remove_if_present(&write.path).await,
			};
			if let Err(e) = result {
				tracing::error!(key = %write.key, error = %e, "Failed to restore key after aborted batch");
			}
		}
	}
}

/// Escapes every byte outside `[A-Za-z0-9._-]` as `%XX`.
fn escape_key(key: &str) -> String {
	let mut out = String::with_capacity(key.len());
	for byte in key.bytes() {
		match byte {
			b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => out.push(byte as char),
			_ => out.push_str(&format!("%{:02X}", byte)),
		}
	}
	out
}

fn unescape_key(name: &str) -> Option<String> {
	let bytes = name.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'%' {
			let hex = name.get(i + 1..i + 3)?;
			out.push(u8::from_str_radix(hex, 16).ok()?);
			i += 3;
		} else {
			out.push(bytes[i]);
			i += 1;
		}
	}
	String::from_utf8(out).ok()
}

fn key_from_path(path: &Path) -> Option<String> {
	if path.extension()? != EXTENSION {
		return None;
	}
	unescape_key(path.file_stem()?.to_str()?)
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let _guard = self.lock.read().await;
		self.read_optional(key).await?.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let _guard = self.lock.write().await;
		self.write_file(key, &value).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let _guard = self.lock.write().await;
		remove_if_present(&self.file_path(key)).await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let _guard = self.lock.read().await;
		fs::try_exists(self.file_path(key))
			.await
			.map_err(backend_error)
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let _guard = self.lock.read().await;
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(backend_error(e)),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries.next_entry().await.map_err(backend_error)? {
			match key_from_path(&entry.path()) {
				Some(key) if key.starts_with(prefix) => keys.push(key),
				Some(_) => {}
				None => tracing::debug!(path = ?entry.path(), "Skipping foreign file in storage directory"),
			}
		}
		keys.sort();
		Ok(keys)
	}

	async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
		let _guard = self.lock.write().await;
		let staged = self.stage(&batch).await?;
		self.publish(staged).await?;
		tracing::trace!(writes = batch.len(), "Committed storage batch");
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(path) if path.trim().is_empty() => {
						Err("storage_path cannot be empty".to_string())
					}
					_ => Ok(()),
				}
			})],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: base directory for files (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage");

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
