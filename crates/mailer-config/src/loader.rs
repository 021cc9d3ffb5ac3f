//! Multi-file configuration loading.
//!
//! The entry file may name other files in an `include` key (a string or an
//! array of strings). Included files are merged into the entry file at the
//! top level; a section defined in two files is rejected, as is a file that
//! is reached twice.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub(crate) struct ConfigLoader {
	base_path: PathBuf,
	visited: HashSet<PathBuf>,
	/// Section name to the file that defined it.
	owners: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub(crate) fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			visited: HashSet::new(),
			owners: HashMap::new(),
		}
	}

	pub(crate) async fn load_config(
		&mut self,
		entry: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let entry = self.resolve_path(entry)?;
		let mut merged = self.read_table(&entry).await?;

		let includes = match merged.remove("include") {
			Some(value) => include_paths(value)?,
			None => Vec::new(),
		};
		self.claim_sections(&merged, &entry)?;

		for include in includes {
			let path = self.resolve_path(&include)?;
			let table = self.read_table(&path).await?;
			if table.contains_key("include") {
				return Err(ConfigError::Validation(format!(
					"Nested include in {} is not supported",
					path.display()
				)));
			}
			self.claim_sections(&table, &path)?;
			merged.extend(table);
		}

		let text = toml::to_string(&toml::Value::Table(merged)).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		text.parse()
	}

	/// Reads a file, substitutes environment variables and parses it.
	async fn read_table(&mut self, path: &Path) -> Result<toml::Table, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await?;
		if !self.visited.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		let resolved = resolve_env_vars(&content)?;
		Ok(toml::from_str(&resolved)?)
	}

	fn claim_sections(&mut self, table: &toml::Table, source: &Path) -> Result<(), ConfigError> {
		for key in table.keys() {
			if let Some(owner) = self.owners.get(key) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}",
					key,
					owner.display(),
					source.display()
				)));
			}
			self.owners.insert(key.clone(), source.to_path_buf());
		}
		Ok(())
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}
		Ok(resolved)
	}
}

fn include_paths(value: toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match value {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(items) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		_ => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}
