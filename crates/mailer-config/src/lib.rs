//! Configuration for the mail-order lifecycle service.
//!
//! Configuration is read from TOML. Values of the form `${VAR}` or
//! `${VAR:-default}` are substituted from the environment before parsing, and
//! a file may pull in other files through `include = ["extra.toml"]` as long
//! as every top-level section is defined exactly once.

mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub service: ServiceConfig,
	pub storage: BackendConfig,
	pub identity: BackendConfig,
	pub notification: NotificationConfig,
	#[serde(default)]
	pub workflow: WorkflowConfig,
	/// HTTP server settings. The server is not started when absent.
	pub api: Option<ApiConfig>,
}

/// Identity of this service instance, used in logs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	pub id: String,
}

/// A pluggable component: the implementation to use and the settings of
/// every configured implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

impl BackendConfig {
	/// Returns the settings table of the primary implementation.
	pub fn primary_config(&self) -> Option<&toml::Value> {
		self.implementations.get(&self.primary)
	}

	fn validate(&self, section: &str) -> Result<(), ConfigError> {
		if self.implementations.is_empty() {
			return Err(ConfigError::Validation(format!(
				"At least one {} implementation must be configured",
				section
			)));
		}
		if self.primary.is_empty() {
			return Err(ConfigError::Validation(format!(
				"{} primary implementation cannot be empty",
				section
			)));
		}
		if !self.implementations.contains_key(&self.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary {} '{}' not found in implementations",
				section, self.primary
			)));
		}
		Ok(())
	}
}

/// Notification channel selection and delivery retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
	/// Delivery attempts before a failure record is stored.
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	/// Delay between attempts, multiplied by the attempt number.
	#[serde(default = "default_retry_delay_ms")]
	pub retry_delay_ms: u64,
}

impl NotificationConfig {
	pub fn backend(&self) -> BackendConfig {
		BackendConfig {
			primary: self.primary.clone(),
			implementations: self.implementations.clone(),
		}
	}
}

fn default_max_attempts() -> u32 {
	3
}

fn default_retry_delay_ms() -> u64 {
	250
}

/// Business rules of the order workflow.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
	/// Number of proofs after which a change request escalates the order.
	#[serde(default = "default_escalation_proof_threshold")]
	pub escalation_proof_threshold: u32,
	/// Prefix of generated order numbers, e.g. `MO-20240101-1a2b3c`.
	#[serde(default = "default_order_number_prefix")]
	pub order_number_prefix: String,
}

impl Default for WorkflowConfig {
	fn default() -> Self {
		Self {
			escalation_proof_threshold: default_escalation_proof_threshold(),
			order_number_prefix: default_order_number_prefix(),
		}
	}
}

fn default_escalation_proof_threshold() -> u32 {
	3
}

fn default_order_number_prefix() -> String {
	"MO".to_string()
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of `VAR_NAME`, or with the text after
/// `:-` in `${VAR_NAME:-default}` when the variable is unset.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					name.as_str()
				)))
			}
		};
		result.push_str(&input[last_end..whole.start()]);
		result.push_str(&value);
		last_end = whole.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;

		loader::ConfigLoader::new(base_dir).load_config(file_name).await
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		self.storage.validate("storage")?;
		self.identity.validate("identity")?;
		self.notification.backend().validate("notification")?;

		if !(1..=10).contains(&self.notification.max_attempts) {
			return Err(ConfigError::Validation(
				"notification.max_attempts must be between 1 and 10".into(),
			));
		}

		if self.workflow.escalation_proof_threshold == 0 {
			return Err(ConfigError::Validation(
				"workflow.escalation_proof_threshold must be at least 1".into(),
			));
		}
		if self.workflow.order_number_prefix.trim().is_empty() {
			return Err(ConfigError::Validation(
				"workflow.order_number_prefix cannot be empty".into(),
			));
		}

		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	pub(crate) const MINIMAL: &str = r#"
[service]
id = "mailer-test"

[storage]
primary = "memory"
[storage.implementations.memory]

[identity]
primary = "header"
[identity.implementations.header]

[notification]
primary = "log"
[notification.implementations.log]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("MAILER_TEST_HOST", "localhost");
		std::env::set_var("MAILER_TEST_PORT", "8080");

		let input = "host = \"${MAILER_TEST_HOST}:${MAILER_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:8080\"");

		std::env::remove_var("MAILER_TEST_HOST");
		std::env::remove_var("MAILER_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "token = \"${MAILER_MISSING_VAR:-fallback}\"";
		assert_eq!(resolve_env_vars(input).unwrap(), "token = \"fallback\"");

		let input = "token = \"${MAILER_MISSING_VAR:-}\"";
		assert_eq!(resolve_env_vars(input).unwrap(), "token = \"\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${MAILER_MISSING_VAR}\"");
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("MAILER_MISSING_VAR"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.service.id, "mailer-test");
		assert_eq!(config.notification.max_attempts, 3);
		assert_eq!(config.notification.retry_delay_ms, 250);
		assert_eq!(config.workflow.escalation_proof_threshold, 3);
		assert_eq!(config.workflow.order_number_prefix, "MO");
		assert!(config.api.is_none());
		assert!(config.storage.primary_config().is_some());
	}

	#[test]
	fn test_primary_must_be_configured() {
		let config_str = MINIMAL.replace("primary = \"memory\"", "primary = \"file\"");
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err
			.to_string()
			.contains("Primary storage 'file' not found in implementations"));
	}

	#[test]
	fn test_workflow_bounds_rejected() {
		let config_str = format!("{}\n[workflow]\nescalation_proof_threshold = 0\n", MINIMAL);
		assert!(config_str.parse::<Config>().is_err());

		let config_str = MINIMAL.replace(
			"primary = \"log\"",
			"primary = \"log\"\nmax_attempts = 0",
		);
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("max_attempts"));
	}

	#[test]
	fn test_api_section() {
		let config_str = format!("{}\n[api]\nenabled = true\nport = 8088\n", MINIMAL);
		let config: Config = config_str.parse().unwrap();
		let api = config.api.unwrap();
		assert!(api.enabled);
		assert_eq!(api.host, "127.0.0.1");
		assert_eq!(api.port, 8088);
	}
}
