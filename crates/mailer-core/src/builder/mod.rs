//! Builder for assembling the lifecycle service from configuration.
//!
//! Each pluggable component (storage, identity, notification) is created
//! from its configured primary implementation through a factory looked up
//! by name. Factories validate their own configuration section.

use crate::OrderLifecycleService;
use mailer_config::{BackendConfig, Config};
use mailer_identity::{IdentityError, IdentityInterface, IdentityService};
use mailer_notify::{NotificationError, NotificationInterface, NotificationService, RetryPolicy};
use mailer_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while assembling the service.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions keyed by implementation name, one map per component.
pub struct LifecycleFactories<SF, IF, NF> {
	pub storage_factories: HashMap<String, SF>,
	pub identity_factories: HashMap<String, IF>,
	pub notification_factories: HashMap<String, NF>,
}

/// Everything the HTTP layer needs from a built service.
#[derive(Clone)]
pub struct ServiceHandles {
	pub lifecycle: Arc<OrderLifecycleService>,
	pub identity: Arc<IdentityService>,
}

pub struct LifecycleBuilder {
	config: Config,
}

impl LifecycleBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub fn build<SF, IF, NF>(
		self,
		factories: LifecycleFactories<SF, IF, NF>,
	) -> Result<ServiceHandles, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		IF: Fn(&toml::Value) -> Result<Box<dyn IdentityInterface>, IdentityError>,
		NF: Fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotificationError>,
	{
		let storage_backend =
			create_primary("storage", &self.config.storage, &factories.storage_factories)?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let identity_impl = create_primary(
			"identity",
			&self.config.identity,
			&factories.identity_factories,
		)?;
		let identity = Arc::new(IdentityService::new(identity_impl));

		let channel = create_primary(
			"notification",
			&self.config.notification.backend(),
			&factories.notification_factories,
		)?;
		let policy = RetryPolicy {
			max_attempts: self.config.notification.max_attempts,
			retry_delay: Duration::from_millis(self.config.notification.retry_delay_ms),
		};
		let notifications = Arc::new(NotificationService::new(channel, storage.clone(), policy));

		tracing::info!(
			service_id = %self.config.service.id,
			escalation_threshold = self.config.workflow.escalation_proof_threshold,
			order_prefix = %self.config.workflow.order_number_prefix,
			"Lifecycle service assembled"
		);

		let lifecycle = Arc::new(OrderLifecycleService::new(
			storage,
			notifications,
			self.config.workflow,
		));
		Ok(ServiceHandles {
			lifecycle,
			identity,
		})
	}
}

/// Runs the factory of a component's primary implementation.
///
/// Configured implementations other than the primary are not instantiated.
fn create_primary<T, E, F>(
	component: &'static str,
	backend: &BackendConfig,
	factories: &HashMap<String, F>,
) -> Result<T, BuilderError>
where
	E: Display,
	F: Fn(&toml::Value) -> Result<T, E>,
{
	let name = backend.primary.as_str();
	let config = backend.primary_config().ok_or_else(|| {
		BuilderError::Config(format!(
			"Primary {} '{}' has no configuration section",
			component, name
		))
	})?;
	let factory = factories.get(name).ok_or_else(|| {
		tracing::error!(component, implementation = %name, "No factory registered");
		BuilderError::MissingComponent(format!("{} implementation '{}'", component, name))
	})?;

	match factory(config) {
		Ok(implementation) => {
			tracing::info!(component, implementation = %name, "Loaded");
			Ok(implementation)
		}
		Err(e) => {
			tracing::error!(
				component,
				implementation = %name,
				error = %e,
				"Failed to create implementation"
			);
			Err(BuilderError::Config(format!(
				"Failed to create {} implementation '{}': {}",
				component, name, e
			)))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use mailer_identity::IdentityFactory;
	use mailer_notify::NotificationFactory;
	use mailer_storage::StorageFactory;

	const CONFIG: &str = r#"
[service]
id = "mailer-builder-test"

[storage]
primary = "memory"
[storage.implementations.memory]

[identity]
primary = "header"
[identity.implementations.header]

[notification]
primary = "log"
max_attempts = 2
[notification.implementations.log]

[workflow]
escalation_proof_threshold = 4
"#;

	fn factories() -> LifecycleFactories<StorageFactory, IdentityFactory, NotificationFactory> {
		LifecycleFactories {
			storage_factories: mailer_storage::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect(),
			identity_factories: mailer_identity::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect(),
			notification_factories: mailer_notify::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect(),
		}
	}

	#[test]
	fn test_build_from_config() {
		let config: Config = CONFIG.parse().unwrap();
		let handles = LifecycleBuilder::new(config).build(factories()).unwrap();
		assert_eq!(handles.lifecycle.workflow().escalation_proof_threshold, 4);
		assert_eq!(handles.lifecycle.workflow().order_number_prefix, "MO");
	}

	#[test]
	fn test_unknown_factory_is_missing_component() {
		let config: Config = CONFIG.parse().unwrap();
		let mut factories = factories();
		factories.identity_factories.remove("header");
		assert!(matches!(
			LifecycleBuilder::new(config).build(factories),
			Err(BuilderError::MissingComponent(_))
		));
	}

	#[test]
	fn test_factory_errors_are_reported() {
		let config: Config = CONFIG
			.replace(
				"[notification.implementations.log]",
				"[notification.implementations.log]\nlabel = 7",
			)
			.parse()
			.unwrap();
		let result = LifecycleBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::Config(msg)) if msg.contains("notification")));
	}
}
