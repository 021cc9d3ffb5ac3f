//! Factory registry for pluggable implementations.
//!
//! Every implementation a crate exports through `get_all_implementations` is
//! registered here once; the configuration then selects among them by name.

use mailer_config::Config;
use mailer_core::{LifecycleBuilder, LifecycleFactories, ServiceHandles};
use mailer_identity::IdentityFactory;
use mailer_notify::NotificationFactory;
use mailer_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Known factories per component, keyed by implementation name.
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub identity: HashMap<String, IdentityFactory>,
	pub notification: HashMap<String, NotificationFactory>,
}

impl FactoryRegistry {
	fn collect() -> Self {
		let mut registry = Self {
			storage: HashMap::new(),
			identity: HashMap::new(),
			notification: HashMap::new(),
		};

		for (name, factory) in mailer_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.storage.insert(name.to_string(), factory);
		}
		for (name, factory) in mailer_identity::get_all_implementations() {
			tracing::debug!("Registering identity implementation: {}", name);
			registry.identity.insert(name.to_string(), factory);
		}
		for (name, factory) in mailer_notify::get_all_implementations() {
			tracing::debug!("Registering notification implementation: {}", name);
			registry.notification.insert(name.to_string(), factory);
		}

		registry
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(FactoryRegistry::collect)
}

/// Picks the factory for every configured implementation, rejecting
/// names nothing registered.
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the lifecycle and identity services selected by the configuration.
pub fn build_service_from_config(
	config: Config,
) -> Result<ServiceHandles, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let factories = LifecycleFactories {
		storage_factories: build_factories!(
			registry,
			config.storage.implementations,
			storage,
			"storage"
		),
		identity_factories: build_factories!(
			registry,
			config.identity.implementations,
			identity,
			"identity"
		),
		notification_factories: build_factories!(
			registry,
			config.notification.implementations,
			notification,
			"notification"
		),
	};

	Ok(LifecycleBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	const CONFIG: &str = r#"
[service]
id = "mailer-registry-test"

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
	fn test_registry_knows_every_implementation() {
		let registry = get_registry();
		for name in ["memory", "file"] {
			assert!(registry.storage.contains_key(name));
		}
		for name in ["header", "token"] {
			assert!(registry.identity.contains_key(name));
		}
		for name in ["log", "webhook"] {
			assert!(registry.notification.contains_key(name));
		}
	}

	#[test]
	fn test_build_from_config() {
		let config: Config = CONFIG.parse().unwrap();
		assert!(build_service_from_config(config).is_ok());
	}

	#[test]
	fn test_unknown_implementation_is_rejected() {
		let config: Config = CONFIG
			.replace(
				"[notification.implementations.log]",
				"[notification.implementations.log]\n[notification.implementations.pigeon]",
			)
			.parse()
			.unwrap();
		let err = build_service_from_config(config).err().unwrap();
		assert!(err.to_string().contains("Unknown notification implementation 'pigeon'"));
	}
}
