//! Notification channel that only emits a tracing event.
//!
//! Used in development and in deployments where a log shipper forwards
//! events to the mail system.

use crate::{NotificationError, NotificationFactory, NotificationInterface, NotificationRegistry};
use async_trait::async_trait;
use mailer_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, NotificationRequest, Schema,
	ValidationError,
};

pub struct LogNotifier {
	target_label: String,
}

impl LogNotifier {
	pub fn new(target_label: impl Into<String>) -> Self {
		Self {
			target_label: target_label.into(),
		}
	}
}

#[async_trait]
impl NotificationInterface for LogNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogNotifierSchema)
	}

	async fn send(&self, request: &NotificationRequest) -> Result<(), NotificationError> {
		tracing::info!(
			channel = %self.target_label,
			notification_id = %request.id,
			email_type = %request.email_type,
			order_id = %request.order_id,
			order_number = %request.order_number,
			practice_id = %request.practice_id,
			recipient = %request.user_id,
			"{}",
			request.description
		);
		Ok(())
	}
}

pub struct LogNotifierSchema;

impl ConfigSchema for LogNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![Field::new("label", FieldType::String)]).validate(config)
	}
}

/// Factory function to create a log notifier.
///
/// Configuration parameters:
/// - `label`: value of the `channel` field on emitted events (default: "mail")
pub fn create_notifier(
	config: &toml::Value,
) -> Result<Box<dyn NotificationInterface>, NotificationError> {
	LogNotifierSchema
		.validate(config)
		.map_err(|e| NotificationError::Configuration(e.to_string()))?;

	let label = config
		.get("label")
		.and_then(|v| v.as_str())
		.unwrap_or("mail");
	Ok(Box::new(LogNotifier::new(label)))
}

/// Registry for the log notification implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = NotificationFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotificationRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use mailer_types::EmailType;

	#[tokio::test]
	async fn test_log_notifier_always_succeeds() {
		let notifier = create_notifier(&toml::Value::Table(toml::Table::new())).unwrap();
		let request = NotificationRequest {
			id: "n-1".into(),
			email_type: EmailType::ProofResponse,
			order_id: "o-1".into(),
			order_number: "MO-20240101-000001".into(),
			practice_id: "p-1".into(),
			user_id: "u-1".into(),
			description: "Proof round 1 approved".into(),
			created_at: Utc::now(),
		};
		assert!(notifier.send(&request).await.is_ok());
	}

	#[test]
	fn test_label_must_be_string() {
		let config: toml::Value = toml::from_str("label = 5").unwrap();
		assert!(create_notifier(&config).is_err());
	}
}
