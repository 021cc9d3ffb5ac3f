//! Notification channel that POSTs each request as JSON to a mail gateway.

use crate::{NotificationError, NotificationFactory, NotificationInterface, NotificationRegistry};
use async_trait::async_trait;
use mailer_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, NotificationRequest, Schema,
	SecretString, ValidationError,
};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

pub struct WebhookNotifier {
	client: reqwest::Client,
	url: String,
	auth_token: Option<SecretString>,
}

impl WebhookNotifier {
	pub fn new(
		url: impl Into<String>,
		auth_token: Option<SecretString>,
		timeout: Duration,
	) -> Result<Self, NotificationError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| NotificationError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			url: url.into(),
			auth_token,
		})
	}
}

#[async_trait]
impl NotificationInterface for WebhookNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(WebhookNotifierSchema)
	}

	async fn send(&self, request: &NotificationRequest) -> Result<(), NotificationError> {
		let mut call = self.client.post(&self.url).json(request);
		if let Some(token) = &self.auth_token {
			call = token.with_exposed(|t| call.bearer_auth(t));
		}

		let response = call
			.send()
			.await
			.map_err(|e| NotificationError::Network(e.to_string()))?;

		let status = response.status();
		if status.is_success() {
			return Ok(());
		}
		let body = response.text().await.unwrap_or_default();
		Err(NotificationError::Rejected(format!(
			"{} {}",
			status.as_u16(),
			body.chars().take(200).collect::<String>()
		)))
	}
}

pub struct WebhookNotifierSchema;

impl ConfigSchema for WebhookNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					}
					_ => Err("must be an http:// or https:// URL".to_string()),
				}
			})],
			vec![
				Field::new("auth_token", FieldType::String),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(120),
					},
				),
			],
		)
		.validate(config)
	}
}

/// Factory function to create a webhook notifier.
///
/// Configuration parameters:
/// - `url`: endpoint receiving the JSON requests (required)
/// - `auth_token`: bearer token; blank means none
/// - `timeout_seconds`: per-request timeout (default: 10)
pub fn create_notifier(
	config: &toml::Value,
) -> Result<Box<dyn NotificationInterface>, NotificationError> {
	WebhookNotifierSchema
		.validate(config)
		.map_err(|e| NotificationError::Configuration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| NotificationError::Configuration("url is required".into()))?;
	let auth_token = mailer_types::non_blank(config.get("auth_token").and_then(|v| v.as_str()))
		.map(SecretString::from);
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|secs| secs as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(WebhookNotifier::new(
		url,
		auth_token,
		Duration::from_secs(timeout),
	)?))
}

/// Registry for the webhook notification implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "webhook";
	type Factory = NotificationFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotificationRegistry for Registry {}
