//! Notification dispatch for committed order events.
//!
//! A [`NotificationInterface`] hands a request to an external mail channel.
//! [`NotificationService`] adds the retry policy on top and, once every
//! attempt has failed, stores a [`NotificationFailure`] so operators can see
//! what was never delivered. Dispatch never reports back into the transition
//! that produced the request.

use async_trait::async_trait;
use chrono::Utc;
use mailer_storage::{StorageError, StorageService};
use mailer_types::{
	truncate_id, ConfigSchema, ImplementationRegistry, NotificationFailure, NotificationRequest,
	StorageKey,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod implementations {
	pub mod log;
	pub mod webhook;
}

/// Errors that can occur during notification delivery.
#[derive(Debug, Error)]
pub enum NotificationError {
	#[error("Network error: {0}")]
	Network(String),
	/// The channel answered but refused the request.
	#[error("Channel rejected notification: {0}")]
	Rejected(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Trait defining the interface for notification channels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Delivers one request to the channel.
	async fn send(&self, request: &NotificationRequest) -> Result<(), NotificationError>;
}

/// Type alias for notification factory functions.
pub type NotificationFactory =
	fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotificationError>;

/// Registry trait for notification implementations.
pub trait NotificationRegistry: ImplementationRegistry<Factory = NotificationFactory> {}

/// Get all registered notification implementations.
pub fn get_all_implementations() -> Vec<(&'static str, NotificationFactory)> {
	use implementations::{log, webhook};

	vec![
		(log::Registry::NAME, log::Registry::factory()),
		(webhook::Registry::NAME, webhook::Registry::factory()),
	]
}

/// How often and how patiently delivery is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	/// Base delay; attempt `n` waits `n * retry_delay` before retrying.
	pub retry_delay: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			retry_delay: Duration::from_millis(250),
		}
	}
}

/// Service delivering notifications with retries and failure records.
pub struct NotificationService {
	channel: Box<dyn NotificationInterface>,
	storage: Arc<StorageService>,
	policy: RetryPolicy,
}

impl NotificationService {
	pub fn new(
		channel: Box<dyn NotificationInterface>,
		storage: Arc<StorageService>,
		policy: RetryPolicy,
	) -> Self {
		Self {
			channel,
			storage,
			policy,
		}
	}

	/// Delivers a request, retrying up to the policy's attempt limit.
	///
	/// Returns the number of attempts used on success. When every attempt
	/// fails, the failure is recorded in storage and returned.
	pub async fn dispatch(
		&self,
		request: &NotificationRequest,
	) -> Result<u32, NotificationFailure> {
		let max_attempts = self.policy.max_attempts.max(1);
		let mut last_error = String::new();

		for attempt in 1..=max_attempts {
			match self.channel.send(request).await {
				Ok(()) => {
					tracing::debug!(
						order_id = %truncate_id(&request.order_id),
						email_type = %request.email_type,
						attempt,
						"Notification delivered"
					);
					return Ok(attempt);
				}
				Err(e) => {
					tracing::warn!(
						order_id = %truncate_id(&request.order_id),
						email_type = %request.email_type,
						attempt,
						error = %e,
						"Notification attempt failed"
					);
					last_error = e.to_string();
				}
			}
			if attempt < max_attempts {
				tokio::time::sleep(self.policy.retry_delay * attempt).await;
			}
		}

		let failure = NotificationFailure {
			id: uuid::Uuid::new_v4().to_string(),
			request: request.clone(),
			attempts: max_attempts,
			last_error,
			failed_at: Utc::now(),
		};
		if let Err(e) = self
			.storage
			.store(StorageKey::NotificationFailures.as_str(), &failure.id, &failure)
			.await
		{
			tracing::error!(
				order_id = %truncate_id(&request.order_id),
				error = %e,
				"Failed to record undelivered notification"
			);
		}
		Err(failure)
	}

	/// Lists recorded delivery failures, oldest first.
	pub async fn failures(&self) -> Result<Vec<NotificationFailure>, NotificationError> {
		let mut failures: Vec<NotificationFailure> = self
			.storage
			.list(StorageKey::NotificationFailures.as_str(), "")
			.await?;
		failures.sort_by_key(|f| f.failed_at);
		Ok(failures)
	}
}
