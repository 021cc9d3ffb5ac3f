//! Caller identity resolution.
//!
//! Authentication happens in front of this service. An identity provider
//! only turns the request headers it is handed into a [`Principal`]: who the
//! caller is, which role they hold and which practice, if any, they belong to.

use async_trait::async_trait;
use axum::http::HeaderMap;
use mailer_types::{ConfigSchema, ImplementationRegistry, Principal};
use thiserror::Error;

pub mod implementations {
	pub mod header;
	pub mod token;
}

/// Errors that can occur while resolving a caller.
#[derive(Debug, Error)]
pub enum IdentityError {
	/// Credentials were presented but are not recognised.
	#[error("Invalid credentials: {0}")]
	InvalidCredentials(String),
	/// An identity header is present but cannot be interpreted.
	#[error("Malformed identity header '{header}': {message}")]
	MalformedHeader { header: String, message: String },
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for identity providers.
#[async_trait]
pub trait IdentityInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Resolves the caller from request headers.
	///
	/// Returns `Ok(None)` when the request carries no identity at all.
	async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Principal>, IdentityError>;
}

/// Type alias for identity factory functions.
pub type IdentityFactory = fn(&toml::Value) -> Result<Box<dyn IdentityInterface>, IdentityError>;

/// Registry trait for identity implementations.
pub trait IdentityRegistry: ImplementationRegistry<Factory = IdentityFactory> {}

/// Get all registered identity implementations.
pub fn get_all_implementations() -> Vec<(&'static str, IdentityFactory)> {
	use implementations::{header, token};

	vec![
		(header::Registry::NAME, header::Registry::factory()),
		(token::Registry::NAME, token::Registry::factory()),
	]
}

/// Reads a header as trimmed, non-empty text.
pub(crate) fn header_text<'a>(
	headers: &'a HeaderMap,
	name: &str,
) -> Result<Option<&'a str>, IdentityError> {
	let Some(value) = headers.get(name) else {
		return Ok(None);
	};
	let text = value
		.to_str()
		.map_err(|_| IdentityError::MalformedHeader {
			header: name.to_string(),
			message: "not valid visible ASCII".into(),
		})?;
	Ok(mailer_types::non_blank(Some(text)))
}

/// Service wrapping the configured identity provider.
pub struct IdentityService {
	implementation: Box<dyn IdentityInterface>,
}

impl IdentityService {
	pub fn new(implementation: Box<dyn IdentityInterface>) -> Self {
		Self { implementation }
	}

	/// Resolves the caller, logging rejected credentials.
	pub async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Principal>, IdentityError> {
		let resolved = self.implementation.resolve(headers).await;
		if let Err(e) = &resolved {
			tracing::debug!(error = %e, "Rejected caller identity");
		}
		resolved
	}
}
