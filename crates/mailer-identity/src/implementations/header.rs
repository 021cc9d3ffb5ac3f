//! Identity taken from headers set by a trusted gateway.
//!
//! The gateway authenticates the user and forwards `x-user-id`, `x-user-role`
//! and optionally `x-practice-id`. Header names can be overridden per
//! deployment.

use crate::{
	header_text, IdentityError, IdentityFactory, IdentityInterface, IdentityRegistry,
};
use async_trait::async_trait;
use axum::http::HeaderMap;
use mailer_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Principal, Role, Schema,
	ValidationError,
};

const DEFAULT_USER_HEADER: &str = "x-user-id";
const DEFAULT_ROLE_HEADER: &str = "x-user-role";
const DEFAULT_PRACTICE_HEADER: &str = "x-practice-id";

pub struct HeaderIdentity {
	user_header: String,
	role_header: String,
	practice_header: String,
}

impl HeaderIdentity {
	pub fn new(
		user_header: impl Into<String>,
		role_header: impl Into<String>,
		practice_header: impl Into<String>,
	) -> Self {
		Self {
			user_header: user_header.into(),
			role_header: role_header.into(),
			practice_header: practice_header.into(),
		}
	}
}

impl Default for HeaderIdentity {
	fn default() -> Self {
		Self::new(
			DEFAULT_USER_HEADER,
			DEFAULT_ROLE_HEADER,
			DEFAULT_PRACTICE_HEADER,
		)
	}
}

#[async_trait]
impl IdentityInterface for HeaderIdentity {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HeaderIdentitySchema)
	}

	async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Principal>, IdentityError> {
		let Some(user_id) = header_text(headers, &self.user_header)? else {
			return Ok(None);
		};

		let role_text =
			header_text(headers, &self.role_header)?.ok_or_else(|| IdentityError::MalformedHeader {
				header: self.role_header.clone(),
				message: "required when a user id is present".into(),
			})?;
		let role: Role = role_text
			.parse()
			.map_err(|message| IdentityError::MalformedHeader {
				header: self.role_header.clone(),
				message,
			})?;

		let practice_id = header_text(headers, &self.practice_header)?.map(str::to_string);

		Ok(Some(Principal::new(user_id, role, practice_id)))
	}
}

pub struct HeaderIdentitySchema;

impl ConfigSchema for HeaderIdentitySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![],
			vec![
				Field::new("user_header", FieldType::String),
				Field::new("role_header", FieldType::String),
				Field::new("practice_header", FieldType::String),
			],
		)
		.validate(config)
	}
}

/// Factory function to create a header identity provider.
///
/// Configuration parameters (all optional):
/// - `user_header`: defaults to "x-user-id"
/// - `role_header`: defaults to "x-user-role"
/// - `practice_header`: defaults to "x-practice-id"
pub fn create_identity(config: &toml::Value) -> Result<Box<dyn IdentityInterface>, IdentityError> {
	HeaderIdentitySchema
		.validate(config)
		.map_err(|e| IdentityError::Configuration(e.to_string()))?;

	let name = |key: &str, default: &str| {
		config
			.get(key)
			.and_then(|v| v.as_str())
			.unwrap_or(default)
			.to_ascii_lowercase()
	};

	Ok(Box::new(HeaderIdentity::new(
		name("user_header", DEFAULT_USER_HEADER),
		name("role_header", DEFAULT_ROLE_HEADER),
		name("practice_header", DEFAULT_PRACTICE_HEADER),
	)))
}

/// Registry for the header identity implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "header";
	type Factory = IdentityFactory;

	fn factory() -> Self::Factory {
		create_identity
	}
}

impl IdentityRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;

	fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
		let mut map = HeaderMap::new();
		for (name, value) in pairs {
			map.insert(*name, HeaderValue::from_static(value));
		}
		map
	}

	#[tokio::test]
	async fn test_resolves_practice_user() {
		let identity = HeaderIdentity::default();
		let principal = identity
			.resolve(&headers(&[
				("x-user-id", "u-1"),
				("x-user-role", "user"),
				("x-practice-id", "p-1"),
			]))
			.await
			.unwrap()
			.unwrap();

		assert_eq!(principal.user_id, "u-1");
		assert_eq!(principal.role, Role::User);
		assert_eq!(principal.practice_id.as_deref(), Some("p-1"));
	}

	#[tokio::test]
	async fn test_super_admin_has_no_practice() {
		let identity = HeaderIdentity::default();
		let principal = identity
			.resolve(&headers(&[("x-user-id", "ops"), ("x-user-role", "ADMIN")]))
			.await
			.unwrap()
			.unwrap();
		assert!(principal.is_super_admin());
	}

	#[tokio::test]
	async fn test_absent_and_malformed() {
		let identity = HeaderIdentity::default();
		assert!(identity.resolve(&HeaderMap::new()).await.unwrap().is_none());

		let missing_role = identity.resolve(&headers(&[("x-user-id", "u-1")])).await;
		assert!(matches!(
			missing_role,
			Err(IdentityError::MalformedHeader { header, .. }) if header == "x-user-role"
		));

		let bad_role = identity
			.resolve(&headers(&[("x-user-id", "u-1"), ("x-user-role", "owner")]))
			.await;
		assert!(bad_role.is_err());
	}

	#[tokio::test]
	async fn test_custom_header_names() {
		let config: toml::Value = toml::from_str("user_header = \"X-Gateway-User\"").unwrap();
		let identity = create_identity(&config).unwrap();
		let principal = identity
			.resolve(&headers(&[("x-gateway-user", "u-9"), ("x-user-role", "user")]))
			.await
			.unwrap();
		assert_eq!(principal.map(|p| p.user_id), Some("u-9".to_string()));
	}
}
