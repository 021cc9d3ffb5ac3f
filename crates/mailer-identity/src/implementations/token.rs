//! Identity from bearer tokens configured as static sessions.
//!
//! Meant for service-to-service callers and local deployments. Each session
//! maps one token to a fixed principal:
//!
//! ```toml
//! [[identity.implementations.token.sessions]]
//! token = "${ADMIN_TOKEN}"
//! user_id = "staff-1"
//! role = "admin"
//! practice_id = "p-1"   # omit for super-admins
//! ```

use crate::{IdentityError, IdentityFactory, IdentityInterface, IdentityRegistry};
use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use mailer_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Principal, Role, Schema, SecretString,
	ValidationError,
};

struct Session {
	token: SecretString,
	principal: Principal,
}

pub struct TokenIdentity {
	sessions: Vec<Session>,
}

impl TokenIdentity {
	pub fn new(sessions: Vec<(SecretString, Principal)>) -> Self {
		Self {
			sessions: sessions
				.into_iter()
				.map(|(token, principal)| Session { token, principal })
				.collect(),
		}
	}
}

#[async_trait]
impl IdentityInterface for TokenIdentity {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(TokenIdentitySchema)
	}

	async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Principal>, IdentityError> {
		let Some(value) = crate::header_text(headers, AUTHORIZATION.as_str())? else {
			return Ok(None);
		};
		let presented = value
			.strip_prefix("Bearer ")
			.or_else(|| value.strip_prefix("bearer "))
			.map(str::trim)
			.ok_or_else(|| IdentityError::MalformedHeader {
				header: AUTHORIZATION.to_string(),
				message: "expected a bearer token".into(),
			})?;

		self.sessions
			.iter()
			.find(|session| session.token.matches(presented))
			.map(|session| Some(session.principal.clone()))
			.ok_or_else(|| IdentityError::InvalidCredentials("unknown bearer token".into()))
	}
}

pub struct TokenIdentitySchema;

impl ConfigSchema for TokenIdentitySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let non_empty = |value: &toml::Value| match value.as_str() {
			Some(text) if text.trim().is_empty() => Err("cannot be empty".to_string()),
			_ => Ok(()),
		};
		let session = Schema::new(
			vec![
				Field::new("token", FieldType::String).with_validator(non_empty),
				Field::new("user_id", FieldType::String).with_validator(non_empty),
				Field::new("role", FieldType::String).with_validator(|value| {
					value
						.as_str()
						.unwrap_or_default()
						.parse::<Role>()
						.map(|_| ())
				}),
			],
			vec![Field::new("practice_id", FieldType::String)],
		);

		Schema::new(
			vec![Field::new(
				"sessions",
				FieldType::Array(Box::new(FieldType::Table(session))),
			)],
			vec![],
		)
		.validate(config)
	}
}

/// Factory function to create a token identity provider.
///
/// Configuration parameters:
/// - `sessions`: array of `{ token, user_id, role, practice_id? }` tables
pub fn create_identity(config: &toml::Value) -> Result<Box<dyn IdentityInterface>, IdentityError> {
	TokenIdentitySchema
		.validate(config)
		.map_err(|e| IdentityError::Configuration(e.to_string()))?;

	let entries = config
		.get("sessions")
		.and_then(|v| v.as_array())
		.map(Vec::as_slice)
		.unwrap_or_default();

	let mut sessions = Vec::with_capacity(entries.len());
	for entry in entries {
		let text = |key: &str| entry.get(key).and_then(|v| v.as_str());
		let role = text("role")
			.unwrap_or_default()
			.parse::<Role>()
			.map_err(IdentityError::Configuration)?;
		let principal = Principal::new(
			text("user_id").unwrap_or_default(),
			role,
			mailer_types::non_blank(text("practice_id")).map(str::to_string),
		);
		sessions.push((SecretString::from(text("token").unwrap_or_default()), principal));
	}

	Ok(Box::new(TokenIdentity::new(sessions)))
}

/// Registry for the token identity implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "token";
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

	const CONFIG: &str = r#"
[[sessions]]
token = "staff-secret"
user_id = "staff-1"
role = "admin"

[[sessions]]
token = "clinic-secret"
user_id = "u-7"
role = "USER"
practice_id = "p-1"
"#;

	fn bearer(token: &'static str) -> HeaderMap {
		let mut headers = HeaderMap::new();
		headers.insert(AUTHORIZATION, HeaderValue::from_static(token));
		headers
	}

	#[tokio::test]
	async fn test_known_tokens_resolve() {
		let config: toml::Value = toml::from_str(CONFIG).unwrap();
		let identity = create_identity(&config).unwrap();

		let staff = identity
			.resolve(&bearer("Bearer staff-secret"))
			.await
			.unwrap()
			.unwrap();
		assert!(staff.is_super_admin());

		let user = identity
			.resolve(&bearer("Bearer clinic-secret"))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(user.role, Role::User);
		assert!(user.belongs_to("p-1"));
	}

	#[tokio::test]
	async fn test_unknown_or_malformed_token() {
		let config: toml::Value = toml::from_str(CONFIG).unwrap();
		let identity = create_identity(&config).unwrap();

		assert!(identity.resolve(&HeaderMap::new()).await.unwrap().is_none());
		assert!(matches!(
			identity.resolve(&bearer("Bearer guess")).await,
			Err(IdentityError::InvalidCredentials(_))
		));
		assert!(matches!(
			identity.resolve(&bearer("Basic dXNlcg==")).await,
			Err(IdentityError::MalformedHeader { .. })
		));
	}

	#[test]
	fn test_schema_rejects_unknown_role() {
		let config: toml::Value = toml::from_str(
			"[[sessions]]\ntoken = \"t\"\nuser_id = \"u\"\nrole = \"owner\"\n",
		)
		.unwrap();
		assert!(TokenIdentitySchema.validate(&config).is_err());
		assert!(matches!(
			create_identity(&config),
			Err(IdentityError::Configuration(_))
		));
	}
}
