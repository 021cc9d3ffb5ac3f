//! Identity claims for the caller of an operation.
//!
//! Principals are produced by an external identity provider and treated as
//! trusted, read-only context by the core.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
	#[serde(alias = "admin")]
	Admin,
	#[serde(alias = "user")]
	User,
}

impl Role {
	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Admin => "ADMIN",
			Role::User => "USER",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"ADMIN" => Ok(Role::Admin),
			"USER" => Ok(Role::User),
			_ => Err(format!("unknown role '{}'", s)),
		}
	}
}

/// The authenticated caller: `{userId, role, practiceId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
	pub user_id: String,
	pub role: Role,
	#[serde(default)]
	pub practice_id: Option<String>,
}

impl Principal {
	pub fn new(user_id: impl Into<String>, role: Role, practice_id: Option<String>) -> Self {
		Self {
			user_id: user_id.into(),
			role,
			practice_id,
		}
	}

	/// Staff principal with no practice association and cross-tenant visibility.
	pub fn is_super_admin(&self) -> bool {
		self.role == Role::Admin && self.practice_id.is_none()
	}

	/// Returns true if the principal is scoped to the given practice.
	pub fn belongs_to(&self, practice_id: &str) -> bool {
		self.practice_id.as_deref() == Some(practice_id)
	}
}
