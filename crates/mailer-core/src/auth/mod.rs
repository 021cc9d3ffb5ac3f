//! Tenant and ownership checks for order access.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. no principal: `Unauthorized`
//! 2. super-admin (ADMIN without a practice): full access to any order
//! 3. ADMIN of the order's practice: full access
//! 4. the order's creator: customer access, limited to transitions open to USER
//! 5. anyone else: `Forbidden`

use crate::LifecycleError;
use mailer_types::{Order, Principal, Role};

/// What a caller may do with one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
	/// Staff access: every transition open to ADMIN.
	Full,
	/// Owner access: only transitions open to USER.
	Customer,
}

impl Capability {
	/// Role used when validating transitions under this capability.
	pub fn effective_role(&self) -> Role {
		match self {
			Capability::Full => Role::Admin,
			Capability::Customer => Role::User,
		}
	}
}

pub struct AuthorizationGuard;

impl AuthorizationGuard {
	pub fn require_principal(principal: Option<&Principal>) -> Result<&Principal, LifecycleError> {
		principal.ok_or(LifecycleError::Unauthorized)
	}

	/// Resolves the caller's capability on an order.
	pub fn authorize(
		principal: Option<&Principal>,
		order: &Order,
	) -> Result<Capability, LifecycleError> {
		let principal = Self::require_principal(principal)?;

		if principal.is_super_admin() {
			return Ok(Capability::Full);
		}
		if principal.role == Role::Admin && principal.belongs_to(&order.practice_id) {
			return Ok(Capability::Full);
		}
		if principal.user_id == order.user_id {
			return Ok(Capability::Customer);
		}
		Err(LifecycleError::Forbidden(format!(
			"User {} has no access to order {}",
			principal.user_id, order.order_number
		)))
	}

	/// Like [`authorize`](Self::authorize) but only staff pass.
	pub fn authorize_staff(
		principal: Option<&Principal>,
		order: &Order,
	) -> Result<(), LifecycleError> {
		match Self::authorize(principal, order)? {
			Capability::Full => Ok(()),
			Capability::Customer => Err(LifecycleError::Forbidden(
				"This action is restricted to staff".into(),
			)),
		}
	}

	/// Passes only super-admins.
	pub fn require_super_admin(principal: Option<&Principal>) -> Result<&Principal, LifecycleError> {
		let principal = Self::require_principal(principal)?;
		if !principal.is_super_admin() {
			return Err(LifecycleError::Forbidden(
				"This action is restricted to super-admins".into(),
			));
		}
		Ok(principal)
	}

	/// Row filter for order listings.
	///
	/// Super-admins see every order; practice-scoped callers see their
	/// practice's orders. A caller without a practice also sees orders they
	/// created.
	pub fn can_list(principal: &Principal, order: &Order) -> bool {
		principal.is_super_admin()
			|| principal.belongs_to(&order.practice_id)
			|| principal.user_id == order.user_id
	}
}
