//! Order lifecycle core for the mail-order service.
//!
//! This crate owns every rule about how an order may change:
//!
//! - [`StatusManager`] holds the transition table.
//! - [`AuthorizationGuard`] decides what a caller may do with an order.
//! - [`ProofWorkflow`] numbers proof rounds and applies the escalation policy.
//! - [`EscalationHandler`] plans staff actions on escalated orders.
//! - [`AuditTrail`] writes the append-only status history.
//! - [`OrderLifecycleService`] runs them in order and commits each accepted
//!   change as one atomic storage batch.
//!
//! [`builder::LifecycleBuilder`] assembles the service from configuration.

use mailer_storage::StorageError;
use mailer_types::{APIError, OrderStatusKind};
use thiserror::Error;

pub mod audit;
pub mod auth;
pub mod builder;
pub mod engine;
pub mod handlers;
pub mod state;

pub use audit::AuditTrail;
pub use auth::{AuthorizationGuard, Capability};
pub use builder::{BuilderError, LifecycleBuilder, LifecycleFactories, ServiceHandles};
pub use engine::OrderLifecycleService;
pub use handlers::{EscalationHandler, EscalationPlan, ProofWorkflow};
pub use state::{StatusManager, TransitionError, TransitionRule};

/// Errors returned by lifecycle operations.
///
/// Everything except `Conflict` and `Internal` is detected before any write.
#[derive(Debug, Error)]
pub enum LifecycleError {
	#[error("Authentication required")]
	Unauthorized,
	#[error("{0}")]
	Forbidden(String),
	#[error("{0}")]
	NotFound(String),
	#[error("Cannot transition from {from} to {to}")]
	InvalidTransition {
		from: OrderStatusKind,
		to: OrderStatusKind,
	},
	#[error("{0}")]
	MissingComment(String),
	/// Malformed input that no transition rule covers.
	#[error("{0}")]
	Validation(String),
	#[error("{0}")]
	Conflict(String),
	#[error("Internal error: {0}")]
	Internal(String),
}

impl From<TransitionError> for LifecycleError {
	fn from(err: TransitionError) -> Self {
		match err {
			TransitionError::NotAllowed { from, to } => {
				LifecycleError::InvalidTransition { from, to }
			}
			TransitionError::RoleNotPermitted { .. } => LifecycleError::Forbidden(err.to_string()),
			TransitionError::MissingComment { .. } => {
				LifecycleError::MissingComment(err.to_string())
			}
		}
	}
}

impl From<StorageError> for LifecycleError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::Conflict(key) => LifecycleError::Conflict(format!(
				"Record '{}' was modified concurrently; reload and retry",
				key
			)),
			other => LifecycleError::Internal(other.to_string()),
		}
	}
}

impl From<LifecycleError> for APIError {
	fn from(err: LifecycleError) -> Self {
		let message = err.to_string();
		match err {
			LifecycleError::Unauthorized => APIError::Unauthorized { message },
			LifecycleError::Forbidden(_) => APIError::Forbidden { message },
			LifecycleError::NotFound(_) => APIError::NotFound { message },
			LifecycleError::InvalidTransition { from, to } => APIError::UnprocessableEntity {
				error_type: "INVALID_TRANSITION".to_string(),
				message,
				details: Some(serde_json::json!({
					"fromStatus": from,
					"toStatus": to,
				})),
			},
			LifecycleError::MissingComment(_) => APIError::BadRequest {
				error_type: "MISSING_COMMENT".to_string(),
				message,
			},
			LifecycleError::Validation(_) => APIError::BadRequest {
				error_type: "BAD_REQUEST".to_string(),
				message,
			},
			LifecycleError::Conflict(_) => APIError::Conflict { message },
			LifecycleError::Internal(_) => APIError::InternalServerError { message },
		}
	}
}
