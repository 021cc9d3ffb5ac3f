//! Request handlers, one module per resource.

pub mod escalation;
pub mod order;
pub mod practice;
pub mod proof;

use mailer_core::LifecycleError;
use mailer_types::APIError;

/// Logs a failed operation and converts the error for the response.
pub(crate) fn rejected(operation: &'static str, err: LifecycleError) -> APIError {
	match &err {
		LifecycleError::Internal(_) => tracing::error!(operation, error = %err, "Request failed"),
		LifecycleError::Conflict(_) => tracing::warn!(operation, error = %err, "Request conflicted"),
		_ => tracing::debug!(operation, error = %err, "Request rejected"),
	}
	APIError::from(err)
}
