use super::OrderLifecycleService;
use crate::{AuditTrail, AuthorizationGuard, EscalationHandler, LifecycleError};
use chrono::Utc;
use mailer_types::{
	truncate_id, EscalationRequest, EscalationResponse, HistoryMetadata, Principal, Role,
};
use tracing::instrument;

impl OrderLifecycleService {
	/// Applies a staff action to an escalated order.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), action = %request.action))]
	pub async fn handle_escalation(
		&self,
		principal: Option<&Principal>,
		order_id: &str,
		request: EscalationRequest,
	) -> Result<EscalationResponse, LifecycleError> {
		let actor = AuthorizationGuard::require_principal(principal)?;
		let current = self.load_order(order_id).await?;
		AuthorizationGuard::authorize_staff(principal, &current.value)?;

		let plan = EscalationHandler::plan(current.value.status, &request)?;
		let now = Utc::now();
		let entry = AuditTrail::record(
			&current.value,
			plan.to_status,
			actor,
			Role::Admin,
			plan.comments.clone(),
			HistoryMetadata::Escalation {
				action: plan.action,
				contact_customer: plan.contact_customer,
			},
			now,
		);

		let mut tx = self.storage.transaction();
		let order = Self::stage_order_change(&mut tx, &current, &entry, now)?;
		tx.commit().await?;

		tracing::info!(status = %order.status, by = %actor.user_id, "Escalation handled");
		if let Some(email) = plan.email {
			self.notify(
				&order,
				email,
				format!("Order {}: {}", order.order_number, plan.description),
			);
		}

		Ok(EscalationResponse {
			order_id: order.id,
			status: order.status,
			history: entry,
		})
	}
}
