//! Practices, orders and plain status transitions.

use super::{describe_change, OrderLifecycleService};
use crate::{AuditTrail, AuthorizationGuard, LifecycleError, StatusManager};
use chrono::Utc;
use mailer_storage::StorageError;
use mailer_types::{
	non_blank, truncate_id, AvailableTransition, EmailType, HistoryMetadata, NewOrder,
	NewPractice, Order, OrderStatus, OrderStatusKind, OrderStatusResponse, Practice, Principal,
	StatusHistoryEntry, StorageKey, UpdateStatusRequest, UpdateStatusResponse,
};
use rust_decimal::Decimal;
use tracing::instrument;

/// Attempts at drawing an unused order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

impl OrderLifecycleService {
	/// Registers a practice. Super-admins only.
	#[instrument(skip_all)]
	pub async fn create_practice(
		&self,
		principal: Option<&Principal>,
		request: NewPractice,
	) -> Result<Practice, LifecycleError> {
		AuthorizationGuard::require_super_admin(principal)?;

		let name = non_blank(Some(&request.name))
			.ok_or_else(|| LifecycleError::Validation("Practice name cannot be empty".into()))?;
		let practice = Practice {
			id: uuid::Uuid::new_v4().to_string(),
			name: name.to_string(),
			contact_email: non_blank(request.contact_email.as_deref()).map(str::to_string),
			contact_phone: non_blank(request.contact_phone.as_deref()).map(str::to_string),
			address: non_blank(request.address.as_deref()).map(str::to_string),
			created_at: Utc::now(),
		};

		let mut tx = self.storage.transaction();
		tx.insert(StorageKey::Practices.as_str(), &practice.id, &practice)?;
		tx.commit().await?;

		tracing::info!(practice_id = %truncate_id(&practice.id), name = %practice.name, "Practice created");
		Ok(practice)
	}

	/// Lists practices visible to the caller.
	pub async fn list_practices(
		&self,
		principal: Option<&Principal>,
	) -> Result<Vec<Practice>, LifecycleError> {
		let principal = AuthorizationGuard::require_principal(principal)?;
		if principal.is_super_admin() {
			let mut practices: Vec<Practice> =
				self.storage.list(StorageKey::Practices.as_str(), "").await?;
			practices.sort_by(|a, b| a.name.cmp(&b.name));
			return Ok(practices);
		}

		let Some(practice_id) = principal.practice_id.as_deref() else {
			return Ok(Vec::new());
		};
		match self
			.storage
			.retrieve(StorageKey::Practices.as_str(), practice_id)
			.await
		{
			Ok(practice) => Ok(vec![practice]),
			Err(StorageError::NotFound) => Ok(Vec::new()),
			Err(e) => Err(e.into()),
		}
	}

	/// Creates an order in `draft`, or in `pending` when converted from a quote.
	///
	/// Practice-scoped callers create orders for their own practice;
	/// super-admins must name one. No history row is written: the first row
	/// belongs to the first transition.
	#[instrument(skip_all)]
	pub async fn create_order(
		&self,
		principal: Option<&Principal>,
		request: NewOrder,
	) -> Result<Order, LifecycleError> {
		let principal = AuthorizationGuard::require_principal(principal)?;

		let requested = non_blank(request.practice_id.as_deref());
		let practice_id = match (&principal.practice_id, requested) {
			(Some(own), Some(other)) if own != other => {
				return Err(LifecycleError::Forbidden(
					"Orders can only be created for your own practice".into(),
				))
			}
			(Some(own), _) => own.clone(),
			(None, Some(named)) if principal.is_super_admin() => named.to_string(),
			(None, None) if principal.is_super_admin() => {
				return Err(LifecycleError::Validation(
					"practiceId is required when creating an order as a super-admin".into(),
				))
			}
			(None, _) => {
				return Err(LifecycleError::Forbidden(
					"Only members of a practice can create orders".into(),
				))
			}
		};

		if !self
			.storage
			.exists(StorageKey::Practices.as_str(), &practice_id)
			.await?
		{
			return Err(LifecycleError::NotFound(format!(
				"Practice {} not found",
				practice_id
			)));
		}
		if request.cost < Decimal::ZERO {
			return Err(LifecycleError::Validation("Order cost cannot be negative".into()));
		}

		let quote_id = non_blank(request.quote_id.as_deref()).map(str::to_string);
		let now = Utc::now();
		let mut order = Order {
			id: uuid::Uuid::new_v4().to_string(),
			order_number: String::new(),
			practice_id,
			user_id: principal.user_id.clone(),
			status: if quote_id.is_some() {
				OrderStatus::Pending
			} else {
				OrderStatus::Draft
			},
			cost: request.cost,
			description: non_blank(request.description.as_deref()).map(str::to_string),
			quote_id,
			version: 0,
			created_at: now,
			updated_at: now,
		};

		for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
			order.order_number = self.draw_order_number(now);

			let mut tx = self.storage.transaction();
			tx.insert(StorageKey::Orders.as_str(), &order.id, &order)?;
			tx.insert(
				StorageKey::OrderNumbers.as_str(),
				&order.order_number,
				&order.id,
			)?;
			match tx.commit().await {
				Ok(()) => {
					tracing::info!(
						order_id = %truncate_id(&order.id),
						order_number = %order.order_number,
						status = %order.status,
						"Order created"
					);
					return Ok(order);
				}
				Err(StorageError::Conflict(key))
					if key.starts_with(StorageKey::OrderNumbers.as_str()) =>
				{
					tracing::debug!(attempt, order_number = %order.order_number, "Order number taken, drawing another");
				}
				Err(e) => return Err(e.into()),
			}
		}

		Err(LifecycleError::Internal(
			"Could not allocate a unique order number".into(),
		))
	}

	/// `<prefix>-<yyyymmdd>-<6 hex digits>`
	fn draw_order_number(&self, at: chrono::DateTime<Utc>) -> String {
		let random = uuid::Uuid::new_v4().simple().to_string();
		format!(
			"{}-{}-{}",
			self.workflow.order_number_prefix,
			at.format("%Y%m%d"),
			&random[..6]
		)
	}

	pub async fn get_order(
		&self,
		principal: Option<&Principal>,
		order_id: &str,
	) -> Result<Order, LifecycleError> {
		AuthorizationGuard::require_principal(principal)?;
		let order = self.load_order(order_id).await?.value;
		AuthorizationGuard::authorize(principal, &order)?;
		Ok(order)
	}

	/// Lists the caller's visible orders, newest first.
	pub async fn list_orders(
		&self,
		principal: Option<&Principal>,
	) -> Result<Vec<Order>, LifecycleError> {
		let principal = AuthorizationGuard::require_principal(principal)?;
		let mut orders: Vec<Order> = self.storage.list(StorageKey::Orders.as_str(), "").await?;
		orders.retain(|order| AuthorizationGuard::can_list(principal, order));
		orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(orders)
	}

	/// Applies a transition requested through the status endpoint.
	///
	/// Moves that upload or answer a proof are refused here; they go through
	/// `upload_proof` and `respond_to_proof` so the round and the escalation
	/// policy are applied.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), to = %request.new_status))]
	pub async fn transition(
		&self,
		principal: Option<&Principal>,
		order_id: &str,
		request: UpdateStatusRequest,
	) -> Result<UpdateStatusResponse, LifecycleError> {
		let actor = AuthorizationGuard::require_principal(principal)?;
		let current = self.load_order(order_id).await?;
		let capability = AuthorizationGuard::authorize(principal, &current.value)?;

		let from = current.value.status;
		let rule = StatusManager::validate(
			from.kind(),
			request.new_status,
			capability.effective_role(),
		)?;
		let comments = StatusManager::check_comment(rule, request.comments.as_deref())?;

		if StatusManager::is_proof_driven(from.kind(), request.new_status) {
			return Err(LifecycleError::InvalidTransition {
				from: from.kind(),
				to: request.new_status,
			});
		}
		let to_status = OrderStatus::from_kind(request.new_status, None).ok_or_else(|| {
			LifecycleError::Internal(format!("Status {} needs a parameter", request.new_status))
		})?;

		let now = Utc::now();
		let entry = AuditTrail::record(
			&current.value,
			to_status,
			actor,
			capability.effective_role(),
			comments,
			HistoryMetadata::StatusChange {
				description: rule.description.to_string(),
			},
			now,
		);

		let mut tx = self.storage.transaction();
		let order = Self::stage_order_change(&mut tx, &current, &entry, now)?;
		tx.commit().await?;

		tracing::info!(from = %from, to = %order.status, by = %actor.user_id, "Order status changed");
		if rule.auto_notify {
			self.notify(
				&order,
				EmailType::StatusChange,
				describe_change(&order, from, order.status, rule.description),
			);
		}

		Ok(UpdateStatusResponse {
			order,
			history: entry,
		})
	}

	/// Current status, the moves open to the caller and the full history.
	pub async fn status(
		&self,
		principal: Option<&Principal>,
		order_id: &str,
	) -> Result<OrderStatusResponse, LifecycleError> {
		AuthorizationGuard::require_principal(principal)?;
		let order = self.load_order(order_id).await?.value;
		let capability = AuthorizationGuard::authorize(principal, &order)?;

		let available_transitions =
			StatusManager::available_transitions(order.status.kind(), capability.effective_role())
				.into_iter()
				.map(|rule| AvailableTransition {
					to_status: rule.to,
					requires_comment: rule.requires_comment,
					auto_notify: rule.auto_notify,
					description: rule.description.to_string(),
				})
				.collect();
		let history = self.audit.history(&order.id).await?;

		Ok(OrderStatusResponse {
			order_id: order.id,
			order_number: order.order_number,
			status: order.status,
			available_transitions,
			history,
		})
	}

	pub async fn history(
		&self,
		principal: Option<&Principal>,
		order_id: &str,
	) -> Result<Vec<StatusHistoryEntry>, LifecycleError> {
		AuthorizationGuard::require_principal(principal)?;
		let order = self.load_order(order_id).await?.value;
		AuthorizationGuard::authorize(principal, &order)?;
		Ok(self.audit.history(&order.id).await?)
	}
}
