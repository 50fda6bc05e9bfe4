use crate::{
    commands::Command,
    db::DbPool,
    entities::order_line,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderLineStatus, RequestKind, TransitionActor},
    repositories::{
        order_repository,
        request_repository::{self, RequestDraft},
    },
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Admin-driven status change on one order line.
///
/// Entering a `*_REQUESTED` status opens the matching request in the same
/// transaction. Falling back to `PAID` or `DELIVERED` withdraws any request
/// still active on the line. `HOLD` remembers the status it was entered from
/// and only releases to moves that status allows.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderLineStatusCommand {
    pub order_line_id: Uuid,
    pub status: OrderLineStatus,
    /// Reason recorded on a request opened by this change
    pub reason_code: Option<String>,
    pub reason_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderLineStatusResult {
    pub order_line_id: Uuid,
    pub old_status: OrderLineStatus,
    pub new_status: OrderLineStatus,
    /// Request opened by entering a `*_REQUESTED` status
    pub request_id: Option<Uuid>,
    pub withdrawn_request_ids: Vec<Uuid>,
}

#[async_trait::async_trait]
impl Command for UpdateOrderLineStatusCommand {
    type Result = UpdateOrderLineStatusResult;

    #[instrument(skip(self, db_pool, event_sender), fields(order_line_id = %self.order_line_id, to = %self.status))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, UpdateOrderLineStatusResult, ServiceError>(move |txn| {
                Box::pin(async move { cmd.apply(txn).await })
            })
            .await
            .map_err(|e| {
                let err = ServiceError::from(e);
                error!("Status update failed: {}", err);
                err
            })?;

        counter!("fulfillment_status_transitions_total", 1, "actor" => "admin");
        info!(from = %result.old_status, "order line status updated");

        event_sender
            .send_or_log(Event::OrderLineStatusChanged {
                order_line_id: result.order_line_id,
                old_status: result.old_status,
                new_status: result.new_status,
            })
            .await;
        if let (Some(request_id), Some(kind)) =
            (result.request_id, RequestKind::for_status(result.new_status))
        {
            event_sender
                .send_or_log(Event::ReturnRequestCreated {
                    request_id,
                    order_line_id: result.order_line_id,
                    kind,
                })
                .await;
        }

        Ok(result)
    }
}

impl UpdateOrderLineStatusCommand {
    async fn apply(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<UpdateOrderLineStatusResult, ServiceError> {
        let line = order_repository::lock_line(txn, self.order_line_id).await?;
        let old_status = line.status;
        let new_status = self.status;
        let requested_kind = RequestKind::for_status(new_status);

        // Releasing a hold back into a request state keeps the request it had.
        let resumed_request = match requested_kind {
            Some(kind) if old_status == OrderLineStatus::Hold && line.held_from == Some(new_status) => {
                request_repository::find_active_request(txn, line.id, Some(kind)).await?
            }
            _ => None,
        };

        if requested_kind.is_some() && resumed_request.is_none() {
            request_repository::ensure_no_active_request(txn, line.id).await?;
        }
        line.check_transition(new_status, TransitionActor::Admin)?;
        self.check_shipping_preconditions(txn, &line).await?;

        let mut request_id = None;
        let mut withdrawn_request_ids = Vec::new();

        if let Some(kind) = requested_kind {
            if resumed_request.is_none() {
                let mut draft = RequestDraft::from_admin(kind);
                if let Some(code) = &self.reason_code {
                    draft.reason_code = code.clone();
                }
                draft.reason_text = self.reason_text.clone();
                let request = request_repository::insert_request(txn, &line, draft).await?;
                request_id = Some(request.id);
            }
        } else if matches!(new_status, OrderLineStatus::Paid | OrderLineStatus::Delivered) {
            withdrawn_request_ids = request_repository::cancel_active_requests(txn, line.id).await?;
        }

        let held_from = (new_status == OrderLineStatus::Hold).then_some(old_status);
        let mut model: order_line::ActiveModel = line.into();
        model.status = Set(new_status);
        model.held_from = Set(held_from);
        model.updated_at = Set(Utc::now());
        let updated = model.update(txn).await?;

        if new_status == OrderLineStatus::Paid {
            // Back from a cancel request; the lineage must still fit what was paid.
            order_repository::ensure_lineage_within_paid(txn, &updated).await?;
        }

        Ok(UpdateOrderLineStatusResult {
            order_line_id: updated.id,
            old_status,
            new_status,
            request_id,
            withdrawn_request_ids,
        })
    }

    /// A line cannot start moving without something to track it by.
    async fn check_shipping_preconditions(
        &self,
        txn: &DatabaseTransaction,
        line: &order_line::Model,
    ) -> Result<(), ServiceError> {
        match self.status {
            OrderLineStatus::InTransit if line.tracking_pair().is_none() => {
                Err(ServiceError::ValidationError(format!(
                    "order line {} has no tracking number",
                    line.id
                )))
            }
            OrderLineStatus::ExchangeInTransit => {
                let exchange =
                    request_repository::find_active_request(txn, line.id, Some(RequestKind::Exchange))
                        .await?;
                match exchange {
                    Some(request) if request.redelivery_tracking().is_some() => Ok(()),
                    Some(request) => Err(ServiceError::ValidationError(format!(
                        "exchange request {} has no redelivery tracking number",
                        request.id
                    ))),
                    None => Err(ServiceError::ValidationError(format!(
                        "order line {} has no active exchange request",
                        line.id
                    ))),
                }
            }
            _ => Ok(()),
        }
    }
}
