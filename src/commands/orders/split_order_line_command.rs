use crate::{
    commands::Command,
    db::DbPool,
    entities::{order_line, shipping_address},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{
        address_lookup::{self, AddressSource, LookupContext},
        order_repository, request_repository,
    },
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Carves `quantity` units off an order line into their own shipping group.
///
/// The target keeps `quantity` and moves to a fresh `order_group`; any
/// remainder becomes a new line in the original group with the same status.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SplitOrderLineCommand {
    pub order_line_id: Uuid,
    #[validate(range(min = 1, message = "Split quantity must be positive"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SplitOrderLineResult {
    pub order_line_id: Uuid,
    pub order_group: i32,
    pub quantity: i32,
    /// Remainder line, absent when the whole line was carved off
    pub new_line_id: Option<Uuid>,
    pub new_line_quantity: Option<i32>,
    pub new_line_address_id: Option<Uuid>,
}

#[async_trait::async_trait]
impl Command for SplitOrderLineCommand {
    type Result = SplitOrderLineResult;

    #[instrument(skip(self, db_pool, event_sender), fields(order_line_id = %self.order_line_id, quantity = self.quantity))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let (order_id, result) = db_pool
            .transaction::<_, (Uuid, SplitOrderLineResult), ServiceError>(move |txn| {
                Box::pin(async move { cmd.split(txn).await })
            })
            .await
            .map_err(|e| {
                let err = ServiceError::from(e);
                error!("Order line split failed: {}", err);
                err
            })?;

        counter!("fulfillment_splits_total", 1);
        info!(
            new_group = result.order_group,
            new_line_id = ?result.new_line_id,
            "order line split"
        );

        event_sender
            .send_or_log(Event::OrderLineSplit {
                order_id,
                source_line_id: result.order_line_id,
                new_line_id: result.new_line_id,
                carved_quantity: result.quantity,
                new_group: result.order_group,
            })
            .await;

        Ok(result)
    }
}

impl SplitOrderLineCommand {
    async fn split(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<(Uuid, SplitOrderLineResult), ServiceError> {
        let line = order_repository::lock_line(txn, self.order_line_id).await?;
        let order = order_repository::lock_order(txn, line.order_id).await?;

        if self.quantity > line.quantity {
            return Err(ServiceError::ValidationError(format!(
                "cannot carve {} units off a line of {}",
                self.quantity, line.quantity
            )));
        }
        if line.status.is_terminal() || line.status.is_in_transit() {
            return Err(ServiceError::Conflict(format!(
                "order line {} is {} and cannot be split",
                line.id, line.status
            )));
        }
        if let Some(request) = request_repository::find_active_request(txn, line.id, None).await? {
            return Err(ServiceError::Conflict(format!(
                "order line {} has active request {}",
                line.id, request.id
            )));
        }

        let original_group = line.order_group;
        let remainder = line.quantity - self.quantity;
        let new_group = order_repository::next_order_group(txn, order.id).await?;
        let now = Utc::now();

        let mut target: order_line::ActiveModel = line.clone().into();
        target.quantity = Set(self.quantity);
        target.order_group = Set(new_group);
        target.updated_at = Set(now);
        let target = target.update(txn).await?;

        let mut new_line_id = None;
        let mut new_line_address_id = None;

        if remainder > 0 {
            let id = Uuid::new_v4();
            order_line::ActiveModel {
                id: Set(id),
                order_id: Set(line.order_id),
                lineage_id: Set(line.lineage_id),
                product_variant_id: Set(line.product_variant_id),
                product_name: Set(line.product_name.clone()),
                paid_quantity: Set(line.paid_quantity),
                quantity: Set(remainder),
                status: Set(line.status),
                held_from: Set(line.held_from),
                order_group: Set(original_group),
                courier_code: Set(line.courier_code.clone()),
                tracking_number: Set(None),
                shipment_id: Set(None),
                delivered_at: Set(None),
                last_reconciliation_id: Set(None),
                deleted: Set(false),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(txn)
            .await?;
            new_line_id = Some(id);

            new_line_address_id = self
                .propagate_address(txn, &line, order.member_id, id)
                .await?;
        }

        order_repository::ensure_lineage_within_paid(txn, &target).await?;

        Ok((
            order.id,
            SplitOrderLineResult {
                order_line_id: target.id,
                order_group: new_group,
                quantity: target.quantity,
                new_line_id,
                new_line_quantity: (remainder > 0).then_some(remainder),
                new_line_address_id,
            },
        ))
    }

    /// Copies the first address the fallback chain finds onto the new line.
    /// A target line with no address of its own gets a copy as well.
    async fn propagate_address(
        &self,
        txn: &DatabaseTransaction,
        line: &order_line::Model,
        member_id: Uuid,
        new_line_id: Uuid,
    ) -> Result<Option<Uuid>, ServiceError> {
        let ctx = LookupContext {
            order_line_id: line.id,
            order_id: line.order_id,
            member_id,
        };
        let chain = address_lookup::default_chain();

        let Some((source, address)) = address_lookup::resolve(&chain, txn, &ctx).await? else {
            warn!(order_line_id = %line.id, "no address found for split line, continuing without one");
            return Ok(None);
        };
        debug!(?source, address_id = %address.id, "address resolved for split");

        let copy: shipping_address::Model = address.copy_for_line(new_line_id).insert(txn).await?;

        if source != AddressSource::SplitLine {
            address.copy_for_line(line.id).insert(txn).await?;
        }

        Ok(Some(copy.id))
    }
}
