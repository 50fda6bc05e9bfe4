use crate::{
    commands::Command,
    db::DbPool,
    entities::{order_line, shipping_address},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{order_repository, request_repository},
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Folds `source` back into `target`, undoing a split.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MergeOrderLinesCommand {
    pub target_line_id: Uuid,
    pub source_line_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MergeOrderLinesResult {
    pub order_line_id: Uuid,
    pub quantity: i32,
    pub removed_line_id: Uuid,
}

#[async_trait::async_trait]
impl Command for MergeOrderLinesCommand {
    type Result = MergeOrderLinesResult;

    #[instrument(skip(self, db_pool, event_sender), fields(target = %self.target_line_id, source = %self.source_line_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        if self.target_line_id == self.source_line_id {
            return Err(ServiceError::ValidationError(
                "cannot merge a line into itself".to_string(),
            ));
        }

        let cmd = self.clone();
        let (order_id, result) = db_pool
            .transaction::<_, (Uuid, MergeOrderLinesResult), ServiceError>(move |txn| {
                Box::pin(async move { cmd.merge(txn).await })
            })
            .await
            .map_err(|e| {
                let err = ServiceError::from(e);
                error!("Order line merge failed: {}", err);
                err
            })?;

        counter!("fulfillment_merges_total", 1);
        info!(quantity = result.quantity, "order lines merged");
        event_sender
            .send_or_log(Event::OrderLinesMerged {
                order_id,
                target_line_id: result.order_line_id,
                source_line_id: result.removed_line_id,
            })
            .await;

        Ok(result)
    }
}

impl MergeOrderLinesCommand {
    async fn merge(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<(Uuid, MergeOrderLinesResult), ServiceError> {
        // Lock in id order so two opposite merges cannot deadlock.
        let (first, second) = if self.target_line_id < self.source_line_id {
            (self.target_line_id, self.source_line_id)
        } else {
            (self.source_line_id, self.target_line_id)
        };
        let a = order_repository::lock_line(txn, first).await?;
        let b = order_repository::lock_line(txn, second).await?;
        let (target, source) = if a.id == self.target_line_id {
            (a, b)
        } else {
            (b, a)
        };

        check_mergeable(&target, &source)?;
        order_repository::lock_order(txn, target.order_id).await?;

        for line_id in [target.id, source.id] {
            if let Some(request) = request_repository::find_active_request(txn, line_id, None).await? {
                return Err(ServiceError::Conflict(format!(
                    "order line {} has active request {}",
                    line_id, request.id
                )));
            }
        }

        let now = Utc::now();
        let merged_quantity = target.quantity + source.quantity;
        let order_id = target.order_id;

        // Tracking follows whichever side has it.
        let (courier_code, tracking_number, shipment_id) = if target.tracking_pair().is_some() {
            (
                target.courier_code.clone(),
                target.tracking_number.clone(),
                target.shipment_id.clone(),
            )
        } else {
            (
                source.courier_code.clone().or(target.courier_code.clone()),
                source.tracking_number.clone(),
                source.shipment_id.clone(),
            )
        };

        let mut target_model: order_line::ActiveModel = target.into();
        target_model.quantity = Set(merged_quantity);
        target_model.courier_code = Set(courier_code);
        target_model.tracking_number = Set(tracking_number);
        target_model.shipment_id = Set(shipment_id);
        target_model.updated_at = Set(now);
        let target = target_model.update(txn).await?;

        let source_id = source.id;
        let mut source_model: order_line::ActiveModel = source.into();
        source_model.deleted = Set(true);
        source_model.updated_at = Set(now);
        source_model.update(txn).await?;

        if let Some(address) = order_repository::find_active_address(txn, source_id).await? {
            let mut address: shipping_address::ActiveModel = address.into();
            address.active = Set(false);
            address.update(txn).await?;
        }

        order_repository::ensure_lineage_within_paid(txn, &target).await?;

        Ok((
            order_id,
            MergeOrderLinesResult {
                order_line_id: target.id,
                quantity: target.quantity,
                removed_line_id: source_id,
            },
        ))
    }
}

fn check_mergeable(
    target: &order_line::Model,
    source: &order_line::Model,
) -> Result<(), ServiceError> {
    if target.order_id != source.order_id || target.lineage_id != source.lineage_id {
        return Err(ServiceError::ValidationError(format!(
            "order lines {} and {} do not descend from the same purchase",
            target.id, source.id
        )));
    }
    if target.status != source.status || target.held_from != source.held_from {
        return Err(ServiceError::Conflict(format!(
            "cannot merge a {} line into a {} line",
            source.status, target.status
        )));
    }
    if target.status.is_terminal() || target.status.is_in_transit() {
        return Err(ServiceError::Conflict(format!(
            "{} lines cannot be merged",
            target.status
        )));
    }
    if let (Some(t), Some(s)) = (target.tracking_pair(), source.tracking_pair()) {
        if t != s {
            return Err(ServiceError::Conflict(format!(
                "order lines {} and {} ship under different tracking numbers",
                target.id, source.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderLineStatus;
    use assert_matches::assert_matches;

    fn line(lineage: Uuid, status: OrderLineStatus, tracking: Option<&str>) -> order_line::Model {
        let now = Utc::now();
        order_line::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            lineage_id: lineage,
            product_variant_id: Uuid::nil(),
            product_name: "Protein bar".into(),
            paid_quantity: 5,
            quantity: 2,
            status,
            held_from: None,
            order_group: 1,
            courier_code: tracking.map(|_| "kr.cjlogistics".to_string()),
            tracking_number: tracking.map(str::to_string),
            shipment_id: None,
            delivered_at: None,
            last_reconciliation_id: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn same_lineage_and_status_merges() {
        let lineage = Uuid::new_v4();
        let a = line(lineage, OrderLineStatus::Paid, Some("111"));
        let b = line(lineage, OrderLineStatus::Paid, None);
        assert!(check_mergeable(&a, &b).is_ok());
    }

    #[test]
    fn different_lineage_is_rejected() {
        let a = line(Uuid::new_v4(), OrderLineStatus::Paid, None);
        let b = line(Uuid::new_v4(), OrderLineStatus::Paid, None);
        assert_matches!(check_mergeable(&a, &b), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn conflicting_tracking_is_rejected() {
        let lineage = Uuid::new_v4();
        let a = line(lineage, OrderLineStatus::Paid, Some("111"));
        let b = line(lineage, OrderLineStatus::Paid, Some("222"));
        assert_matches!(check_mergeable(&a, &b), Err(ServiceError::Conflict(_)));
    }

    #[test]
    fn status_mismatch_is_rejected() {
        let lineage = Uuid::new_v4();
        let a = line(lineage, OrderLineStatus::Paid, None);
        let b = line(lineage, OrderLineStatus::Hold, None);
        assert_matches!(check_mergeable(&a, &b), Err(ServiceError::Conflict(_)));
    }

    #[test]
    fn held_lines_must_share_their_origin() {
        let lineage = Uuid::new_v4();
        let mut a = line(lineage, OrderLineStatus::Hold, None);
        let mut b = line(lineage, OrderLineStatus::Hold, None);
        a.held_from = Some(OrderLineStatus::Paid);
        b.held_from = Some(OrderLineStatus::Delivered);
        assert_matches!(check_mergeable(&a, &b), Err(ServiceError::Conflict(_)));

        b.held_from = Some(OrderLineStatus::Paid);
        assert!(check_mergeable(&a, &b).is_ok());
    }
}
