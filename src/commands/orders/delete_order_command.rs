use crate::{
    commands::Command,
    db::DbPool,
    entities::{order, order_line},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::order_repository,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Tombstones an order. Refused while any of its lines is moving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOrderCommand {
    pub order_id: Uuid,
}

#[async_trait::async_trait]
impl Command for DeleteOrderCommand {
    type Result = ();

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let order_id = self.order_id;
        db_pool
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = order_repository::lock_order(txn, order_id).await?;

                    let moving = order_line::Entity::find()
                        .filter(order_line::Column::OrderId.eq(order.id))
                        .filter(order_line::Column::Deleted.eq(false))
                        .all(txn)
                        .await?
                        .into_iter()
                        .any(|line| line.status.is_in_transit());
                    if moving {
                        return Err(ServiceError::Conflict(format!(
                            "order {} has lines in transit",
                            order.id
                        )));
                    }

                    let mut model: order::ActiveModel = order.into();
                    model.deleted = Set(true);
                    model.update(txn).await?;
                    Ok(())
                })
            })
            .await?;

        info!("order soft-deleted");
        event_sender.send_or_log(Event::OrderDeleted(order_id)).await;
        Ok(())
    }
}
