use crate::{
    commands::Command,
    db::DbPool,
    entities::order,
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::order_repository,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Replaces the admin memo on an order and clears its acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderMemoCommand {
    pub order_id: Uuid,
    #[validate(length(max = 2000))]
    pub memo: String,
}

#[async_trait::async_trait]
impl Command for UpdateOrderMemoCommand {
    type Result = order::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let order_id = self.order_id;
        let memo = self.memo.clone();

        let updated = db_pool
            .transaction::<_, order::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = order_repository::lock_order(txn, order_id).await?;
                    let mut model: order::ActiveModel = order.into();
                    model.memo = Set(Some(memo));
                    model.memo_updated_at = Set(Some(Utc::now()));
                    model.memo_checked = Set(false);
                    Ok(model.update(txn).await?)
                })
            })
            .await?;

        event_sender
            .send_or_log(Event::OrderMemoUpdated(updated.id))
            .await;
        Ok(updated)
    }
}

/// Marks the current memo as read.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AcknowledgeMemoCommand {
    pub order_id: Uuid,
}

#[async_trait::async_trait]
impl Command for AcknowledgeMemoCommand {
    type Result = order::Model;

    #[instrument(skip(self, db_pool, _event_sender), fields(order_id = %self.order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        _event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let order_id = self.order_id;
        let updated = db_pool
            .transaction::<_, order::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = order_repository::lock_order(txn, order_id).await?;
                    let mut model: order::ActiveModel = order.into();
                    model.memo_checked = Set(true);
                    Ok(model.update(txn).await?)
                })
            })
            .await?;
        Ok(updated)
    }
}
