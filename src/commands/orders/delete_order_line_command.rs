use crate::{
    commands::Command,
    db::DbPool,
    entities::order_line,
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::order_repository,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOrderLineCommand {
    pub order_line_id: Uuid,
}

#[async_trait::async_trait]
impl Command for DeleteOrderLineCommand {
    type Result = ();

    #[instrument(skip(self, db_pool, event_sender), fields(order_line_id = %self.order_line_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let line_id = self.order_line_id;
        db_pool
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let line = order_repository::lock_line(txn, line_id).await?;
                    if line.status.is_in_transit() {
                        return Err(ServiceError::Conflict(format!(
                            "order line {} is {} and cannot be deleted",
                            line.id, line.status
                        )));
                    }
                    let mut model: order_line::ActiveModel = line.into();
                    model.deleted = Set(true);
                    model.updated_at = Set(Utc::now());
                    model.update(txn).await?;
                    Ok(())
                })
            })
            .await?;

        info!("order line soft-deleted");
        event_sender
            .send_or_log(Event::OrderLineDeleted(line_id))
            .await;
        Ok(())
    }
}
