use crate::{
    commands::Command,
    db::DbPool,
    entities::return_request,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequestCommand {
    pub request_id: Uuid,
}

#[async_trait::async_trait]
impl Command for DeleteRequestCommand {
    type Result = ();

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let request_id = self.request_id;
        db_pool
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let (request, _line) = super::lock_request_with_line(txn, request_id).await?;
                    let mut model: return_request::ActiveModel = request.into();
                    model.deleted = Set(true);
                    model.updated_at = Set(Utc::now());
                    model.update(txn).await?;
                    Ok(())
                })
            })
            .await?;

        info!("request soft-deleted");
        event_sender
            .send_or_log(Event::ReturnRequestDeleted(request_id))
            .await;
        Ok(())
    }
}
