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
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Records the approval decision on a request. The order line's status is
/// left alone; moving it is a separate admin action.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApproveRequestCommand {
    pub request_id: Uuid,
    pub approved: bool,
}

#[async_trait::async_trait]
impl Command for ApproveRequestCommand {
    type Result = return_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id, approved = self.approved))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let request_id = self.request_id;
        let approved = self.approved;

        let updated = db_pool
            .transaction::<_, return_request::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let (request, line) = super::lock_request_with_line(txn, request_id).await?;
                    if request.canceled {
                        return Err(ServiceError::Conflict(format!(
                            "request {} was withdrawn",
                            request.id
                        )));
                    }
                    let line_status = line.effective_status();
                    if approved && !line_status.accepts_request_approval() {
                        return Err(ServiceError::Conflict(format!(
                            "order line {} is {} and its request cannot be approved yet",
                            line.id, line_status
                        )));
                    }

                    let mut model: return_request::ActiveModel = request.into();
                    model.approved = Set(Some(approved));
                    model.updated_at = Set(Utc::now());
                    Ok(model.update(txn).await?)
                })
            })
            .await
            .map_err(|e| {
                let err = ServiceError::from(e);
                error!("Failed to record approval: {}", err);
                err
            })?;

        info!("request approval recorded");
        event_sender
            .send_or_log(Event::ReturnRequestApproved {
                request_id,
                approved,
            })
            .await;
        Ok(updated)
    }
}
