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
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Records the courier and tracking number an order line ships under.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecordTrackingCommand {
    pub order_line_id: Uuid,
    #[validate(length(min = 1, message = "Courier code is required"))]
    pub courier_code: String,
    #[validate(length(min = 1, message = "Tracking number is required"))]
    pub tracking_number: String,
    pub shipment_id: Option<String>,
}

#[async_trait::async_trait]
impl Command for RecordTrackingCommand {
    type Result = order_line::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(order_line_id = %self.order_line_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let cmd = self.normalized();
        cmd.validate()?;

        let line_id = cmd.order_line_id;
        let courier_code = cmd.courier_code.clone();
        let tracking_number = cmd.tracking_number.clone();
        let shipment_id = cmd.shipment_id.clone();

        let updated = db_pool
            .transaction::<_, order_line::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let line = order_repository::lock_line(txn, line_id).await?;
                    if line.status.is_terminal() {
                        return Err(ServiceError::Conflict(format!(
                            "order line {} is {}",
                            line.id, line.status
                        )));
                    }

                    let mut model: order_line::ActiveModel = line.into();
                    model.courier_code = Set(Some(courier_code));
                    model.tracking_number = Set(Some(tracking_number));
                    model.shipment_id = Set(shipment_id);
                    model.updated_at = Set(Utc::now());
                    Ok(model.update(txn).await?)
                })
            })
            .await
            .map_err(|e| {
                let err = ServiceError::from(e);
                error!("Failed to record tracking: {}", err);
                err
            })?;

        info!(
            courier = %cmd.courier_code,
            tracking_number = %cmd.tracking_number,
            "tracking recorded"
        );
        event_sender
            .send_or_log(Event::TrackingRecorded {
                order_line_id: updated.id,
                courier_code: cmd.courier_code,
                tracking_number: cmd.tracking_number,
            })
            .await;

        Ok(updated)
    }
}

impl RecordTrackingCommand {
    fn normalized(&self) -> Self {
        Self {
            order_line_id: self.order_line_id,
            courier_code: self.courier_code.trim().to_string(),
            tracking_number: self.tracking_number.trim().to_string(),
            shipment_id: self
                .shipment_id
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}
