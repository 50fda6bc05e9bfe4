use crate::{
    commands::Command,
    db::DbPool,
    entities::return_request,
    errors::ServiceError,
    events::{Event, EventSender},
    models::RequestKind,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Which shipment of a request is being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingLeg {
    /// Member to company
    Pickup,
    /// Company to member, exchanges only
    Redelivery,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecordRequestTrackingCommand {
    #[serde(default)]
    pub request_id: Uuid,
    pub leg: ShippingLeg,
    #[validate(length(min = 1, message = "Courier code is required"))]
    pub courier_code: String,
    #[validate(length(min = 1, message = "Tracking number is required"))]
    pub tracking_number: String,
    pub shipment_id: Option<String>,
}

#[async_trait::async_trait]
impl Command for RecordRequestTrackingCommand {
    type Result = return_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id, leg = ?self.leg))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let courier_code = self.courier_code.trim().to_string();
        let tracking_number = self.tracking_number.trim().to_string();
        if courier_code.is_empty() || tracking_number.is_empty() {
            return Err(ServiceError::ValidationError(
                "courier code and tracking number are required".to_string(),
            ));
        }
        self.validate()?;

        let request_id = self.request_id;
        let leg = self.leg;
        let shipment_id = self.shipment_id.clone();
        let updated = db_pool
            .transaction::<_, return_request::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let (request, _line) = super::lock_request_with_line(txn, request_id).await?;
                    if leg == ShippingLeg::Redelivery && request.kind != RequestKind::Exchange {
                        return Err(ServiceError::ValidationError(format!(
                            "{} requests have no redelivery leg",
                            request.kind
                        )));
                    }

                    let mut model: return_request::ActiveModel = request.into();
                    match leg {
                        ShippingLeg::Pickup => {
                            model.pickup_courier_code = Set(Some(courier_code));
                            model.pickup_tracking_number = Set(Some(tracking_number));
                            model.pickup_shipment_id = Set(shipment_id);
                        }
                        ShippingLeg::Redelivery => {
                            model.redelivery_courier_code = Set(Some(courier_code));
                            model.redelivery_tracking_number = Set(Some(tracking_number));
                            model.redelivery_shipment_id = Set(shipment_id);
                        }
                    }
                    model.updated_at = Set(Utc::now());
                    Ok(model.update(txn).await?)
                })
            })
            .await?;

        info!("request tracking recorded");
        event_sender
            .send_or_log(Event::ReturnRequestUpdated(updated.id))
            .await;
        Ok(updated)
    }
}
