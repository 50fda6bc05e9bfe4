use crate::{
    commands::Command,
    db::DbPool,
    entities::return_request,
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::request_repository,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Partial update of a request. Fields left `None` keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateRequestCommand {
    #[serde(default)]
    pub request_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub reason_code: Option<String>,
    #[validate(length(max = 2000))]
    pub reason_text: Option<String>,
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    pub receiver_name: Option<String>,
    pub receiver_phone: Option<String>,
    pub address: Option<String>,
    pub address_detail: Option<String>,
    pub zip_code: Option<String>,
    pub approved: Option<bool>,
    pub canceled: Option<bool>,
}

#[async_trait::async_trait]
impl Command for UpdateRequestCommand {
    type Result = return_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let updated = db_pool
            .transaction::<_, return_request::Model, ServiceError>(move |txn| {
                Box::pin(async move { cmd.apply(txn).await })
            })
            .await
            .map_err(|e| {
                let err = ServiceError::from(e);
                error!("Failed to update request: {}", err);
                err
            })?;

        info!("request updated");
        event_sender
            .send_or_log(Event::ReturnRequestUpdated(updated.id))
            .await;
        if let Some(approved) = self.approved {
            event_sender
                .send_or_log(Event::ReturnRequestApproved {
                    request_id: updated.id,
                    approved,
                })
                .await;
        }
        Ok(updated)
    }
}

impl UpdateRequestCommand {
    async fn apply(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<return_request::Model, ServiceError> {
        let (request, line) = super::lock_request_with_line(txn, self.request_id).await?;

        if let Some(quantity) = self.quantity {
            if quantity > line.quantity {
                return Err(ServiceError::ValidationError(format!(
                    "request quantity {} exceeds line quantity {}",
                    quantity, line.quantity
                )));
            }
        }
        if self.approved == Some(true) && !line.effective_status().accepts_request_approval() {
            return Err(ServiceError::Conflict(format!(
                "order line {} is {} and its request cannot be approved yet",
                line.id,
                line.effective_status()
            )));
        }
        if self.canceled == Some(false) && request.canceled {
            // Reviving a withdrawn request must not create a second active one.
            if let Some(other) =
                request_repository::find_active_request(txn, line.id, None).await?
            {
                return Err(ServiceError::DuplicateRequest(format!(
                    "order line {} already has active request {}",
                    line.id, other.id
                )));
            }
        }

        let mut model: return_request::ActiveModel = request.into();
        if let Some(code) = &self.reason_code {
            model.reason_code = Set(code.clone());
        }
        if let Some(text) = &self.reason_text {
            model.reason_text = Set(Some(text.clone()));
        }
        if let Some(quantity) = self.quantity {
            model.quantity = Set(quantity);
        }
        if let Some(name) = &self.receiver_name {
            model.receiver_name = Set(Some(name.clone()));
        }
        if let Some(phone) = &self.receiver_phone {
            model.receiver_phone = Set(Some(phone.clone()));
        }
        if let Some(address) = &self.address {
            model.address = Set(Some(address.clone()));
        }
        if let Some(detail) = &self.address_detail {
            model.address_detail = Set(Some(detail.clone()));
        }
        if let Some(zip) = &self.zip_code {
            model.zip_code = Set(Some(zip.clone()));
        }
        if let Some(approved) = self.approved {
            model.approved = Set(Some(approved));
        }
        if let Some(canceled) = self.canceled {
            model.canceled = Set(canceled);
        }
        model.updated_at = Set(Utc::now());

        Ok(model.update(txn).await?)
    }
}
