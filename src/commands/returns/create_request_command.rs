use crate::{
    commands::Command,
    db::DbPool,
    entities::{order_line, return_request},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderLineStatus, RequestKind, RequesterType, TransitionActor},
    repositories::{
        order_repository,
        request_repository::{self, RequestDraft},
    },
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Opens a return, exchange or cancel request and moves the line into the
/// matching `*_REQUESTED` status.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateRequestCommand {
    #[serde(default)]
    pub order_line_id: Uuid,
    pub kind: RequestKind,
    pub requester_type: RequesterType,
    pub requester_id: Option<Uuid>,
    #[validate(length(min = 1, max = 64))]
    pub reason_code: String,
    #[validate(length(max = 2000))]
    pub reason_text: Option<String>,
    /// Defaults to the whole line
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    pub receiver_name: Option<String>,
    pub receiver_phone: Option<String>,
    pub address: Option<String>,
    pub address_detail: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateRequestResult {
    pub request: return_request::Model,
    pub old_status: OrderLineStatus,
    pub new_status: OrderLineStatus,
}

#[async_trait::async_trait]
impl Command for CreateRequestCommand {
    type Result = CreateRequestResult;

    #[instrument(skip(self, db_pool, event_sender), fields(order_line_id = %self.order_line_id, kind = %self.kind))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, CreateRequestResult, ServiceError>(move |txn| {
                Box::pin(async move { cmd.open(txn).await })
            })
            .await
            .map_err(|e| {
                let err = ServiceError::from(e);
                error!("Failed to open request: {}", err);
                err
            })?;

        counter!("fulfillment_requests_created_total", 1, "kind" => self.kind.to_string());
        info!(request_id = %result.request.id, "request opened");

        event_sender
            .send_or_log(Event::ReturnRequestCreated {
                request_id: result.request.id,
                order_line_id: self.order_line_id,
                kind: self.kind,
            })
            .await;
        event_sender
            .send_or_log(Event::OrderLineStatusChanged {
                order_line_id: self.order_line_id,
                old_status: result.old_status,
                new_status: result.new_status,
            })
            .await;

        Ok(result)
    }
}

impl CreateRequestCommand {
    async fn open(&self, txn: &DatabaseTransaction) -> Result<CreateRequestResult, ServiceError> {
        let line = order_repository::lock_line(txn, self.order_line_id).await?;
        let old_status = line.status;
        let new_status = self.kind.requested_status();

        request_repository::ensure_no_active_request(txn, line.id).await?;
        line.check_transition(new_status, TransitionActor::Admin)?;

        let request = request_repository::insert_request(txn, &line, self.draft()).await?;

        let mut model: order_line::ActiveModel = line.into();
        model.status = Set(new_status);
        model.held_from = Set(None);
        model.updated_at = Set(Utc::now());
        model.update(txn).await?;

        Ok(CreateRequestResult {
            request,
            old_status,
            new_status,
        })
    }

    fn draft(&self) -> RequestDraft {
        RequestDraft {
            kind: self.kind,
            requester_type: self.requester_type,
            requester_id: self.requester_id,
            reason_code: self.reason_code.clone(),
            reason_text: self.reason_text.clone(),
            quantity: self.quantity,
            receiver_name: self.receiver_name.clone(),
            receiver_phone: self.receiver_phone.clone(),
            address: self.address.clone(),
            address_detail: self.address_detail.clone(),
            zip_code: self.zip_code.clone(),
        }
    }
}
