use crate::{
    commands::{
        returns::{
            ApproveRequestCommand, CreateRequestCommand, CreateRequestResult,
            DeleteRequestCommand, RecordRequestTrackingCommand, UpdateRequestCommand,
        },
        Command,
    },
    db::DbPool,
    entities::return_request,
    errors::ServiceError,
    events::EventSender,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Return, exchange and cancel requests.
#[derive(Clone)]
pub struct ReturnService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ReturnService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_request(&self, request_id: Uuid) -> Result<return_request::Model, ServiceError> {
        return_request::Entity::find_by_id(request_id)
            .filter(return_request::Column::Deleted.eq(false))
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("request", request_id))
    }

    pub async fn create_request(
        &self,
        command: CreateRequestCommand,
    ) -> Result<CreateRequestResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    pub async fn update_request(
        &self,
        command: UpdateRequestCommand,
    ) -> Result<return_request::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    pub async fn approve_request(
        &self,
        request_id: Uuid,
        approved: bool,
    ) -> Result<return_request::Model, ServiceError> {
        ApproveRequestCommand {
            request_id,
            approved,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    pub async fn record_tracking(
        &self,
        command: RecordRequestTrackingCommand,
    ) -> Result<return_request::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    pub async fn delete_request(&self, request_id: Uuid) -> Result<(), ServiceError> {
        DeleteRequestCommand { request_id }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }
}
