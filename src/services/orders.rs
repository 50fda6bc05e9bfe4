use crate::{
    commands::{
        orders::{
            AcknowledgeMemoCommand, CreateOrderCommand, CreateOrderResult, DeleteOrderCommand,
            DeleteOrderLineCommand, MergeOrderLinesCommand, MergeOrderLinesResult,
            RecordTrackingCommand, SplitOrderLineCommand, SplitOrderLineResult,
            UpdateOrderLineStatusCommand, UpdateOrderLineStatusResult, UpdateOrderMemoCommand,
        },
        Command,
    },
    db::DbPool,
    entities::{order, order_line, payment, return_request, shipping_address},
    errors::ServiceError,
    events::EventSender,
    repositories::order_repository::OrderRepository,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// An order as the back office sees it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetail {
    pub order: order::Model,
    pub lines: Vec<OrderLineDetail>,
    pub payments: Vec<payment::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineDetail {
    pub line: order_line::Model,
    pub address: Option<shipping_address::Model>,
    /// Open return, exchange or cancel request
    pub request: Option<return_request::Model>,
}

/// Order store operations exposed to the admin API.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    repository: OrderRepository,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        let repository = OrderRepository::new(db_pool.clone());
        Self {
            db_pool,
            event_sender,
            repository,
        }
    }

    #[instrument(skip(self, command))]
    pub async fn create_order(
        &self,
        command: CreateOrderCommand,
    ) -> Result<CreateOrderResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Order header with live lines, each line's active address and open request.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let order = self
            .repository
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("order", order_id))?;

        let lines = self.repository.lines_for_order(order_id).await?;
        let line_ids: Vec<Uuid> = lines.iter().map(|line| line.id).collect();

        let mut addresses: HashMap<Uuid, shipping_address::Model> = HashMap::new();
        for address in self.repository.active_addresses(line_ids.clone()).await? {
            match addresses.get(&address.order_line_id) {
                Some(existing) if existing.created_at >= address.created_at => {}
                _ => {
                    addresses.insert(address.order_line_id, address);
                }
            }
        }

        let mut requests: HashMap<Uuid, return_request::Model> = HashMap::new();
        if !line_ids.is_empty() {
            let open = return_request::Entity::find()
                .filter(return_request::Column::OrderLineId.is_in(line_ids))
                .filter(return_request::Column::Deleted.eq(false))
                .filter(return_request::Column::Canceled.eq(false))
                .order_by_asc(return_request::Column::CreatedAt)
                .all(self.db_pool.as_ref())
                .await?;
            for request in open {
                requests.insert(request.order_line_id, request);
            }
        }

        let payments = payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .order_by_asc(payment::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await?;

        let lines = lines
            .into_iter()
            .map(|line| OrderLineDetail {
                address: addresses.remove(&line.id),
                request: requests.remove(&line.id),
                line,
            })
            .collect();

        Ok(OrderDetail {
            order,
            lines,
            payments,
        })
    }

    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        DeleteOrderCommand { order_id }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    pub async fn update_memo(
        &self,
        command: UpdateOrderMemoCommand,
    ) -> Result<order::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    pub async fn acknowledge_memo(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        AcknowledgeMemoCommand { order_id }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    pub async fn split_line(
        &self,
        command: SplitOrderLineCommand,
    ) -> Result<SplitOrderLineResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    pub async fn merge_lines(
        &self,
        command: MergeOrderLinesCommand,
    ) -> Result<MergeOrderLinesResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    pub async fn update_line_status(
        &self,
        command: UpdateOrderLineStatusCommand,
    ) -> Result<UpdateOrderLineStatusResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    pub async fn record_tracking(
        &self,
        command: RecordTrackingCommand,
    ) -> Result<order_line::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    pub async fn delete_line(&self, order_line_id: Uuid) -> Result<(), ServiceError> {
        DeleteOrderLineCommand { order_line_id }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }
}
