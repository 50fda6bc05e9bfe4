use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{
    order::{self, Entity as Order},
    order_line::{self, Entity as OrderLine},
    shipping_address::{self, Entity as ShippingAddress},
};
use crate::errors::ServiceError;
use crate::models::OrderLineStatus;
use crate::repositories::Repository;

use super::BaseRepository;

/// Read-side access to orders and their lines.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find a live (not soft-deleted) order by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        Ok(Order::find_by_id(id)
            .filter(order::Column::Deleted.eq(false))
            .one(self.base.get_db())
            .await?)
    }

    /// Live lines of an order, grouped then oldest first
    pub async fn lines_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_line::Model>, ServiceError> {
        Ok(OrderLine::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .filter(order_line::Column::Deleted.eq(false))
            .order_by_asc(order_line::Column::OrderGroup)
            .order_by_asc(order_line::Column::CreatedAt)
            .all(self.base.get_db())
            .await?)
    }

    pub async fn active_addresses(
        &self,
        line_ids: Vec<Uuid>,
    ) -> Result<Vec<shipping_address::Model>, ServiceError> {
        if line_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(ShippingAddress::find()
            .filter(shipping_address::Column::OrderLineId.is_in(line_ids))
            .filter(shipping_address::Column::Active.eq(true))
            .all(self.base.get_db())
            .await?)
    }
}

/// Loads a live order, holding its row lock for the rest of the transaction.
pub async fn lock_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<order::Model, ServiceError> {
    Order::find_by_id(order_id)
        .filter(order::Column::Deleted.eq(false))
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("order", order_id))
}

/// Loads a live order line under `SELECT ... FOR UPDATE`.
pub async fn lock_line<C: ConnectionTrait>(
    conn: &C,
    line_id: Uuid,
) -> Result<order_line::Model, ServiceError> {
    OrderLine::find_by_id(line_id)
        .filter(order_line::Column::Deleted.eq(false))
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("order line", line_id))
}

pub async fn find_active_address<C: ConnectionTrait>(
    conn: &C,
    line_id: Uuid,
) -> Result<Option<shipping_address::Model>, ServiceError> {
    Ok(ShippingAddress::find()
        .filter(shipping_address::Column::OrderLineId.eq(line_id))
        .filter(shipping_address::Column::Active.eq(true))
        .order_by_desc(shipping_address::Column::CreatedAt)
        .one(conn)
        .await?)
}

/// One past the highest group number ever used on the order.
pub async fn next_order_group<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<i32, ServiceError> {
    let highest = OrderLine::find()
        .filter(order_line::Column::OrderId.eq(order_id))
        .order_by_desc(order_line::Column::OrderGroup)
        .one(conn)
        .await?
        .map(|line| line.order_group)
        .unwrap_or(0);
    Ok(highest + 1)
}

/// Quantity held by live, non-canceled lines of a lineage.
pub async fn lineage_live_quantity<C: ConnectionTrait>(
    conn: &C,
    lineage_id: Uuid,
) -> Result<i64, ServiceError> {
    let lines = OrderLine::find()
        .filter(order_line::Column::LineageId.eq(lineage_id))
        .filter(order_line::Column::Deleted.eq(false))
        .filter(order_line::Column::Status.ne(OrderLineStatus::Canceled))
        .all(conn)
        .await?;
    Ok(lines.iter().map(|line| i64::from(line.quantity)).sum())
}

/// Fails the enclosing transaction when a lineage holds more than was paid for.
pub async fn ensure_lineage_within_paid<C: ConnectionTrait>(
    conn: &C,
    line: &order_line::Model,
) -> Result<(), ServiceError> {
    let live = lineage_live_quantity(conn, line.lineage_id).await?;
    if live > i64::from(line.paid_quantity) {
        return Err(ServiceError::Conflict(format!(
            "lineage {} holds {} units but only {} were paid",
            line.lineage_id, live, line.paid_quantity
        )));
    }
    Ok(())
}
