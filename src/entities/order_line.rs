use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{OrderLineStatus, TransitionActor, TransitionError};

/// One product line of an order. Lines sharing a `lineage_id` descend from
/// the same purchased line through splits; their quantities always sum to
/// `paid_quantity`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = OrderLine)]
#[sea_orm(table_name = "order_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub lineage_id: Uuid,
    pub product_variant_id: Uuid,
    pub product_name: String,
    pub paid_quantity: i32,
    pub quantity: i32,
    pub status: OrderLineStatus,
    /// Status the line was in when it was put on `HOLD`
    pub held_from: Option<OrderLineStatus>,
    pub order_group: i32,
    pub courier_code: Option<String>,
    pub tracking_number: Option<String>,
    pub shipment_id: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub last_reconciliation_id: Option<Uuid>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Courier code and tracking number, when both are recorded.
    pub fn tracking_pair(&self) -> Option<(&str, &str)> {
        match (self.courier_code.as_deref(), self.tracking_number.as_deref()) {
            (Some(courier), Some(tracking)) if !courier.is_empty() && !tracking.is_empty() => {
                Some((courier, tracking))
            }
            _ => None,
        }
    }

    /// The status a held line resumes from; `status` otherwise.
    pub fn effective_status(&self) -> OrderLineStatus {
        match (self.status, self.held_from) {
            (OrderLineStatus::Hold, Some(origin)) => origin,
            (status, _) => status,
        }
    }

    /// Checks a move out of the line's current status. A held line may only
    /// go where the status it was held from could.
    pub fn check_transition(
        &self,
        to: OrderLineStatus,
        actor: TransitionActor,
    ) -> Result<(), TransitionError> {
        match (self.status, self.held_from) {
            (OrderLineStatus::Hold, Some(origin)) if to != OrderLineStatus::Hold => {
                OrderLineStatus::check_release(origin, to, actor)
            }
            (status, _) => status.check_transition(to, actor),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Order,
    #[sea_orm(has_many = "super::shipping_address::Entity")]
    ShippingAddresses,
    #[sea_orm(has_many = "super::return_request::Entity")]
    ReturnRequests,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::shipping_address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShippingAddresses.def()
    }
}

impl Related<super::return_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReturnRequests.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}
