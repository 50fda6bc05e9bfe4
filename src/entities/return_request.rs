use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{ApprovalState, RequestKind, RequesterType};

/// Return, exchange or cancel request against one order line.
///
/// `approved` is tri-state: `None` while undecided. The pickup leg carries
/// goods back from the member; the redelivery leg carries the replacement
/// for exchanges.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = ReturnExchangeRequest)]
#[sea_orm(table_name = "return_exchange_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_line_id: Uuid,
    pub kind: RequestKind,
    pub requester_type: RequesterType,
    pub requester_id: Option<Uuid>,
    pub reason_code: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason_text: Option<String>,
    pub quantity: i32,
    pub approved: Option<bool>,
    pub canceled: bool,
    pub receiver_name: Option<String>,
    pub receiver_phone: Option<String>,
    pub address: Option<String>,
    pub address_detail: Option<String>,
    pub zip_code: Option<String>,
    pub pickup_courier_code: Option<String>,
    pub pickup_tracking_number: Option<String>,
    pub pickup_shipment_id: Option<String>,
    pub redelivery_courier_code: Option<String>,
    pub redelivery_tracking_number: Option<String>,
    pub redelivery_shipment_id: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn approval(&self) -> ApprovalState {
        ApprovalState::from_column(self.approved)
    }

    /// Not withdrawn and not removed.
    pub fn is_active(&self) -> bool {
        !self.deleted && !self.canceled
    }

    pub fn redelivery_tracking(&self) -> Option<(&str, &str)> {
        match (
            self.redelivery_courier_code.as_deref(),
            self.redelivery_tracking_number.as_deref(),
        ) {
            (Some(courier), Some(tracking)) if !courier.is_empty() && !tracking.is_empty() => {
                Some((courier, tracking))
            }
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order_line::Entity",
        from = "Column::OrderLineId",
        to = "super::order_line::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    OrderLine,
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
