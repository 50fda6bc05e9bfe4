use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Delivery address attached to an order line. At most one row per line is
/// `active`; replaced addresses stay for history.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = ShippingAddress)]
#[sea_orm(table_name = "shipping_addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_line_id: Uuid,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub address: String,
    pub address_detail: Option<String>,
    pub zip_code: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub entry_instructions: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Fresh active copy of this address for another line.
    pub fn copy_for_line(&self, order_line_id: Uuid) -> ActiveModel {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            order_line_id: Set(order_line_id),
            receiver_name: Set(self.receiver_name.clone()),
            receiver_phone: Set(self.receiver_phone.clone()),
            address: Set(self.address.clone()),
            address_detail: Set(self.address_detail.clone()),
            zip_code: Set(self.zip_code.clone()),
            entry_instructions: Set(self.entry_instructions.clone()),
            active: Set(true),
            created_at: Set(Utc::now()),
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
