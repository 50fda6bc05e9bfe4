use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const POST_TYPE_DELIVERY: &str = "DELIVERY";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub post_type: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub all_send: bool,
    pub push_send: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::member_post::Entity")]
    MemberPosts,
}

impl Related<super::member_post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MemberPosts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
