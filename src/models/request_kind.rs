use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;
use utoipa::ToSchema;

use super::order_line_status::OrderLineStatus;

/// What a return/exchange request asks for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    #[sea_orm(string_value = "RETURN")]
    Return,
    #[sea_orm(string_value = "EXCHANGE")]
    Exchange,
    #[sea_orm(string_value = "CANCEL")]
    Cancel,
}

impl RequestKind {
    /// Line status entered when a request of this kind is opened.
    pub fn requested_status(self) -> OrderLineStatus {
        match self {
            RequestKind::Return => OrderLineStatus::ReturnRequested,
            RequestKind::Exchange => OrderLineStatus::ExchangeRequested,
            RequestKind::Cancel => OrderLineStatus::CancelRequested,
        }
    }

    pub fn for_status(status: OrderLineStatus) -> Option<Self> {
        match status {
            OrderLineStatus::ReturnRequested => Some(RequestKind::Return),
            OrderLineStatus::ExchangeRequested => Some(RequestKind::Exchange),
            OrderLineStatus::CancelRequested => Some(RequestKind::Cancel),
            _ => None,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RequesterType {
    #[sea_orm(string_value = "MEMBER")]
    Member,
    #[sea_orm(string_value = "ADMIN")]
    Admin,
}

/// Approval decision on a request. `None` in the store means undecided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalState {
    pub fn from_column(approved: Option<bool>) -> Self {
        match approved {
            None => ApprovalState::Pending,
            Some(true) => ApprovalState::Approved,
            Some(false) => ApprovalState::Rejected,
        }
    }

    pub fn to_column(self) -> Option<bool> {
        match self {
            ApprovalState::Pending => None,
            ApprovalState::Approved => Some(true),
            ApprovalState::Rejected => Some(false),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    #[sea_orm(string_value = "PRODUCT")]
    Product,
    #[sea_orm(string_value = "DELIVERY_FEE")]
    DeliveryFee,
}
