//! Ordered fallback chain for finding the address a split-off line ships to.
//!
//! Each strategy either finds an active address or passes; the first hit wins.

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseTransaction, EntityTrait, JoinType, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait,
};
use uuid::Uuid;

use crate::entities::{
    order,
    order_line,
    shipping_address::{self, Entity as ShippingAddress},
};
use crate::errors::ServiceError;

/// The line being split and where it sits.
#[derive(Debug, Clone, Copy)]
pub struct LookupContext {
    pub order_line_id: Uuid,
    pub order_id: Uuid,
    pub member_id: Uuid,
}

/// Where a resolved address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    SplitLine,
    SameOrder,
    MemberHistory,
}

#[async_trait]
pub trait AddressLookup: Send + Sync {
    fn source(&self) -> AddressSource;

    async fn find(
        &self,
        txn: &DatabaseTransaction,
        ctx: &LookupContext,
    ) -> Result<Option<shipping_address::Model>, ServiceError>;
}

/// Active address of the line being split.
pub struct SplitLineAddress;

/// Most recent active address on any live line of the same order.
pub struct SameOrderAddress;

/// Most recent active address on a live line of any other live order of the
/// same member.
pub struct MemberHistoryAddress;

#[async_trait]
impl AddressLookup for SplitLineAddress {
    fn source(&self) -> AddressSource {
        AddressSource::SplitLine
    }

    async fn find(
        &self,
        txn: &DatabaseTransaction,
        ctx: &LookupContext,
    ) -> Result<Option<shipping_address::Model>, ServiceError> {
        super::order_repository::find_active_address(txn, ctx.order_line_id).await
    }
}

#[async_trait]
impl AddressLookup for SameOrderAddress {
    fn source(&self) -> AddressSource {
        AddressSource::SameOrder
    }

    async fn find(
        &self,
        txn: &DatabaseTransaction,
        ctx: &LookupContext,
    ) -> Result<Option<shipping_address::Model>, ServiceError> {
        Ok(ShippingAddress::find()
            .join(JoinType::InnerJoin, shipping_address::Relation::OrderLine.def())
            .filter(order_line::Column::OrderId.eq(ctx.order_id))
            .filter(order_line::Column::Deleted.eq(false))
            .filter(shipping_address::Column::Active.eq(true))
            .order_by_desc(shipping_address::Column::CreatedAt)
            .one(txn)
            .await?)
    }
}

#[async_trait]
impl AddressLookup for MemberHistoryAddress {
    fn source(&self) -> AddressSource {
        AddressSource::MemberHistory
    }

    async fn find(
        &self,
        txn: &DatabaseTransaction,
        ctx: &LookupContext,
    ) -> Result<Option<shipping_address::Model>, ServiceError> {
        Ok(ShippingAddress::find()
            .join(JoinType::InnerJoin, shipping_address::Relation::OrderLine.def())
            .join(JoinType::InnerJoin, order_line::Relation::Order.def())
            .filter(order::Column::MemberId.eq(ctx.member_id))
            .filter(order::Column::Id.ne(ctx.order_id))
            .filter(order::Column::Deleted.eq(false))
            .filter(order_line::Column::Deleted.eq(false))
            .filter(shipping_address::Column::Active.eq(true))
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(shipping_address::Column::CreatedAt)
            .one(txn)
            .await?)
    }
}

/// Split line first, then its order, then the member's other orders.
pub fn default_chain() -> Vec<Box<dyn AddressLookup>> {
    vec![
        Box::new(SplitLineAddress),
        Box::new(SameOrderAddress),
        Box::new(MemberHistoryAddress),
    ]
}

/// Runs the chain in order; `None` when no strategy finds an address.
pub async fn resolve(
    chain: &[Box<dyn AddressLookup>],
    txn: &DatabaseTransaction,
    ctx: &LookupContext,
) -> Result<Option<(AddressSource, shipping_address::Model)>, ServiceError> {
    for strategy in chain {
        if let Some(address) = strategy.find(txn, ctx).await? {
            return Ok(Some((strategy.source(), address)));
        }
    }
    Ok(None)
}
