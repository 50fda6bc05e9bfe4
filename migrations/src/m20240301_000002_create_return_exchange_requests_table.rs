use sea_orm_migration::prelude::*;

use super::m20240301_000001_create_orders_tables::OrderLines;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReturnExchangeRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::OrderLineId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::Kind)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::RequesterType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::RequesterId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::ReasonCode)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::ReasonText)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::Quantity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::Approved)
                            .boolean()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::Canceled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::ReceiverName)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::ReceiverPhone)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::Address)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::AddressDetail)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::ZipCode)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::PickupCourierCode)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::PickupTrackingNumber)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::PickupShipmentId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::RedeliveryCourierCode)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::RedeliveryTrackingNumber)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::RedeliveryShipmentId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReturnExchangeRequests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_return_exchange_requests_order_line_id")
                            .from(
                                ReturnExchangeRequests::Table,
                                ReturnExchangeRequests::OrderLineId,
                            )
                            .to(OrderLines::Table, OrderLines::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReturnExchangeRequests::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ReturnExchangeRequests {
    Table,
    Id,
    OrderLineId,
    Kind,
    RequesterType,
    RequesterId,
    ReasonCode,
    ReasonText,
    Quantity,
    Approved,
    Canceled,
    ReceiverName,
    ReceiverPhone,
    Address,
    AddressDetail,
    ZipCode,
    PickupCourierCode,
    PickupTrackingNumber,
    PickupShipmentId,
    RedeliveryCourierCode,
    RedeliveryTrackingNumber,
    RedeliveryShipmentId,
    Deleted,
    CreatedAt,
    UpdatedAt,
}
