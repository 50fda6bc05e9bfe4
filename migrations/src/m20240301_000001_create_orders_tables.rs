use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Orders::MemberId).uuid().not_null())
                    .col(ColumnDef::new(Orders::Memo).text().null())
                    .col(
                        ColumnDef::new(Orders::MemoUpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Orders::MemoChecked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Orders::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Orders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Orders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderLines::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderLines::OrderId).uuid().not_null())
                    .col(ColumnDef::new(OrderLines::LineageId).uuid().not_null())
                    .col(
                        ColumnDef::new(OrderLines::ProductVariantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderLines::ProductName).string().not_null())
                    .col(
                        ColumnDef::new(OrderLines::PaidQuantity)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderLines::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(OrderLines::Status)
                            .string()
                            .not_null()
                            .default("PAID"),
                    )
                    .col(ColumnDef::new(OrderLines::HeldFrom).string().null())
                    .col(
                        ColumnDef::new(OrderLines::OrderGroup)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(OrderLines::CourierCode).string().null())
                    .col(ColumnDef::new(OrderLines::TrackingNumber).string().null())
                    .col(ColumnDef::new(OrderLines::ShipmentId).string().null())
                    .col(
                        ColumnDef::new(OrderLines::DeliveredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OrderLines::LastReconciliationId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OrderLines::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(OrderLines::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderLines::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_lines_order_id")
                            .from(OrderLines::Table, OrderLines::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ShippingAddresses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShippingAddresses::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShippingAddresses::OrderLineId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShippingAddresses::ReceiverName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShippingAddresses::ReceiverPhone)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ShippingAddresses::Address).string().not_null())
                    .col(
                        ColumnDef::new(ShippingAddresses::AddressDetail)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(ShippingAddresses::ZipCode).string().not_null())
                    .col(
                        ColumnDef::new(ShippingAddresses::EntryInstructions)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ShippingAddresses::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ShippingAddresses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shipping_addresses_order_line_id")
                            .from(ShippingAddresses::Table, ShippingAddresses::OrderLineId)
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
            .drop_table(Table::drop().table(ShippingAddresses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Orders {
    Table,
    Id,
    MemberId,
    Memo,
    MemoUpdatedAt,
    MemoChecked,
    Deleted,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum OrderLines {
    Table,
    Id,
    OrderId,
    LineageId,
    ProductVariantId,
    ProductName,
    PaidQuantity,
    Quantity,
    Status,
    HeldFrom,
    OrderGroup,
    CourierCode,
    TrackingNumber,
    ShipmentId,
    DeliveredAt,
    LastReconciliationId,
    Deleted,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum ShippingAddresses {
    Table,
    Id,
    OrderLineId,
    ReceiverName,
    ReceiverPhone,
    Address,
    AddressDetail,
    ZipCode,
    EntryInstructions,
    Active,
    CreatedAt,
}
