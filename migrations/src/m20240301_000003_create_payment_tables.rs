use sea_orm_migration::prelude::*;

use super::m20240301_000001_create_orders_tables::Orders;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Payments::OrderId).uuid().not_null())
                    .col(ColumnDef::new(Payments::PaymentType).string().not_null())
                    .col(ColumnDef::new(Payments::PaidAmount).decimal().not_null())
                    .col(
                        ColumnDef::new(Payments::RefundedAmount)
                            .decimal()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Payments::ProviderPaymentKey).string().null())
                    .col(ColumnDef::new(Payments::ProviderOrderId).string().null())
                    .col(
                        ColumnDef::new(Payments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Payments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_order_id")
                            .from(Payments::Table, Payments::OrderId)
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
                    .table(PointLedger::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PointLedger::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PointLedger::MemberId).uuid().not_null())
                    .col(ColumnDef::new(PointLedger::OrderId).uuid().not_null())
                    .col(ColumnDef::new(PointLedger::Amount).big_integer().not_null())
                    .col(ColumnDef::new(PointLedger::Reason).string().not_null())
                    .col(
                        ColumnDef::new(PointLedger::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PointLedger::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_point_ledger_order_id")
                            .from(PointLedger::Table, PointLedger::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PointLedger::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    OrderId,
    PaymentType,
    PaidAmount,
    RefundedAmount,
    ProviderPaymentKey,
    ProviderOrderId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PointLedger {
    Table,
    Id,
    MemberId,
    OrderId,
    Amount,
    Reason,
    Deleted,
    CreatedAt,
}
