use sea_orm_migration::prelude::*;

use super::m20240301_000001_create_orders_tables::{OrderLines, Orders, ShippingAddresses};
use super::m20240301_000002_create_return_exchange_requests_table::ReturnExchangeRequests;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============================================
        // ORDERS
        // ============================================

        // Member order history, newest first (split address fallback)
        manager
            .create_index(
                Index::create()
                    .name("idx_orders_member_created")
                    .table(Orders::Table)
                    .col(Orders::MemberId)
                    .col((Orders::CreatedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        // ============================================
        // ORDER_LINES
        // ============================================

        // Reconciliation collection scans by status
        manager
            .create_index(
                Index::create()
                    .name("idx_order_lines_status")
                    .table(OrderLines::Table)
                    .col(OrderLines::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_lines_order_id")
                    .table(OrderLines::Table)
                    .col(OrderLines::OrderId)
                    .col(OrderLines::OrderGroup)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_lines_lineage_id")
                    .table(OrderLines::Table)
                    .col(OrderLines::LineageId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_lines_last_reconciliation_id")
                    .table(OrderLines::Table)
                    .col(OrderLines::LastReconciliationId)
                    .to_owned(),
            )
            .await?;

        // ============================================
        // SHIPPING_ADDRESSES / REQUESTS
        // ============================================

        manager
            .create_index(
                Index::create()
                    .name("idx_shipping_addresses_line_active")
                    .table(ShippingAddresses::Table)
                    .col(ShippingAddresses::OrderLineId)
                    .col(ShippingAddresses::Active)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_return_exchange_requests_order_line_id")
                    .table(ReturnExchangeRequests::Table)
                    .col(ReturnExchangeRequests::OrderLineId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, table) in [
            ("idx_orders_member_created", Orders::Table.into_iden()),
            ("idx_order_lines_status", OrderLines::Table.into_iden()),
            ("idx_order_lines_order_id", OrderLines::Table.into_iden()),
            ("idx_order_lines_lineage_id", OrderLines::Table.into_iden()),
            (
                "idx_order_lines_last_reconciliation_id",
                OrderLines::Table.into_iden(),
            ),
            (
                "idx_shipping_addresses_line_active",
                ShippingAddresses::Table.into_iden(),
            ),
            (
                "idx_return_exchange_requests_order_line_id",
                ReturnExchangeRequests::Table.into_iden(),
            ),
        ] {
            manager
                .drop_index(Index::drop().name(name).table(table).to_owned())
                .await?;
        }
        Ok(())
    }
}
