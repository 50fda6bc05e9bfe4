pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_orders_tables;
mod m20240301_000002_create_return_exchange_requests_table;
mod m20240301_000003_create_payment_tables;
mod m20240301_000004_create_notification_tables;
mod m20240301_000005_add_fulfillment_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_orders_tables::Migration),
            Box::new(m20240301_000002_create_return_exchange_requests_table::Migration),
            Box::new(m20240301_000003_create_payment_tables::Migration),
            Box::new(m20240301_000004_create_notification_tables::Migration),
            Box::new(m20240301_000005_add_fulfillment_indexes::Migration),
        ]
    }
}
