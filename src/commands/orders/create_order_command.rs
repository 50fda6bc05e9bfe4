use crate::{
    commands::Command,
    db::DbPool,
    entities::{order, order_line, payment, shipping_address},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderLineStatus, PaymentType},
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderCommand {
    pub member_id: Uuid,
    #[validate(length(min = 1, message = "At least one line is required"))]
    pub lines: Vec<NewOrderLine>,
    /// Copied onto every line as its active shipping address
    pub address: Option<NewShippingAddress>,
    pub memo: Option<String>,
    /// Lines start `PAID` when true, `PENDING_PAYMENT` otherwise
    #[serde(default = "default_paid")]
    pub paid: bool,
    #[serde(default)]
    pub payments: Vec<NewPayment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewOrderLine {
    pub product_variant_id: Uuid,
    #[validate(length(min = 1))]
    pub product_name: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewShippingAddress {
    #[validate(length(min = 1))]
    pub receiver_name: String,
    #[validate(length(min = 1))]
    pub receiver_phone: String,
    #[validate(length(min = 1))]
    pub address: String,
    pub address_detail: Option<String>,
    #[validate(length(min = 1))]
    pub zip_code: String,
    pub entry_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewPayment {
    pub payment_type: PaymentType,
    #[schema(value_type = String, example = "39000")]
    pub paid_amount: Decimal,
    pub provider_payment_key: Option<String>,
    pub provider_order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResult {
    pub order_id: Uuid,
    pub line_ids: Vec<Uuid>,
    pub payment_ids: Vec<Uuid>,
}

fn default_paid() -> bool {
    true
}

#[async_trait::async_trait]
impl Command for CreateOrderCommand {
    type Result = CreateOrderResult;

    #[instrument(skip(self, db_pool, event_sender), fields(member_id = %self.member_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate_all()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, CreateOrderResult, ServiceError>(move |txn| {
                Box::pin(async move { cmd.insert_rows(txn).await })
            })
            .await
            .map_err(|e| {
                let err = ServiceError::from(e);
                error!("Failed to create order: {}", err);
                err
            })?;

        counter!("fulfillment_orders_created_total", 1);
        info!(order_id = %result.order_id, lines = result.line_ids.len(), "order created");
        event_sender
            .send_or_log(Event::OrderCreated(result.order_id))
            .await;

        Ok(result)
    }
}

impl CreateOrderCommand {
    fn validate_all(&self) -> Result<(), ServiceError> {
        self.validate()?;
        for line in &self.lines {
            line.validate()?;
        }
        if let Some(address) = &self.address {
            address.validate()?;
        }
        if let Some(bad) = self.payments.iter().find(|p| p.paid_amount <= Decimal::ZERO) {
            return Err(ServiceError::ValidationError(format!(
                "paid amount must be positive, got {}",
                bad.paid_amount
            )));
        }
        Ok(())
    }

    async fn insert_rows(
        &self,
        txn: &sea_orm::DatabaseTransaction,
    ) -> Result<CreateOrderResult, ServiceError> {
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        order::ActiveModel {
            id: Set(order_id),
            member_id: Set(self.member_id),
            memo: Set(self.memo.clone()),
            memo_updated_at: Set(self.memo.as_ref().map(|_| now)),
            memo_checked: Set(false),
            deleted: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        let status = if self.paid {
            OrderLineStatus::Paid
        } else {
            OrderLineStatus::PendingPayment
        };

        let mut line_ids = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let line_id = Uuid::new_v4();
            order_line::ActiveModel {
                id: Set(line_id),
                order_id: Set(order_id),
                lineage_id: Set(line_id),
                product_variant_id: Set(line.product_variant_id),
                product_name: Set(line.product_name.clone()),
                paid_quantity: Set(line.quantity),
                quantity: Set(line.quantity),
                status: Set(status),
                held_from: Set(None),
                order_group: Set(1),
                courier_code: Set(None),
                tracking_number: Set(None),
                shipment_id: Set(None),
                delivered_at: Set(None),
                last_reconciliation_id: Set(None),
                deleted: Set(false),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(txn)
            .await?;

            if let Some(address) = &self.address {
                shipping_address::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_line_id: Set(line_id),
                    receiver_name: Set(address.receiver_name.clone()),
                    receiver_phone: Set(address.receiver_phone.clone()),
                    address: Set(address.address.clone()),
                    address_detail: Set(address.address_detail.clone()),
                    zip_code: Set(address.zip_code.clone()),
                    entry_instructions: Set(address.entry_instructions.clone()),
                    active: Set(true),
                    created_at: Set(now),
                }
                .insert(txn)
                .await?;
            }
            line_ids.push(line_id);
        }

        let mut payment_ids = Vec::with_capacity(self.payments.len());
        for new_payment in &self.payments {
            let payment_id = Uuid::new_v4();
            payment::ActiveModel {
                id: Set(payment_id),
                order_id: Set(order_id),
                payment_type: Set(new_payment.payment_type),
                paid_amount: Set(new_payment.paid_amount),
                refunded_amount: Set(Decimal::ZERO),
                provider_payment_key: Set(new_payment.provider_payment_key.clone()),
                provider_order_id: Set(new_payment.provider_order_id.clone()),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(txn)
            .await?;
            payment_ids.push(payment_id);
        }

        Ok(CreateOrderResult {
            order_id,
            line_ids,
            payment_ids,
        })
    }
}
