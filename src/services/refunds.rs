use crate::{
    db::DbPool,
    entities::{payment, point_ledger},
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// The payment provider's refund call.
#[async_trait]
pub trait RefundGateway: Send + Sync {
    async fn refund(&self, payment: &payment::Model, amount: Decimal) -> Result<(), ServiceError>;
}

/// Gateway for deployments that settle refunds in the provider console.
/// Accepts every refund and only records it in the log.
#[derive(Debug, Clone, Default)]
pub struct ManualRefundGateway;

#[async_trait]
impl RefundGateway for ManualRefundGateway {
    async fn refund(&self, payment: &payment::Model, amount: Decimal) -> Result<(), ServiceError> {
        info!(
            payment_id = %payment.id,
            provider_payment_key = ?payment.provider_payment_key,
            %amount,
            "refund recorded for manual settlement"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefundPaymentRequest {
    #[schema(value_type = String, example = "12000")]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefundResult {
    pub payment: payment::Model,
    pub fully_refunded: bool,
    /// Point ledger entries soft-deleted by this refund
    pub reversed_point_entries: u64,
}

#[derive(Clone)]
pub struct RefundService {
    db_pool: Arc<DbPool>,
    gateway: Arc<dyn RefundGateway>,
    event_sender: Arc<EventSender>,
}

impl RefundService {
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn RefundGateway>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db_pool,
            gateway,
            event_sender,
        }
    }

    /// Refunds `amount` of a payment through the gateway, then records it.
    /// A payment that becomes fully refunded also reverses the order's points.
    #[instrument(skip(self), fields(payment_id = %payment_id, amount = %amount))]
    pub async fn refund_payment(
        &self,
        payment_id: Uuid,
        amount: Decimal,
    ) -> Result<RefundResult, ServiceError> {
        let payment = payment::Entity::find_by_id(payment_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("payment", payment_id))?;
        check_refund_amount(&payment, amount)?;

        self.gateway.refund(&payment, amount).await.map_err(|e| {
            counter!("fulfillment_refund_failures_total", 1);
            error!(error = %e, "payment gateway refused refund");
            e
        })?;

        let result = self
            .db_pool
            .transaction::<_, RefundResult, ServiceError>(move |txn| {
                Box::pin(async move {
                    let payment = payment::Entity::find_by_id(payment_id)
                        .lock_exclusive()
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("payment", payment_id))?;
                    check_refund_amount(&payment, amount)?;

                    let order_id = payment.order_id;
                    let refunded_amount = payment.refunded_amount + amount;
                    let mut model: payment::ActiveModel = payment.into();
                    model.refunded_amount = Set(refunded_amount);
                    model.updated_at = Set(Utc::now());
                    let payment = model.update(txn).await?;

                    let fully_refunded = payment.refundable() <= Decimal::ZERO;
                    let mut reversed_point_entries = 0;
                    if fully_refunded {
                        reversed_point_entries = point_ledger::Entity::update_many()
                            .set(point_ledger::ActiveModel {
                                deleted: Set(true),
                                ..Default::default()
                            })
                            .filter(point_ledger::Column::OrderId.eq(order_id))
                            .filter(point_ledger::Column::Deleted.eq(false))
                            .exec(txn)
                            .await?
                            .rows_affected;
                    }

                    Ok(RefundResult {
                        payment,
                        fully_refunded,
                        reversed_point_entries,
                    })
                })
            })
            .await
            .map_err(|e| {
                let err = ServiceError::from(e);
                // The gateway already moved the money; this needs a human.
                error!(error = %err, "refund accepted by gateway but not recorded");
                err
            })?;

        counter!("fulfillment_refunds_total", 1);
        info!(
            fully_refunded = result.fully_refunded,
            reversed_points = result.reversed_point_entries,
            "payment refunded"
        );
        self.event_sender
            .send_or_log(Event::PaymentRefunded {
                payment_id,
                amount,
                fully_refunded: result.fully_refunded,
            })
            .await;

        Ok(result)
    }
}

fn check_refund_amount(payment: &payment::Model, amount: Decimal) -> Result<(), ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "refund amount must be positive, got {}",
            amount
        )));
    }
    if amount > payment.refundable() {
        return Err(ServiceError::ValidationError(format!(
            "refund of {} exceeds the {} still refundable on payment {}",
            amount,
            payment.refundable(),
            payment.id
        )));
    }
    Ok(())
}
