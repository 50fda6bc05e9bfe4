use crate::{
    db::DbPool,
    events::EventSender,
    services::{
        orders::OrderService, reconciliation::DeliveryReconciler, refunds::RefundService,
        returns::ReturnService,
    },
};
use std::sync::Arc;

pub mod health;
pub mod order_lines;
pub mod orders;
pub mod payments;
pub mod reconciliation;
pub mod requests;

/// Services shared by every admin handler.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub returns: Arc<ReturnService>,
    pub refunds: Arc<RefundService>,
    pub reconciler: Arc<DeliveryReconciler>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        refunds: RefundService,
        reconciler: Arc<DeliveryReconciler>,
    ) -> Self {
        Self {
            orders: Arc::new(OrderService::new(db_pool.clone(), event_sender.clone())),
            returns: Arc::new(ReturnService::new(db_pool, event_sender)),
            refunds: Arc::new(refunds),
            reconciler,
        }
    }
}
