use crate::models::{OrderLineStatus, RequestKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handle used by commands and services to publish domain events.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends after a committed write. A closed channel only gets logged.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

// Events raised by the fulfillment subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderDeleted(Uuid),
    OrderMemoUpdated(Uuid),
    OrderLineSplit {
        order_id: Uuid,
        source_line_id: Uuid,
        new_line_id: Option<Uuid>,
        carved_quantity: i32,
        new_group: i32,
    },
    OrderLinesMerged {
        order_id: Uuid,
        target_line_id: Uuid,
        source_line_id: Uuid,
    },
    OrderLineStatusChanged {
        order_line_id: Uuid,
        old_status: OrderLineStatus,
        new_status: OrderLineStatus,
    },
    OrderLineDeleted(Uuid),
    TrackingRecorded {
        order_line_id: Uuid,
        courier_code: String,
        tracking_number: String,
    },
    ReturnRequestCreated {
        request_id: Uuid,
        order_line_id: Uuid,
        kind: RequestKind,
    },
    ReturnRequestUpdated(Uuid),
    ReturnRequestApproved {
        request_id: Uuid,
        approved: bool,
    },
    ReturnRequestDeleted(Uuid),
    PaymentRefunded {
        payment_id: Uuid,
        amount: Decimal,
        fully_refunded: bool,
    },
    DeliveryReconciled {
        run_id: Uuid,
        lines_advanced: usize,
    },
}

/// Drains the event channel, logging each event. Returns when every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::DeliveryReconciled {
                run_id,
                lines_advanced,
            } => {
                info!(%run_id, lines_advanced, "delivery reconciliation applied");
            }
            Event::PaymentRefunded {
                payment_id,
                amount,
                fully_refunded,
            } => {
                info!(%payment_id, %amount, fully_refunded, "payment refunded");
            }
            other => debug!(event = ?other, "domain event"),
        }
    }

    info!("Event processing loop finished");
}
