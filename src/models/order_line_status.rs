use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Fulfillment status of a single order line.
///
/// Stored as its SCREAMING_SNAKE_CASE string. Every status change goes through
/// [`OrderLineStatus::check_transition`]; nothing writes a status the table
/// below does not allow.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum OrderLineStatus {
    #[sea_orm(string_value = "PENDING_PAYMENT")]
    PendingPayment,
    #[sea_orm(string_value = "PAID")]
    Paid,
    #[sea_orm(string_value = "IN_TRANSIT")]
    InTransit,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "RETURN_REQUESTED")]
    ReturnRequested,
    #[sea_orm(string_value = "RETURNED")]
    Returned,
    #[sea_orm(string_value = "EXCHANGE_REQUESTED")]
    ExchangeRequested,
    #[sea_orm(string_value = "EXCHANGE_IN_TRANSIT")]
    ExchangeInTransit,
    #[sea_orm(string_value = "EXCHANGE_DELIVERED")]
    ExchangeDelivered,
    #[sea_orm(string_value = "CANCEL_REQUESTED")]
    CancelRequested,
    #[sea_orm(string_value = "CANCELED")]
    Canceled,
    #[sea_orm(string_value = "HOLD")]
    Hold,
}

/// Who is asking for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionActor {
    Admin,
    Reconciliation,
}

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("{from} is terminal")]
    Terminal { from: OrderLineStatus },
    #[error("{from} -> {to} is driven by delivery reconciliation only")]
    ReconciliationOnly {
        from: OrderLineStatus,
        to: OrderLineStatus,
    },
    #[error("{from} -> {to} is not a valid transition")]
    NotAllowed {
        from: OrderLineStatus,
        to: OrderLineStatus,
    },
}

use OrderLineStatus::*;

/// (from, to, actor allowed to drive it). `HOLD` has no outgoing rows: a held
/// line leaves through [`OrderLineStatus::check_release`] using the status it
/// was held from.
const TRANSITIONS: &[(OrderLineStatus, OrderLineStatus, TransitionActor)] = &[
    (PendingPayment, Paid, TransitionActor::Admin),
    (PendingPayment, Canceled, TransitionActor::Admin),
    (Paid, InTransit, TransitionActor::Admin),
    (Paid, CancelRequested, TransitionActor::Admin),
    (InTransit, Delivered, TransitionActor::Reconciliation),
    (Delivered, Confirmed, TransitionActor::Admin),
    (Delivered, ReturnRequested, TransitionActor::Admin),
    (Delivered, ExchangeRequested, TransitionActor::Admin),
    (ReturnRequested, Returned, TransitionActor::Admin),
    (ReturnRequested, Delivered, TransitionActor::Admin),
    (ExchangeRequested, ExchangeInTransit, TransitionActor::Admin),
    (ExchangeRequested, Delivered, TransitionActor::Admin),
    (ExchangeInTransit, ExchangeDelivered, TransitionActor::Reconciliation),
    (ExchangeDelivered, Confirmed, TransitionActor::Admin),
    (ExchangeDelivered, ReturnRequested, TransitionActor::Admin),
    (CancelRequested, Canceled, TransitionActor::Admin),
    (CancelRequested, Paid, TransitionActor::Admin),
];

impl OrderLineStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Confirmed | Returned | Canceled)
    }

    /// Statuses that open a return/exchange/cancel request on entry.
    pub fn is_request_state(self) -> bool {
        matches!(self, ReturnRequested | ExchangeRequested | CancelRequested)
    }

    /// A shipment is physically moving; reconciliation owns the next step.
    pub fn is_in_transit(self) -> bool {
        matches!(self, InTransit | ExchangeInTransit)
    }

    /// Whether a request targeting a line in this status may be approved.
    pub fn accepts_request_approval(self) -> bool {
        !matches!(self, PendingPayment)
    }

    /// Terminal status reconciliation advances an in-transit line to.
    pub fn delivered_counterpart(self) -> Option<OrderLineStatus> {
        match self {
            InTransit => Some(Delivered),
            ExchangeInTransit => Some(ExchangeDelivered),
            _ => None,
        }
    }

    pub fn check_transition(
        self,
        to: OrderLineStatus,
        actor: TransitionActor,
    ) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal { from: self });
        }
        if to == Hold {
            return if self == Hold {
                Err(TransitionError::NotAllowed { from: self, to })
            } else {
                Ok(())
            };
        }

        match TRANSITIONS
            .iter()
            .find(|(from, target, _)| *from == self && *target == to)
        {
            Some((_, _, required)) if *required == actor => Ok(()),
            Some((_, _, TransitionActor::Reconciliation)) => {
                Err(TransitionError::ReconciliationOnly { from: self, to })
            }
            // Reconciliation never drives admin edges
            Some(_) => Err(TransitionError::NotAllowed { from: self, to }),
            None => Err(TransitionError::NotAllowed { from: self, to }),
        }
    }

    /// Leaving `HOLD`: back to `held_from`, or anywhere `held_from` itself
    /// could go.
    pub fn check_release(
        held_from: OrderLineStatus,
        to: OrderLineStatus,
        actor: TransitionActor,
    ) -> Result<(), TransitionError> {
        if to == held_from && held_from != Hold {
            return Ok(());
        }
        held_from.check_transition(to, actor)
    }
}
