// Status and classification enums shared by entities, commands and handlers
pub mod order_line_status;
pub mod request_kind;

pub use order_line_status::{OrderLineStatus, TransitionActor, TransitionError};
pub use request_kind::{ApprovalState, PaymentType, RequestKind, RequesterType};
